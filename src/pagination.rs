use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 50;

/// Query parameters shared by every list endpoint.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Pagination block returned alongside every page of rows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        Self {
            page,
            limit,
            total,
            // ceil(total / limit)
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// Normalizes raw page/limit values and returns (page, limit, offset).
pub fn clamp(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    (page, limit, (page - 1) * limit)
}

impl PageQuery {
    pub fn clamp(&self) -> (i64, i64, i64) {
        clamp(self.page, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_applies_defaults() {
        assert_eq!(clamp(None, None), (1, DEFAULT_LIMIT, 0));
    }

    #[test]
    fn clamp_rejects_out_of_range_values() {
        assert_eq!(clamp(Some(0), Some(0)), (1, 1, 0));
        assert_eq!(clamp(Some(-3), Some(500)), (1, MAX_LIMIT, 0));
    }

    #[test]
    fn clamp_computes_offset() {
        assert_eq!(clamp(Some(3), Some(10)), (3, 10, 20));
        assert_eq!(clamp(Some(1), Some(50)), (1, 50, 0));
    }

    #[test]
    fn total_pages_is_ceiling_of_total_over_limit() {
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 10, 1).total_pages, 1);
        assert_eq!(Pagination::new(1, 10, 10).total_pages, 1);
        assert_eq!(Pagination::new(1, 10, 11).total_pages, 2);
        assert_eq!(Pagination::new(1, 50, 101).total_pages, 3);
    }
}
