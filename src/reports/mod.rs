use serde::{Deserialize, Serialize};
use sqlx::prelude::Type;
use uuid::Uuid;
use validator::Validate;

use crate::pagination::Pagination;

pub mod handler;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "report_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportType {
    Post,
    Comment,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "report_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Resolved,
    Dismissed,
}

/// The reported row, once the type/id coherence check has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTarget {
    Post(Uuid),
    Comment(Uuid),
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReport {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Reason must be between 1 and 1000 characters"
    ))]
    pub reason: String,
    #[serde(rename = "type")]
    pub kind: ReportType,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
}

impl CreateReport {
    /// The id matching `type` must be present.
    pub fn target(&self) -> Option<ReportTarget> {
        match self.kind {
            ReportType::Post => self.post_id.map(ReportTarget::Post),
            ReportType::Comment => self.comment_id.map(ReportTarget::Comment),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReportStatus {
    pub status: ReportStatus,
    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<ReportStatus>,
}

/// Summary of the reported post
#[derive(Debug, Serialize)]
pub struct ReportedPost {
    pub id: Uuid,
    pub title: String,
}

/// Summary of the reported comment
#[derive(Debug, Serialize)]
pub struct ReportedComment {
    pub id: Uuid,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct Reporter {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: Uuid,
    pub reason: String,
    #[serde(rename = "type")]
    pub kind: ReportType,
    pub status: ReportStatus,
    pub notes: Option<String>,
    pub post: Option<ReportedPost>,
    pub comment: Option<ReportedComment>,
    pub reporter: Reporter,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReportListResponse {
    pub reports: Vec<ReportResponse>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_requires_id_matching_type() {
        let report: CreateReport =
            serde_json::from_str(r#"{"reason": "spam", "type": "POST"}"#).unwrap();
        assert_eq!(report.target(), None);

        let id = Uuid::new_v4();
        let report: CreateReport = serde_json::from_str(&format!(
            r#"{{"reason": "spam", "type": "POST", "postId": "{}"}}"#,
            id
        ))
        .unwrap();
        assert_eq!(report.target(), Some(ReportTarget::Post(id)));

        // an id of the wrong kind does not satisfy the check
        let report: CreateReport = serde_json::from_str(&format!(
            r#"{{"reason": "spam", "type": "COMMENT", "postId": "{}"}}"#,
            id
        ))
        .unwrap();
        assert_eq!(report.target(), None);
    }

    #[test]
    fn statuses_use_uppercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&ReportStatus::Dismissed).unwrap(),
            r#""DISMISSED""#
        );
        let status: ReportStatus = serde_json::from_str(r#""PENDING""#).unwrap();
        assert_eq!(status, ReportStatus::Pending);
    }
}
