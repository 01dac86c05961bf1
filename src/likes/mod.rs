use serde::Serialize;

pub mod handler;

/// Result of a toggle: the state the like ended up in.
#[derive(Debug, Serialize)]
pub struct LikeToggleResponse {
    pub liked: bool,
}
