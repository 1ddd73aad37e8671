//! Request DTOs for the HTTP API.

use serde::Deserialize;
use validator::Validate;

/// Share-by-email request.
#[derive(Debug, Deserialize, Validate)]
pub struct ShareRequest {
    /// Recipient address.
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
}

/// Pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    /// Page number (1-based).
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}
