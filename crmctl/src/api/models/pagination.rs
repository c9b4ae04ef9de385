//! Shared pagination types for API query parameters.
//!
//! List endpoints use page-based pagination with `page` and `limit` parameters. Each endpoint
//! picks its own default page size; the maximum is shared.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 100;

/// Page-based pagination parameters.
///
/// - `page`: 1-based page number (default: 1)
/// - `limit`: items per page, clamped to 1..=100
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Page number, starting at 1
    #[param(default = 1, minimum = 1)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page: Option<i64>,

    /// Maximum number of items to return (max: 100)
    #[param(minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub limit: Option<i64>,
}

impl Pagination {
    /// Get the page, defaulting to 1 and never below it.
    #[inline]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Get the limit, clamped between 1 and MAX_LIMIT. `default` applies when not specified.
    #[inline]
    pub fn limit(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
    }

    /// Rows to skip for the requested page.
    #[inline]
    pub fn skip(&self, default: i64) -> i64 {
        (self.page() - 1).saturating_mul(self.limit(default))
    }

    /// Metadata block for a response, given the total row count.
    pub fn meta(&self, default: i64, total: i64) -> PageMeta {
        let limit = self.limit(default);
        PageMeta {
            page: self.page(),
            limit,
            total,
            pages: (total + limit - 1) / limit,
        }
    }
}

/// Pagination metadata returned alongside list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    /// Total number of items matching the query (before pagination)
    pub total: i64,
    pub pages: i64,
}
