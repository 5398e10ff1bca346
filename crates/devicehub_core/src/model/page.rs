//! Pagination bounds passed from service to repository.

use serde::{Deserialize, Serialize};

/// Row window for bounded list queries.
///
/// `limit == 0` means unbounded; an offset past the last row yields an
/// empty result rather than an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// Derives bounds from a 1-based page index and a page size.
    ///
    /// Page index `0` is treated as the first page.
    pub fn from_request(page: u32, size: u32) -> Self {
        Self {
            limit: size,
            offset: size.saturating_mul(page.saturating_sub(1)),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.limit == 0
    }
}
