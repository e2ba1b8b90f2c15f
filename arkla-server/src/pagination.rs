//! Pagination utilities
//!
//! Pages are 1-indexed. Out-of-range `page`/`limit` values are rejected rather
//! than clamped so clients notice bad requests.

use arkla_common::api::types::PaginationMeta;

use crate::error::{ApiError, ApiResult};

/// Validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Current page number (1-indexed)
    pub page: u32,
    /// Rows per page
    pub limit: u32,
}

impl PageRequest {
    /// Validate raw query values against `1 ..= max_limit`, applying defaults
    ///
    /// # Examples
    /// ```
    /// use arkla_server::pagination::PageRequest;
    ///
    /// let p = PageRequest::from_query(Some(3), None, 20, 100).unwrap();
    /// assert_eq!(p.page, 3);
    /// assert_eq!(p.limit, 20);
    /// assert_eq!(p.offset(), 40);
    ///
    /// assert!(PageRequest::from_query(Some(0), None, 20, 100).is_err());
    /// assert!(PageRequest::from_query(None, Some(101), 20, 100).is_err());
    /// ```
    pub fn from_query(
        page: Option<i64>,
        limit: Option<i64>,
        default_limit: u32,
        max_limit: u32,
    ) -> ApiResult<Self> {
        let page = page.unwrap_or(1);
        if page < 1 || page > i64::from(u32::MAX) {
            return Err(ApiError::Validation(format!(
                "page must be >= 1 (got {})",
                page
            )));
        }

        let limit = limit.unwrap_or(i64::from(default_limit));
        if limit < 1 || limit > i64::from(max_limit) {
            return Err(ApiError::Validation(format!(
                "limit must be between 1 and {} (got {})",
                max_limit, limit
            )));
        }

        Ok(Self {
            page: page as u32,
            limit: limit as u32,
        })
    }

    /// Offset for SQL LIMIT/OFFSET
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }

    /// Metadata for a result set of `total` rows
    pub fn meta(&self, total: i64) -> PaginationMeta {
        PaginationMeta::new(self.page, self.limit, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = PageRequest::from_query(None, None, 20, 100).unwrap();
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 20);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_offset() {
        let p = PageRequest::from_query(Some(2), Some(50), 20, 100).unwrap();
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn test_limit_bounds() {
        assert!(PageRequest::from_query(None, Some(0), 20, 100).is_err());
        assert!(PageRequest::from_query(None, Some(100), 20, 100).is_ok());
        assert!(PageRequest::from_query(None, Some(101), 20, 100).is_err());
        assert!(PageRequest::from_query(None, Some(500), 50, 500).is_ok());
    }

    #[test]
    fn test_page_bounds() {
        assert!(PageRequest::from_query(Some(0), None, 20, 100).is_err());
        assert!(PageRequest::from_query(Some(-3), None, 20, 100).is_err());
    }

    #[test]
    fn test_meta_past_last_page_is_not_clamped() {
        let p = PageRequest::from_query(Some(9), Some(10), 20, 100).unwrap();
        let meta = p.meta(25);
        assert_eq!(meta.page, 9);
        assert_eq!(meta.total_pages, 3);
    }
}
