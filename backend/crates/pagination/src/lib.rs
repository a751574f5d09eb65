//! Page/page-size pagination primitives shared by backend endpoints.
//!
//! Endpoints that page over result sets accept a 1-based `page` and a bounded
//! `page_size`. [`PageRequest`] validates both at construction time so
//! handlers and services never see an out-of-range page, and centralises the
//! offset/limit arithmetic used by persistence adapters.

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size applied when the caller does not supply one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Validation errors raised when constructing a [`PageRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    /// Pages are 1-based; zero is not a valid page number.
    #[error("page must be >= 1")]
    PageOutOfRange,
    /// Page size must lie in `1..=MAX_PAGE_SIZE`.
    #[error("page size must be between 1 and {MAX_PAGE_SIZE}")]
    PageSizeOutOfRange,
}

/// A validated pagination window.
///
/// ## Invariants
/// - `page >= 1`
/// - `1 <= page_size <= MAX_PAGE_SIZE`
///
/// # Examples
/// ```
/// use pagination::PageRequest;
///
/// let page = PageRequest::new(2, 25).expect("valid window");
/// assert_eq!(page.offset(), 25);
/// assert_eq!(page.limit(), 25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Construct a validated pagination window.
    pub fn new(page: u32, page_size: u32) -> Result<Self, PageError> {
        if page < 1 {
            return Err(PageError::PageOutOfRange);
        }
        if page_size < 1 || page_size > MAX_PAGE_SIZE {
            return Err(PageError::PageSizeOutOfRange);
        }
        Ok(Self { page, page_size })
    }

    /// The first page with the default page size.
    #[must_use]
    pub fn first() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// 1-based page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Number of items per page.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Row offset for the underlying query.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    /// Row limit for the underlying query.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// Whether pages beyond this one remain in a result set of `total` rows.
    #[must_use]
    pub fn has_more(&self, total: i64) -> bool {
        self.offset() + i64::from(self.page_size) < total
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn rejects_page_zero() {
        assert_eq!(PageRequest::new(0, 50), Err(PageError::PageOutOfRange));
    }

    #[rstest]
    #[case(0)]
    #[case(101)]
    #[case(150)]
    fn rejects_out_of_range_page_size(#[case] page_size: u32) {
        assert_eq!(
            PageRequest::new(1, page_size),
            Err(PageError::PageSizeOutOfRange)
        );
    }

    #[rstest]
    #[case(1, 50, 0)]
    #[case(2, 50, 50)]
    #[case(3, 10, 20)]
    fn computes_offset(#[case] page: u32, #[case] page_size: u32, #[case] offset: i64) {
        let request = PageRequest::new(page, page_size).expect("valid window");
        assert_eq!(request.offset(), offset);
    }

    #[rstest]
    fn has_more_is_true_only_when_rows_remain() {
        let request = PageRequest::new(2, 50).expect("valid window");
        assert!(request.has_more(150));
        assert!(!request.has_more(100));
        assert!(!request.has_more(99));
    }

    #[rstest]
    fn default_is_first_page_with_default_size() {
        let request = PageRequest::default();
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(request.offset(), 0);
    }

    #[rstest]
    fn boundary_page_size_is_accepted() {
        let request = PageRequest::new(1, MAX_PAGE_SIZE).expect("valid window");
        assert_eq!(request.limit(), i64::from(MAX_PAGE_SIZE));
    }
}
