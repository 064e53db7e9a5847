use crate::error::{ErrorKind, Result};

/// Largest page size handed out to user-facing listings.
pub const MAX_PAGE_SIZE: u32 = 20;

/// A zero-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}
impl PageRequest {
    /// Create a page request with an exact page size.
    ///
    /// Returns [`ErrorKind::InvalidPage`] if `page_size` is zero.
    pub fn new(page: u32, page_size: u32) -> Result<Self> {
        if page_size == 0 {
            exn::bail!(ErrorKind::InvalidPage("page size must be greater than zero"));
        }
        Ok(Self { page, page_size })
    }

    /// Same as [`new`](Self::new), but caps the page size at [`MAX_PAGE_SIZE`].
    pub fn clamped(page: u32, page_size: u32) -> Result<Self> {
        Self::new(page, page_size.min(MAX_PAGE_SIZE))
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of items preceding this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.page_size)
    }

    /// The request for the page after this one.
    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            page_size: self.page_size,
        }
    }
}
impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Zero-indexed number of this page.
    pub page: u32,
    pub page_size: u32,
    /// Number of items across all pages at the time this page was read.
    pub total_items: u64,
    /// Number of pages across the full listing at the time this page was read.
    pub total_pages: u32,
}
impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        let total_pages = u32::try_from(total_items.div_ceil(u64::from(request.page_size))).unwrap_or(u32::MAX);
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total_items,
            total_pages,
        }
    }

    /// Whether the listing (as of this read) has a page after this one.
    pub fn has_next(&self) -> bool {
        self.page.saturating_add(1) < self.total_pages
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}
