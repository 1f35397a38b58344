use serde::{Deserialize, Serialize};

/// 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Rows to skip. Callers validate `page >= 1` first.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedList<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

impl<T> PagedList<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_count: u64) -> Self {
        let size = u64::from(request.page_size.max(1));
        let total_pages = total_count.div_ceil(size);
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total_count,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }
}
