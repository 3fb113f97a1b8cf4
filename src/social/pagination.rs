use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;

/// Page-number pagination parameters as they arrive in a query string.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Resolved, clamped pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn resolve(query: PageQuery, config: &PaginationConfig) -> Self {
        let size = query
            .page_size
            .unwrap_or(config.page_size)
            .clamp(1, config.max_page_size.max(1));
        Self::new(query.page.unwrap_or(1), size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, PaginationConfig::default().page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: i64, req: PageRequest) -> Self {
        Self {
            has_next: req.offset() + (results.len() as i64) < count,
            has_previous: req.page > 1,
            count,
            page: req.page,
            page_size: req.page_size,
            results,
        }
    }

    pub fn next_page(&self) -> u32 {
        self.page.saturating_add(1)
    }

    pub fn previous_page(&self) -> u32 {
        self.page.saturating_sub(1).max(1)
    }
}
