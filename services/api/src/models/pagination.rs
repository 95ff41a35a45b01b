//! `?page=&page_size=` pagination

use serde::{Deserialize, Serialize};

pub const MAX_PAGE_SIZE: u32 = 100;

/// Raw query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Resolved 1-based page with a bounded size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageParams {
    pub fn resolve(&self, default_size: u32) -> PageRequest {
        PageRequest {
            page: self.page.unwrap_or(1).max(1),
            page_size: self
                .page_size
                .unwrap_or(default_size)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl PageRequest {
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: i64, request: PageRequest) -> Self {
        Self {
            count,
            page: request.page,
            page_size: request.page_size,
            results,
        }
    }

    /// Cut one page out of a fully loaded list
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let count = all.len() as i64;
        let results = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.page_size as usize)
            .collect();
        Self::new(results, count, request)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_defaults_and_bounds() {
        let params = PageParams::default();
        assert_eq!(params.resolve(20), PageRequest { page: 1, page_size: 20 });

        let params = PageParams {
            page: Some(0),
            page_size: Some(1000),
        };
        assert_eq!(params.resolve(20), PageRequest { page: 1, page_size: 100 });
    }

    #[test]
    fn slices_the_requested_page() {
        let request = PageRequest { page: 2, page_size: 3 };
        let page = Page::from_vec((1..=7).collect::<Vec<_>>(), request);
        assert_eq!(page.count, 7);
        assert_eq!(page.results, vec![4, 5, 6]);
        assert_eq!(request.offset(), 3);
    }
}
