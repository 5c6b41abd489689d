use serde::Serialize;

pub const EMPLOYEES_PAGE_SIZE: i64 = 7;
pub const REQUESTS_PAGE_SIZE: i64 = 10;
pub const USERS_PAGE_SIZE: i64 = 10;
pub const AREAS_PAGE_SIZE: i64 = 7;
pub const MANAGERS_PAGE_SIZE: i64 = 7;

/// Number of pages needed for `total` rows: `ceil(total / page_size)`.
pub fn page_count(total: i64, page_size: i64) -> i64 {
    if total <= 0 || page_size <= 0 {
        return 0;
    }
    (total + page_size - 1) / page_size
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub page_size: i64,
}

impl PageWindow {
    /// 1-based; missing or non-positive pages resolve to the first page.
    pub fn new(page: Option<i64>, page_size: i64) -> Self {
        Self {
            page: page.filter(|p| *p >= 1).unwrap_or(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn into_page<T>(self, rows: Vec<T>, total: i64) -> Page<T> {
        Page {
            rows,
            total,
            page: self.page,
            page_size: self.page_size,
            total_pages: page_count(total, self.page_size),
        }
    }

    /// Pages an already filtered in-memory list.
    pub fn slice<T>(self, items: Vec<T>) -> Page<T> {
        let total = items.len() as i64;
        let rows = items
            .into_iter()
            .skip(self.offset().max(0) as usize)
            .take(self.page_size as usize)
            .collect();
        self.into_page(rows, total)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}
