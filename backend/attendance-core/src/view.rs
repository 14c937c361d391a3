// src/view.rs
//
// Search, pagination and pager window over a published row set. Pages are 1-based.

use crate::breakdown::BreakdownRow;
use crate::model::{DailyRow, ReportRow};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_MAX_VISIBLE_PAGES: usize = 6;

/// Rows that can be matched by the search box.
pub trait Searchable {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

impl Searchable for ReportRow {
    fn id(&self) -> &str {
        &self.emp_id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Breakdown rows are searched by date and status.
impl Searchable for BreakdownRow {
    fn id(&self) -> &str {
        &self.date
    }

    fn name(&self) -> &str {
        self.status.label()
    }
}

impl Searchable for DailyRow {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Case-insensitive substring match on name or id. A blank query keeps every row.
pub fn filter<R: Searchable + Clone>(rows: &[R], query: &str) -> Vec<R> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|row| {
            row.name().to_lowercase().contains(&needle) || row.id().to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

pub fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1))
}

/// Rows `[(page-1)*size, min(len, page*size))`. Out of range pages are empty.
pub fn paginate<R>(rows: &[R], page_size: usize, page: usize) -> &[R] {
    let page_size = page_size.max(1);
    let start = page.saturating_sub(1).saturating_mul(page_size);
    if page == 0 || start >= rows.len() {
        return &[];
    }
    let end = rows.len().min(start + page_size);
    &rows[start..end]
}

/// Page numbers shown by the pager: at most `max_visible`, centred on
/// `current` where possible.
pub fn visible_pages(current: usize, total: usize, max_visible: usize) -> Vec<usize> {
    if total == 0 || max_visible == 0 {
        return Vec::new();
    }
    let current = current.clamp(1, total);
    let mut start = current.saturating_sub(max_visible / 2).max(1);
    let end = (start + max_visible - 1).min(total);
    if end + 1 - start < max_visible {
        start = (end + 1).saturating_sub(max_visible).max(1);
    }
    (start..=end).collect()
}

/// View state for one report table.
#[derive(Debug, Clone)]
pub struct ReportView<R> {
    rows: Vec<R>,
    query: String,
    page: usize,
    page_size: usize,
}

impl<R: Searchable + Clone> ReportView<R> {
    pub fn new(page_size: usize) -> Self {
        Self {
            rows: Vec::new(),
            query: String::new(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn set_rows(&mut self, rows: Vec<R>) {
        self.rows = rows;
        self.page = 1;
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.total_pages().max(1));
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filtered(&self) -> Vec<R> {
        filter(&self.rows, &self.query)
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.filtered().len(), self.page_size)
    }

    pub fn current_page(&self) -> Vec<R> {
        paginate(&self.filtered(), self.page_size, self.page).to_vec()
    }

    pub fn visible_pages(&self) -> Vec<usize> {
        visible_pages(self.page, self.total_pages(), DEFAULT_MAX_VISIBLE_PAGES)
    }
}
