//! Pagination state for server-side paged lists

use crowdpulse_core::utils::{PageItem, page_numbers};

/// Current position within a paged result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page (1-based)
    pub current_page: u32,
    /// Records per page
    pub page_size: u32,
    /// Records across all pages
    pub total_records: u64,
    /// Number of pages
    pub total_pages: u32,
}

impl Pagination {
    /// First page of an unknown result
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            current_page: 1,
            page_size: page_size.max(1),
            total_records: 0,
            total_pages: 0,
        }
    }

    /// Move to `page` if it lies within `1..=total_pages`
    ///
    /// Returns whether the page changed hands; out-of-range requests leave
    /// the state untouched.
    pub const fn go_to(&mut self, page: u32) -> bool {
        if page >= 1 && page <= self.total_pages {
            self.current_page = page;
            true
        } else {
            false
        }
    }

    /// Move back one page
    pub const fn previous(&mut self) -> bool {
        if self.has_prev() {
            self.go_to(self.current_page - 1)
        } else {
            false
        }
    }

    /// Move forward one page
    pub const fn next(&mut self) -> bool {
        if self.has_next() {
            self.go_to(self.current_page + 1)
        } else {
            false
        }
    }

    /// Whether a previous page exists
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    /// Whether a next page exists
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Record the totals reported by the server
    pub const fn set_totals(&mut self, total_records: u64, total_pages: u32) {
        self.total_records = total_records;
        self.total_pages = total_pages;
    }

    /// Whether the current page lies past the last known page
    #[must_use]
    pub const fn is_past_end(&self) -> bool {
        self.total_pages > 0 && self.current_page > self.total_pages
    }

    /// Move to the last known page if the current one lies past it
    pub const fn clamp_to_last(&mut self) -> bool {
        if self.is_past_end() {
            self.current_page = self.total_pages;
            true
        } else {
            false
        }
    }

    /// Forget the totals, keeping the requested page
    pub const fn reset_totals(&mut self) {
        self.set_totals(0, 0);
    }

    /// Pages to list in the pager
    #[must_use]
    pub fn page_numbers(&self) -> Vec<PageItem> {
        page_numbers(self.total_pages, self.current_page)
    }

    /// 1-based index range of the records shown on this page
    #[must_use]
    pub fn showing(&self) -> Option<(u64, u64)> {
        if self.total_records == 0 {
            return None;
        }
        let first = u64::from(self.current_page.saturating_sub(1)) * u64::from(self.page_size) + 1;
        let last = (first + u64::from(self.page_size) - 1).min(self.total_records);
        (first <= last).then_some((first, last))
    }

    /// One-line pager, `‹ 1 … 4 [5] 6 … 12 ›`
    ///
    /// The arrows are blanked when there is no page in that direction.
    #[must_use]
    pub fn render(&self) -> String {
        let mut parts = vec![if self.has_prev() { "‹" } else { " " }.to_string()];
        parts.extend(self.page_numbers().into_iter().map(|item| match item {
            PageItem::Page(n) if n == self.current_page => format!("[{n}]"),
            PageItem::Page(n) => n.to_string(),
            PageItem::Ellipsis => "…".to_string(),
        }));
        parts.push(if self.has_next() { "›" } else { " " }.to_string());
        parts.join(" ")
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(10)
    }
}
