//! Entry/exit records view with server-side pagination

use chrono::{DateTime, FixedOffset, Utc};
use crowdpulse_client::ApiClient;
use crowdpulse_core::config::DashboardConfig;
use crowdpulse_core::types::{EntriesQuery, EntryExitPage, EntryExitRecord};
use crowdpulse_core::utils::{
    PLACEHOLDER, display_offset, format_clock_time, format_entry_dwell, initials,
};
use crowdpulse_core::{AlertEvent, Result, SiteId};
use std::fmt::Write as _;
use tracing::{debug, error, warn};

use crate::components::alerts::AlertFeed;
use crate::components::pagination::Pagination;

/// Identifies one page request so late responses can be recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// A record formatted for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    /// Avatar initials
    pub initials: String,
    /// Person name
    pub name: String,
    /// Gender badge
    pub gender: String,
    /// Zone
    pub zone: String,
    /// Entry clock time
    pub entry: String,
    /// Exit clock time
    pub exit: String,
    /// Visit length, `HH:MM`
    pub dwell: String,
}

impl EntryRow {
    fn from_record(record: &EntryExitRecord, offset: FixedOffset) -> Self {
        Self {
            initials: initials(record.person_name.as_deref()),
            name: record
                .person_name
                .clone()
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            gender: record.gender.clone().unwrap_or_else(|| PLACEHOLDER.to_string()),
            zone: record.zone_name.clone().unwrap_or_else(|| PLACEHOLDER.to_string()),
            entry: format_clock_time(record.entry_utc, record.entry_local.as_deref(), offset),
            exit: format_clock_time(record.exit_utc, record.exit_local.as_deref(), offset),
            dwell: format_entry_dwell(record.dwell_minutes, record.exit_utc),
        }
    }
}

/// State behind the entries screen
#[derive(Debug, Clone)]
pub struct EntriesView {
    site_id: Option<SiteId>,
    offset: FixedOffset,
    records: Vec<EntryExitRecord>,
    loading: bool,
    latest_ticket: u64,

    /// Page position and totals
    pub pagination: Pagination,
    /// Alerts received while the view is open
    pub alerts: AlertFeed,
}

impl EntriesView {
    /// View for `site_id` positioned on the first page
    #[must_use]
    pub fn new(site_id: Option<SiteId>, config: &DashboardConfig) -> Self {
        Self {
            site_id,
            offset: display_offset(config.utc_offset_minutes),
            records: Vec::new(),
            loading: false,
            latest_ticket: 0,
            pagination: Pagination::new(config.page_size),
            alerts: AlertFeed::new(config.max_alerts),
        }
    }

    /// Start on `page` instead of the first page
    ///
    /// The page count is unknown before the first load, so the page is taken
    /// as given; `load` falls back to the last page once the server's totals
    /// show it lies past the end.
    #[must_use]
    pub fn starting_at(mut self, page: u32) -> Self {
        self.pagination.current_page = page.max(1);
        self
    }

    /// Records on the current page
    #[must_use]
    pub fn records(&self) -> &[EntryExitRecord] {
        &self.records
    }

    /// Whether a page request is in flight
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Request body for the current page
    #[must_use]
    pub fn query(&self) -> EntriesQuery {
        EntriesQuery {
            page_number: self.pagination.current_page,
            page_size: self.pagination.page_size,
            site_id: self.site_id.clone(),
        }
    }

    /// Mark a request as started; responses to older tickets are dropped
    pub const fn begin_load(&mut self) -> LoadTicket {
        self.latest_ticket += 1;
        self.loading = true;
        LoadTicket(self.latest_ticket)
    }

    /// Apply the response to the request identified by `ticket`
    ///
    /// Returns `false`, leaving the view untouched, when a newer request has
    /// started since. Errors and responses without `records` empty the view.
    pub fn apply_page(&mut self, ticket: LoadTicket, result: Result<EntryExitPage>) -> bool {
        if ticket.0 != self.latest_ticket {
            debug!(ticket = ticket.0, latest = self.latest_ticket, "Dropping stale page");
            return false;
        }

        match result {
            Ok(EntryExitPage {
                records: Some(records),
                total_records,
                total_pages,
                ..
            }) => {
                self.records = records;
                self.pagination
                    .set_totals(total_records.unwrap_or(0), total_pages.unwrap_or(0));
            }
            Ok(page) => {
                warn!(?page, "Unexpected entry/exit response structure");
                self.clear();
            }
            Err(e) => {
                error!(error = %e, "Error loading entries");
                self.clear();
            }
        }

        self.loading = false;
        true
    }

    fn clear(&mut self) {
        self.records.clear();
        self.pagination.reset_totals();
    }

    /// Fetch and apply the current page
    ///
    /// A page past the end reported by the server is replaced by the last
    /// page, which is fetched once more.
    pub async fn load(&mut self, api: &ApiClient) -> bool {
        let applied = self.fetch_current(api).await;
        if !applied || !self.pagination.is_past_end() {
            return applied;
        }

        debug!(
            requested = self.pagination.current_page,
            total_pages = self.pagination.total_pages,
            "Requested page past the end, loading the last page"
        );
        self.pagination.clamp_to_last();
        self.fetch_current(api).await
    }

    async fn fetch_current(&mut self, api: &ApiClient) -> bool {
        let ticket = self.begin_load();
        let query = self.query();
        let result = api.entry_exit_records(&query).await;
        self.apply_page(ticket, result)
    }

    /// Load `page` if it is within range; returns whether a load happened
    pub async fn go_to_page(&mut self, api: &ApiClient, page: u32) -> bool {
        if !self.pagination.go_to(page) {
            return false;
        }
        self.load(api).await
    }

    /// Load the previous page if there is one
    pub async fn previous_page(&mut self, api: &ApiClient) -> bool {
        if !self.pagination.previous() {
            return false;
        }
        self.load(api).await
    }

    /// Load the next page if there is one
    pub async fn next_page(&mut self, api: &ApiClient) -> bool {
        if !self.pagination.next() {
            return false;
        }
        self.load(api).await
    }

    /// Add a pushed alert to the feed
    pub fn apply_alert(&mut self, event: AlertEvent, now: DateTime<Utc>) -> bool {
        self.alerts.push(event, now).is_some()
    }

    /// Current records formatted for display
    #[must_use]
    pub fn rows(&self) -> Vec<EntryRow> {
        self.records
            .iter()
            .map(|r| EntryRow::from_record(r, self.offset))
            .collect()
    }

    /// Table, pager and alert badge as text
    #[must_use]
    pub fn render(&self, now: DateTime<Utc>) -> String {
        let mut out = String::from("Crowd entries");
        if let Some(site) = &self.site_id {
            let _ = write!(out, " · site {site}");
        }
        if self.loading {
            out.push_str(" · loading…");
        }
        out.push_str("\n\n");

        let rows = self.rows();
        if rows.is_empty() {
            out.push_str("  No entries found\n");
        } else {
            let _ = writeln!(
                out,
                "  {:<4}{:<24}{:<8}{:<16}{:>9}{:>10}{:>8}",
                "", "Name", "Gender", "Zone", "Entry", "Exit", "Dwell"
            );
            for row in rows {
                let _ = writeln!(
                    out,
                    "  {:<4}{:<24}{:<8}{:<16}{:>9}{:>10}{:>8}",
                    row.initials, row.name, row.gender, row.zone, row.entry, row.exit, row.dwell
                );
            }
        }

        out.push('\n');
        if let Some((first, last)) = self.pagination.showing() {
            let _ = writeln!(
                out,
                "Showing {first}-{last} of {} entries",
                self.pagination.total_records
            );
        }
        let _ = write!(out, "{}\n\n{}", self.pagination.render(), self.alerts.render(now));
        out
    }
}
