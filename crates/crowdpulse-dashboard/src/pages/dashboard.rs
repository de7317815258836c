//! Dashboard view: REST snapshots with live updates layered on top
//!
//! The view is refreshed from two directions. Periodic snapshots replace
//! every metric at once, while the realtime channel pushes occupancy ticks
//! and alerts in between. Both sources advance a single "occupancy as of"
//! watermark: a snapshot whose latest bucket is older than the watermark
//! keeps the current value, and a tick older than the watermark is dropped,
//! whether the watermark came from a tick or a snapshot. Events for another
//! site are dropped too.

use chrono::{DateTime, FixedOffset, Utc};
use crowdpulse_client::ApiClient;
use crowdpulse_core::config::DashboardConfig;
use crowdpulse_core::types::{
    Comparison, DemographicsResponse, DwellTimeResponse, FlexibleTime, FootfallResponse,
    GenderSplit, OccupancyResponse,
};
use crowdpulse_core::utils::{
    dashboard_windows, display_offset, format_change, format_count, format_dwell_time,
    percentage,
};
use crowdpulse_core::{AlertEvent, LiveOccupancyEvent, SiteId};
use std::fmt::Write as _;
use tracing::{debug, error, info, warn};

use crate::components::alerts::AlertFeed;
use crate::components::charts::ChartData;

/// Width of chart bars in the text rendering
const CHART_WIDTH: usize = 40;

/// Dwell unit reported by the backend
const DWELL_UNIT: &str = "minutes";

/// Responses from one dashboard load; a failed request leaves its slot empty
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSnapshot {
    /// Occupancy over the last 24 hours
    pub occupancy: Option<OccupancyResponse>,
    /// Footfall for the current UTC day
    pub footfall: Option<FootfallResponse>,
    /// Average dwell over the last 24 hours
    pub dwell: Option<DwellTimeResponse>,
    /// Demographics over the last 24 hours
    pub demographics: Option<DemographicsResponse>,
    /// When the requests were issued
    pub fetched_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    /// Issue the four dashboard requests concurrently
    ///
    /// Each failure is logged and only blanks its own metric.
    pub async fn fetch(api: &ApiClient, site_id: &str, now: DateTime<Utc>) -> Self {
        let windows = dashboard_windows(now);

        let (occupancy, footfall, dwell, demographics) = tokio::join!(
            api.occupancy_timeseries(site_id, windows.recent),
            api.today_footfall(site_id, windows.today),
            api.average_dwell_time(site_id, windows.recent),
            api.demographics(site_id, windows.recent),
        );

        Self {
            occupancy: settle("occupancy", occupancy),
            footfall: settle("footfall", footfall),
            dwell: settle("dwell time", dwell),
            demographics: settle("demographics", demographics),
            fetched_at: now,
        }
    }
}

fn settle<T>(metric: &str, result: crowdpulse_core::Result<T>) -> Option<T> {
    result
        .map_err(|e| error!(metric, error = %e, "Error loading {metric}"))
        .ok()
}

/// State behind the dashboard screen
#[derive(Debug, Clone)]
pub struct DashboardView {
    site_id: Option<SiteId>,
    offset: FixedOffset,
    loading: bool,
    last_updated: Option<DateTime<Utc>>,
    occupancy_as_of: Option<DateTime<Utc>>,
    occupancy_from_tick: bool,

    /// People currently present
    pub live_occupancy: f64,
    /// Entries today
    pub today_footfall: f64,
    /// Average dwell
    pub average_dwell_minutes: f64,
    /// Unit of `average_dwell_minutes`
    pub dwell_unit: String,
    /// Occupancy change against the previous period
    pub occupancy_comparison: Option<Comparison>,
    /// Footfall change against the previous period
    pub footfall_comparison: Option<Comparison>,
    /// Dwell change against the previous period
    pub dwell_comparison: Option<Comparison>,
    /// Latest male/female split
    pub current_demographics: GenderSplit,
    /// Occupancy over the last 24 hours
    pub occupancy_chart: ChartData,
    /// Demographics over the last 24 hours
    pub demographics_chart: ChartData,
    /// Alerts received while the view is open
    pub alerts: AlertFeed,
}

impl DashboardView {
    /// Empty view for `site_id`, waiting for its first load
    #[must_use]
    pub fn new(site_id: Option<SiteId>, config: &DashboardConfig) -> Self {
        Self {
            site_id,
            offset: display_offset(config.utc_offset_minutes),
            loading: true,
            last_updated: None,
            occupancy_as_of: None,
            occupancy_from_tick: false,
            live_occupancy: 0.0,
            today_footfall: 0.0,
            average_dwell_minutes: 0.0,
            dwell_unit: DWELL_UNIT.to_string(),
            occupancy_comparison: None,
            footfall_comparison: None,
            dwell_comparison: None,
            current_demographics: GenderSplit::default(),
            occupancy_chart: ChartData::default(),
            demographics_chart: ChartData::default(),
            alerts: AlertFeed::new(config.max_alerts),
        }
    }

    /// Site the view is scoped to
    #[must_use]
    pub fn site_id(&self) -> Option<&str> {
        self.site_id.as_deref()
    }

    /// Whether a load is in progress
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// When the last snapshot was applied
    #[must_use]
    pub const fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Fetch and apply a fresh snapshot
    ///
    /// Without a site nothing is requested; the error is logged, loading
    /// stops and `false` is returned.
    pub async fn load(&mut self, api: &ApiClient, now: DateTime<Utc>) -> bool {
        let Some(site_id) = self.site_id.clone() else {
            error!("Site ID is required");
            self.loading = false;
            return false;
        };

        self.loading = true;
        let snapshot = DashboardSnapshot::fetch(api, &site_id, now).await;
        self.apply_snapshot(&snapshot);
        true
    }

    /// Replace every metric with the snapshot's values
    pub fn apply_snapshot(&mut self, snapshot: &DashboardSnapshot) {
        self.apply_occupancy(snapshot.occupancy.as_ref(), snapshot.fetched_at);

        self.today_footfall = snapshot.footfall.as_ref().map_or(0.0, FootfallResponse::value);
        self.footfall_comparison = snapshot.footfall.as_ref().and_then(|f| f.comparison);

        self.average_dwell_minutes = snapshot.dwell.as_ref().map_or(0.0, DwellTimeResponse::minutes);
        self.dwell_unit = DWELL_UNIT.to_string();
        self.dwell_comparison = snapshot.dwell.as_ref().and_then(|d| d.comparison);

        match snapshot.demographics.as_ref().filter(|d| d.has_data()) {
            Some(demographics) => {
                self.current_demographics = demographics.current_split();
                self.demographics_chart = ChartData::demographics(demographics, self.offset);
            }
            None => {
                if snapshot.demographics.is_some() {
                    warn!("No buckets or timeseries data found in demographics response");
                }
                self.current_demographics = GenderSplit::default();
                self.demographics_chart = ChartData::default();
            }
        }

        self.loading = false;
        self.last_updated = Some(snapshot.fetched_at);
        info!(
            occupancy = self.live_occupancy,
            footfall = self.today_footfall,
            dwell_minutes = self.average_dwell_minutes,
            "Dashboard refreshed"
        );
    }

    fn apply_occupancy(&mut self, response: Option<&OccupancyResponse>, fetched_at: DateTime<Utc>) {
        self.occupancy_comparison = response.and_then(|r| r.comparison);

        let Some(response) = response.filter(|r| r.has_data()) else {
            if response.is_some() {
                warn!("No buckets or timeseries data found in occupancy response");
            }
            self.occupancy_chart = ChartData::default();
            if !self.occupancy_from_tick {
                self.live_occupancy = 0.0;
            }
            return;
        };

        self.occupancy_chart = ChartData::occupancy(response, self.offset);

        let snapshot_at = response.latest_time().unwrap_or(fetched_at);
        match self.occupancy_as_of {
            Some(as_of) if as_of > snapshot_at => {
                debug!(%as_of, %snapshot_at, "Keeping newer live occupancy over snapshot");
            }
            _ => {
                self.live_occupancy = response.current();
                self.occupancy_as_of = Some(snapshot_at);
                self.occupancy_from_tick = false;
            }
        }
    }

    /// Apply a pushed occupancy tick; returns whether it changed the view
    ///
    /// Ticks without a timestamp are dated `received_at`.
    pub fn apply_live_occupancy(
        &mut self,
        event: &LiveOccupancyEvent,
        received_at: DateTime<Utc>,
    ) -> bool {
        if !self.is_own_site(event.site_id.as_deref()) {
            debug!(site = ?event.site_id, "Ignoring occupancy for another site");
            return false;
        }

        let tick_at = event
            .timestamp
            .as_ref()
            .and_then(FlexibleTime::to_utc)
            .unwrap_or(received_at);
        if self.occupancy_as_of.is_some_and(|as_of| tick_at < as_of) {
            debug!(%tick_at, "Ignoring stale occupancy tick");
            return false;
        }

        self.live_occupancy = event.occupancy;
        self.occupancy_as_of = Some(tick_at);
        self.occupancy_from_tick = true;
        true
    }

    /// Add a pushed alert to the feed; returns whether it was new
    pub fn apply_alert(&mut self, event: AlertEvent, now: DateTime<Utc>) -> bool {
        if !self.is_own_site(event.site_id.as_deref()) {
            debug!(site = ?event.site_id, "Ignoring alert for another site");
            return false;
        }
        self.alerts.push(event, now).is_some()
    }

    fn is_own_site(&self, site: Option<&str>) -> bool {
        match (site, self.site_id.as_deref()) {
            (Some(event_site), Some(own)) => event_site == own,
            _ => true,
        }
    }

    /// Male plus female in the latest split
    #[must_use]
    pub fn total_crowd(&self) -> f64 {
        self.current_demographics.total()
    }

    /// Male share of the crowd, rounded percent
    #[must_use]
    pub fn male_percentage(&self) -> u32 {
        percentage(self.current_demographics.male, self.total_crowd())
    }

    /// Female share of the crowd, rounded percent
    #[must_use]
    pub fn female_percentage(&self) -> u32 {
        percentage(self.current_demographics.female, self.total_crowd())
    }

    /// Average dwell for the summary card
    #[must_use]
    pub fn formatted_dwell_time(&self) -> String {
        format_dwell_time(self.average_dwell_minutes, &self.dwell_unit)
    }

    /// Full text rendering of the dashboard
    #[must_use]
    pub fn render(&self, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        let site = self.site_id.as_deref().unwrap_or("(no site)");
        let _ = write!(out, "CrowdPulse dashboard · site {site}");
        if let Some(updated) = self.last_updated {
            let _ = write!(
                out,
                " · updated {}",
                updated.with_timezone(&self.offset).format("%-I:%M %p")
            );
        }
        if self.loading {
            out.push_str(" · loading…");
        }
        out.push_str("\n\n");

        let cards = [
            ("Live occupancy", format_count(self.live_occupancy), self.occupancy_comparison),
            ("Today's footfall", format_count(self.today_footfall), self.footfall_comparison),
            ("Avg dwell time", self.formatted_dwell_time(), self.dwell_comparison),
        ];
        for (title, value, comparison) in cards {
            let _ = write!(out, "{title:<18}{value:>14}");
            if let Some(comparison) = comparison {
                let _ = write!(out, "   {}", format_change(&comparison));
            }
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "{:<18}{:>14}   Male {}% · Female {}%",
            "Total crowd",
            format_count(self.total_crowd()),
            self.male_percentage(),
            self.female_percentage()
        );

        let _ = write!(
            out,
            "\nOccupancy (last 24h)\n{}\n\nDemographics\n{}\n\n{}",
            self.occupancy_chart.render(CHART_WIDTH),
            self.demographics_chart.render(CHART_WIDTH),
            self.alerts.render(now)
        );
        out
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crowdpulse_core::Severity;
    use pretty_assertions::assert_eq;

    const HOUR_MS: i64 = 3_600_000;
    const BASE_MS: i64 = 1_700_000_000_000;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn view() -> DashboardView {
        DashboardView::new(Some("site-1".to_string()), &DashboardConfig::default())
    }

    fn occupancy(last_bucket_ms: i64, avg: f64) -> OccupancyResponse {
        serde_json::from_value(serde_json::json!({
            "buckets": [
                {"utc": last_bucket_ms - HOUR_MS, "avg": avg - 10.0},
                {"utc": last_bucket_ms, "avg": avg}
            ],
            "comparison": {"change": 5, "changePercent": 2.5}
        }))
        .unwrap()
    }

    fn snapshot(occupancy: Option<OccupancyResponse>, fetched_ms: i64) -> DashboardSnapshot {
        DashboardSnapshot {
            occupancy,
            footfall: Some(FootfallResponse {
                today_footfall: Some(1234.0),
                ..FootfallResponse::default()
            }),
            dwell: Some(DwellTimeResponse {
                avg_dwell_minutes: Some(8.5),
                ..DwellTimeResponse::default()
            }),
            demographics: Some(
                serde_json::from_value(serde_json::json!({
                    "buckets": [{"utc": BASE_MS, "male": 30, "female": 45}]
                }))
                .unwrap(),
            ),
            fetched_at: at(fetched_ms),
        }
    }

    fn tick(site: Option<&str>, occupancy: f64, ms: Option<i64>) -> LiveOccupancyEvent {
        LiveOccupancyEvent {
            site_id: site.map(str::to_string),
            occupancy,
            timestamp: ms.map(FlexibleTime::Millis),
        }
    }

    #[test]
    fn test_snapshot_sets_all_metrics() {
        let mut view = view();
        assert!(view.is_loading());

        view.apply_snapshot(&snapshot(Some(occupancy(BASE_MS, 150.0)), BASE_MS));

        assert!(!view.is_loading());
        assert_eq!(view.live_occupancy, 150.0);
        assert_eq!(view.today_footfall, 1234.0);
        assert_eq!(view.formatted_dwell_time(), "08min 30sec");
        assert_eq!(view.total_crowd(), 75.0);
        assert_eq!(view.male_percentage(), 40);
        assert_eq!(view.female_percentage(), 60);
        assert_eq!(view.occupancy_chart.labels.len(), 2);
        assert_eq!(view.occupancy_comparison.unwrap().change, 5.0);
        assert_eq!(view.last_updated(), Some(at(BASE_MS)));
    }

    #[test]
    fn test_failed_metrics_reset_to_zero() {
        let mut view = view();
        view.apply_snapshot(&snapshot(Some(occupancy(BASE_MS, 150.0)), BASE_MS));

        view.apply_snapshot(&DashboardSnapshot {
            fetched_at: at(BASE_MS + HOUR_MS),
            ..DashboardSnapshot::default()
        });

        assert_eq!(view.live_occupancy, 0.0);
        assert_eq!(view.today_footfall, 0.0);
        assert_eq!(view.average_dwell_minutes, 0.0);
        assert_eq!(view.total_crowd(), 0.0);
        assert_eq!(view.male_percentage(), 0);
        assert!(view.occupancy_chart.is_empty());
        assert!(view.occupancy_comparison.is_none());
    }

    #[test]
    fn test_newer_live_tick_survives_refresh() {
        let mut view = view();
        view.apply_snapshot(&snapshot(Some(occupancy(BASE_MS, 150.0)), BASE_MS));

        assert!(view.apply_live_occupancy(&tick(Some("site-1"), 171.0, Some(BASE_MS + 60_000)), at(BASE_MS + 60_000)));

        // the refresh still ends at the older bucket
        view.apply_snapshot(&snapshot(Some(occupancy(BASE_MS, 155.0)), BASE_MS + 120_000));
        assert_eq!(view.live_occupancy, 171.0);

        // a bucket past the tick takes over again
        view.apply_snapshot(&snapshot(Some(occupancy(BASE_MS + HOUR_MS, 190.0)), BASE_MS + HOUR_MS));
        assert_eq!(view.live_occupancy, 190.0);
    }

    #[test]
    fn test_tick_older_than_applied_snapshot_is_dropped() {
        let mut view = view();
        assert!(view.apply_live_occupancy(&tick(Some("site-1"), 100.0, Some(BASE_MS)), at(BASE_MS)));

        view.apply_snapshot(&snapshot(Some(occupancy(BASE_MS + 600_000, 300.0)), BASE_MS + 600_000));
        assert_eq!(view.live_occupancy, 300.0);

        // delayed tick from before the snapshot's bucket
        assert!(!view.apply_live_occupancy(
            &tick(Some("site-1"), 120.0, Some(BASE_MS + 300_000)),
            at(BASE_MS + 610_000)
        ));
        assert_eq!(view.live_occupancy, 300.0);

        assert!(view.apply_live_occupancy(
            &tick(Some("site-1"), 310.0, Some(BASE_MS + 660_000)),
            at(BASE_MS + 660_000)
        ));
        assert_eq!(view.live_occupancy, 310.0);
    }

    #[test]
    fn test_empty_refresh_keeps_live_tick() {
        let mut view = view();
        assert!(view.apply_live_occupancy(&tick(Some("site-1"), 42.0, Some(BASE_MS)), at(BASE_MS)));

        view.apply_snapshot(&DashboardSnapshot {
            fetched_at: at(BASE_MS + 60_000),
            ..DashboardSnapshot::default()
        });
        assert_eq!(view.live_occupancy, 42.0);
        assert_eq!(view.today_footfall, 0.0);
    }

    #[test]
    fn test_stale_and_foreign_ticks_are_ignored() {
        let mut view = view();
        assert!(view.apply_live_occupancy(&tick(Some("site-1"), 100.0, Some(BASE_MS)), at(BASE_MS)));
        assert!(!view.apply_live_occupancy(&tick(Some("site-1"), 90.0, Some(BASE_MS - 1)), at(BASE_MS)));
        assert!(!view.apply_live_occupancy(&tick(Some("site-2"), 5.0, Some(BASE_MS + 1)), at(BASE_MS)));
        assert_eq!(view.live_occupancy, 100.0);

        // untagged ticks are dated on receipt
        assert!(view.apply_live_occupancy(&tick(None, 101.0, None), at(BASE_MS + 5)));
        assert_eq!(view.live_occupancy, 101.0);
    }

    #[test]
    fn test_alerts_are_site_scoped_and_deduplicated() {
        let mut view = view();
        let alert = AlertEvent {
            site_id: Some("site-1".to_string()),
            zone_name: None,
            message: "Queue building".to_string(),
            severity: Severity::Low,
            timestamp: Some(FlexibleTime::Millis(BASE_MS)),
        };

        assert!(view.apply_alert(alert.clone(), at(BASE_MS)));
        assert!(!view.apply_alert(alert.clone(), at(BASE_MS)));
        assert!(!view.apply_alert(
            AlertEvent {
                site_id: Some("elsewhere".to_string()),
                ..alert
            },
            at(BASE_MS)
        ));
        assert_eq!(view.alerts.unread_count(), 1);
    }

    #[test]
    fn test_render_contains_cards() {
        let mut view = view();
        view.apply_snapshot(&snapshot(Some(occupancy(BASE_MS, 150.0)), BASE_MS));

        let text = view.render(at(BASE_MS));
        assert!(text.contains("CrowdPulse dashboard · site site-1"));
        assert!(text.contains("1,234"));
        assert!(text.contains("+5 (+2.5%)"));
        assert!(text.contains("Male 40% · Female 60%"));
        assert!(text.contains("◀ LIVE"));
        assert!(text.ends_with("Alerts (0)"));
    }

    #[tokio::test]
    async fn test_load_without_site_stops_loading() {
        let mut view = DashboardView::new(None, &DashboardConfig::default());
        let api = ApiClient::new("http://127.0.0.1:9");

        assert!(!view.load(&api, at(BASE_MS)).await);
        assert!(!view.is_loading());
        assert!(view.last_updated().is_none());
    }
}
