//! Wire data types exchanged with the analytics backend
//!
//! The backend is lenient about field names and frequently omits values, so
//! every metric field is optional and the accessor methods fold the known
//! aliases into a single value with a zero default.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Site identifier type
pub type SiteId = String;

/// Credentials submitted to `/auth/login`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address or login id
    #[validate(length(min = 1, message = "Email or login ID is required"))]
    pub email: String,

    /// Account password
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Successful login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests
    pub token: String,
}

/// A monitored site the account has access to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    /// Site identifier used to scope every analytics query
    pub site_id: SiteId,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

/// A timestamp as the backend sends it: epoch milliseconds or text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlexibleTime {
    /// Milliseconds since the Unix epoch (UTC)
    Millis(i64),
    /// RFC 3339, `dd/mm/yyyy HH:MM:SS` or digits-only epoch millis
    Text(String),
}

impl FlexibleTime {
    /// Resolve to a UTC instant, if the value is parseable
    #[must_use]
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Self::Text(text) => parse_text_time(text.trim()),
        }
    }
}

impl From<DateTime<Utc>> for FlexibleTime {
    fn from(time: DateTime<Utc>) -> Self {
        Self::Millis(time.timestamp_millis())
    }
}

fn parse_text_time(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    }
    ["%d/%m/%Y %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Inclusive query window in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    /// Window start
    pub from_utc: i64,
    /// Window end
    pub to_utc: i64,
}

impl TimeWindow {
    /// Window covering `[from, to]`
    #[must_use]
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from_utc: from.timestamp_millis(),
            to_utc: to.timestamp_millis(),
        }
    }
}

/// Body of every site-scoped analytics query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    /// Site to query
    pub site_id: SiteId,
    /// Window start, epoch millis
    pub from_utc: i64,
    /// Window end, epoch millis
    pub to_utc: i64,
}

impl AnalyticsQuery {
    /// Query for `site_id` over `window`
    #[must_use]
    pub fn new(site_id: impl Into<SiteId>, window: TimeWindow) -> Self {
        Self {
            site_id: site_id.into(),
            from_utc: window.from_utc,
            to_utc: window.to_utc,
        }
    }
}

/// Change against the previous comparable period
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    /// Absolute change
    #[serde(default)]
    pub change: f64,
    /// Relative change in percent
    #[serde(default)]
    pub change_percent: f64,
}

/// One aggregated occupancy bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupancyBucket {
    /// Bucket start, UTC
    #[serde(default)]
    pub utc: Option<FlexibleTime>,
    /// Bucket start, site-local
    #[serde(default)]
    pub local: Option<FlexibleTime>,
    /// Average occupancy over the bucket
    #[serde(default)]
    pub avg: Option<f64>,
}

/// One aggregated demographics bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographicsBucket {
    /// Bucket start, UTC
    #[serde(default)]
    pub utc: Option<FlexibleTime>,
    /// Bucket start, site-local
    #[serde(default)]
    pub local: Option<FlexibleTime>,
    /// Male count
    #[serde(default)]
    pub male: Option<f64>,
    /// Female count
    #[serde(default)]
    pub female: Option<f64>,
}

/// Legacy point format, still returned by some deployments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    /// Point time
    #[serde(default)]
    pub timestamp: Option<FlexibleTime>,
    /// Point time, older name
    #[serde(default)]
    pub time: Option<FlexibleTime>,
    /// Point time, older name
    #[serde(default)]
    pub date: Option<FlexibleTime>,
    /// Occupancy at the point
    #[serde(default)]
    pub occupancy: Option<f64>,
    /// Occupancy, older name
    #[serde(default)]
    pub count: Option<f64>,
    /// Male count
    #[serde(default)]
    pub male: Option<f64>,
    /// Female count
    #[serde(default)]
    pub female: Option<f64>,
}

impl TimeseriesPoint {
    /// Time from the first present of `timestamp`, `time`, `date`
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_ref()
            .or(self.time.as_ref())
            .or(self.date.as_ref())
            .and_then(FlexibleTime::to_utc)
    }

    /// Occupancy from `occupancy`, falling back to `count`
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.occupancy.or(self.count)
    }
}

/// Male/female split
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenderSplit {
    /// Male count
    #[serde(default)]
    pub male: f64,
    /// Female count
    #[serde(default)]
    pub female: f64,
}

impl GenderSplit {
    /// Sum of both groups
    #[must_use]
    pub fn total(&self) -> f64 {
        self.male + self.female
    }
}

/// A chart point with its resolved time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricPoint {
    /// Point time, when the backend supplied a parseable one
    pub time: Option<DateTime<Utc>>,
    /// Point value
    pub value: f64,
}

fn bucket_time(utc: Option<&FlexibleTime>, local: Option<&FlexibleTime>) -> Option<DateTime<Utc>> {
    utc.and_then(FlexibleTime::to_utc)
        .or_else(|| local.and_then(FlexibleTime::to_utc))
}

fn non_empty<T>(items: Option<&Vec<T>>) -> Option<&[T]> {
    items.map(Vec::as_slice).filter(|s| !s.is_empty())
}

/// Occupancy timeseries response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyResponse {
    /// Aggregated buckets
    #[serde(default)]
    pub buckets: Option<Vec<OccupancyBucket>>,
    /// Legacy timeseries
    #[serde(default)]
    pub timeseries: Option<Vec<TimeseriesPoint>>,
    /// Current occupancy reported alongside the legacy timeseries
    #[serde(default)]
    pub current_occupancy: Option<f64>,
    /// Alternate name for `currentOccupancy`
    #[serde(default)]
    pub occupancy: Option<f64>,
    /// Change against the previous period
    #[serde(default)]
    pub comparison: Option<Comparison>,
}

impl OccupancyResponse {
    /// Whether the response carries any usable series
    #[must_use]
    pub fn has_data(&self) -> bool {
        non_empty(self.buckets.as_ref()).is_some() || non_empty(self.timeseries.as_ref()).is_some()
    }

    /// Current occupancy: the latest bucket average, or for the legacy format
    /// the reported current value falling back to the last point
    #[must_use]
    pub fn current(&self) -> f64 {
        if let Some(buckets) = non_empty(self.buckets.as_ref()) {
            return buckets.last().and_then(|b| b.avg).unwrap_or(0.0);
        }
        if let Some(series) = non_empty(self.timeseries.as_ref()) {
            return self
                .current_occupancy
                .or(self.occupancy)
                .or_else(|| series.last().and_then(TimeseriesPoint::value))
                .unwrap_or(0.0);
        }
        0.0
    }

    /// Chart points, preferring buckets over the legacy series
    #[must_use]
    pub fn points(&self) -> Vec<MetricPoint> {
        if let Some(buckets) = non_empty(self.buckets.as_ref()) {
            return buckets
                .iter()
                .map(|b| MetricPoint {
                    time: bucket_time(b.utc.as_ref(), b.local.as_ref()),
                    value: b.avg.unwrap_or(0.0),
                })
                .collect();
        }
        non_empty(self.timeseries.as_ref())
            .map(|series| {
                series
                    .iter()
                    .map(|p| MetricPoint {
                        time: p.time(),
                        value: p.value().unwrap_or(0.0),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Time of the newest point carrying a parseable timestamp
    #[must_use]
    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.points().iter().filter_map(|p| p.time).max()
    }
}

/// Footfall count response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FootfallResponse {
    /// Entries in the window
    #[serde(default)]
    pub footfall: Option<f64>,
    /// Alternate name used by the daily endpoint
    #[serde(default)]
    pub today_footfall: Option<f64>,
    /// Generic count field
    #[serde(default)]
    pub count: Option<f64>,
    /// Change against the previous period
    #[serde(default)]
    pub comparison: Option<Comparison>,
}

impl FootfallResponse {
    /// Footfall from the first populated field
    #[must_use]
    pub fn value(&self) -> f64 {
        self.footfall
            .or(self.today_footfall)
            .or(self.count)
            .unwrap_or(0.0)
    }
}

/// Average dwell time response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DwellTimeResponse {
    /// Average dwell in minutes
    #[serde(default)]
    pub avg_dwell_minutes: Option<f64>,
    /// Older name for the average
    #[serde(default)]
    pub average_dwell_time: Option<f64>,
    /// Older name for the average
    #[serde(default)]
    pub dwell_time: Option<f64>,
    /// Older name for the average
    #[serde(default)]
    pub avg_dwell_time: Option<f64>,
    /// Change against the previous period
    #[serde(default)]
    pub comparison: Option<Comparison>,
}

impl DwellTimeResponse {
    /// Average dwell in minutes from the first populated field
    #[must_use]
    pub fn minutes(&self) -> f64 {
        self.avg_dwell_minutes
            .or(self.average_dwell_time)
            .or(self.dwell_time)
            .or(self.avg_dwell_time)
            .unwrap_or(0.0)
    }
}

/// Demographics timeseries response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemographicsResponse {
    /// Aggregated buckets
    #[serde(default)]
    pub buckets: Option<Vec<DemographicsBucket>>,
    /// Legacy timeseries
    #[serde(default)]
    pub timeseries: Option<Vec<TimeseriesPoint>>,
    /// Current split reported alongside the legacy timeseries
    #[serde(default)]
    pub current: Option<GenderSplit>,
}

impl DemographicsResponse {
    /// Whether the response carries any usable series
    #[must_use]
    pub fn has_data(&self) -> bool {
        non_empty(self.buckets.as_ref()).is_some() || non_empty(self.timeseries.as_ref()).is_some()
    }

    /// Current split: the latest bucket, or the reported `current` value
    #[must_use]
    pub fn current_split(&self) -> GenderSplit {
        if let Some(buckets) = non_empty(self.buckets.as_ref()) {
            return buckets
                .last()
                .map(|b| GenderSplit {
                    male: b.male.unwrap_or(0.0),
                    female: b.female.unwrap_or(0.0),
                })
                .unwrap_or_default();
        }
        if non_empty(self.timeseries.as_ref()).is_some() {
            return self.current.unwrap_or_default();
        }
        GenderSplit::default()
    }

    /// `(time, split)` pairs, preferring buckets over the legacy series
    #[must_use]
    pub fn points(&self) -> Vec<(Option<DateTime<Utc>>, GenderSplit)> {
        if let Some(buckets) = non_empty(self.buckets.as_ref()) {
            return buckets
                .iter()
                .map(|b| {
                    (
                        bucket_time(b.utc.as_ref(), b.local.as_ref()),
                        GenderSplit {
                            male: b.male.unwrap_or(0.0),
                            female: b.female.unwrap_or(0.0),
                        },
                    )
                })
                .collect();
        }
        non_empty(self.timeseries.as_ref())
            .map(|series| {
                series
                    .iter()
                    .map(|p| {
                        (
                            p.time(),
                            GenderSplit {
                                male: p.male.unwrap_or(0.0),
                                female: p.female.unwrap_or(0.0),
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One person's visit as recorded by the entry/exit sensors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryExitRecord {
    /// Tracked person id
    #[serde(default)]
    pub person_id: Option<String>,
    /// Display name
    #[serde(default)]
    pub person_name: Option<String>,
    /// `male` or `female`
    #[serde(default)]
    pub gender: Option<String>,
    /// Zone the visit was recorded in
    #[serde(default)]
    pub zone_name: Option<String>,
    /// Entry time, epoch millis
    #[serde(default)]
    pub entry_utc: Option<i64>,
    /// Entry time as site-local text
    #[serde(default)]
    pub entry_local: Option<String>,
    /// Exit time, epoch millis; absent while the person is still inside
    #[serde(default)]
    pub exit_utc: Option<i64>,
    /// Exit time as site-local text
    #[serde(default)]
    pub exit_local: Option<String>,
    /// Dwell in minutes
    #[serde(default)]
    pub dwell_minutes: Option<f64>,
}

/// One page of entry/exit records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryExitPage {
    /// Records on this page
    #[serde(default)]
    pub records: Option<Vec<EntryExitRecord>>,
    /// Records across all pages
    #[serde(default)]
    pub total_records: Option<u64>,
    /// Number of pages
    #[serde(default)]
    pub total_pages: Option<u32>,
    /// Page echoed back by the server
    #[serde(default)]
    pub page_number: Option<u32>,
    /// Page size echoed back by the server
    #[serde(default)]
    pub page_size: Option<u32>,
}

/// Server-side pagination request for entry/exit records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntriesQuery {
    /// Page number (1-based)
    pub page_number: u32,
    /// Records per page
    pub page_size: u32,
    /// Site scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<SiteId>,
}

/// Live occupancy tick pushed by the realtime channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveOccupancyEvent {
    /// Site the tick belongs to
    #[serde(default)]
    pub site_id: Option<SiteId>,
    /// People currently present
    pub occupancy: f64,
    /// Measurement time
    #[serde(default)]
    pub timestamp: Option<FlexibleTime>,
}

/// Alert severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Low,
    /// Needs attention
    Medium,
    /// Needs immediate action
    High,
    /// Severity the client does not recognise
    #[default]
    #[serde(other)]
    Unknown,
}

impl Severity {
    /// Fixed-width tag shown next to an alert
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW ",
            Self::Medium => "MED ",
            Self::High => "HIGH",
            Self::Unknown => "INFO",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Alert pushed by the realtime channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    /// Site the alert belongs to
    #[serde(default)]
    pub site_id: Option<SiteId>,
    /// Zone that triggered the alert
    #[serde(default)]
    pub zone_name: Option<String>,
    /// Human-readable alert text
    #[serde(default)]
    pub message: String,
    /// Alert severity
    #[serde(default)]
    pub severity: Severity,
    /// When the alert was raised
    #[serde(default)]
    pub timestamp: Option<FlexibleTime>,
}
