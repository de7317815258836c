//! Formatting and pagination helpers shared by the dashboard views

use crate::types::{Comparison, FlexibleTime, TimeWindow};
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, TimeZone, Utc};

/// Marker rendered for missing values
pub const PLACEHOLDER: &str = "--";

/// Maximum page count shown without ellipses
const MAX_INLINE_PAGES: u32 = 7;

/// Display offset for `minutes` east of UTC, falling back to UTC when out of range
#[must_use]
pub fn display_offset(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

/// Format an average dwell time for the summary card
///
/// `hours` renders as `1.5 hrs`; anything else is treated as minutes and
/// rendered as `08min 30sec`.
#[must_use]
pub fn format_dwell_time(minutes: f64, unit: &str) -> String {
    if unit == "hours" {
        return format!("{minutes:.1} hrs");
    }
    let minutes = minutes.max(0.0);
    let whole = minutes.floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (mut mins, mut secs) = (whole as u64, ((minutes - whole) * 60.0).round() as u64);
    if secs == 60 {
        mins += 1;
        secs = 0;
    }
    format!("{mins:02}min {secs:02}sec")
}

/// Format a single visit's dwell as `HH:MM`
///
/// Visits still in progress (no exit time) and zero-length visits render as
/// the placeholder.
#[must_use]
pub fn format_entry_dwell(minutes: Option<f64>, exit_utc: Option<i64>) -> String {
    match (minutes, exit_utc) {
        (Some(m), Some(exit)) if exit != 0 && m > 0.0 => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let total = m.round() as u64;
            format!("{:02}:{:02}", total / 60, total % 60)
        }
        _ => PLACEHOLDER.to_string(),
    }
}

/// Format an entry/exit instant as `h:mm AM`
///
/// Prefers the epoch-millis value; falls back to the `HH:MM:SS` part of the
/// site-local text when the millis are absent or out of range.
#[must_use]
pub fn format_clock_time(utc_ms: Option<i64>, local: Option<&str>, offset: FixedOffset) -> String {
    if let Some(time) = utc_ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single()) {
        return time.with_timezone(&offset).format("%-I:%M %p").to_string();
    }
    local
        .and_then(extract_clock)
        .map_or_else(|| PLACEHOLDER.to_string(), |t| t.format("%-I:%M %p").to_string())
}

fn extract_clock(text: &str) -> Option<NaiveTime> {
    text.split_whitespace()
        .find_map(|part| NaiveTime::parse_from_str(part, "%H:%M:%S").ok())
}

/// Relative age of an alert: `Just now`, `5m ago`, `3h ago`, or the date
#[must_use]
pub fn format_alert_age(timestamp: &FlexibleTime, now: DateTime<Utc>) -> String {
    let Some(time) = timestamp.to_utc() else {
        return match timestamp {
            FlexibleTime::Millis(ms) => ms.to_string(),
            FlexibleTime::Text(text) => text.clone(),
        };
    };

    let elapsed = now.signed_duration_since(time);
    if elapsed < Duration::minutes(1) {
        "Just now".to_string()
    } else if elapsed < Duration::hours(1) {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed < Duration::hours(24) {
        format!("{}h ago", elapsed.num_hours())
    } else {
        time.format("%Y-%m-%d").to_string()
    }
}

/// Chart axis label for a bucket, `04:00 PM`
#[must_use]
pub fn bucket_label(time: DateTime<Utc>, offset: FixedOffset) -> String {
    time.with_timezone(&offset).format("%I:%M %p").to_string()
}

/// Two-letter initials for a person's avatar
#[must_use]
pub fn initials(name: Option<&str>) -> String {
    let words: Vec<&str> = name.unwrap_or_default().split_whitespace().collect();
    match words.as_slice() {
        [] => "??".to_string(),
        [single] => single.chars().take(2).collect::<String>().to_uppercase(),
        [first, .., last] => first
            .chars()
            .take(1)
            .chain(last.chars().take(1))
            .collect::<String>()
            .to_uppercase(),
    }
}

/// `part` as a rounded percentage of `total`; 0 when `total` is 0
#[must_use]
pub fn percentage(part: f64, total: f64) -> u32 {
    if total <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = (part / total * 100.0).round().clamp(0.0, 100.0) as u32;
    pct
}

/// Round a metric for display, grouping thousands: `1,234`
#[must_use]
pub fn format_count(value: f64) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Change badge text, `+12 (+8.5%)`
#[must_use]
pub fn format_change(comparison: &Comparison) -> String {
    let sign = if comparison.change >= 0.0 { "+" } else { "-" };
    let pct_sign = if comparison.change_percent >= 0.0 { "+" } else { "-" };
    format!(
        "{sign}{} ({pct_sign}{:.1}%)",
        format_count(comparison.change.abs()),
        comparison.change_percent.abs()
    )
}

/// Entry in a pager's page list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    /// A selectable page number
    Page(u32),
    /// A gap of hidden pages
    Ellipsis,
}

/// Pages to show in the pager
///
/// Up to seven pages are listed in full. Beyond that the first and last page
/// are always shown together with the neighbours of `current`, and ellipses
/// mark the gaps.
#[must_use]
pub fn page_numbers(total: u32, current: u32) -> Vec<PageItem> {
    if total <= MAX_INLINE_PAGES {
        return (1..=total).map(PageItem::Page).collect();
    }

    let mut pages = vec![PageItem::Page(1)];
    if current > 3 {
        pages.push(PageItem::Ellipsis);
    }

    let start = current.saturating_sub(1).max(2);
    let end = current.saturating_add(1).min(total - 1);
    pages.extend((start..=end).map(PageItem::Page));

    if current < total.saturating_sub(2) {
        pages.push(PageItem::Ellipsis);
    }
    pages.push(PageItem::Page(total));
    pages
}

/// Query windows used by one dashboard load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardWindows {
    /// Last 24 hours, for occupancy, dwell time and demographics
    pub recent: TimeWindow,
    /// Current UTC day, for footfall
    pub today: TimeWindow,
}

/// Compute the dashboard query windows relative to `now`
#[must_use]
pub fn dashboard_windows(now: DateTime<Utc>) -> DashboardWindows {
    let day_start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |naive| naive.and_utc());
    let day_end = day_start + Duration::days(1) - Duration::milliseconds(1);

    DashboardWindows {
        recent: TimeWindow::new(now - Duration::hours(24), now),
        today: TimeWindow::new(day_start, day_end),
    }
}
