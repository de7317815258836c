//! Chart datasets built from analytics snapshots and their text rendering

use chrono::FixedOffset;
use crowdpulse_core::types::{DemographicsResponse, OccupancyResponse};
use crowdpulse_core::utils::{PLACEHOLDER, bucket_label, format_count};
use std::fmt::Write as _;

/// Bar drawn for chart values
const BAR: char = '█';

/// One named line on a chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    /// Legend label
    pub label: String,
    /// One value per chart label
    pub values: Vec<f64>,
}

/// Labels plus the series plotted against them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartData {
    /// X-axis labels
    pub labels: Vec<String>,
    /// Plotted series
    pub series: Vec<ChartSeries>,
    /// Index of the point marked live, normally the last one
    pub live_index: Option<usize>,
}

impl ChartData {
    /// Occupancy line from buckets, or the legacy timeseries
    #[must_use]
    pub fn occupancy(response: &OccupancyResponse, offset: FixedOffset) -> Self {
        let points = response.points();
        let labels = points
            .iter()
            .map(|p| p.time.map_or_else(|| PLACEHOLDER.to_string(), |t| bucket_label(t, offset)))
            .collect();
        let values = points.iter().map(|p| p.value).collect();

        Self::with_live_tail(
            labels,
            vec![ChartSeries {
                label: "Occupancy".to_string(),
                values,
            }],
        )
    }

    /// Male and female lines from buckets, or the legacy timeseries
    #[must_use]
    pub fn demographics(response: &DemographicsResponse, offset: FixedOffset) -> Self {
        let points = response.points();
        let labels = points
            .iter()
            .map(|(time, _)| time.map_or_else(|| PLACEHOLDER.to_string(), |t| bucket_label(t, offset)))
            .collect();

        Self::with_live_tail(
            labels,
            vec![
                ChartSeries {
                    label: "Male".to_string(),
                    values: points.iter().map(|(_, split)| split.male).collect(),
                },
                ChartSeries {
                    label: "Female".to_string(),
                    values: points.iter().map(|(_, split)| split.female).collect(),
                },
            ],
        )
    }

    fn with_live_tail(labels: Vec<String>, series: Vec<ChartSeries>) -> Self {
        let live_index = labels.len().checked_sub(1);
        Self {
            labels,
            series,
            live_index,
        }
    }

    /// Whether there is nothing to plot
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn max_value(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .fold(0.0, f64::max)
    }

    /// Horizontal bar chart, one row per label and series
    ///
    /// Bars are scaled so the largest value spans `width` cells.
    #[must_use]
    pub fn render(&self, width: usize) -> String {
        if self.is_empty() {
            return "  No data".to_string();
        }

        let max = self.max_value();
        let label_width = self.labels.iter().map(String::len).max().unwrap_or(0);
        let series_width = self.series.iter().map(|s| s.label.len()).max().unwrap_or(0);
        let many = self.series.len() > 1;

        let mut out = String::new();
        for (index, label) in self.labels.iter().enumerate() {
            for (n, series) in self.series.iter().enumerate() {
                let value = series.values.get(index).copied().unwrap_or(0.0);
                let row_label = if n == 0 { label.as_str() } else { "" };
                let _ = write!(out, "  {row_label:>label_width$} ");
                if many {
                    let _ = write!(out, "{:<series_width$} ", series.label);
                }
                let bar: String = std::iter::repeat_n(BAR, bar_cells(value, max, width)).collect();
                let _ = write!(out, "{bar} {}", format_count(value));
                if n == 0 && self.live_index == Some(index) {
                    out.push_str("  ◀ LIVE");
                }
                out.push('\n');
            }
        }
        out.truncate(out.trim_end().len());
        out
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn bar_cells(value: f64, max: f64, width: usize) -> usize {
    if max <= 0.0 || value <= 0.0 {
        return 0;
    }
    ((value / max) * width as f64).round() as usize
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Offset, Utc};
    use pretty_assertions::assert_eq;

    fn utc() -> FixedOffset {
        Utc.fix()
    }

    #[test]
    fn test_occupancy_chart_from_buckets() {
        let response: OccupancyResponse = serde_json::from_str(
            r#"{"buckets": [
                {"utc": "2023-11-14T08:00:00Z", "avg": 50},
                {"utc": "2023-11-14T09:00:00Z", "avg": 100}
            ]}"#,
        )
        .unwrap();

        let chart = ChartData::occupancy(&response, utc());
        assert_eq!(chart.labels, vec!["08:00 AM", "09:00 AM"]);
        assert_eq!(chart.series[0].values, vec![50.0, 100.0]);
        assert_eq!(chart.live_index, Some(1));
    }

    #[test]
    fn test_demographics_chart_from_timeseries() {
        let response: DemographicsResponse = serde_json::from_str(
            r#"{"timeseries": [
                {"date": "2023-11-14T13:30:00Z", "male": 4, "female": 6}
            ], "current": {"male": 4, "female": 6}}"#,
        )
        .unwrap();

        let chart = ChartData::demographics(&response, FixedOffset::east_opt(3600).unwrap());
        assert_eq!(chart.labels, vec!["02:30 PM"]);
        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[1].values, vec![6.0]);
    }

    #[test]
    fn test_missing_time_uses_placeholder_label() {
        let response: OccupancyResponse =
            serde_json::from_str(r#"{"buckets": [{"avg": 3}]}"#).unwrap();
        let chart = ChartData::occupancy(&response, utc());
        assert_eq!(chart.labels, vec!["--"]);
    }

    #[test]
    fn test_render_scales_bars_and_marks_live() {
        let chart = ChartData {
            labels: vec!["A".to_string(), "B".to_string()],
            series: vec![ChartSeries {
                label: "Occupancy".to_string(),
                values: vec![5.0, 10.0],
            }],
            live_index: Some(1),
        };

        assert_eq!(chart.render(4), "  A ██ 5\n  B ████ 10  ◀ LIVE");
    }

    #[test]
    fn test_render_empty_chart() {
        assert_eq!(ChartData::default().render(10), "  No data");
    }

    #[test]
    fn test_bar_cells_handles_zero_max() {
        assert_eq!(bar_cells(5.0, 0.0, 10), 0);
        assert_eq!(bar_cells(0.0, 10.0, 10), 0);
        assert_eq!(bar_cells(10.0, 10.0, 10), 10);
    }
}
