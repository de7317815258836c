//! Alert feed shared by the dashboard and entries views

use chrono::{DateTime, Utc};
use crowdpulse_core::AlertEvent;
use crowdpulse_core::types::FlexibleTime;
use crowdpulse_core::utils::format_alert_age;
use std::collections::VecDeque;
use std::fmt::Write as _;
use uuid::Uuid;

/// An alert as held by the feed
#[derive(Debug, Clone, PartialEq)]
pub struct AlertItem {
    /// Feed-local id used to dismiss the alert
    pub id: Uuid,
    /// The pushed event
    pub event: AlertEvent,
    /// When the client received it
    pub received_at: DateTime<Utc>,
}

/// Newest-first list of alerts with a size cap
///
/// The same timestamped event delivered twice (after a reconnect, for
/// instance) is kept once. Alerts without a timestamp cannot be told apart
/// from a recurrence, so every one of them is kept.
#[derive(Debug, Clone)]
pub struct AlertFeed {
    items: VecDeque<AlertItem>,
    max_alerts: usize,
    panel_open: bool,
}

impl AlertFeed {
    /// Empty feed holding at most `max_alerts` alerts
    #[must_use]
    pub fn new(max_alerts: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_alerts: max_alerts.max(1),
            panel_open: false,
        }
    }

    /// Add an alert at the front, returning its id
    ///
    /// Returns `None` for a redelivery of a timestamped alert already in the
    /// feed.
    pub fn push(&mut self, event: AlertEvent, now: DateTime<Utc>) -> Option<Uuid> {
        if event.timestamp.is_some() && self.items.iter().any(|item| item.event == event) {
            tracing::debug!(alert = %event.message, "Duplicate alert ignored");
            return None;
        }

        let id = Uuid::new_v4();
        self.items.push_front(AlertItem {
            id,
            event,
            received_at: now,
        });
        self.items.truncate(self.max_alerts);
        Some(id)
    }

    /// Remove one alert; false when no alert has that id
    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    /// Remove every alert
    pub fn dismiss_all(&mut self) {
        self.items.clear();
    }

    /// Open or close the alert panel, returning the new state
    pub const fn toggle_panel(&mut self) -> bool {
        self.panel_open = !self.panel_open;
        self.panel_open
    }

    /// Whether the alert panel is open
    #[must_use]
    pub const fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    /// Alerts not yet dismissed
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.items.len()
    }

    /// Alerts, newest first
    pub fn iter(&self) -> impl Iterator<Item = &AlertItem> {
        self.items.iter()
    }

    /// Whether the feed is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Badge line plus, when the panel is open, one line per alert
    #[must_use]
    pub fn render(&self, now: DateTime<Utc>) -> String {
        let mut out = format!("Alerts ({})", self.unread_count());
        if !self.panel_open {
            return out;
        }
        if self.items.is_empty() {
            out.push_str("\n  No alerts");
            return out;
        }
        for item in &self.items {
            let age = match &item.event.timestamp {
                Some(time) => format_alert_age(time, now),
                None => format_alert_age(&FlexibleTime::from(item.received_at), now),
            };
            let zone = item.event.zone_name.as_deref().unwrap_or("Site");
            let _ = write!(
                out,
                "\n  [{}] {zone}: {} ({age})",
                item.event.severity.label(),
                item.event.message
            );
        }
        out
    }
}
