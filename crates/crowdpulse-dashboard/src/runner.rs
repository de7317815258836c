//! Command handlers behind the `crowdpulse` binary

use chrono::{DateTime, Utc};
use crowdpulse_client::{ApiClient, RealtimeChannel};
use crowdpulse_core::{AlertEvent, Config, Error, LiveOccupancyEvent, Result};
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::pages::dashboard::DashboardView;
use crate::pages::entries::EntriesView;
use crate::pages::login::LoginForm;
use crate::state::AppState;

/// Clear the terminal and home the cursor
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Log in and report the resolved site
///
/// # Errors
///
/// Returns the validation or login error. A rejected login carries the
/// message the form shows.
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<String> {
    let mut form = LoginForm::new(email, password);
    if let Err(e) = form.submit(&state.auth).await {
        return Err(match form.error_message() {
            Some(message) if e.is_auth_failure() => Error::Authentication(message.to_string()),
            _ => e,
        });
    }

    Ok(match state.site_id() {
        Some(site) => format!("Logged in. Site: {site}"),
        None => "Logged in, but no site could be resolved for this account.".to_string(),
    })
}

/// Forget the stored session
///
/// # Errors
///
/// Returns an error if the session file cannot be written.
pub fn logout(state: &AppState) -> Result<String> {
    state.auth.logout()?;
    Ok("Logged out.".to_string())
}

/// Describe the stored session
#[must_use]
pub fn status(state: &AppState) -> String {
    let path = state.auth.store().path().display().to_string();
    if !state.auth.is_authenticated() {
        return format!("Not logged in (session file {path})");
    }
    let site = state.site_id().unwrap_or_else(|| "none".to_string());
    format!("Logged in\n  site:    {site}\n  session: {path}\n  backend: {}", state.config.api.base_url)
}

/// Load the dashboard once and render it
///
/// # Errors
///
/// Returns `Error::NotAuthenticated` without a session.
pub async fn dashboard_once(state: &AppState) -> Result<String> {
    let api = state.require_session()?;
    let mut view = DashboardView::new(state.site_id(), &state.config.dashboard);
    view.load(&api, Utc::now()).await;
    Ok(view.render(Utc::now()))
}

/// A screen that can be kept live by [`watch_screen`]
pub trait LiveScreen {
    /// Reload from the REST API; returns whether the screen changed
    fn reload(&mut self, api: &ApiClient) -> impl Future<Output = bool>;

    /// Apply a pushed occupancy tick; screens without occupancy ignore it
    fn on_occupancy(&mut self, _event: &LiveOccupancyEvent, _now: DateTime<Utc>) -> bool {
        false
    }

    /// Apply a pushed alert
    fn on_alert(&mut self, event: AlertEvent, now: DateTime<Utc>) -> bool;

    /// Text of the screen
    fn screen(&self, now: DateTime<Utc>) -> String;
}

impl LiveScreen for DashboardView {
    async fn reload(&mut self, api: &ApiClient) -> bool {
        self.load(api, Utc::now()).await
    }

    fn on_occupancy(&mut self, event: &LiveOccupancyEvent, now: DateTime<Utc>) -> bool {
        self.apply_live_occupancy(event, now)
    }

    fn on_alert(&mut self, event: AlertEvent, now: DateTime<Utc>) -> bool {
        self.apply_alert(event, now)
    }

    fn screen(&self, now: DateTime<Utc>) -> String {
        self.render(now)
    }
}

impl LiveScreen for EntriesView {
    async fn reload(&mut self, api: &ApiClient) -> bool {
        self.load(api).await
    }

    fn on_alert(&mut self, event: AlertEvent, now: DateTime<Utc>) -> bool {
        self.apply_alert(event, now)
    }

    fn screen(&self, now: DateTime<Utc>) -> String {
        self.render(now)
    }
}

/// Realtime subscriptions feeding a watched screen
#[derive(Debug, Default)]
pub struct LiveFeeds {
    /// Occupancy ticks, if subscribed
    pub occupancy: Option<broadcast::Receiver<LiveOccupancyEvent>>,
    /// Alerts, if subscribed
    pub alerts: Option<broadcast::Receiver<AlertEvent>>,
}

impl LiveFeeds {
    /// Alerts only, as the entries screen listens
    #[must_use]
    pub fn alerts_from(channel: Option<&RealtimeChannel>) -> Self {
        Self {
            occupancy: None,
            alerts: channel.map(RealtimeChannel::on_alert),
        }
    }

    /// Occupancy ticks and alerts
    #[must_use]
    pub fn all_from(channel: Option<&RealtimeChannel>) -> Self {
        Self {
            occupancy: channel.map(RealtimeChannel::on_live_occupancy),
            alerts: channel.map(RealtimeChannel::on_alert),
        }
    }
}

/// What a watch loop did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    /// Loop iterations, one per event, refresh or closed stream
    pub wakeups: usize,
    /// Periodic reloads
    pub refreshes: usize,
    /// Times the screen was drawn
    pub redraws: usize,
}

/// Keep `screen` up to date until `shutdown` completes
///
/// Pushed events are applied as they arrive and the screen is reloaded every
/// `refresh_every` when set. A closed stream is dropped from the loop; a
/// lagging one logs the number of skipped events and carries on. The screen
/// is handed to `draw` whenever something visible changed.
pub async fn watch_screen<S, F>(
    screen: &mut S,
    api: &ApiClient,
    mut feeds: LiveFeeds,
    refresh_every: Option<Duration>,
    shutdown: F,
    mut draw: impl FnMut(&str),
) -> WatchStats
where
    S: LiveScreen,
    F: Future<Output = ()>,
{
    let mut stats = WatchStats::default();
    let mut refresh = refresh_every.filter(|p| !p.is_zero()).map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });
    tokio::pin!(shutdown);

    loop {
        let redraw = tokio::select! {
            () = &mut shutdown => break,
            () = next_tick(&mut refresh) => {
                stats.refreshes += 1;
                screen.reload(api).await
            }
            event = next_event(&mut feeds.occupancy) => match event {
                Some(event) => screen.on_occupancy(&event, Utc::now()),
                None => {
                    warn!("Live occupancy stream ended");
                    feeds.occupancy = None;
                    false
                }
            },
            event = next_event(&mut feeds.alerts) => match event {
                Some(event) => screen.on_alert(event, Utc::now()),
                None => {
                    warn!("Alert stream ended");
                    feeds.alerts = None;
                    false
                }
            },
        };

        stats.wakeups += 1;
        if redraw {
            stats.redraws += 1;
            draw(&screen.screen(Utc::now()));
        }
    }
    stats
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Next event from an optional subscription; pends forever once it is gone
async fn next_event<T: Clone>(receiver: &mut Option<broadcast::Receiver<T>>) -> Option<T> {
    let Some(receiver) = receiver.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match receiver.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Screen fell behind the realtime channel");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Unable to listen for Ctrl+C");
        return;
    }
    info!("Received Ctrl+C, shutting down gracefully");
}

fn draw(screen: &str) {
    println!("{CLEAR_SCREEN}{screen}");
}

/// Keep the dashboard on screen until Ctrl+C
///
/// The REST snapshot is refreshed every `dashboard.refresh_interval`
/// seconds and realtime events are applied as they arrive.
///
/// # Errors
///
/// Returns `Error::NotAuthenticated` without a session, or an error if the
/// realtime task failed.
pub async fn watch_dashboard(state: &AppState) -> Result<()> {
    let api = state.require_session()?;
    let mut view = DashboardView::new(state.site_id(), &state.config.dashboard);
    view.load(&api, Utc::now()).await;
    view.alerts.toggle_panel();
    draw(&view.render(Utc::now()));

    let channel = state.connect_realtime();
    let feeds = LiveFeeds::all_from(channel.as_ref());
    let every = Duration::from_secs(state.config.dashboard.refresh_interval);

    info!("Watching dashboard. Press Ctrl+C to stop.");
    let stats = watch_screen(&mut view, &api, feeds, Some(every), ctrl_c(), draw).await;
    debug!(?stats, "Dashboard watch stopped");

    if let Some(channel) = channel {
        channel.shutdown().await?;
    }
    Ok(())
}

fn entries_view(state: &AppState, page: u32, page_size: Option<u32>) -> EntriesView {
    let mut config = state.config.dashboard.clone();
    if let Some(size) = page_size.filter(|s| *s > 0) {
        config.page_size = size;
    }
    EntriesView::new(state.site_id(), &config).starting_at(page)
}

/// Load one page of entry/exit records and render it
///
/// # Errors
///
/// Returns `Error::NotAuthenticated` without a session.
pub async fn entries(state: &AppState, page: u32, page_size: Option<u32>) -> Result<String> {
    let api = state.require_session()?;
    let mut view = entries_view(state, page, page_size);
    view.load(&api).await;
    Ok(view.render(Utc::now()))
}

/// Keep one page of entry/exit records on screen until Ctrl+C, adding
/// pushed alerts as they arrive
///
/// # Errors
///
/// Returns `Error::NotAuthenticated` without a session, or an error if the
/// realtime task failed.
pub async fn watch_entries(state: &AppState, page: u32, page_size: Option<u32>) -> Result<()> {
    let api = state.require_session()?;
    let mut view = entries_view(state, page, page_size);
    view.load(&api).await;
    view.alerts.toggle_panel();
    draw(&view.render(Utc::now()));

    let channel = state.connect_realtime();
    let feeds = LiveFeeds::alerts_from(channel.as_ref());

    info!("Watching entries. Press Ctrl+C to stop.");
    let stats = watch_screen(&mut view, &api, feeds, None, ctrl_c(), draw).await;
    debug!(?stats, "Entries watch stopped");

    if let Some(channel) = channel {
        channel.shutdown().await?;
    }
    Ok(())
}

/// Resolved configuration as TOML
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized.
pub fn show_config(config: &Config) -> Result<String> {
    toml::to_string_pretty(config)
        .map_err(|e| Error::configuration(format!("Failed to serialize configuration: {e}")))
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crowdpulse_core::Severity;
    use crowdpulse_core::config::DashboardConfig;
    use crowdpulse_core::types::FlexibleTime;
    use pretty_assertions::assert_eq;

    fn api() -> ApiClient {
        ApiClient::new("http://127.0.0.1:9")
    }

    fn alert(message: &str, ts: i64) -> AlertEvent {
        AlertEvent {
            site_id: Some("site-1".to_string()),
            zone_name: Some("Food court".to_string()),
            message: message.to_string(),
            severity: Severity::Medium,
            timestamp: Some(FlexibleTime::Millis(ts)),
        }
    }

    #[derive(Default)]
    struct CountingScreen {
        reloads: usize,
    }

    impl LiveScreen for CountingScreen {
        async fn reload(&mut self, _api: &ApiClient) -> bool {
            self.reloads += 1;
            true
        }

        fn on_alert(&mut self, _event: AlertEvent, _now: DateTime<Utc>) -> bool {
            false
        }

        fn screen(&self, _now: DateTime<Utc>) -> String {
            format!("reloads {}", self.reloads)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pushed_events_reach_dashboard() {
        let (occupancy_tx, occupancy_rx) = broadcast::channel(8);
        let (alert_tx, alert_rx) = broadcast::channel(8);
        occupancy_tx
            .send(LiveOccupancyEvent {
                site_id: Some("site-1".to_string()),
                occupancy: 42.0,
                timestamp: None,
            })
            .unwrap();
        alert_tx.send(alert("Queue at gate 3", 1_700_000_000_000)).unwrap();
        drop(occupancy_tx);
        drop(alert_tx);

        let mut view = DashboardView::new(Some("site-1".to_string()), &DashboardConfig::default());
        let mut frames = Vec::new();
        let feeds = LiveFeeds {
            occupancy: Some(occupancy_rx),
            alerts: Some(alert_rx),
        };

        let stats = watch_screen(
            &mut view,
            &api(),
            feeds,
            None,
            tokio::time::sleep(Duration::from_secs(1)),
            |screen: &str| frames.push(screen.to_string()),
        )
        .await;

        assert_eq!(view.live_occupancy, 42.0);
        assert_eq!(view.alerts.unread_count(), 1);
        // one event and one close per stream; closed streams stay quiet
        assert_eq!(
            stats,
            WatchStats {
                wakeups: 4,
                refreshes: 0,
                redraws: 2,
            }
        );
        assert!(frames.last().unwrap().contains("Alerts (1)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagging_alert_stream_keeps_going() {
        let (alert_tx, alert_rx) = broadcast::channel(1);
        for (i, message) in ["one", "two", "three"].into_iter().enumerate() {
            alert_tx.send(alert(message, i64::try_from(i).unwrap())).unwrap();
        }
        drop(alert_tx);

        let mut view = EntriesView::new(Some("site-1".to_string()), &DashboardConfig::default());
        let feeds = LiveFeeds {
            occupancy: None,
            alerts: Some(alert_rx),
        };

        let stats = watch_screen(
            &mut view,
            &api(),
            feeds,
            None,
            tokio::time::sleep(Duration::from_secs(1)),
            |_: &str| {},
        )
        .await;

        let messages: Vec<_> = view.alerts.iter().map(|a| a.event.message.clone()).collect();
        assert_eq!(messages, vec!["three".to_string()]);
        assert_eq!(stats.wakeups, 2);
        assert_eq!(stats.redraws, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_refresh() {
        let mut screen = CountingScreen::default();
        let mut frames = Vec::new();

        let stats = watch_screen(
            &mut screen,
            &api(),
            LiveFeeds::default(),
            Some(Duration::from_secs(60)),
            tokio::time::sleep(Duration::from_secs(150)),
            |s: &str| frames.push(s.to_string()),
        )
        .await;

        assert_eq!(screen.reloads, 2);
        assert_eq!(stats.refreshes, 2);
        assert_eq!(frames, vec!["reloads 1".to_string(), "reloads 2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_feeds_waits_for_shutdown() {
        let mut screen = CountingScreen::default();
        let stats = watch_screen(
            &mut screen,
            &api(),
            LiveFeeds::alerts_from(None),
            None,
            tokio::time::sleep(Duration::from_secs(5)),
            |_: &str| {},
        )
        .await;

        assert_eq!(stats, WatchStats::default());
    }
}
