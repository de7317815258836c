//! WebSocket client for realtime occupancy ticks and alerts

use crowdpulse_core::config::RealtimeConfig;
use crowdpulse_core::{AlertEvent, Error, LiveOccupancyEvent, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Decoded push frame
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeMessage {
    /// Occupancy changed
    LiveOccupancy(LiveOccupancyEvent),
    /// Alert raised
    Alert(AlertEvent),
    /// Event this client does not handle
    Unknown(String),
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode a `{ "event": ..., "data": ... }` text frame
///
/// # Errors
///
/// Returns an error if the frame is not JSON or a known event's payload does
/// not match its type.
pub fn parse_frame(text: &str) -> Result<RealtimeMessage> {
    let frame: Frame = serde_json::from_str(text)?;
    match frame.event.as_str() {
        "live_occupancy" | "liveOccupancy" | "live-occupancy" => Ok(
            RealtimeMessage::LiveOccupancy(serde_json::from_value(frame.data)?),
        ),
        "alert" => Ok(RealtimeMessage::Alert(serde_json::from_value(frame.data)?)),
        _ => Ok(RealtimeMessage::Unknown(frame.event)),
    }
}

/// Where and as whom to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeEndpoint {
    /// Websocket URL
    pub url: String,
    /// Bearer token, sent as the `token` query parameter
    pub token: Option<String>,
    /// Site to subscribe to, sent as the `siteId` query parameter
    pub site_id: Option<String>,
}

impl RealtimeEndpoint {
    /// Full URL including the query parameters
    #[must_use]
    pub fn to_url(&self) -> String {
        let params: Vec<String> = [("token", &self.token), ("siteId", &self.site_id)]
            .into_iter()
            .filter_map(|(key, value)| {
                value
                    .as_deref()
                    .map(|v| format!("{key}={}", urlencoding::encode(v)))
            })
            .collect();

        if params.is_empty() {
            return self.url.clone();
        }
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{}", self.url, params.join("&"))
    }
}

/// Reconnect and buffering behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealtimeOptions {
    /// Pause between connection attempts
    pub reconnect_delay: Duration,
    /// Consecutive failed attempts before the channel gives up
    pub max_reconnect_attempts: u32,
    /// Buffered events per subscriber
    pub channel_capacity: usize,
}

impl Default for RealtimeOptions {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

impl From<&RealtimeConfig> for RealtimeOptions {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            max_reconnect_attempts: config.max_reconnect_attempts,
            channel_capacity: config.channel_capacity.max(1),
        }
    }
}

/// Handle to a background websocket task
///
/// Events are fanned out over broadcast channels, so every subscriber sees
/// every event delivered after it subscribed. When the task ends (after
/// `disconnect` or once reconnecting gives up) the channels close and
/// receivers observe `RecvError::Closed`.
#[derive(Debug)]
pub struct RealtimeChannel {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    occupancy: broadcast::Receiver<LiveOccupancyEvent>,
    alerts: broadcast::Receiver<AlertEvent>,
}

impl RealtimeChannel {
    /// Spawn the connection task; must be called inside a Tokio runtime
    #[must_use]
    pub fn connect(endpoint: &RealtimeEndpoint, options: RealtimeOptions) -> Self {
        let (occupancy_tx, occupancy) = broadcast::channel(options.channel_capacity);
        let (alert_tx, alerts) = broadcast::channel(options.channel_capacity);
        let cancel = CancellationToken::new();

        let worker = Worker {
            url: endpoint.to_url(),
            options,
            occupancy_tx,
            alert_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());

        Self {
            cancel,
            task,
            occupancy,
            alerts,
        }
    }

    /// Subscribe to live occupancy ticks
    #[must_use]
    pub fn on_live_occupancy(&self) -> broadcast::Receiver<LiveOccupancyEvent> {
        self.occupancy.resubscribe()
    }

    /// Subscribe to alerts
    #[must_use]
    pub fn on_alert(&self) -> broadcast::Receiver<AlertEvent> {
        self.alerts.resubscribe()
    }

    /// Stop the connection task
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    /// Whether the connection task has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task and wait for it to end
    ///
    /// # Errors
    ///
    /// Returns an error if the task panicked.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        (&mut self.task)
            .await
            .map_err(|e| Error::Realtime(format!("Connection task failed: {e}")))
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Reconnect,
    Stop,
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Worker {
    url: String,
    options: RealtimeOptions,
    occupancy_tx: broadcast::Sender<LiveOccupancyEvent>,
    alert_tx: broadcast::Sender<AlertEvent>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        let mut failures: u32 = 0;

        loop {
            let attempt = tokio::select! {
                () = self.cancel.cancelled() => break,
                attempt = connect_async(self.url.as_str()) => attempt,
            };

            match attempt {
                Ok((socket, _)) => {
                    info!("Realtime channel connected");
                    failures = 0;
                    if self.pump(socket).await == Flow::Stop {
                        break;
                    }
                    warn!("Realtime channel dropped, reconnecting");
                }
                Err(e) => {
                    failures += 1;
                    warn!(attempt = failures, error = %e, "Realtime connection failed");
                    if failures >= self.options.max_reconnect_attempts {
                        error!(
                            attempts = failures,
                            "Giving up on realtime channel"
                        );
                        break;
                    }
                }
            }

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.options.reconnect_delay) => {}
            }
        }

        info!("Realtime channel closed");
    }

    async fn pump(&self, socket: Socket) -> Flow {
        let (mut write, mut read) = socket.split();

        loop {
            let msg = tokio::select! {
                () = self.cancel.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!("Close frame not delivered: {e}");
                    }
                    return Flow::Stop;
                }
                msg = read.next() => msg,
            };

            match msg {
                Some(Ok(Message::Text(text))) => self.dispatch(&text),
                Some(Ok(Message::Ping(payload))) => {
                    if write.send(Message::Pong(payload)).await.is_err() {
                        return Flow::Reconnect;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Realtime connection closed by server");
                    return Flow::Reconnect;
                }
                Some(Err(e)) => {
                    error!("WebSocket error: {e}");
                    return Flow::Reconnect;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match parse_frame(text) {
            // send only fails when nobody is subscribed
            Ok(RealtimeMessage::LiveOccupancy(event)) => {
                debug!(occupancy = event.occupancy, "Live occupancy");
                let _ = self.occupancy_tx.send(event);
            }
            Ok(RealtimeMessage::Alert(event)) => {
                info!(severity = %event.severity, alert = %event.message, "Alert received");
                let _ = self.alert_tx.send(event);
            }
            Ok(RealtimeMessage::Unknown(name)) => debug!(event = %name, "Ignoring realtime event"),
            Err(e) => warn!("Failed to parse realtime message: {e}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crowdpulse_core::Severity;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_live_occupancy_frame() {
        let msg = parse_frame(
            r#"{"event": "live_occupancy", "data": {"siteId": "s-1", "occupancy": 182, "timestamp": 1700000000000}}"#,
        )
        .unwrap();

        match msg {
            RealtimeMessage::LiveOccupancy(event) => {
                assert_eq!(event.site_id.as_deref(), Some("s-1"));
                assert_eq!(event.occupancy, 182.0);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_parse_alert_frame() {
        let msg = parse_frame(
            r#"{"event": "alert", "data": {"message": "Zone B at capacity", "severity": "high"}}"#,
        )
        .unwrap();

        let RealtimeMessage::Alert(alert) = msg else {
            panic!("expected alert");
        };
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.message, "Zone B at capacity");
    }

    #[test]
    fn test_parse_unknown_and_malformed_frames() {
        assert_eq!(
            parse_frame(r#"{"event": "heartbeat"}"#).unwrap(),
            RealtimeMessage::Unknown("heartbeat".to_string())
        );
        assert!(parse_frame("not json").is_err());
        assert!(parse_frame(r#"{"event": "live_occupancy", "data": {"occupancy": "many"}}"#).is_err());
    }

    #[test]
    fn test_endpoint_url_building() {
        let bare = RealtimeEndpoint {
            url: "ws://localhost:8080/ws".to_string(),
            token: None,
            site_id: None,
        };
        assert_eq!(bare.to_url(), "ws://localhost:8080/ws");

        let full = RealtimeEndpoint {
            url: "wss://rt.example.com/ws".to_string(),
            token: Some("a b/c".to_string()),
            site_id: Some("site-1".to_string()),
        };
        assert_eq!(
            full.to_url(),
            "wss://rt.example.com/ws?token=a%20b%2Fc&siteId=site-1"
        );

        let with_query = RealtimeEndpoint {
            url: "ws://h/ws?v=2".to_string(),
            token: None,
            site_id: Some("s".to_string()),
        };
        assert_eq!(with_query.to_url(), "ws://h/ws?v=2&siteId=s");
    }

    #[test]
    fn test_options_from_config() {
        let config = RealtimeConfig {
            enabled: true,
            reconnect_delay_ms: 250,
            max_reconnect_attempts: 3,
            channel_capacity: 0,
        };
        let options = RealtimeOptions::from(&config);
        assert_eq!(options.reconnect_delay, Duration::from_millis(250));
        assert_eq!(options.max_reconnect_attempts, 3);
        assert_eq!(options.channel_capacity, 1);
    }
}
