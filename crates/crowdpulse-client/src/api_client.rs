//! HTTP client for communicating with the analytics API

use crowdpulse_core::types::{
    AnalyticsQuery, DemographicsResponse, DwellTimeResponse, EntriesQuery, EntryExitPage,
    FootfallResponse, LoginRequest, LoginResponse, OccupancyResponse, Site, TimeWindow,
};
use crowdpulse_core::{Error, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// API client for making HTTP requests to the analytics backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the bearer token sent with every request
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL requests are resolved against
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a bearer token is attached
    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Exchange credentials for a session token
    ///
    /// # Errors
    ///
    /// Returns `Error::Authentication` when the credentials are rejected, or
    /// another error if the request fails or the response cannot be parsed.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse> {
        let request = self.client.post(self.url("auth/login")).json(credentials);
        self.execute(request, "log in").await
    }

    /// List the sites the session has access to
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the response cannot be parsed.
    pub async fn sites(&self) -> Result<Vec<Site>> {
        let request = self.client.get(self.url("sites"));
        self.execute(request, "fetch sites").await
    }

    /// Occupancy timeseries for a site
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the response cannot be parsed.
    pub async fn occupancy_timeseries(
        &self,
        site_id: &str,
        window: TimeWindow,
    ) -> Result<OccupancyResponse> {
        self.analytics("analytics/occupancy", site_id, window, "fetch occupancy")
            .await
    }

    /// Footfall for a site, normally over the current day
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the response cannot be parsed.
    pub async fn today_footfall(&self, site_id: &str, window: TimeWindow) -> Result<FootfallResponse> {
        self.analytics("analytics/footfall", site_id, window, "fetch footfall")
            .await
    }

    /// Average dwell time for a site
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the response cannot be parsed.
    pub async fn average_dwell_time(
        &self,
        site_id: &str,
        window: TimeWindow,
    ) -> Result<DwellTimeResponse> {
        self.analytics("analytics/dwell", site_id, window, "fetch dwell time")
            .await
    }

    /// Demographics timeseries for a site
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the response cannot be parsed.
    pub async fn demographics(
        &self,
        site_id: &str,
        window: TimeWindow,
    ) -> Result<DemographicsResponse> {
        self.analytics("analytics/demographics", site_id, window, "fetch demographics")
            .await
    }

    /// One page of entry/exit records
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the response cannot be parsed.
    pub async fn entry_exit_records(&self, query: &EntriesQuery) -> Result<EntryExitPage> {
        let request = self.client.post(self.url("analytics/entry-exit")).json(query);
        self.execute(request, "fetch entry/exit records").await
    }

    async fn analytics<T: DeserializeOwned>(
        &self,
        path: &str,
        site_id: &str,
        window: TimeWindow,
        action: &str,
    ) -> Result<T> {
        let body = AnalyticsQuery::new(site_id, window);
        let request = self.client.post(self.url(path)).json(&body);
        self.execute(request, action).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder, action: &str) -> Result<T> {
        let mut request = request.timeout(self.timeout);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                }
            } else {
                Error::Network(format!("Failed to {action}: {e}"))
            }
        })?;

        let status = response.status();
        debug!(%status, url = %response.url(), "{action}");

        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response to {action}: {e}")))?;

        if !status.is_success() {
            let message = error_message(&body);
            warn!(%status, reason = %message, "Failed to {action}");
            return Err(if status == StatusCode::UNAUTHORIZED {
                Error::Authentication(message)
            } else {
                Error::Http {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Pull the `message` (or `error`) field out of an error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_default()
}
