//! Application state management

use crowdpulse_client::{
    ApiClient, AuthService, RealtimeChannel, RealtimeEndpoint, RealtimeOptions, SessionStore,
};
use crowdpulse_core::{Config, Error, Result, SiteId};
use std::sync::Arc;
use std::time::Duration;

/// Application state holding configuration and clients
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Login and session handling
    pub auth: AuthService,
}

impl AppState {
    /// Create new application state, opening the session file
    ///
    /// # Errors
    ///
    /// Returns an error if the session file exists but cannot be read.
    pub fn new(config: Config) -> Result<Self> {
        let store = SessionStore::open(&config.session.path)?;
        let api_client = ApiClient::new(&config.api.base_url)
            .with_timeout(Duration::from_secs(config.api.request_timeout));
        let auth = AuthService::new(api_client, Arc::new(store));

        Ok(Self { config, auth })
    }

    /// API client for views that need a logged-in session
    ///
    /// # Errors
    ///
    /// Returns `Error::NotAuthenticated` when nobody is logged in.
    pub fn require_session(&self) -> Result<ApiClient> {
        if !self.auth.is_authenticated() {
            return Err(Error::NotAuthenticated);
        }
        self.auth.authorized_client()
    }

    /// Site stored at login
    #[must_use]
    pub fn site_id(&self) -> Option<SiteId> {
        self.auth.stored_site_id()
    }

    /// Open the realtime channel for the session, if enabled
    #[must_use]
    pub fn connect_realtime(&self) -> Option<RealtimeChannel> {
        if !self.config.realtime.enabled {
            tracing::info!("Realtime updates disabled by configuration");
            return None;
        }
        let endpoint = RealtimeEndpoint {
            url: self.config.api.realtime_url.clone(),
            token: self.auth.token(),
            site_id: self.site_id(),
        };
        Some(RealtimeChannel::connect(
            &endpoint,
            RealtimeOptions::from(&self.config.realtime),
        ))
    }
}
