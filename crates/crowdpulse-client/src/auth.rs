//! Login, logout and site resolution on top of the session store

use crate::{api_client::ApiClient, session::SessionStore};
use crowdpulse_core::types::{LoginRequest, LoginResponse};
use crowdpulse_core::{Error, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use validator::Validate;

/// Authentication service holding the session for the rest of the client
#[derive(Debug, Clone)]
pub struct AuthService {
    api: ApiClient,
    store: Arc<SessionStore>,
}

impl AuthService {
    /// Create a service that logs in through `api` and persists into `store`
    #[must_use]
    pub const fn new(api: ApiClient, store: Arc<SessionStore>) -> Self {
        Self { api, store }
    }

    /// Log in and resolve the session's site
    ///
    /// The token is stored as soon as the backend accepts the credentials.
    /// The site is then taken from the first entry of `/sites`; failing to
    /// resolve it is logged and does not fail the login, but any site from a
    /// previous session is dropped so it cannot be used with the new token.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty fields, the backend's rejection,
    /// or an error if the session cannot be saved.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse> {
        credentials.validate()?;

        let response = self.api.login(credentials).await?;
        self.store.set_token(response.token.clone())?;
        self.store.clear_site_id()?;
        info!(user = %credentials.email, "Logged in");

        self.resolve_site(&response.token).await;
        Ok(response)
    }

    async fn resolve_site(&self, token: &str) {
        let sites = self.api.clone().with_token(token).sites().await;
        match sites {
            Ok(sites) => match sites.first() {
                Some(site) => {
                    if let Err(e) = self.store.set_site_id(site.site_id.clone()) {
                        error!("Error saving site ID: {e}");
                    } else {
                        info!(site_id = %site.site_id, "Resolved session site");
                    }
                }
                None => warn!("Account has no sites; analytics views will be empty"),
            },
            Err(e) => error!("Error fetching site ID: {e}"),
        }
    }

    /// Forget the session
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be written.
    pub fn logout(&self) -> Result<()> {
        self.store.clear()?;
        info!("Logged out");
        Ok(())
    }

    /// Stored bearer token
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.store.token()
    }

    /// Whether a token is stored
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    /// Site resolved at login
    #[must_use]
    pub fn stored_site_id(&self) -> Option<String> {
        self.store.site_id()
    }

    /// The session store backing this service
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// API client carrying the stored token
    ///
    /// # Errors
    ///
    /// Returns `Error::NotAuthenticated` when no token is stored.
    pub fn authorized_client(&self) -> Result<ApiClient> {
        self.store
            .token()
            .filter(|t| !t.is_empty())
            .map(|token| self.api.clone().with_token(token))
            .ok_or(Error::NotAuthenticated)
    }
}
