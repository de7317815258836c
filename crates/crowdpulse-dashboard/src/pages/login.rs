//! Login form state

use crowdpulse_client::AuthService;
use crowdpulse_core::types::LoginRequest;
use crowdpulse_core::{Error, Result};
use validator::Validate;

/// Shown when the backend rejects a login without saying why
pub const FALLBACK_LOGIN_ERROR: &str = "Please check your credentials and try again.";

/// Login form: fields, visibility toggle and submit status
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    /// Email address or login id
    pub email: String,
    /// Password
    pub password: String,
    show_password: bool,
    loading: bool,
    error_message: Option<String>,
}

impl LoginForm {
    /// Form pre-filled with credentials
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Show or hide the password, returning the new state
    pub const fn toggle_password_visibility(&mut self) -> bool {
        self.show_password = !self.show_password;
        self.show_password
    }

    /// Whether the password is shown in clear
    #[must_use]
    pub const fn is_password_visible(&self) -> bool {
        self.show_password
    }

    /// Password as it should be displayed
    #[must_use]
    pub fn password_display(&self) -> String {
        if self.show_password {
            self.password.clone()
        } else {
            "•".repeat(self.password.chars().count())
        }
    }

    /// Whether a submit is in flight
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Error from the last submit
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    fn request(&self) -> LoginRequest {
        LoginRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        }
    }

    /// Whether both fields are filled in
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.request().validate().is_ok()
    }

    /// Submit the form through `auth`
    ///
    /// An invalid form is not sent. A rejected login leaves the form with
    /// an error message: the backend's own when it gave one, otherwise
    /// [`FALLBACK_LOGIN_ERROR`].
    ///
    /// # Errors
    ///
    /// Returns the validation or login error.
    pub async fn submit(&mut self, auth: &AuthService) -> Result<()> {
        let request = self.request();
        if let Err(e) = request.validate() {
            let error = Error::from(e);
            self.error_message = error.user_message().map(str::to_string);
            return Err(error);
        }

        self.loading = true;
        self.error_message = None;

        let result = auth.login(&request).await;
        self.loading = false;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                self.error_message = Some(login_error_message(&e));
                Err(e)
            }
        }
    }
}

/// Message shown to the user for a failed login
#[must_use]
pub fn login_error_message(error: &Error) -> String {
    match error {
        Error::Http { .. } | Error::Authentication(_) | Error::Validation { .. } => error
            .user_message()
            .unwrap_or(FALLBACK_LOGIN_ERROR)
            .to_string(),
        _ => FALLBACK_LOGIN_ERROR.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_password_visibility_toggle() {
        let mut form = LoginForm::new("ops", "abc");
        assert_eq!(form.password_display(), "•••");
        assert!(form.toggle_password_visibility());
        assert_eq!(form.password_display(), "abc");
        assert!(!form.toggle_password_visibility());
    }

    #[test]
    fn test_validity() {
        assert!(LoginForm::new("ops", "pw").is_valid());
        assert!(!LoginForm::new("   ", "pw").is_valid());
        assert!(!LoginForm::new("ops", "").is_valid());
    }

    #[test]
    fn test_error_message_prefers_backend_text() {
        let err = Error::Authentication("Account locked".to_string());
        assert_eq!(login_error_message(&err), "Account locked");

        let err = Error::Http {
            status: 500,
            message: String::new(),
        };
        assert_eq!(login_error_message(&err), FALLBACK_LOGIN_ERROR);

        let err = Error::Network("connection refused".to_string());
        assert_eq!(login_error_message(&err), FALLBACK_LOGIN_ERROR);
    }
}
