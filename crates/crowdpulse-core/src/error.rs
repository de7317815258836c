//! Error types for the `CrowdPulse` dashboard

use std::{error::Error as StdError, fmt};

/// Main error type for the `CrowdPulse` dashboard
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Configuration error
    Configuration {
        /// Error message
        message: String,
    },

    /// Validation error
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// Credentials were rejected by the backend
    Authentication(String),

    /// No session token is stored
    NotAuthenticated,

    /// Backend answered with a non-success status
    Http {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body, if any
        message: String,
    },

    /// Transport-level failure talking to the backend
    Network(String),

    /// Realtime channel error
    Realtime(String),

    /// Session storage error
    Session(String),

    /// Not found error
    NotFound {
        /// Resource that was not found
        resource: String,
    },

    /// Timeout error
    Timeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Serialization error
    Serialization(serde_json::Error),

    /// Other error
    Other(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new validation error
    #[must_use]
    pub fn validation<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Message suitable for showing to the operator.
    ///
    /// For backend rejections this is the `message` the server sent, without
    /// the status prefix.
    #[must_use]
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Http { message, .. } | Self::Authentication(message) if !message.is_empty() => {
                Some(message)
            }
            Self::Validation { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Whether the error means the stored session is no longer usable
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_) | Self::NotAuthenticated | Self::Http { status: 401, .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Configuration { message } => write!(f, "Configuration error: {message}"),
            Self::Validation { field, message } => {
                write!(f, "Validation error: {field} - {message}")
            }
            Self::Authentication(msg) => write!(f, "Authentication failed: {msg}"),
            Self::NotAuthenticated => write!(f, "Not logged in"),
            Self::Http { status, message } if message.is_empty() => {
                write!(f, "API returned error: {status}")
            }
            Self::Http { status, message } => write!(f, "API returned error {status}: {message}"),
            Self::Network(msg) => write!(f, "Network error: {msg}"),
            Self::Realtime(msg) => write!(f, "Realtime channel error: {msg}"),
            Self::Session(msg) => write!(f, "Session error: {msg}"),
            Self::NotFound { resource } => write!(f, "Resource not found: {resource}"),
            Self::Timeout { duration_ms } => {
                write!(f, "Operation timed out after {duration_ms}ms")
            }
            Self::Serialization(err) => write!(f, "Serialization error: {err}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// From implementations for automatic conversions
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        fields
            .first()
            .map_or_else(
                || Self::validation("input", "invalid input"),
                |(field, errs)| {
                    let message = errs
                        .first()
                        .and_then(|e| e.message.as_ref())
                        .map_or_else(|| "is invalid".to_string(), ToString::to_string);
                    Self::validation(field.to_string(), message)
                },
            )
    }
}

#[cfg(test)]
#[allow(
    clippy::missing_panics_doc,
    clippy::unwrap_used,
    clippy::uninlined_format_args
)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io;

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let app_error = Error::from(io_error);

        assert!(matches!(app_error, Error::Io(_)));
        assert!(format!("{}", app_error).contains("I/O error"));
        assert!(app_error.source().is_some());
    }

    #[test]
    fn test_http_error_display() {
        let error = Error::Http {
            status: 500,
            message: String::new(),
        };
        assert_eq!(error.to_string(), "API returned error: 500");

        let error = Error::Http {
            status: 400,
            message: "siteId is required".to_string(),
        };
        assert_eq!(error.to_string(), "API returned error 400: siteId is required");
    }

    #[test]
    fn test_user_message_prefers_backend_text() {
        let error = Error::Http {
            status: 403,
            message: "Account locked".to_string(),
        };
        assert_eq!(error.user_message(), Some("Account locked"));

        let error = Error::Http {
            status: 502,
            message: String::new(),
        };
        assert_eq!(error.user_message(), None);

        assert_eq!(Error::Network("refused".to_string()).user_message(), None);
    }

    #[test]
    fn test_auth_failure_classification() {
        assert!(Error::NotAuthenticated.is_auth_failure());
        assert!(Error::Authentication("bad token".to_string()).is_auth_failure());
        assert!(
            Error::Http {
                status: 401,
                message: String::new()
            }
            .is_auth_failure()
        );
        assert!(
            !Error::Http {
                status: 500,
                message: String::new()
            }
            .is_auth_failure()
        );
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>(r#"{"invalid": json}"#)
            .unwrap_err();
        let app_error = Error::from(json_error);

        assert!(matches!(app_error, Error::Serialization(_)));
        assert!(app_error.source().is_some());
    }

    #[test]
    fn test_all_error_display_variants() {
        let test_cases = vec![
            (Error::Io(io::Error::other("test")), "I/O error:"),
            (Error::configuration("bad url"), "Configuration error: bad url"),
            (
                Error::validation("email", "is required"),
                "Validation error: email - is required",
            ),
            (
                Error::Authentication("expired".to_string()),
                "Authentication failed: expired",
            ),
            (Error::NotAuthenticated, "Not logged in"),
            (Error::Network("dns".to_string()), "Network error: dns"),
            (Error::Realtime("closed".to_string()), "Realtime channel error: closed"),
            (Error::Session("corrupt".to_string()), "Session error: corrupt"),
            (
                Error::NotFound {
                    resource: "site".to_string(),
                },
                "Resource not found: site",
            ),
            (
                Error::Timeout { duration_ms: 5000 },
                "Operation timed out after 5000ms",
            ),
            (Error::Other("other error".to_string()), "other error"),
        ];

        for (error, expected) in test_cases {
            let display = error.to_string();
            assert!(
                display.contains(expected),
                "Error display '{}' should contain '{}'",
                display,
                expected
            );
        }
    }
}
