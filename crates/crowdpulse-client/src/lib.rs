//! `CrowdPulse` backend client
//!
//! REST access to the analytics API, the persisted login session and the
//! realtime push channel.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod api_client;
pub mod auth;
pub mod realtime;
pub mod session;

// Re-export the main types
pub use api_client::ApiClient;
pub use auth::AuthService;
pub use realtime::{RealtimeChannel, RealtimeEndpoint, RealtimeOptions};
pub use session::{Session, SessionStore};
