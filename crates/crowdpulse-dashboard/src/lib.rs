//! `CrowdPulse` dashboard
//!
//! View state for the login, dashboard and entries screens, the live-update
//! reconciliation between REST snapshots and realtime events, and the
//! command handlers behind the `crowdpulse` binary.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod components;
pub mod pages;
pub mod runner;
pub mod state;

// Re-export the main types
pub use pages::dashboard::{DashboardSnapshot, DashboardView};
pub use pages::entries::EntriesView;
pub use pages::login::LoginForm;
pub use state::AppState;
