//! Views of the terminal dashboard

pub mod dashboard;
pub mod entries;
pub mod login;
