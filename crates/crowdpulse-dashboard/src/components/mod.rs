//! Building blocks shared by the views

pub mod alerts;
pub mod charts;
pub mod pagination;
