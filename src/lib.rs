//! Tracks Claude token usage against the rolling 5-hour budget windows.
//!
//! Usage events are segmented into session windows, weighted per model,
//! matched against a plan tier and turned into a snapshot with a burn rate and
//! an exhaustion forecast.

pub mod models;
pub mod services;
pub mod ui;
