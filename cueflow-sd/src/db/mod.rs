//! Database access layer
//!
//! Queries over the schedules table, including the conditional claim
//! update the scanner depends on.

pub mod schedules;
