//! Database access layer
//!
//! Provides connection initialization and shared models for the
//! schedules store.

pub mod init;
pub mod models;

pub use init::init_database;
pub use models::{Recurrence, Schedule, DEFAULT_DURATION_MIN};
