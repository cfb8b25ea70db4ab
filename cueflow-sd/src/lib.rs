//! cueflow-sd library - Schedule Daemon
//!
//! Scheduled-playback daemon: CRUD over schedule entries, a periodic
//! pre-playback scanner with an at-most-once claim protocol, and
//! now-playing resolution for viewers.

pub mod api;
pub mod db;
pub mod error;
pub mod scanner;
pub mod sink;

pub use api::server::{build_router, AppContext};
