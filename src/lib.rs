//! Video to audio conversion pipeline.
//!
//! Three services share this crate: the gateway stores uploads and queues
//! jobs, the converter turns queued videos into stored audio, and the
//! notifier announces finished conversions.

pub mod app;
pub mod common;
pub mod config;
pub mod infrastructure;
pub mod middleware;
pub mod modules;
pub mod routes;
pub mod state;
pub mod workers;
