//! # lib_signal
//!
//! Shared library behind the `signal2x-client` CLI and the `server_live` HTTP
//! front door. It talks to the SPaT traffic-management service, keeps one
//! server-sent-event subscription per requested lane group alive for as long as
//! somebody keeps asking for it, and turns raw lane events into something a
//! human (or a polling client) can read.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod configs;
pub mod core;
pub mod geometry;
pub mod handlers;
pub mod ingestors;
pub mod lanes;
pub mod loggers;
pub mod retrieve;

// --- Public API Re-exports ---
pub use crate::core::{Dispatcher, LiveCache, LiveError, LiveStatusManager, Termination};
pub use configs::{Config, Settings};
pub use handlers::{BatchHandler, CacheUpdater, HandlerError, TerminalRenderer};
pub use ingestors::{BatchStream, EventSource, SpatStreamClient};
pub use lanes::{LaneDirection, LaneEvent, LaneGroupBatch, LaneIndex, LaneProperties, LaneType};
pub use retrieve::{ApiClient, ConnectionError, Credentials};
