//! # Core Live Engine
//!
//! The parts that move live batches from a stream to wherever they are
//! consumed.
//!
//! - **`dispatcher`**: drives one stream into one handler, optionally bounded
//!   by a budget.
//! - **`registry`**: the query-driven [`LiveStatusManager`] that keeps at most
//!   one leased background worker per lane group.
//! - **`cache`**: the shared latest-batch-per-lane-group map those workers
//!   write into.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Latest batch per lane group.
pub mod cache;
/// Single-stream driver.
pub mod dispatcher;
/// Leased background workers.
pub mod registry;

// --- Public API Re-exports ---
pub use cache::LiveCache;
pub use dispatcher::{Budget, Dispatcher, LiveError, Termination};
pub use registry::{LiveStatusManager, DEFAULT_INITIAL_LEASE};
