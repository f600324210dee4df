//! # Data Ingestors Module
//!
//! Clients for the live side of the SPaT service. An ingestor turns one
//! lane group's upstream connection into a lazy stream of decoded
//! [`LaneGroupBatch`]es; what happens to those batches is the dispatcher's
//! and the handlers' business.
//!
//! ## Contained Modules:
//! - **`sse`**: incremental `text/event-stream` framing.
//! - **`spat_stream`**: the authenticated `broadcast` endpoint client.
//!
//! [`EventSource`] is the seam between the stream and everything that
//! consumes it, so the worker lifecycle can be driven by something other than
//! the real service.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use futures_util::stream::BoxStream;

use crate::lanes::LaneGroupBatch;
use crate::retrieve::ConnectionError;

/// Server-sent event framing.
pub mod sse;
/// Client for the live `broadcast` endpoint.
pub mod spat_stream;

/// Lazy, single-use sequence of batches for one lane group.
///
/// A failure to connect shows up as a single `Err` item followed by the end
/// of the stream; a remote close simply ends it.
pub type BatchStream = BoxStream<'static, Result<LaneGroupBatch, ConnectionError>>;

/// Something that can open a live batch stream for a lane group.
pub trait EventSource: Send + Sync {
    /// Opens a new stream. Nothing happens on the network until it is polled.
    fn open(&self, lane_group_id: &str) -> BatchStream;
}

// --- Public API Re-exports ---
pub use spat_stream::{decode_batch, intersection_id, stream_path, SpatStreamClient, LANE_GROUP_STATE_EVENT};
pub use sse::{SseDecoder, SseFrame};
