//! # Lanes
//!
//! Everything that describes a lane: the raw events pushed by the live stream
//! (`model`) and the static per-lane metadata derived from the downloaded lane
//! map (`index`).

/// Raw lane events and the batches they arrive in.
pub mod model;
/// Static lane metadata loaded from the persisted lane map.
pub mod index;

// --- Public API Re-exports ---
pub use index::{ClassificationError, LaneDirection, LaneIndex, LaneIndexError, LaneProperties, LaneType};
pub use model::{lane_sort_key, normalize_time_left, LaneEvent, LaneGroupBatch, TIME_LEFT_MAX, TIME_LEFT_UNKNOWN};
