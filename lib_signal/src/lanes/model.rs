//! # Lane Events
//!
//! The live stream pushes lane events as bare JSON arrays of the form
//! `[laneId, signalState, timeLeft, timestamp]`. `LaneEvent` gives those
//! tuples names while keeping the array shape on the wire, so whatever the
//! HTTP front door hands back looks exactly like what the service sent.

use serde::{Deserialize, Serialize};

/// Largest `time_left` value the service uses for a real countdown.
pub const TIME_LEFT_MAX: i64 = 200;
/// Value shown in place of any `time_left` outside `[0, TIME_LEFT_MAX]`.
pub const TIME_LEFT_UNKNOWN: i64 = -1;

type RawLaneEvent = (String, String, i64, String);

/// A single lane's signal state as reported by one stream event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawLaneEvent", into = "RawLaneEvent")]
pub struct LaneEvent {
    /// Composite lane id, e.g. `"1234_3"`.
    pub lane_id: String,
    /// Signal state as named by the service (`"RED"`, `"GREEN"`, ...).
    pub signal_state: String,
    /// Seconds until the next state change, or a sentinel outside `[0, 200]`.
    pub time_left: i64,
    /// Upstream timestamp, passed through untouched.
    pub timestamp: String,
}

impl From<RawLaneEvent> for LaneEvent {
    fn from((lane_id, signal_state, time_left, timestamp): RawLaneEvent) -> Self {
        Self { lane_id, signal_state, time_left, timestamp }
    }
}

impl From<LaneEvent> for RawLaneEvent {
    fn from(event: LaneEvent) -> Self {
        (event.lane_id, event.signal_state, event.time_left, event.timestamp)
    }
}

impl LaneEvent {
    /// Builds an event from borrowed parts. Mostly useful in tests and fakes.
    pub fn new(lane_id: &str, signal_state: &str, time_left: i64, timestamp: &str) -> Self {
        Self {
            lane_id: lane_id.to_string(),
            signal_state: signal_state.to_string(),
            time_left,
            timestamp: timestamp.to_string(),
        }
    }

    /// Returns a copy with `time_left` run through [`normalize_time_left`].
    pub fn normalized(&self) -> Self {
        Self {
            time_left: normalize_time_left(self.time_left),
            ..self.clone()
        }
    }
}

/// Maps every `time_left` outside `[0, 200]` to `-1`; values inside pass through.
pub fn normalize_time_left(time_left: i64) -> i64 {
    if (0..=TIME_LEFT_MAX).contains(&time_left) {
        time_left
    } else {
        TIME_LEFT_UNKNOWN
    }
}

/// Sort key for left-to-right lane ordering: the second `_` segment of the
/// lane id read as a number. Ids without a numeric segment yield `None`.
pub fn lane_sort_key(lane_id: &str) -> Option<u64> {
    lane_id.split('_').nth(1)?.trim().parse().ok()
}

/// The events delivered by one `SignalizedLaneGroupState` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LaneGroupBatch {
    /// Lane group the stream was opened for (`"{intersectionId}_..."`).
    pub lane_group_id: String,
    /// Events in the order the service sent them. Not sorted.
    pub events: Vec<LaneEvent>,
}

impl LaneGroupBatch {
    /// Wraps decoded events for a lane group.
    pub fn new(lane_group_id: &str, events: Vec<LaneEvent>) -> Self {
        Self {
            lane_group_id: lane_group_id.to_string(),
            events,
        }
    }

    /// An empty batch, used as the snapshot before anything was received.
    pub fn empty(lane_group_id: &str) -> Self {
        Self::new(lane_group_id, Vec::new())
    }

    /// Number of raw events in the batch.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when the batch carries no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Copy of the batch with every `time_left` normalized.
    pub fn normalized(&self) -> Self {
        Self {
            lane_group_id: self.lane_group_id.clone(),
            events: self.events.iter().map(LaneEvent::normalized).collect(),
        }
    }
}
