//! # Live Cache
//!
//! Latest batch per lane group, shared between the workers that write it and
//! the query path that reads it. Entries are never evicted: once a worker
//! stops, readers keep getting its last batch.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::lanes::LaneGroupBatch;

/// Cloneable handle on the shared lane-group → latest-batch map.
#[derive(Debug, Clone, Default)]
pub struct LiveCache {
    entries: Arc<RwLock<HashMap<String, LaneGroupBatch>>>,
}

impl LiveCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever is stored for `lane_group_id`.
    pub fn update(&self, lane_group_id: &str, batch: LaneGroupBatch) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(lane_group_id.to_string(), batch);
    }

    /// Creates an empty slot for `lane_group_id` unless one exists.
    pub fn ensure(&self, lane_group_id: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(lane_group_id.to_string())
            .or_insert_with(|| LaneGroupBatch::empty(lane_group_id));
    }

    /// The stored batch, if any.
    pub fn get(&self, lane_group_id: &str) -> Option<LaneGroupBatch> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(lane_group_id).cloned()
    }

    /// The stored batch, or an empty one when nothing was received yet.
    pub fn snapshot(&self, lane_group_id: &str) -> LaneGroupBatch {
        self.get(lane_group_id)
            .unwrap_or_else(|| LaneGroupBatch::empty(lane_group_id))
    }
}
