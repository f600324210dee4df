//! # Cache Updater
//!
//! Handler used by the query path's background workers: every batch replaces
//! the lane group's entry in the [`LiveCache`].

use crate::core::LiveCache;
use crate::lanes::LaneGroupBatch;

/// Stores each batch, with `time_left` normalized, in the shared cache.
#[derive(Debug, Clone)]
pub struct CacheUpdater {
    cache: LiveCache,
}

impl CacheUpdater {
    pub fn new(cache: LiveCache) -> Self {
        Self { cache }
    }

    /// Overwrites the cached batch for `lane_group_id`.
    pub fn update(&self, lane_group_id: &str, batch: &LaneGroupBatch) {
        log::debug!("Caching {} lane events for {}", batch.len(), lane_group_id);
        self.cache.update(lane_group_id, batch.normalized());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::LaneEvent;

    #[test]
    fn latest_batch_wins_and_is_normalized() {
        let cache = LiveCache::new();
        let updater = CacheUpdater::new(cache.clone());

        updater.update("A_g", &LaneGroupBatch::new("A_g", vec![LaneEvent::new("A_1", "RED", 30, "t1")]));
        updater.update("A_g", &LaneGroupBatch::new("A_g", vec![LaneEvent::new("A_1", "GREEN", 255, "t2")]));

        let stored = cache.snapshot("A_g");
        assert_eq!(stored.events, vec![LaneEvent::new("A_1", "GREEN", -1, "t2")]);
    }
}
