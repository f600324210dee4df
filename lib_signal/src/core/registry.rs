//! # Live Status Manager
//!
//! Keeps at most one background worker per lane group and answers status
//! queries from the [`LiveCache`] without waiting for the network.
//!
//! Each worker holds a *lease*: a number of batches it may still handle. A
//! query for a lane group whose worker is alive only resets that lease; a
//! query for an idle lane group starts a new worker with a fresh one. The
//! worker gives up its lease entry when its stream ends for any reason, so
//! the next query always finds either a live worker or none at all.
//!
//! All lease bookkeeping, including a worker's own decision to retire,
//! happens under one lock. Entries are tagged with the id of the worker that
//! owns them so a retiring worker can never remove its successor's lease.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::cache::LiveCache;
use super::dispatcher::{Budget, Dispatcher, Termination};
use crate::handlers::{BatchHandler, CacheUpdater};
use crate::ingestors::EventSource;
use crate::lanes::LaneGroupBatch;

/// Default number of batches a worker may handle after the last query.
pub const DEFAULT_INITIAL_LEASE: u32 = 5;

#[derive(Debug, Clone, Copy)]
struct LeaseEntry {
    remaining: u32,
    worker_id: u64,
}

type LeaseTable = Arc<Mutex<HashMap<String, LeaseEntry>>>;

fn lock(table: &LeaseTable) -> MutexGuard<'_, HashMap<String, LeaseEntry>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A worker's view of its own lease entry.
struct LeaseBudget {
    table: LeaseTable,
    lane_group_id: String,
    worker_id: u64,
}

impl Budget for LeaseBudget {
    fn take(&self) -> bool {
        let mut leases = lock(&self.table);
        match leases.get_mut(&self.lane_group_id) {
            Some(entry) if entry.worker_id == self.worker_id => {
                if entry.remaining == 0 {
                    leases.remove(&self.lane_group_id);
                    false
                } else {
                    entry.remaining -= 1;
                    true
                }
            }
            // Entry gone or owned by another worker.
            _ => false,
        }
    }
}

impl LeaseBudget {
    /// Drops the entry if it still belongs to this worker.
    fn release(&self) {
        let mut leases = lock(&self.table);
        if leases
            .get(&self.lane_group_id)
            .is_some_and(|entry| entry.worker_id == self.worker_id)
        {
            leases.remove(&self.lane_group_id);
        }
    }
}

/// # Live Status Manager
///
/// Query-driven owner of the background workers that keep the [`LiveCache`]
/// fresh. Must be used from within a Tokio runtime.
pub struct LiveStatusManager {
    dispatcher: Dispatcher,
    cache: LiveCache,
    leases: LeaseTable,
    initial_lease: u32,
    next_worker_id: AtomicU64,
}

impl LiveStatusManager {
    /// Creates a manager with an empty cache.
    pub fn new(source: Arc<dyn EventSource>, initial_lease: u32) -> Self {
        Self::with_cache(source, LiveCache::new(), initial_lease)
    }

    /// Creates a manager writing into an existing cache.
    pub fn with_cache(source: Arc<dyn EventSource>, cache: LiveCache, initial_lease: u32) -> Self {
        Self {
            dispatcher: Dispatcher::new(source),
            cache,
            leases: Arc::new(Mutex::new(HashMap::new())),
            initial_lease,
            next_worker_id: AtomicU64::new(1),
        }
    }

    /// The cache the workers write into.
    pub fn cache(&self) -> &LiveCache {
        &self.cache
    }

    /// Remaining lease of the lane group's worker, `None` when no worker runs.
    pub fn lease(&self, lane_group_id: &str) -> Option<u32> {
        lock(&self.leases).get(lane_group_id).map(|entry| entry.remaining)
    }

    /// Number of lane groups with a running worker.
    pub fn active_workers(&self) -> usize {
        lock(&self.leases).len()
    }

    /// # Request
    ///
    /// Returns the latest cached batch for `lane_group_id` (empty when nothing
    /// has arrived yet) and makes sure a worker is feeding the cache: an
    /// existing worker gets its lease reset, otherwise a new one is spawned.
    /// Never waits on the network.
    pub fn request(&self, lane_group_id: &str) -> LaneGroupBatch {
        let mut leases = lock(&self.leases);
        match leases.get_mut(lane_group_id) {
            Some(entry) => {
                entry.remaining = self.initial_lease;
                log::debug!("Lease for {} renewed to {}", lane_group_id, self.initial_lease);
            }
            None => {
                let worker_id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
                leases.insert(
                    lane_group_id.to_string(),
                    LeaseEntry {
                        remaining: self.initial_lease,
                        worker_id,
                    },
                );
                self.cache.ensure(lane_group_id);
                self.spawn_worker(lane_group_id, worker_id);
            }
        }
        drop(leases);

        self.cache.snapshot(lane_group_id)
    }

    fn spawn_worker(&self, lane_group_id: &str, worker_id: u64) {
        let dispatcher = self.dispatcher.clone();
        let mut handler = BatchHandler::Cache(CacheUpdater::new(self.cache.clone()));
        let budget = LeaseBudget {
            table: Arc::clone(&self.leases),
            lane_group_id: lane_group_id.to_string(),
            worker_id,
        };
        log::info!("Starting live worker #{} for lane group {}", worker_id, lane_group_id);

        tokio::spawn(async move {
            let lane_group_id = budget.lane_group_id.clone();
            match dispatcher.run(&lane_group_id, &mut handler, Some(&budget)).await {
                Ok(Termination::BudgetExhausted { handled }) => {
                    log::info!("Live worker #{} for {} retired after {} batches", worker_id, lane_group_id, handled);
                }
                Ok(Termination::StreamEnded { handled }) => {
                    log::info!("Live worker #{} for {} ended with the stream after {} batches", worker_id, lane_group_id, handled);
                }
                Err(e) => {
                    log::error!("Live worker #{} for {} failed: {}", worker_id, lane_group_id, e);
                }
            }
            budget.release();
        });
    }
}
