//! # Live Status Dispatcher
//!
//! Drives one live stream to completion. Each batch the [`EventSource`]
//! yields goes to exactly one [`BatchHandler`], in arrival order and one at a
//! time. An optional [`Budget`] is asked *before* every handler call; once it
//! says no, the stream is dropped and no further batch is handled.
//!
//! The dispatcher never reconnects. A failed connection or a failing handler
//! ends the run with an error, a remote close ends it cleanly. Whoever started
//! the run decides what happens next.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::sync::Arc;

use futures_util::StreamExt;
use thiserror::Error;

use crate::handlers::{BatchHandler, HandlerError};
use crate::ingestors::EventSource;
use crate::retrieve::ConnectionError;

/// Why a live run stopped with an error.
#[derive(Debug, Error)]
pub enum LiveError {
    /// The stream could not be opened, or broke while opening.
    #[error("Live connection failed: {0}")]
    Connection(#[from] ConnectionError),
    /// The handler rejected a batch.
    #[error("Batch handler failed: {0}")]
    Handler(#[from] HandlerError),
}

/// Gatekeeper consulted before each batch is handled.
pub trait Budget: Send + Sync {
    /// Spends one unit. `false` means stop before handling the batch.
    fn take(&self) -> bool;
}

/// How a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The budget ran out; the stream was closed from our side.
    BudgetExhausted {
        /// Batches handled before stopping.
        handled: u64,
    },
    /// The remote side closed the stream.
    StreamEnded {
        /// Batches handled before the close.
        handled: u64,
    },
}

impl Termination {
    /// Number of batches that reached the handler.
    pub fn handled(&self) -> u64 {
        match self {
            Termination::BudgetExhausted { handled } | Termination::StreamEnded { handled } => *handled,
        }
    }
}

/// Runs live streams from a shared [`EventSource`].
#[derive(Clone)]
pub struct Dispatcher {
    source: Arc<dyn EventSource>,
}

impl Dispatcher {
    /// Creates a dispatcher over `source`.
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self { source }
    }

    /// # Run
    ///
    /// Opens a stream for `lane_group_id` and feeds it into `handler` until
    /// the stream ends, the budget is spent or something fails. Without a
    /// budget the run is unbounded.
    pub async fn run(
        &self,
        lane_group_id: &str,
        handler: &mut BatchHandler,
        budget: Option<&dyn Budget>,
    ) -> Result<Termination, LiveError> {
        let mut stream = self.source.open(lane_group_id);
        let mut handled: u64 = 0;
        log::debug!("Dispatching {} to the {} handler", lane_group_id, handler.kind());

        while let Some(item) = stream.next().await {
            let batch = item?;
            if let Some(budget) = budget {
                if !budget.take() {
                    log::debug!("Budget for {} exhausted after {} batches", lane_group_id, handled);
                    return Ok(Termination::BudgetExhausted { handled });
                }
            }
            handler.handle(lane_group_id, &batch)?;
            handled += 1;
        }

        log::info!("Live stream for {} closed by remote after {} batches", lane_group_id, handled);
        Ok(Termination::StreamEnded { handled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LiveCache;
    use crate::handlers::CacheUpdater;
    use crate::ingestors::BatchStream;
    use crate::lanes::{LaneEvent, LaneGroupBatch};
    use futures_util::stream;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedSource {
        items: Vec<Result<LaneGroupBatch, String>>,
    }

    impl EventSource for FixedSource {
        fn open(&self, _lane_group_id: &str) -> BatchStream {
            let items: Vec<Result<LaneGroupBatch, ConnectionError>> = self
                .items
                .iter()
                .map(|item| item.clone().map_err(ConnectionError::Auth))
                .collect();
            stream::iter(items).boxed()
        }
    }

    struct Counter(AtomicU32);

    impl Budget for Counter {
        fn take(&self) -> bool {
            self.0
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
        }
    }

    fn batch(state: &str) -> LaneGroupBatch {
        LaneGroupBatch::new("A_g", vec![LaneEvent::new("A_1", state, 5, "t")])
    }

    fn dispatcher(items: Vec<Result<LaneGroupBatch, String>>) -> Dispatcher {
        Dispatcher::new(Arc::new(FixedSource { items }))
    }

    #[tokio::test]
    async fn unbounded_run_handles_everything_in_order() {
        let cache = LiveCache::new();
        let mut handler = BatchHandler::Cache(CacheUpdater::new(cache.clone()));

        let outcome = dispatcher(vec![Ok(batch("RED")), Ok(batch("GREEN"))])
            .run("A_g", &mut handler, None)
            .await
            .unwrap();

        assert_eq!(outcome, Termination::StreamEnded { handled: 2 });
        assert_eq!(cache.snapshot("A_g").events[0].signal_state, "GREEN");
    }

    #[tokio::test]
    async fn budget_is_checked_before_each_batch() {
        let cache = LiveCache::new();
        let mut handler = BatchHandler::Cache(CacheUpdater::new(cache.clone()));
        let budget = Counter(AtomicU32::new(2));

        let outcome = dispatcher(vec![Ok(batch("RED")), Ok(batch("GREEN")), Ok(batch("YELLOW"))])
            .run("A_g", &mut handler, Some(&budget))
            .await
            .unwrap();

        assert_eq!(outcome, Termination::BudgetExhausted { handled: 2 });
        assert_eq!(cache.snapshot("A_g").events[0].signal_state, "GREEN");
    }

    #[tokio::test]
    async fn zero_budget_handles_nothing() {
        let cache = LiveCache::new();
        let mut handler = BatchHandler::Cache(CacheUpdater::new(cache.clone()));
        let budget = Counter(AtomicU32::new(0));

        let outcome = dispatcher(vec![Ok(batch("RED"))])
            .run("A_g", &mut handler, Some(&budget))
            .await
            .unwrap();

        assert_eq!(outcome.handled(), 0);
        assert!(cache.get("A_g").is_none());
    }

    #[tokio::test]
    async fn connection_error_ends_the_run() {
        let cache = LiveCache::new();
        let mut handler = BatchHandler::Cache(CacheUpdater::new(cache));

        let err = dispatcher(vec![Err("denied".into())])
            .run("A_g", &mut handler, None)
            .await
            .unwrap_err();

        assert!(matches!(err, LiveError::Connection(ConnectionError::Auth(_))));
    }
}
