//! # Presentation Handlers
//!
//! What to do with each batch a live stream produces. A dispatcher is given
//! exactly one handler per stream:
//!
//! - **`terminal`**: redraws a grouped, colored table on a terminal.
//! - **`cache_updater`**: stores the batch for the HTTP query path.

use std::io;

use thiserror::Error;

use crate::lanes::{LaneGroupBatch, LaneIndexError};

/// Terminal output.
pub mod terminal;
/// Live cache writes.
pub mod cache_updater;

pub use cache_updater::CacheUpdater;
pub use terminal::{classify, format_row, format_screen, ClassifiedEvent, LaneTypeGroup, TerminalRenderer};

/// Errors a handler can raise; any of them stops the stream it was handling.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Lane metadata unavailable: {0}")]
    LaneIndex(#[from] LaneIndexError),
    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// The handler a dispatcher feeds batches into.
pub enum BatchHandler {
    Terminal(TerminalRenderer),
    Cache(CacheUpdater),
}

impl BatchHandler {
    /// Processes one batch.
    pub fn handle(&mut self, lane_group_id: &str, batch: &LaneGroupBatch) -> Result<(), HandlerError> {
        match self {
            BatchHandler::Terminal(renderer) => renderer.render(lane_group_id, batch),
            BatchHandler::Cache(updater) => {
                updater.update(lane_group_id, batch);
                Ok(())
            }
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BatchHandler::Terminal(_) => "terminal",
            BatchHandler::Cache(_) => "cache",
        }
    }
}
