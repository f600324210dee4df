/// `fern` setup with log-file rotation.
pub mod logger;

pub use logger::{cleanup_old_logs, parse_level, setup_logging};
