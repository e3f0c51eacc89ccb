//! Event log port - structured application events

use crate::domain::result::Result;
use crate::services::LogEvent;

/// Sink for structured application events
pub trait EventLog: Send + Sync {
    /// Record a single event
    fn record(&self, event: LogEvent) -> Result<()>;
}
