use crate::error::SinkError;
use crate::storage::SessionRecord;

/// Every outbound destination for completed sessions implements this trait.
/// Sinks are fire-and-forget from the engine's point of view: a failure is
/// logged by the dispatcher and never reaches the session.
pub trait SessionSink: Send + Sync {
    /// Unique identifier (e.g. "remote", "sheets").
    fn name(&self) -> &str;

    /// Whether the sink has everything it needs to publish.
    fn is_configured(&self) -> bool;

    /// Deliver one record. Blocking; the dispatcher keeps it off the tick path.
    fn publish(&self, record: &SessionRecord) -> Result<(), SinkError>;
}
