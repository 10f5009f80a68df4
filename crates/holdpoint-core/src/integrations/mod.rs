pub mod remote;
pub mod sheets;
pub mod traits;

pub use remote::RemoteSyncSink;
pub use sheets::SheetsWebhookSink;
pub use traits::SessionSink;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::storage::{SessionRecord, SyncConfig};

/// Upper bound on one sink request, connect to last byte.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// The configured sinks, in dispatch order. Unconfigured sinks are left out.
pub fn sinks_from_config(sync: &SyncConfig) -> Vec<Arc<dyn SessionSink>> {
    let mut sinks: Vec<Arc<dyn SessionSink>> = Vec::new();
    let remote = RemoteSyncSink::from_config(sync);
    if remote.is_configured() {
        sinks.push(Arc::new(remote));
    }
    if let Some(sheets) = SheetsWebhookSink::from_config(sync) {
        if sheets.is_configured() {
            sinks.push(Arc::new(sheets));
        }
    }
    sinks
}

/// Hand a record to every sink without waiting on any of them.
///
/// Inside a tokio runtime each publish runs on the blocking pool and its
/// handle is returned so the host can wait for it before exiting; outside one
/// it runs inline. Failures are logged and dropped.
pub fn dispatch(sinks: &[Arc<dyn SessionSink>], record: &SessionRecord) -> Vec<JoinHandle<()>> {
    let mut pending = Vec::new();
    for sink in sinks {
        let sink = Arc::clone(sink);
        let record = record.clone();
        let publish = move || {
            if let Err(e) = sink.publish(&record) {
                tracing::warn!(sink = sink.name(), error = %e, "session sink failed");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => pending.push(handle.spawn_blocking(publish)),
            Err(_) => publish(),
        }
    }
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::routine::{RoutineKind, ScalingParameter};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl SessionSink for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn is_configured(&self) -> bool {
            true
        }

        fn publish(&self, _record: &SessionRecord) -> Result<(), SinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SinkError::NotConfigured("counting".into()))
            } else {
                Ok(())
            }
        }
    }

    fn record() -> SessionRecord {
        SessionRecord {
            timestamp: Utc::now(),
            routine_name: "Yin Yoga".into(),
            actual_duration_min: 60,
            planned_duration_min: 60,
            scaling_parameter_used: ScalingParameter::default(),
            units_completed: "27 poses".into(),
            routine_kind: RoutineKind::TimedSequence,
        }
    }

    #[test]
    fn failing_sink_does_not_stop_the_others() {
        let failing = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let ok = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let sinks: Vec<Arc<dyn SessionSink>> = vec![failing.clone(), ok.clone()];
        assert!(dispatch(&sinks, &record()).is_empty());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ok.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_config_has_no_sinks() {
        assert!(sinks_from_config(&SyncConfig::default()).is_empty());
    }
}
