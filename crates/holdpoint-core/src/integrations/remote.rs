//! Remote database sync: one JSON row per completed session, POSTed to a
//! REST table endpoint.

use reqwest::blocking::Client;
use serde::Serialize;
use url::Url;

use super::traits::SessionSink;
use crate::error::SinkError;
use crate::routine::RoutineKind;
use crate::storage::{SessionRecord, SyncConfig};

const NAME: &str = "remote";

/// Row shape the remote `session_history` table expects.
#[derive(Debug, Serialize)]
struct SessionRow<'a> {
    routine_name: &'a str,
    duration_min: u64,
    planned_min: u64,
    core_time: u8,
    completed: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    completed_at: String,
}

impl<'a> From<&'a SessionRecord> for SessionRow<'a> {
    fn from(record: &'a SessionRecord) -> Self {
        Self {
            routine_name: &record.routine_name,
            duration_min: record.actual_duration_min,
            planned_min: record.planned_duration_min,
            core_time: record.scaling_parameter_used.get(),
            completed: &record.units_completed,
            kind: match record.routine_kind {
                RoutineKind::TimedSequence => "yoga",
                RoutineKind::GripCycle => "hangboard",
            },
            completed_at: record.timestamp.to_rfc3339(),
        }
    }
}

pub struct RemoteSyncSink {
    endpoint: Option<Url>,
    api_key: Option<String>,
}

impl RemoteSyncSink {
    pub fn new(endpoint: Option<Url>, api_key: Option<String>) -> Self {
        Self { endpoint, api_key }
    }

    /// Build from config. An unparsable URL leaves the sink unconfigured.
    pub fn from_config(sync: &SyncConfig) -> Self {
        let endpoint = sync
            .remote_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .and_then(|u| match Url::parse(u) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(url = u, error = %e, "ignoring invalid remote sync URL");
                    None
                }
            });
        let api_key = sync.remote_api_key.clone().filter(|k| !k.is_empty());
        Self::new(endpoint, api_key)
    }
}

impl SessionSink for RemoteSyncSink {
    fn name(&self) -> &str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    fn publish(&self, record: &SessionRecord) -> Result<(), SinkError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| SinkError::NotConfigured(NAME.into()))?;

        let mut request = Client::builder()
            .timeout(super::PUBLISH_TIMEOUT)
            .build()
            .map_err(|e| SinkError::Transport {
                sink: NAME.into(),
                message: e.to_string(),
            })?
            .post(endpoint.clone())
            .json(&SessionRow::from(record));
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let resp = request.send().map_err(|e| SinkError::Transport {
            sink: NAME.into(),
            message: e.to_string(),
        })?;

        let status = resp.status();
        if status.is_success() {
            tracing::info!(routine = %record.routine_name, "session synced to remote");
            Ok(())
        } else {
            Err(SinkError::Http {
                sink: NAME.into(),
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            })
        }
    }
}
