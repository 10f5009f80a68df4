//! Spreadsheet row-append webhook.
//!
//! The webhook (a script web app) takes a JSON body sent as `text/plain`
//! and appends one row to the named tab.

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use super::traits::SessionSink;
use crate::error::SinkError;
use crate::storage::{SessionRecord, SyncConfig};

const NAME: &str = "sheets";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SheetRow<'a> {
    tab_name: &'a str,
    date: String,
    type_of_workout: &'static str,
    minutes: u64,
    notes: &'a str,
}

pub struct SheetsWebhookSink {
    url: Option<String>,
    tab: String,
}

impl SheetsWebhookSink {
    pub fn new(url: Option<String>, tab: impl Into<String>) -> Self {
        Self {
            url,
            tab: tab.into(),
        }
    }

    /// `None` unless the webhook is switched on in config.
    pub fn from_config(sync: &SyncConfig) -> Option<Self> {
        if !sync.sheets_enabled {
            return None;
        }
        let url = sync.sheets_url.clone().filter(|u| !u.trim().is_empty());
        Some(Self::new(url, sync.sheet_tab.clone()))
    }

    fn row<'a>(&'a self, record: &'a SessionRecord) -> SheetRow<'a> {
        SheetRow {
            tab_name: &self.tab,
            date: record.timestamp.to_rfc3339(),
            type_of_workout: record.routine_kind.workout_label(),
            minutes: record.actual_duration_min,
            notes: &record.routine_name,
        }
    }
}

impl SessionSink for SheetsWebhookSink {
    fn name(&self) -> &str {
        NAME
    }

    fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    fn publish(&self, record: &SessionRecord) -> Result<(), SinkError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| SinkError::NotConfigured(NAME.into()))?;
        let transport = |message: String| SinkError::Transport {
            sink: NAME.into(),
            message,
        };

        let body = serde_json::to_string(&self.row(record)).map_err(|e| transport(e.to_string()))?;
        let resp = Client::builder()
            .timeout(super::PUBLISH_TIMEOUT)
            .build()
            .map_err(|e| transport(e.to_string()))?
            .post(url)
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .map_err(|e| transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() || status.is_redirection() {
            tracing::info!(tab = %self.tab, routine = %record.routine_name, "session logged to sheet");
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
