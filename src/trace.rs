//! Webhook [`TraceSink`].
//!
//! Each event is posted as `{"timestamp": <RFC 3339>, "event": {...}}` on a
//! spawned task, so `record` returns immediately. Delivery failures are
//! logged at debug level and otherwise ignored.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use hybrid_rag_core::answer::{TraceEvent, TraceSink};

use crate::http;

const TRACE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Serialize)]
struct Envelope {
    timestamp: String,
    event: TraceEvent,
}

pub struct WebhookTracer {
    client: reqwest::Client,
    url: String,
}

impl WebhookTracer {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            client: http::client(TRACE_TIMEOUT_SECS)?,
            url: url.to_string(),
        })
    }
}

impl TraceSink for WebhookTracer {
    fn record(&self, event: TraceEvent) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .context("trace webhook requires a tokio runtime")?;
        let envelope = Envelope {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event,
        };
        let client = self.client.clone();
        let url = self.url.clone();

        handle.spawn(async move {
            match client.post(&url).json(&envelope).send().await {
                Ok(response) if !response.status().is_success() => {
                    debug!(status = %response.status(), "trace webhook rejected event");
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "trace webhook unreachable"),
            }
        });
        Ok(())
    }
}
