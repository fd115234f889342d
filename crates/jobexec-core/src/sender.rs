//! `EventSender` transports.

use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use crate::lifecycle::{EventSender, OutboundEvent, SendError};

const CLOUDEVENTS_JSON: &str = "application/cloudevents+json";

// ---------------------------------------------------------------------------
// HttpEventSender
// ---------------------------------------------------------------------------

/// POSTs each event as structured-mode CloudEvents JSON.
#[derive(Debug, Clone)]
pub struct HttpEventSender {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpEventSender {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SendError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EventSender for HttpEventSender {
    async fn send(&self, event: &OutboundEvent) -> Result<(), SendError> {
        let body = serde_json::to_vec(event).map_err(|e| SendError::Encode(e.to_string()))?;
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CLOUDEVENTS_JSON)
            .body(body);
        if let Some(token) = &self.token {
            request = request.header("x-token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SendError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// StdoutEventSender
// ---------------------------------------------------------------------------

/// Writes each event as one JSON line to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutEventSender;

#[async_trait]
impl EventSender for StdoutEventSender {
    async fn send(&self, event: &OutboundEvent) -> Result<(), SendError> {
        let line = serde_json::to_string(event).map_err(|e| SendError::Encode(e.to_string()))?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}").map_err(|e| SendError::Transport(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// RecordingEventSender
// ---------------------------------------------------------------------------

/// Keeps every event in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingEventSender {
    events: Mutex<Vec<OutboundEvent>>,
    attempts: Mutex<usize>,
    fail: bool,
}

impl RecordingEventSender {
    /// A sender whose every delivery fails after being counted.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<OutboundEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event_type).collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().map(|a| *a).unwrap_or_default()
    }
}

#[async_trait]
impl EventSender for RecordingEventSender {
    async fn send(&self, event: &OutboundEvent) -> Result<(), SendError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            *attempts += 1;
        }
        if self.fail {
            return Err(SendError::Transport("recording sender configured to fail".into()));
        }
        self.events
            .lock()
            .map_err(|_| SendError::Transport("recording sender poisoned".into()))?
            .push(event.clone());
        Ok(())
    }
}
