//! Outbound `started` / `finished` lifecycle events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::event::{finished_event_type, started_event_type, EventData, InboundEvent};
use crate::outcome::{EventResult, EventStatus};

/// UTC timestamps in event payloads, e.g. `2021-05-13T07:46:12Z`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Task kind whose finished payload carries its bounds under `test`.
const TEST_TASK_KIND: &str = "test";

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// EventContext
// ---------------------------------------------------------------------------

/// What the outbound events need to know about the triggering event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventContext {
    pub event_id: String,
    pub keptn_context: String,
    pub task_kind: String,
    pub data: EventData,
}

impl EventContext {
    pub fn new(event: &InboundEvent, task_kind: impl Into<String>, data: EventData) -> Self {
        Self {
            event_id: event.id.clone(),
            keptn_context: event.shkeptncontext.clone(),
            task_kind: task_kind.into(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// OutboundEvent
// ---------------------------------------------------------------------------

/// CloudEvents 1.0 envelope sent back to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub specversion: String,
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub time: String,
    pub datacontenttype: String,
    pub shkeptncontext: String,
    pub triggeredid: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleData {
    pub project: String,
    pub stage: String,
    pub service: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<EventResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<TimeBounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<TimeBounds>,
}

impl LifecycleData {
    fn from_context(context: &EventContext, status: EventStatus) -> Self {
        Self {
            project: context.data.project.clone(),
            stage: context.data.stage.clone(),
            service: context.data.service.clone(),
            labels: context.data.labels.clone(),
            status,
            result: None,
            message: None,
            test: None,
            timeframe: None,
        }
    }
}

fn envelope(
    source: &str,
    context: &EventContext,
    event_type: String,
    data: &LifecycleData,
) -> OutboundEvent {
    OutboundEvent {
        specversion: "1.0".into(),
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        event_type,
        time: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        datacontenttype: "application/json".into(),
        shkeptncontext: context.keptn_context.clone(),
        triggeredid: context.event_id.clone(),
        data: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
    }
}

// ---------------------------------------------------------------------------
// EventSender
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("event transport error: {0}")]
    Transport(String),

    #[error("event receiver rejected event with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to encode event: {0}")]
    Encode(String),
}

/// Delivers outbound events to the event bus.
#[async_trait]
pub trait EventSender: Send + Sync {
    async fn send(&self, event: &OutboundEvent) -> Result<(), SendError>;
}

// ---------------------------------------------------------------------------
// LifecycleEmitter
// ---------------------------------------------------------------------------

/// Sends at most one `started` and one `finished` event for one action.
///
/// A silent emitter never touches the sender. Transport failures are logged
/// and swallowed.
pub struct LifecycleEmitter<'a> {
    sender: &'a dyn EventSender,
    source: &'a str,
    context: &'a EventContext,
    silent: bool,
    started_sent: bool,
    finished_sent: bool,
}

impl<'a> LifecycleEmitter<'a> {
    pub fn new(
        sender: &'a dyn EventSender,
        source: &'a str,
        context: &'a EventContext,
        silent: bool,
    ) -> Self {
        Self {
            sender,
            source,
            context,
            silent,
            started_sent: false,
            finished_sent: false,
        }
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub async fn send_started(&mut self) {
        if self.silent {
            return;
        }
        if self.started_sent {
            tracing::warn!(kind = %self.context.task_kind, "started event already sent");
            return;
        }
        self.started_sent = true;

        let data = LifecycleData::from_context(self.context, EventStatus::Succeeded);
        let event = envelope(
            self.source,
            self.context,
            started_event_type(&self.context.task_kind),
            &data,
        );
        self.deliver(&event).await;
    }

    pub async fn send_finished(
        &mut self,
        status: EventStatus,
        result: EventResult,
        message: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) {
        if self.silent {
            return;
        }
        if self.finished_sent {
            tracing::warn!(kind = %self.context.task_kind, "finished event already sent");
            return;
        }
        self.finished_sent = true;

        let bounds = TimeBounds {
            start: format_timestamp(start),
            end: format_timestamp(end),
        };
        let mut data = LifecycleData::from_context(self.context, status);
        data.result = Some(result);
        data.message = Some(message.to_string());
        if self.context.task_kind == TEST_TASK_KIND {
            data.test = Some(bounds);
        } else {
            data.timeframe = Some(bounds);
        }

        let event = envelope(
            self.source,
            self.context,
            finished_event_type(&self.context.task_kind),
            &data,
        );
        self.deliver(&event).await;
    }

    async fn deliver(&self, event: &OutboundEvent) {
        match self.sender.send(event).await {
            Ok(()) => tracing::info!(event_type = %event.event_type, id = %event.id, "sent event"),
            Err(e) => tracing::warn!(event_type = %event.event_type, error = %e, "could not send event"),
        }
    }
}
