//! Inbound CloudEvents and their mapping into a property dictionary.

use crate::error::{JobExecError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix shared by all lifecycle event types this executor understands.
pub const EVENT_TYPE_PREFIX: &str = "sh.keptn.event.";

const TRIGGERED_SUFFIX: &str = ".triggered";

// ---------------------------------------------------------------------------
// InboundEvent
// ---------------------------------------------------------------------------

/// A CloudEvents 1.0 envelope as received from the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_spec_version")]
    pub specversion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Correlation id shared by every event of one sequence.
    #[serde(default)]
    pub shkeptncontext: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

fn default_spec_version() -> String {
    "1.0".to_string()
}

impl InboundEvent {
    pub fn from_json(json: &str) -> Result<Self> {
        let event: InboundEvent = serde_json::from_str(json)?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(JobExecError::InvalidEvent("missing event id".into()));
        }
        if self.event_type.trim().is_empty() {
            return Err(JobExecError::InvalidEvent("missing event type".into()));
        }
        Ok(())
    }

    /// The task kind of a `sh.keptn.event.<kind>.triggered` event, or `None`
    /// for any other event type.
    pub fn triggered_task_kind(&self) -> Option<&str> {
        triggered_task_kind(&self.event_type)
    }

    /// Typed view of the common fields in `data`.
    pub fn event_data(&self) -> Result<EventData> {
        if self.data.is_null() {
            return Ok(EventData::default());
        }
        serde_json::from_value(self.data.clone())
            .map_err(|e| JobExecError::InvalidEvent(format!("malformed event data: {e}")))
    }
}

/// `sh.keptn.event.test.triggered` → `Some("test")`.
pub fn triggered_task_kind(event_type: &str) -> Option<&str> {
    let kind = event_type
        .strip_prefix(EVENT_TYPE_PREFIX)?
        .strip_suffix(TRIGGERED_SUFFIX)?;
    if kind.is_empty() {
        None
    } else {
        Some(kind)
    }
}

pub fn started_event_type(task_kind: &str) -> String {
    format!("{EVENT_TYPE_PREFIX}{task_kind}.started")
}

pub fn finished_event_type(task_kind: &str) -> String {
    format!("{EVENT_TYPE_PREFIX}{task_kind}.finished")
}

// ---------------------------------------------------------------------------
// EventData
// ---------------------------------------------------------------------------

/// Fields every lifecycle event payload carries. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub service: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub result: String,
}

// ---------------------------------------------------------------------------
// EventMapper
// ---------------------------------------------------------------------------

/// Turns an inbound event into the property dictionary used for action
/// selection and `valueFrom: event` substitution.
pub trait EventMapper: Send + Sync {
    fn map(&self, event: &InboundEvent) -> serde_json::Value;
}

/// Exposes the envelope attributes at the top level and the payload under
/// `data`, so paths look like `$.data.project` or `$.shkeptncontext`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudEventMapper;

impl EventMapper for CloudEventMapper {
    fn map(&self, event: &InboundEvent) -> serde_json::Value {
        serde_json::json!({
            "id": event.id,
            "type": event.event_type,
            "source": event.source,
            "specversion": event.specversion,
            "time": event.time,
            "shkeptncontext": event.shkeptncontext,
            "data": event.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;

    const TEST_EVENT: &str = r#"{
        "specversion": "1.0",
        "id": "f2b878d3-03c0-4e8f-bc3f-454bc1b3d79d",
        "type": "sh.keptn.event.test.triggered",
        "source": "shipyard-controller",
        "shkeptncontext": "a3e5f16d-8888-4720-82c7-6995062905c1",
        "time": "2021-05-13T07:46:12.000Z",
        "data": {
            "project": "sockshop",
            "stage": "dev",
            "service": "carts",
            "labels": { "testId": "4711", "buildId": "build-17", "owner": "JohnDoe" },
            "status": "succeeded",
            "result": "pass",
            "test": { "teststrategy": "locust" }
        }
    }"#;

    #[test]
    fn parses_envelope_and_data() {
        let event = InboundEvent::from_json(TEST_EVENT).unwrap();
        assert_eq!(event.triggered_task_kind(), Some("test"));

        let data = event.event_data().unwrap();
        assert_eq!(data.project, "sockshop");
        assert_eq!(data.stage, "dev");
        assert_eq!(data.service, "carts");
        assert_eq!(data.labels.get("buildId").map(String::as_str), Some("build-17"));
    }

    #[test]
    fn rejects_event_without_id() {
        let err = InboundEvent::from_json(r#"{"id":"","type":"sh.keptn.event.test.triggered"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("missing event id"));
    }

    #[test]
    fn task_kind_only_for_triggered_events() {
        assert_eq!(triggered_task_kind("sh.keptn.event.action.triggered"), Some("action"));
        assert_eq!(triggered_task_kind("sh.keptn.event.test.finished"), None);
        assert_eq!(triggered_task_kind("sh.keptn.event..triggered"), None);
        assert_eq!(triggered_task_kind("com.example.other"), None);
    }

    #[test]
    fn lifecycle_event_types() {
        assert_eq!(started_event_type("test"), "sh.keptn.event.test.started");
        assert_eq!(finished_event_type("test"), "sh.keptn.event.test.finished");
    }

    #[test]
    fn mapper_exposes_envelope_and_payload_paths() {
        let event = InboundEvent::from_json(TEST_EVENT).unwrap();
        let props = CloudEventMapper.map(&event);
        assert_eq!(
            path::lookup_string(&props, "$.data.test.teststrategy").as_deref(),
            Some("locust")
        );
        assert_eq!(
            path::lookup_string(&props, "$.shkeptncontext").as_deref(),
            Some("a3e5f16d-8888-4720-82c7-6995062905c1")
        );
        assert_eq!(
            path::lookup_string(&props, "$.type").as_deref(),
            Some("sh.keptn.event.test.triggered")
        );
    }

    #[test]
    fn null_data_yields_default_event_data() {
        let event =
            InboundEvent::from_json(r#"{"id":"1","type":"sh.keptn.event.test.triggered"}"#)
                .unwrap();
        assert_eq!(event.event_data().unwrap(), EventData::default());
    }
}
