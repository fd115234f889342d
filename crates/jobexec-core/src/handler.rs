use serde::Serialize;

use crate::config::ConfigSource;
use crate::driver::ClusterClient;
use crate::error::Result;
use crate::event::{EventMapper, InboundEvent};
use crate::filter::ImageFilter;
use crate::lifecycle::{EventContext, EventSender};
use crate::orchestrator::ActionOrchestrator;
use crate::outcome::ActionReport;
use crate::settings::JobSettings;

/// What became of one inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandleOutcome {
    /// Nothing to do for this event; no job ran and no event was sent.
    Ignored { reason: String },
    Executed { report: ActionReport },
}

/// Takes an inbound event from envelope to finished event: selects the
/// configured action for it and hands that to the orchestrator.
pub struct EventHandler<'a> {
    pub settings: &'a JobSettings,
    pub configs: &'a dyn ConfigSource,
    pub mapper: &'a dyn EventMapper,
    pub filter: &'a dyn ImageFilter,
    pub cluster: &'a dyn ClusterClient,
    pub sender: &'a dyn EventSender,
}

impl EventHandler<'_> {
    pub async fn handle(&self, event: &InboundEvent) -> Result<HandleOutcome> {
        event.validate()?;

        let Some(task_kind) = event.triggered_task_kind() else {
            return Ok(ignored(format!(
                "event type {} is not a triggered event",
                event.event_type
            )));
        };

        let data = event.event_data()?;
        let Some(config) = self
            .configs
            .load_for(&data.project, &data.stage, &data.service)?
        else {
            return Ok(ignored(format!(
                "no job config for {}/{}/{}",
                data.project, data.stage, data.service
            )));
        };

        let properties = self.mapper.map(event);
        let Some(action) = config.find_action_for(&event.event_type, &properties) else {
            return Ok(ignored(format!(
                "no action matches event {} ({})",
                event.id, event.event_type
            )));
        };

        tracing::info!(
            event = %event.id,
            action = %action.name,
            tasks = action.tasks.len(),
            silent = action.silent,
            "executing action"
        );
        let context = EventContext::new(event, task_kind, data);
        let report = ActionOrchestrator::new(self.settings, self.filter, self.cluster, self.sender)
            .execute(&context, action, &properties)
            .await?;
        Ok(HandleOutcome::Executed { report })
    }
}

fn ignored(reason: String) -> HandleOutcome {
    tracing::info!(%reason, "ignoring event");
    HandleOutcome::Ignored { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JobConfig, StaticConfigSource};
    use crate::event::CloudEventMapper;
    use crate::filter::AllowAll;
    use crate::sender::RecordingEventSender;
    use crate::testing::FakeCluster;

    const CONFIG: &str = r#"
apiVersion: v2
actions:
  - name: "Run locust"
    events:
      - name: "sh.keptn.event.test.triggered"
        jsonpath:
          property: "$.data.test.teststrategy"
          match: "locust"
    tasks:
      - name: "Run locust smoke tests"
        image: "locustio/locust"
"#;

    fn event(event_type: &str, strategy: &str) -> InboundEvent {
        InboundEvent::from_json(
            &serde_json::json!({
                "id": "f2b878d3-03c0-4e8f-bc3f-454bc1b3d79d",
                "type": event_type,
                "source": "shipyard-controller",
                "shkeptncontext": "ctx",
                "data": {
                    "project": "sockshop", "stage": "dev", "service": "carts",
                    "test": { "teststrategy": strategy }
                }
            })
            .to_string(),
        )
        .unwrap()
    }

    async fn handle(
        event: &InboundEvent,
        source: &dyn ConfigSource,
    ) -> (HandleOutcome, FakeCluster, RecordingEventSender) {
        let settings = JobSettings::default();
        let cluster = FakeCluster::default();
        let sender = RecordingEventSender::default();
        let outcome = EventHandler {
            settings: &settings,
            configs: source,
            mapper: &CloudEventMapper,
            filter: &AllowAll,
            cluster: &cluster,
            sender: &sender,
        }
        .handle(event)
        .await
        .unwrap();
        (outcome, cluster, sender)
    }

    fn config() -> StaticConfigSource {
        StaticConfigSource(JobConfig::parse(CONFIG).unwrap())
    }

    #[tokio::test]
    async fn matching_event_runs_action() {
        let (outcome, cluster, sender) =
            handle(&event("sh.keptn.event.test.triggered", "locust"), &config()).await;

        let HandleOutcome::Executed { report } = outcome else {
            panic!("expected Executed, got {outcome:?}")
        };
        assert_eq!(report.action, "Run locust");
        assert_eq!(cluster.created_jobs().len(), 1);
        assert_eq!(
            sender.event_types(),
            vec!["sh.keptn.event.test.started", "sh.keptn.event.test.finished"]
        );
    }

    #[tokio::test]
    async fn non_triggered_events_are_ignored() {
        let (outcome, cluster, sender) =
            handle(&event("sh.keptn.event.test.finished", "locust"), &config()).await;
        assert!(matches!(outcome, HandleOutcome::Ignored { .. }));
        assert!(cluster.calls().is_empty());
        assert!(sender.events().is_empty());
    }

    #[tokio::test]
    async fn unmatched_events_are_ignored() {
        let (outcome, cluster, _) =
            handle(&event("sh.keptn.event.test.triggered", "jmeter"), &config()).await;
        let HandleOutcome::Ignored { reason } = outcome else {
            panic!("expected Ignored")
        };
        assert!(reason.contains("no action matches"));
        assert!(cluster.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_config_is_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = crate::config::FileConfigSource::new(dir.path());
        let (outcome, _, _) =
            handle(&event("sh.keptn.event.test.triggered", "locust"), &source).await;
        let HandleOutcome::Ignored { reason } = outcome else {
            panic!("expected Ignored")
        };
        assert!(reason.contains("sockshop/dev/carts"));
    }
}
