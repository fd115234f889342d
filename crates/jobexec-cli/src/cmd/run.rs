use anyhow::Context;
use serde::Serialize;
use std::path::Path;

use jobexec_core::config::FileConfigSource;
use jobexec_core::event::{CloudEventMapper, InboundEvent};
use jobexec_core::handler::{EventHandler, HandleOutcome};
use jobexec_core::lifecycle::{EventSender, OutboundEvent};
use jobexec_core::sender::{HttpEventSender, RecordingEventSender};
use jobexec_k8s::KubeDriver;

use crate::output::{print_json, print_report};
use crate::settings::{SettingsArgs, SourceArgs};

#[derive(Serialize)]
struct RunOutput<'a> {
    outcome: &'a HandleOutcome,
    /// Events that were not delivered to an endpoint.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    events: Vec<OutboundEvent>,
}

/// Handle one event file synchronously.
///
/// Without `--events-url`, lifecycle events are collected and printed
/// alongside the report instead of being sent.
pub fn run(
    event_file: &Path,
    settings: &SettingsArgs,
    sources: &SourceArgs,
    json: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(event_file)
        .with_context(|| format!("failed to read {}", event_file.display()))?;
    let event = InboundEvent::from_json(&raw)
        .with_context(|| format!("invalid event in {}", event_file.display()))?;

    let job_settings = settings.job_settings();
    let filter = settings.image_filter()?;
    let configs = FileConfigSource::new(&sources.config_root);
    let cluster = KubeDriver::new(settings.kube_settings());
    let recorder = RecordingEventSender::default();
    let http = match &sources.events_url {
        Some(url) => Some(HttpEventSender::new(url, sources.events_token.clone())?),
        None => None,
    };
    let sender: &dyn EventSender = match &http {
        Some(http) => http,
        None => &recorder,
    };

    let handler = EventHandler {
        settings: &job_settings,
        configs: &configs,
        mapper: &CloudEventMapper,
        filter: &filter,
        cluster: &cluster,
        sender,
    };
    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(handler.handle(&event))?;

    let events = recorder.events();
    if json {
        return print_json(&RunOutput {
            outcome: &outcome,
            events,
        });
    }

    match &outcome {
        HandleOutcome::Ignored { reason } => println!("Ignored: {reason}"),
        HandleOutcome::Executed { report } => print_report(report),
    }
    for event in &events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}
