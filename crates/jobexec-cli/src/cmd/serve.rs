use std::sync::Arc;

use jobexec_core::config::FileConfigSource;
use jobexec_core::lifecycle::EventSender;
use jobexec_core::sender::{HttpEventSender, StdoutEventSender};
use jobexec_server::AppState;

use crate::settings::{SettingsArgs, SourceArgs};

/// Start the event receiver. Without `--events-url`, lifecycle events are
/// written to stdout as JSON lines.
pub fn run(port: u16, settings: &SettingsArgs, sources: &SourceArgs) -> anyhow::Result<()> {
    let sender: Arc<dyn EventSender> = match &sources.events_url {
        Some(url) => Arc::new(HttpEventSender::new(url, sources.events_token.clone())?),
        None => {
            tracing::warn!("no --events-url configured, writing events to stdout");
            Arc::new(StdoutEventSender)
        }
    };

    let state = AppState::new(
        settings.job_settings(),
        Arc::new(FileConfigSource::new(&sources.config_root)),
        Arc::new(settings.image_filter()?),
        sender,
        Arc::new(settings.kube_settings()),
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(jobexec_server::serve(state, port))
}
