//! Merges process defaults with per-task overrides.
//!
//! Resolution is a pure function of its inputs: the same settings, task,
//! event id and ordinal always produce the same [`ResolvedTask`].

use std::time::Duration;

use crate::config::Task;
use crate::driver::JobIdentity;
use crate::settings::JobSettings;

/// Wait bound for tasks without `maxPollDuration`.
pub const DEFAULT_MAX_POLL_DURATION: Duration = Duration::from_secs(60);

/// Completion-check granularity for tasks without `pollInterval`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    pub identity: JobIdentity,
    pub namespace: String,
    pub image: String,
    pub max_poll_duration: Duration,
    pub poll_interval: Duration,
    pub service_account: Option<String>,
    pub ttl_seconds_after_finished: Option<i32>,
}

/// Resolve the task at zero-based `index` of an action triggered by `event_id`.
pub fn resolve_task(
    settings: &JobSettings,
    event_id: &str,
    index: usize,
    task: &Task,
) -> ResolvedTask {
    let namespace = if task.namespace.trim().is_empty() {
        settings.namespace.clone()
    } else {
        task.namespace.clone()
    };

    ResolvedTask {
        identity: JobIdentity::new(&settings.service_name, event_id, index + 1),
        namespace,
        image: task
            .image()
            .map(str::to_string)
            .unwrap_or_else(|| settings.default_image.clone()),
        max_poll_duration: task
            .max_poll_duration
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_MAX_POLL_DURATION),
        poll_interval: task
            .poll_interval
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL),
        service_account: task
            .service_account
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| settings.service_account.clone()),
        ttl_seconds_after_finished: task
            .ttl_seconds_after_finished
            .or(settings.ttl_seconds_after_finished),
    }
}
