//! Runs one action against the cluster and reports its outcome.
//!
//! ```text
//! started ─► connect ─► for each task, in order:
//!                         resolve ─► admit? ──no──► Denied
//!                                      │yes
//!                                      ▼
//!                         create ─► await (bounded) ─► logs
//!            ─► aggregate ─► finished
//! ```
//!
//! Only a failed `connect` aborts the action. Every per-task failure is
//! recorded in the [`ActionReport`] and the next task still runs.

use chrono::Utc;
use std::collections::BTreeMap;

use crate::config::{Action, Task};
use crate::driver::{ClusterClient, JobCompletion, JobSpec};
use crate::env::{prepare_env, standard_env};
use crate::error::{JobExecError, Result};
use crate::filter::ImageFilter;
use crate::lifecycle::{EventContext, EventSender, LifecycleEmitter};
use crate::outcome::{ActionReport, EventResult, EventStatus, TaskOutcome, TaskReport};
use crate::resolve::{resolve_task, ResolvedTask};
use crate::settings::JobSettings;

pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_CONTEXT: &str = "keptn.sh/context";
pub const LABEL_TASK_KIND: &str = "keptn.sh/task";

/// Everything one action execution depends on. Holds only shared references,
/// so independent actions can run concurrently on separate orchestrators.
pub struct ActionOrchestrator<'a> {
    pub settings: &'a JobSettings,
    pub filter: &'a dyn ImageFilter,
    pub cluster: &'a dyn ClusterClient,
    pub sender: &'a dyn EventSender,
}

impl<'a> ActionOrchestrator<'a> {
    pub fn new(
        settings: &'a JobSettings,
        filter: &'a dyn ImageFilter,
        cluster: &'a dyn ClusterClient,
        sender: &'a dyn EventSender,
    ) -> Self {
        Self {
            settings,
            filter,
            cluster,
            sender,
        }
    }

    /// Execute `action` for the event described by `context`.
    ///
    /// `properties` is the mapped event used for `valueFrom: event`.
    /// Returns `Err` only when the cluster connection fails; a non-silent
    /// action has then already reported the failure in its finished event.
    pub async fn execute(
        &self,
        context: &EventContext,
        action: &Action,
        properties: &serde_json::Value,
    ) -> Result<ActionReport> {
        let started_at = Utc::now();
        let mut emitter =
            LifecycleEmitter::new(self.sender, &self.settings.service_name, context, action.silent);
        emitter.send_started().await;

        if let Err(e) = self.cluster.connect().await {
            tracing::error!(action = %action.name, error = %e, "error while connecting to cluster");
            emitter
                .send_finished(
                    EventStatus::Errored,
                    EventResult::Fail,
                    &format!("Error while connecting to cluster: {e}"),
                    started_at,
                    Utc::now(),
                )
                .await;
            return Err(JobExecError::Connection(e));
        }

        let mut tasks = Vec::with_capacity(action.tasks.len());
        for (index, task) in action.tasks.iter().enumerate() {
            let resolved = resolve_task(self.settings, &context.event_id, index, task);
            tracing::info!(
                action = %action.name,
                task = %task.name,
                job = %resolved.identity,
                namespace = %resolved.namespace,
                "starting task {}/{}",
                index + 1,
                action.tasks.len()
            );
            let report = self.run_task(context, task, resolved, properties).await;
            tracing::info!(task = %report.task, job = %report.job, outcome = ?report.outcome, "task done");
            tasks.push(report);
        }

        let report = ActionReport {
            action: action.name.clone(),
            tasks,
            started_at,
            finished_at: Utc::now(),
        };
        emitter
            .send_finished(
                report.status(),
                report.result(),
                &report.message(),
                report.started_at,
                report.finished_at,
            )
            .await;
        Ok(report)
    }

    async fn run_task(
        &self,
        context: &EventContext,
        task: &Task,
        resolved: ResolvedTask,
        properties: &serde_json::Value,
    ) -> TaskReport {
        let mut report = TaskReport {
            task: task.name.clone(),
            job: resolved.identity.clone(),
            namespace: resolved.namespace.clone(),
            outcome: TaskOutcome::Succeeded,
            logs: None,
        };

        if let Some(image) = task.image() {
            if !self.filter.is_allowed(image) {
                tracing::warn!(task = %task.name, image, "image rejected by image filter");
                report.outcome = TaskOutcome::Denied {
                    image: image.to_string(),
                };
                return report;
            }
        }

        let spec = match self.job_spec(context, task, &resolved, properties) {
            Ok(spec) => spec,
            Err(e) => {
                report.outcome = TaskOutcome::Failed {
                    reason: e.to_string(),
                    infrastructure: true,
                };
                return report;
            }
        };

        if let Err(e) = self.cluster.create_job(&spec).await {
            tracing::error!(job = %resolved.identity, error = %e, "could not create job");
            report.outcome = TaskOutcome::Failed {
                reason: e.to_string(),
                infrastructure: true,
            };
            return report;
        }

        report.outcome = match self
            .cluster
            .await_job_done(
                &resolved.identity,
                resolved.max_poll_duration,
                resolved.poll_interval,
                &resolved.namespace,
            )
            .await
        {
            Ok(JobCompletion::Succeeded) => TaskOutcome::Succeeded,
            Ok(JobCompletion::TimedOut) => TaskOutcome::TimedOut {
                max_poll_seconds: resolved.max_poll_duration.as_secs(),
            },
            Ok(JobCompletion::Failed { reason }) => TaskOutcome::Failed {
                reason,
                infrastructure: false,
            },
            Err(e) => TaskOutcome::Failed {
                reason: e.to_string(),
                infrastructure: true,
            },
        };

        match self
            .cluster
            .get_logs_of_pod(&resolved.identity, &resolved.namespace)
            .await
        {
            Ok(logs) => report.logs = Some(logs),
            Err(e) => {
                tracing::warn!(job = %resolved.identity, error = %e, "could not retrieve job logs")
            }
        }
        report
    }

    fn job_spec(
        &self,
        context: &EventContext,
        task: &Task,
        resolved: &ResolvedTask,
        properties: &serde_json::Value,
    ) -> Result<JobSpec> {
        let payload = properties
            .get("data")
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let mut env = standard_env(&context.data, &payload);
        env.extend(prepare_env(&task.env, properties)?);

        let mut labels = BTreeMap::new();
        labels.insert(LABEL_MANAGED_BY.to_string(), self.settings.service_name.clone());
        labels.insert(LABEL_TASK_KIND.to_string(), context.task_kind.clone());
        if !context.keptn_context.is_empty() {
            labels.insert(LABEL_CONTEXT.to_string(), context.keptn_context.clone());
        }

        Ok(JobSpec {
            identity: resolved.identity.clone(),
            namespace: resolved.namespace.clone(),
            image: resolved.image.clone(),
            cmd: task.cmd.clone(),
            args: task.args.clone(),
            env,
            working_dir: task.working_dir.clone(),
            resources: task.resources.clone(),
            service_account: resolved.service_account.clone(),
            ttl_seconds_after_finished: resolved.ttl_seconds_after_finished,
            image_pull_policy: task.image_pull_policy.clone(),
            labels,
        })
    }
}
