//! Per-task outcomes and their aggregation into the action result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::driver::JobIdentity;

// ---------------------------------------------------------------------------
// TaskOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Admitted, created, and completed successfully.
    Succeeded,
    /// Admitted and created, but still running when the poll bound elapsed.
    TimedOut { max_poll_seconds: u64 },
    /// Admitted, but did not complete successfully.
    ///
    /// `infrastructure` separates cluster or configuration errors (the job
    /// could not be created or watched) from the job itself failing.
    Failed { reason: String, infrastructure: bool },
    /// Rejected by the image filter; no job was created.
    Denied { image: String },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded)
    }

    /// Policy rejections and infrastructure errors turn the action `errored`.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            TaskOutcome::Denied { .. }
                | TaskOutcome::Failed {
                    infrastructure: true,
                    ..
                }
        )
    }
}

/// What happened to one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub task: String,
    pub job: JobIdentity,
    pub namespace: String,
    pub outcome: TaskOutcome,
    /// `None` when no job ran or its logs could not be retrieved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

impl TaskReport {
    fn describe(&self) -> String {
        match &self.outcome {
            TaskOutcome::Succeeded => {
                format!("Job {} of task '{}' finished successfully", self.job, self.task)
            }
            TaskOutcome::TimedOut { max_poll_seconds } => format!(
                "Execution failure: job {} of task '{}' did not complete within {}s",
                self.job, self.task, max_poll_seconds
            ),
            TaskOutcome::Failed {
                reason,
                infrastructure: false,
            } => format!(
                "Execution failure: job {} of task '{}' failed: {}",
                self.job, self.task, reason
            ),
            TaskOutcome::Failed {
                reason,
                infrastructure: true,
            } => format!(
                "Execution error: task '{}' could not be run as job {}: {}",
                self.task, self.job, reason
            ),
            TaskOutcome::Denied { image } => format!(
                "Policy rejection: image {} of task '{}' is not allowed by the configured image filter",
                image, self.task
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Status / Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Succeeded,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventResult {
    Pass,
    Fail,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventStatus::Succeeded => "succeeded",
            EventStatus::Errored => "errored",
        })
    }
}

impl fmt::Display for EventResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventResult::Pass => "pass",
            EventResult::Fail => "fail",
        })
    }
}

// ---------------------------------------------------------------------------
// ActionReport
// ---------------------------------------------------------------------------

/// Aggregated outcome of one action, the source of the finished event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    pub action: String,
    pub tasks: Vec<TaskReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ActionReport {
    /// `pass` iff every task succeeded. An action without tasks passes.
    pub fn result(&self) -> EventResult {
        if self.tasks.iter().all(|t| t.outcome.is_success()) {
            EventResult::Pass
        } else {
            EventResult::Fail
        }
    }

    pub fn status(&self) -> EventStatus {
        if self.tasks.iter().any(|t| t.outcome.is_error()) {
            EventStatus::Errored
        } else {
            EventStatus::Succeeded
        }
    }

    pub fn first_failure(&self) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| !t.outcome.is_success())
    }

    /// Human-readable summary for the finished event.
    ///
    /// Failures come first, in task order, so the first line always names
    /// the first failing task. Job logs follow.
    pub fn message(&self) -> String {
        let mut out = String::new();
        let failures: Vec<&TaskReport> = self
            .tasks
            .iter()
            .filter(|t| !t.outcome.is_success())
            .collect();

        if self.tasks.is_empty() {
            out.push_str(&format!("Action '{}' has no tasks to run", self.action));
        } else if failures.is_empty() {
            out.push_str(&format!(
                "Action '{}' finished successfully: {} task(s) completed",
                self.action,
                self.tasks.len()
            ));
        } else {
            let lines: Vec<String> = failures.iter().map(|t| t.describe()).collect();
            out.push_str(&lines.join("\n"));
            out.push_str(&format!(
                "\n{} of {} task(s) of action '{}' did not succeed",
                failures.len(),
                self.tasks.len(),
                self.action
            ));
        }

        for report in &self.tasks {
            if let Some(logs) = report.logs.as_deref().filter(|l| !l.is_empty()) {
                out.push_str(&format!("\n\nLogs of job {}:\n{}", report.job, logs));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(task: &str, ordinal: usize, outcome: TaskOutcome) -> TaskReport {
        TaskReport {
            task: task.into(),
            job: JobIdentity::new("svc", "event", ordinal),
            namespace: "keptn".into(),
            outcome,
            logs: None,
        }
    }

    fn action(tasks: Vec<TaskReport>) -> ActionReport {
        let now = Utc::now();
        ActionReport {
            action: "Run locust".into(),
            tasks,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn all_success_passes() {
        let a = action(vec![
            report("a", 1, TaskOutcome::Succeeded),
            report("b", 2, TaskOutcome::Succeeded),
        ]);
        assert_eq!(a.result(), EventResult::Pass);
        assert_eq!(a.status(), EventStatus::Succeeded);
        assert!(a.first_failure().is_none());
        assert!(a.message().contains("2 task(s) completed"));
    }

    #[test]
    fn empty_action_passes() {
        let a = action(vec![]);
        assert_eq!(a.result(), EventResult::Pass);
        assert_eq!(a.status(), EventStatus::Succeeded);
        assert!(a.message().contains("no tasks"));
    }

    #[test]
    fn timeout_fails_without_erroring() {
        let a = action(vec![
            report("a", 1, TaskOutcome::Succeeded),
            report("b", 2, TaskOutcome::TimedOut { max_poll_seconds: 60 }),
        ]);
        assert_eq!(a.result(), EventResult::Fail);
        assert_eq!(a.status(), EventStatus::Succeeded);
        assert!(a.message().starts_with("Execution failure: job svc-job-event-2"));
        assert!(a.message().contains("within 60s"));
    }

    #[test]
    fn job_failure_is_an_execution_failure() {
        let a = action(vec![report(
            "a",
            1,
            TaskOutcome::Failed {
                reason: "BackoffLimitExceeded".into(),
                infrastructure: false,
            },
        )]);
        assert_eq!(a.status(), EventStatus::Succeeded);
        assert_eq!(a.result(), EventResult::Fail);
        assert!(a.message().contains("BackoffLimitExceeded"));
    }

    #[test]
    fn infrastructure_failure_errors() {
        let a = action(vec![report(
            "a",
            1,
            TaskOutcome::Failed {
                reason: "quota exceeded".into(),
                infrastructure: true,
            },
        )]);
        assert_eq!(a.status(), EventStatus::Errored);
        assert_eq!(a.result(), EventResult::Fail);
        assert!(a.message().starts_with("Execution error"));
    }

    #[test]
    fn denial_errors_and_names_the_image() {
        let a = action(vec![
            report("ok", 1, TaskOutcome::Succeeded),
            report(
                "bad",
                2,
                TaskOutcome::Denied {
                    image: "alpine:latest".into(),
                },
            ),
        ]);
        assert_eq!(a.status(), EventStatus::Errored);
        assert_eq!(a.result(), EventResult::Fail);
        let msg = a.message();
        assert!(msg.starts_with("Policy rejection"));
        assert!(msg.contains("alpine:latest"));
        assert_eq!(a.first_failure().map(|t| t.task.as_str()), Some("bad"));
    }

    #[test]
    fn first_failure_leads_the_message() {
        let a = action(vec![
            report(
                "first",
                1,
                TaskOutcome::Denied {
                    image: "evil:1".into(),
                },
            ),
            report("second", 2, TaskOutcome::TimedOut { max_poll_seconds: 5 }),
        ]);
        let msg = a.message();
        let first_line = msg.lines().next().unwrap();
        assert!(first_line.contains("evil:1"));
        assert!(msg.contains("2 of 2 task(s)"));
    }

    #[test]
    fn logs_are_appended_per_job() {
        let mut ok = report("a", 1, TaskOutcome::Succeeded);
        ok.logs = Some("hello from locust".into());
        let mut empty = report("b", 2, TaskOutcome::Succeeded);
        empty.logs = Some(String::new());
        let msg = action(vec![ok, empty]).message();
        assert!(msg.contains("Logs of job svc-job-event-1:\nhello from locust"));
        assert!(!msg.contains("Logs of job svc-job-event-2"));
    }

    #[test]
    fn status_and_result_serialize_lowercase() {
        assert_eq!(
            serde_json::to_value(EventStatus::Errored).unwrap(),
            serde_json::json!("errored")
        );
        assert_eq!(EventResult::Fail.to_string(), "fail");
    }
}
