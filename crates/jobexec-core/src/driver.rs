//! Contract for the cluster that runs task jobs.
//!
//! The orchestrator drives every job through the same four calls:
//!
//! ```text
//! connect ──► create_job ──► await_job_done ──► get_logs_of_pod
//!  (once)      (per task)     (bounded poll)      (best effort)
//! ```
//!
//! Implementations own the polling loop; the orchestrator only supplies the
//! bound and the interval.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::Resources;

// ---------------------------------------------------------------------------
// JobIdentity
// ---------------------------------------------------------------------------

/// Number of leading event-id characters kept in a job name.
///
/// `<service>-job-` plus 28 id characters plus `-999` stays inside the
/// 63-character Kubernetes name limit for the default service name.
pub const EVENT_ID_CHARS: usize = 28;

/// Deterministic cluster job name for one task of one inbound event.
///
/// Format: `<service>-job-<first 28 chars of event id, lowercased>-<ordinal>`,
/// where `ordinal` is the 1-based position of the task within its action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobIdentity(String);

impl JobIdentity {
    pub fn new(service_name: &str, event_id: &str, ordinal: usize) -> Self {
        let id: String = event_id
            .trim()
            .chars()
            .take(EVENT_ID_CHARS)
            .collect::<String>()
            .to_lowercase();
        Self(format!("{service_name}-job-{id}-{ordinal}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// JobSpec
// ---------------------------------------------------------------------------

/// One environment entry of a job container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEnv {
    Value { name: String, value: String },
    /// Every key of the named secret becomes an environment variable.
    Secret { name: String },
}

/// Everything the cluster needs to create one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub identity: JobIdentity,
    pub namespace: String,
    pub image: String,
    pub cmd: Vec<String>,
    pub args: Vec<String>,
    pub env: Vec<JobEnv>,
    pub working_dir: Option<String>,
    pub resources: Option<Resources>,
    pub service_account: Option<String>,
    pub ttl_seconds_after_finished: Option<i32>,
    pub image_pull_policy: Option<String>,
    pub labels: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// JobCompletion / DriverError
// ---------------------------------------------------------------------------

/// Terminal state observed by `await_job_done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobCompletion {
    Succeeded,
    /// The job reached a failed state, e.g. a non-zero container exit.
    Failed { reason: String },
    /// The poll bound elapsed before the job finished. Not an error.
    TimedOut,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("could not connect to cluster: {0}")]
    Connect(String),

    #[error("not connected to cluster")]
    NotConnected,

    #[error("failed to create job {job}: {reason}")]
    CreateJob { job: String, reason: String },

    #[error("failed to watch job {job}: {reason}")]
    Await { job: String, reason: String },

    #[error("failed to read logs of job {job}: {reason}")]
    Logs { job: String, reason: String },
}

// ---------------------------------------------------------------------------
// ClusterClient
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Establish the session used by every later call. Called once per action.
    async fn connect(&self) -> Result<(), DriverError>;

    async fn create_job(&self, spec: &JobSpec) -> Result<(), DriverError>;

    /// Block until the job is terminal or `max_poll_duration` has elapsed,
    /// checking every `poll_interval`.
    async fn await_job_done(
        &self,
        identity: &JobIdentity,
        max_poll_duration: Duration,
        poll_interval: Duration,
        namespace: &str,
    ) -> Result<JobCompletion, DriverError>;

    async fn get_logs_of_pod(
        &self,
        identity: &JobIdentity,
        namespace: &str,
    ) -> Result<String, DriverError>;
}
