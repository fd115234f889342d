//! In-memory [`ClusterClient`] that records every call.
//!
//! Every job succeeds immediately unless configured otherwise; logs are
//! `logs of <job>`.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::driver::{ClusterClient, DriverError, JobCompletion, JobIdentity, JobSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Create {
        job: String,
        namespace: String,
    },
    Await {
        job: String,
        max_poll: Duration,
        interval: Duration,
        namespace: String,
    },
    Logs {
        job: String,
        namespace: String,
    },
}

#[derive(Debug, Default)]
pub struct FakeCluster {
    calls: Mutex<Vec<Call>>,
    specs: Mutex<Vec<JobSpec>>,
    fail_connect: bool,
    fail_create: HashSet<String>,
    fail_await: HashSet<String>,
    fail_logs: HashSet<String>,
    completions: HashMap<String, JobCompletion>,
}

impl FakeCluster {
    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn fail_create(mut self, job: &str) -> Self {
        self.fail_create.insert(job.to_string());
        self
    }

    pub fn fail_await(mut self, job: &str) -> Self {
        self.fail_await.insert(job.to_string());
        self
    }

    pub fn fail_logs(mut self, job: &str) -> Self {
        self.fail_logs.insert(job.to_string());
        self
    }

    /// Report `completion` instead of success when `job` is awaited.
    pub fn complete(mut self, job: &str, completion: JobCompletion) -> Self {
        self.completions.insert(job.to_string(), completion);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn specs(&self) -> Vec<JobSpec> {
        self.specs.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn created_jobs(&self) -> Vec<String> {
        self.specs()
            .into_iter()
            .map(|s| s.identity.to_string())
            .collect()
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn connect(&self) -> Result<(), DriverError> {
        self.record(Call::Connect);
        if self.fail_connect {
            return Err(DriverError::Connect("no kubeconfig".into()));
        }
        Ok(())
    }

    async fn create_job(&self, spec: &JobSpec) -> Result<(), DriverError> {
        let job = spec.identity.to_string();
        self.record(Call::Create {
            job: job.clone(),
            namespace: spec.namespace.clone(),
        });
        if self.fail_create.contains(&job) {
            return Err(DriverError::CreateJob {
                job,
                reason: "admission webhook denied the request".into(),
            });
        }
        if let Ok(mut specs) = self.specs.lock() {
            specs.push(spec.clone());
        }
        Ok(())
    }

    async fn await_job_done(
        &self,
        identity: &JobIdentity,
        max_poll_duration: Duration,
        poll_interval: Duration,
        namespace: &str,
    ) -> Result<JobCompletion, DriverError> {
        let job = identity.to_string();
        self.record(Call::Await {
            job: job.clone(),
            max_poll: max_poll_duration,
            interval: poll_interval,
            namespace: namespace.to_string(),
        });
        if self.fail_await.contains(&job) {
            return Err(DriverError::Await {
                job,
                reason: "connection reset".into(),
            });
        }
        Ok(self
            .completions
            .get(&job)
            .cloned()
            .unwrap_or(JobCompletion::Succeeded))
    }

    async fn get_logs_of_pod(
        &self,
        identity: &JobIdentity,
        namespace: &str,
    ) -> Result<String, DriverError> {
        let job = identity.to_string();
        self.record(Call::Logs {
            job: job.clone(),
            namespace: namespace.to_string(),
        });
        if self.fail_logs.contains(&job) {
            return Err(DriverError::Logs {
                job,
                reason: "pod not found".into(),
            });
        }
        Ok(format!("logs of {job}"))
    }
}
