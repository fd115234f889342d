use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, LogParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use jobexec_core::driver::{ClusterClient, DriverError, JobCompletion, JobIdentity, JobSpec};

use crate::manifest::{completion_of, job_manifest, JOB_NAME_LABEL};
use crate::Result;

/// How to reach the cluster.
#[derive(Debug, Clone, Default)]
pub struct KubeSettings {
    /// Explicit kubeconfig. `None` tries in-cluster config first, then the
    /// default kubeconfig.
    pub kubeconfig: Option<PathBuf>,
}

/// [`ClusterClient`] backed by the Kubernetes API.
///
/// One driver serves one inbound event; the client is created on
/// [`connect`](ClusterClient::connect) and reused for every task.
pub struct KubeDriver {
    settings: KubeSettings,
    client: OnceCell<Client>,
}

impl KubeDriver {
    pub fn new(settings: KubeSettings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> Result<Client> {
        self.client.get().cloned().ok_or(DriverError::NotConnected)
    }

    async fn build_client(&self) -> Result<Client> {
        let Some(path) = &self.settings.kubeconfig else {
            return Client::try_default()
                .await
                .map_err(|e| DriverError::Connect(e.to_string()));
        };

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            DriverError::Connect(format!("failed to read kubeconfig {}: {e}", path.display()))
        })?;
        let kubeconfig = Kubeconfig::from_yaml(&content)
            .map_err(|e| DriverError::Connect(format!("failed to parse kubeconfig: {e}")))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| DriverError::Connect(format!("failed to load kubeconfig: {e}")))?;
        Client::try_from(config).map_err(|e| DriverError::Connect(e.to_string()))
    }
}

#[async_trait]
impl ClusterClient for KubeDriver {
    async fn connect(&self) -> Result<()> {
        let client = self
            .client
            .get_or_try_init(|| self.build_client())
            .await?;
        tracing::debug!(namespace = %client.default_namespace(), "connected to cluster");
        Ok(())
    }

    async fn create_job(&self, spec: &JobSpec) -> Result<()> {
        let create_err = |reason: String| DriverError::CreateJob {
            job: spec.identity.to_string(),
            reason,
        };
        let job = job_manifest(spec);
        let jobs: Api<Job> = Api::namespaced(self.client()?, &spec.namespace);
        jobs.create(&PostParams::default(), &job)
            .await
            .map_err(|e| create_err(e.to_string()))?;

        tracing::info!(job = %spec.identity, namespace = %spec.namespace, image = %spec.image, "created job");
        Ok(())
    }

    async fn await_job_done(
        &self,
        identity: &JobIdentity,
        max_poll_duration: Duration,
        poll_interval: Duration,
        namespace: &str,
    ) -> Result<JobCompletion> {
        let jobs: Api<Job> = Api::namespaced(self.client()?, namespace);
        // `None` when the bound does not fit in an Instant: wait until done.
        let deadline = Instant::now().checked_add(max_poll_duration);

        loop {
            let job = jobs
                .get(identity.as_str())
                .await
                .map_err(|e| DriverError::Await {
                    job: identity.to_string(),
                    reason: e.to_string(),
                })?;
            if let Some(completion) = completion_of(&job) {
                return Ok(completion);
            }

            let mut wait = poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    tracing::warn!(job = %identity, max_poll_secs = max_poll_duration.as_secs(), "job did not finish in time");
                    return Ok(JobCompletion::TimedOut);
                }
                wait = wait.min(deadline - now);
            }
            tracing::debug!(job = %identity, "job still running");
            tokio::time::sleep(wait).await;
        }
    }

    async fn get_logs_of_pod(
        &self,
        identity: &JobIdentity,
        namespace: &str,
    ) -> Result<String> {
        let logs_err = |reason: String| DriverError::Logs {
            job: identity.to_string(),
            reason,
        };
        let pods: Api<Pod> = Api::namespaced(self.client()?, namespace);
        let selector = format!("{JOB_NAME_LABEL}={identity}");
        let mut list = pods
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| logs_err(e.to_string()))?
            .items;
        if list.is_empty() {
            return Err(logs_err("no pods found".into()));
        }
        list.sort_by_key(|p| p.metadata.creation_timestamp.as_ref().map(|t| t.0));

        let mut out = String::new();
        for pod in list {
            let Some(name) = pod.metadata.name else {
                continue;
            };
            let logs = pods
                .logs(&name, &LogParams::default())
                .await
                .map_err(|e| logs_err(format!("pod {name}: {e}")))?;
            out.push_str(&logs);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn identity() -> JobIdentity {
        JobIdentity::new("svc", "abc", 1)
    }

    #[tokio::test]
    async fn calls_before_connect_are_rejected() {
        let driver = KubeDriver::new(KubeSettings::default());
        let err = driver
            .get_logs_of_pod(&identity(), "keptn")
            .await
            .unwrap_err();
        assert_eq!(err, DriverError::NotConnected);

        let err = driver
            .await_job_done(
                &identity(),
                Duration::from_secs(1),
                Duration::from_secs(1),
                "keptn",
            )
            .await
            .unwrap_err();
        assert_eq!(err, DriverError::NotConnected);
    }

    #[tokio::test]
    async fn create_before_connect_is_rejected() {
        let driver = KubeDriver::new(KubeSettings::default());
        let spec = JobSpec {
            identity: identity(),
            namespace: "keptn".into(),
            image: "alpine:3".into(),
            cmd: vec![],
            args: vec![],
            env: vec![],
            working_dir: None,
            resources: None,
            service_account: None,
            ttl_seconds_after_finished: None,
            image_pull_policy: None,
            labels: BTreeMap::new(),
        };
        assert_eq!(
            driver.create_job(&spec).await.unwrap_err(),
            DriverError::NotConnected
        );
    }

    #[tokio::test]
    async fn missing_kubeconfig_fails_to_connect() {
        let dir = tempfile::TempDir::new().unwrap();
        let driver = KubeDriver::new(KubeSettings {
            kubeconfig: Some(dir.path().join("nope.yaml")),
        });
        let err = driver.connect().await.unwrap_err();
        assert!(matches!(err, DriverError::Connect(ref m) if m.contains("nope.yaml")));
    }

    const UNREACHABLE_KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
clusters:
  - name: local
    cluster:
      server: http://127.0.0.1:1
contexts:
  - name: local
    context:
      cluster: local
      user: local
      namespace: keptn
current-context: local
users:
  - name: local
    user: {}
"#;

    #[tokio::test]
    async fn oversized_poll_bound_does_not_overflow() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kubeconfig");
        std::fs::write(&path, UNREACHABLE_KUBECONFIG).unwrap();
        let driver = KubeDriver::new(KubeSettings {
            kubeconfig: Some(path),
        });
        driver.connect().await.unwrap();

        let err = driver
            .await_job_done(
                &identity(),
                Duration::from_secs(u64::MAX),
                Duration::from_secs(5),
                "keptn",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Await { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn malformed_kubeconfig_fails_to_connect() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("kubeconfig");
        std::fs::write(&path, "clusters: [not, a, map").unwrap();
        let driver = KubeDriver::new(KubeSettings {
            kubeconfig: Some(path),
        });
        assert!(matches!(
            driver.connect().await,
            Err(DriverError::Connect(_))
        ));
    }
}
