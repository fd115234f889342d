use anyhow::Context;
use clap::Args;
use std::path::PathBuf;

use jobexec_core::filter::PatternFilter;
use jobexec_core::settings::{JobSettings, DEFAULT_IMAGE, DEFAULT_NAMESPACE, DEFAULT_SERVICE_NAME};
use jobexec_k8s::KubeSettings;

/// Process-wide settings shared by `run` and `serve`.
#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    /// Namespace for tasks that do not set their own
    #[arg(long, global = true, env = "JOB_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Service name used in job names and as the source of sent events
    #[arg(long, global = true, env = "SERVICE_NAME", default_value = DEFAULT_SERVICE_NAME)]
    pub service_name: String,

    /// Image for tasks that do not set their own
    #[arg(long, global = true, env = "DEFAULT_JOB_IMAGE", default_value = DEFAULT_IMAGE)]
    pub default_image: String,

    /// Comma-separated glob patterns of images tasks may use (unset: all)
    #[arg(long, global = true, env = "JOB_ALLOWED_IMAGE_LIST")]
    pub allowed_images: Option<String>,

    /// Comma-separated glob patterns of images tasks may not use
    #[arg(long, global = true, env = "JOB_DENIED_IMAGE_LIST")]
    pub denied_images: Option<String>,

    /// Service account for tasks that do not set their own
    #[arg(long, global = true, env = "JOB_SERVICE_ACCOUNT")]
    pub service_account: Option<String>,

    /// ttlSecondsAfterFinished for tasks that do not set their own
    #[arg(long, global = true, env = "JOB_TTL_SECONDS_AFTER_FINISHED")]
    pub ttl_seconds_after_finished: Option<i32>,

    /// Kubeconfig file (default: in-cluster config, then ~/.kube/config)
    #[arg(long, global = true, env = "JOB_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,
}

impl SettingsArgs {
    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            service_name: self.service_name.clone(),
            namespace: self.namespace.clone(),
            default_image: self.default_image.clone(),
            service_account: self.service_account.clone(),
            ttl_seconds_after_finished: self.ttl_seconds_after_finished,
        }
    }

    pub fn image_filter(&self) -> anyhow::Result<PatternFilter> {
        let filter = PatternFilter::from_lists(
            self.allowed_images.as_deref(),
            self.denied_images.as_deref(),
        )
        .context("invalid image list")?;
        tracing::debug!(
            allowed = filter.allow_list_len(),
            denied = filter.deny_list_len(),
            "image filter configured"
        );
        Ok(filter)
    }

    pub fn kube_settings(&self) -> KubeSettings {
        KubeSettings {
            kubeconfig: self.kubeconfig.clone(),
        }
    }
}

/// Where task configs and outbound events go.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Root directory searched for `job/config.yaml`
    #[arg(long, env = "JOB_CONFIG_ROOT", default_value = ".")]
    pub config_root: PathBuf,

    /// Endpoint receiving started/finished events
    #[arg(long, env = "EVENTS_URL")]
    pub events_url: Option<String>,

    /// Value of the `x-token` header sent with each event
    #[arg(long, env = "EVENTS_TOKEN", hide_env_values = true)]
    pub events_token: Option<String>,
}
