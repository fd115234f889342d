use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVICE_NAME: &str = "job-executor-service";
pub const DEFAULT_NAMESPACE: &str = "keptn";
pub const DEFAULT_IMAGE: &str = "alpine:3";

/// Process-level defaults applied to every task that does not override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSettings {
    /// Prefix of every job name and `source` of outbound events.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Namespace for tasks without their own `namespace`.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Image for tasks without their own `image`.
    #[serde(default = "default_image")]
    pub default_image: String,
    #[serde(default)]
    pub service_account: Option<String>,
    #[serde(default)]
    pub ttl_seconds_after_finished: Option<i32>,
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            namespace: default_namespace(),
            default_image: default_image(),
            service_account: None,
            ttl_seconds_after_finished: None,
        }
    }
}

impl JobSettings {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}
