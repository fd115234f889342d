use crate::error::{JobExecError, Result};
use crate::path;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The only job config schema version understood by this executor.
pub const SUPPORTED_API_VERSION: &str = "v2";

/// Location of the job config relative to a project/stage/service directory.
pub const CONFIG_FILE: &str = "job/config.yaml";

// ---------------------------------------------------------------------------
// JobConfig
// ---------------------------------------------------------------------------

/// Parsed `job/config.yaml`: the actions this executor may run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    pub api_version: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl JobConfig {
    /// Parse and validate a YAML job config.
    pub fn parse(yaml: &str) -> Result<Self> {
        let config: JobConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_version != SUPPORTED_API_VERSION {
            return Err(JobExecError::InvalidConfig(format!(
                "unsupported apiVersion '{}', expected '{SUPPORTED_API_VERSION}'",
                self.api_version
            )));
        }
        for (i, action) in self.actions.iter().enumerate() {
            action.validate().map_err(|reason| {
                JobExecError::InvalidConfig(format!("action #{}: {reason}", i + 1))
            })?;
        }
        Ok(())
    }

    /// First action, in file order, that any of whose matchers accepts the event.
    pub fn find_action_for(
        &self,
        event_type: &str,
        properties: &serde_json::Value,
    ) -> Option<&Action> {
        self.actions
            .iter()
            .find(|a| a.events.iter().any(|m| m.matches(event_type, properties)))
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: String,
    #[serde(default)]
    pub events: Vec<EventMatcher>,
    /// Executed strictly in this order.
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Suppress the started/finished lifecycle events.
    #[serde(default)]
    pub silent: bool,
}

impl Action {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if self.events.is_empty() {
            return Err(format!("'{}' has no event matchers", self.name));
        }
        if let Some(m) = self.events.iter().find(|m| m.name.trim().is_empty()) {
            return Err(format!(
                "'{}' has an event matcher without a name{}",
                self.name,
                m.jsonpath
                    .as_ref()
                    .map(|j| format!(" (jsonpath {})", j.property))
                    .unwrap_or_default()
            ));
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.name.trim().is_empty() {
                return Err(format!("'{}' has a task without a name", self.name));
            }
            if !seen.insert(task.name.as_str()) {
                return Err(format!(
                    "'{}' declares task '{}' more than once",
                    self.name, task.name
                ));
            }
            if task.max_poll_duration == Some(0) {
                return Err(format!(
                    "task '{}' has a zero maxPollDuration",
                    task.name
                ));
            }
            if task.poll_interval == Some(0) {
                return Err(format!("task '{}' has a zero pollInterval", task.name));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EventMatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMatcher {
    /// Full event type, e.g. `sh.keptn.event.test.triggered`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonpath: Option<JsonPathMatch>,
}

/// Extra condition: the property at `property` must render to `matches`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonPathMatch {
    pub property: String,
    #[serde(rename = "match")]
    pub matches: String,
}

impl EventMatcher {
    pub fn matches(&self, event_type: &str, properties: &serde_json::Value) -> bool {
        if self.name != event_type {
            return false;
        }
        match &self.jsonpath {
            None => true,
            Some(jp) => path::lookup_string(properties, &jp.property)
                .is_some_and(|value| value == jp.matches),
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub name: String,
    /// Absent (or empty) means the process default image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Empty means the process default namespace.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_finished: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
    /// Upper bound in seconds to wait for job completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_poll_duration: Option<u64>,
    /// Seconds between completion checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
}

impl Task {
    /// The explicitly configured image, treating an empty string as unset.
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref().filter(|i| !i.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    pub name: String,
    /// Literal value, or a property path when `value_from` is `event`.
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub value_from: ValueFrom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFrom {
    #[default]
    String,
    Event,
    Secret,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default)]
    pub limits: ResourceList,
    #[serde(default)]
    pub requests: ResourceList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

// ---------------------------------------------------------------------------
// ConfigSource
// ---------------------------------------------------------------------------

/// Where the job config for an inbound event comes from.
pub trait ConfigSource: Send + Sync {
    /// Returns `Ok(None)` when no config exists for the event's
    /// project/stage/service.
    fn load_for(&self, project: &str, stage: &str, service: &str) -> Result<Option<JobConfig>>;
}

/// Looks up `job/config.yaml` in a directory tree, most specific first:
/// service, stage, project, then the root itself.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    root: PathBuf,
}

impl FileConfigSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Candidate files in lookup order. Empty path components are skipped so
    /// an event without a stage does not resolve to a project-level path twice.
    pub fn candidates(&self, project: &str, stage: &str, service: &str) -> Vec<PathBuf> {
        let scopes: [&[&str]; 4] = [
            &[project, stage, service],
            &[project, stage],
            &[project],
            &[],
        ];
        let mut out: Vec<PathBuf> = Vec::new();
        for scope in scopes {
            if scope.iter().any(|p| p.is_empty()) {
                continue;
            }
            let mut dir = self.root.clone();
            for part in scope {
                dir.push(part);
            }
            let file = dir.join(CONFIG_FILE);
            if !out.contains(&file) {
                out.push(file);
            }
        }
        out
    }
}

/// A project, stage or service name must be a single directory name.
fn check_component(kind: &str, value: &str) -> Result<()> {
    let escapes = matches!(value, "." | "..") || value.contains(['/', '\\', '\0']);
    if escapes {
        return Err(JobExecError::InvalidEvent(format!(
            "{kind} '{value}' is not a valid directory name"
        )));
    }
    Ok(())
}

impl ConfigSource for FileConfigSource {
    fn load_for(&self, project: &str, stage: &str, service: &str) -> Result<Option<JobConfig>> {
        check_component("project", project)?;
        check_component("stage", stage)?;
        check_component("service", service)?;
        for candidate in self.candidates(project, stage, service) {
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "loading job config");
                return JobConfig::load(&candidate).map(Some);
            }
        }
        Ok(None)
    }
}

/// A fixed, in-memory config applied to every event.
#[derive(Debug, Clone)]
pub struct StaticConfigSource(pub JobConfig);

impl ConfigSource for StaticConfigSource {
    fn load_for(&self, _project: &str, _stage: &str, _service: &str) -> Result<Option<JobConfig>> {
        Ok(Some(self.0.clone()))
    }
}
