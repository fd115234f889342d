use k8s_openapi::api::batch::v1::{Job, JobSpec as BatchJobSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvFromSource, EnvVar, PodSpec, PodTemplateSpec, ResourceRequirements,
    SecretEnvSource,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

use jobexec_core::config::{ResourceList, Resources};
use jobexec_core::driver::{JobCompletion, JobEnv, JobSpec};

/// Name of the single container in every task pod.
pub const CONTAINER_NAME: &str = "job";

/// Label the job controller puts on every pod it creates.
pub const JOB_NAME_LABEL: &str = "job-name";

/// Build the `batch/v1` Job for one task.
///
/// Pods never restart and the job never retries: one failed container
/// fails the task.
pub fn job_manifest(spec: &JobSpec) -> Job {
    let mut env = Vec::new();
    let mut env_from = Vec::new();
    for entry in &spec.env {
        match entry {
            JobEnv::Value { name, value } => env.push(EnvVar {
                name: name.clone(),
                value: Some(value.clone()),
                ..Default::default()
            }),
            JobEnv::Secret { name } => env_from.push(EnvFromSource {
                secret_ref: Some(SecretEnvSource {
                    name: name.clone().into(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        }
    }

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(spec.image.clone()),
        command: non_empty(spec.cmd.clone()),
        args: non_empty(spec.args.clone()),
        env: non_empty(env),
        env_from: non_empty(env_from),
        working_dir: spec.working_dir.clone(),
        image_pull_policy: spec.image_pull_policy.clone(),
        resources: spec.resources.as_ref().map(resource_requirements),
        ..Default::default()
    };

    let labels = (!spec.labels.is_empty()).then(|| spec.labels.clone());
    Job {
        metadata: ObjectMeta {
            name: Some(spec.identity.as_str().to_string()),
            namespace: Some(spec.namespace.clone()),
            labels: labels.clone(),
            ..Default::default()
        },
        spec: Some(BatchJobSpec {
            backoff_limit: Some(0),
            ttl_seconds_after_finished: spec.ttl_seconds_after_finished,
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels,
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    containers: vec![container],
                    service_account_name: spec.service_account.clone(),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

fn resource_requirements(resources: &Resources) -> ResourceRequirements {
    fn list(l: &ResourceList) -> Option<BTreeMap<String, Quantity>> {
        let mut m = BTreeMap::new();
        if let Some(cpu) = &l.cpu {
            m.insert("cpu".to_string(), Quantity(cpu.clone()));
        }
        if let Some(memory) = &l.memory {
            m.insert("memory".to_string(), Quantity(memory.clone()));
        }
        (!m.is_empty()).then_some(m)
    }
    ResourceRequirements {
        limits: list(&resources.limits),
        requests: list(&resources.requests),
        ..Default::default()
    }
}

/// Terminal state of a job, or `None` while it is still running.
pub fn completion_of(job: &Job) -> Option<JobCompletion> {
    let status = job.status.as_ref()?;
    if status.succeeded.unwrap_or(0) > 0 {
        return Some(JobCompletion::Succeeded);
    }

    let conditions = status.conditions.as_deref().unwrap_or_default();
    if let Some(failed) = conditions
        .iter()
        .find(|c| c.type_ == "Failed" && c.status == "True")
    {
        let reason = failed
            .message
            .clone()
            .or_else(|| failed.reason.clone())
            .unwrap_or_else(|| "job failed".to_string());
        return Some(JobCompletion::Failed { reason });
    }
    if conditions
        .iter()
        .any(|c| c.type_ == "Complete" && c.status == "True")
    {
        return Some(JobCompletion::Succeeded);
    }

    match status.failed.unwrap_or(0) {
        0 => None,
        n => Some(JobCompletion::Failed {
            reason: format!("{n} pod(s) failed"),
        }),
    }
}
