use crate::config::{EnvVar, ValueFrom};
use crate::driver::JobEnv;
use crate::error::{JobExecError, Result};
use crate::event::EventData;
use crate::path;

/// Environment variable carrying the full inbound event payload as JSON.
pub const EVENT_ENV: &str = "JOB_EXECUTOR_EVENT";

/// Resolve a task's configured environment against the event properties.
///
/// `valueFrom: event` entries are property paths; one that does not resolve
/// fails the whole task rather than starting a job with a blank variable.
pub fn prepare_env(vars: &[EnvVar], properties: &serde_json::Value) -> Result<Vec<JobEnv>> {
    vars.iter()
        .map(|var| match var.value_from {
            ValueFrom::String => Ok(JobEnv::Value {
                name: var.name.clone(),
                value: var.value.clone(),
            }),
            ValueFrom::Event => path::lookup_string(properties, &var.value)
                .map(|value| JobEnv::Value {
                    name: var.name.clone(),
                    value,
                })
                .ok_or_else(|| JobExecError::PropertyNotFound(var.value.clone())),
            ValueFrom::Secret => Ok(JobEnv::Secret {
                name: var.name.clone(),
            }),
        })
        .collect()
}

/// Variables every job receives regardless of its configuration.
pub fn standard_env(data: &EventData, payload: &serde_json::Value) -> Vec<JobEnv> {
    vec![
        JobEnv::Value {
            name: "KEPTN_PROJECT".into(),
            value: data.project.clone(),
        },
        JobEnv::Value {
            name: "KEPTN_STAGE".into(),
            value: data.stage.clone(),
        },
        JobEnv::Value {
            name: "KEPTN_SERVICE".into(),
            value: data.service.clone(),
        },
        JobEnv::Value {
            name: EVENT_ENV.into(),
            value: payload.to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn var(name: &str, value: &str, from: ValueFrom) -> EnvVar {
        EnvVar {
            name: name.into(),
            value: value.into(),
            value_from: from,
        }
    }

    #[test]
    fn resolves_each_value_source() {
        let props = json!({ "data": { "deployment": { "uris": ["http://carts"] } } });
        let env = prepare_env(
            &[
                var("MODE", "smoke", ValueFrom::String),
                var("HOST", "$.data.deployment.uris[0]", ValueFrom::Event),
                var("locust-secret", "", ValueFrom::Secret),
            ],
            &props,
        )
        .unwrap();

        assert_eq!(
            env,
            vec![
                JobEnv::Value {
                    name: "MODE".into(),
                    value: "smoke".into()
                },
                JobEnv::Value {
                    name: "HOST".into(),
                    value: "http://carts".into()
                },
                JobEnv::Secret {
                    name: "locust-secret".into()
                },
            ]
        );
    }

    #[test]
    fn unresolvable_event_path_is_an_error() {
        let err = prepare_env(
            &[var("HOST", "$.data.nope", ValueFrom::Event)],
            &json!({ "data": {} }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("$.data.nope"), "{err}");
    }

    #[test]
    fn standard_env_includes_event_coordinates() {
        let data = EventData {
            project: "sockshop".into(),
            stage: "dev".into(),
            service: "carts".into(),
            ..Default::default()
        };
        let payload = json!({ "project": "sockshop" });
        let env = standard_env(&data, &payload);
        assert_eq!(env.len(), 4);
        assert!(env.contains(&JobEnv::Value {
            name: "KEPTN_STAGE".into(),
            value: "dev".into()
        }));
        assert!(env.contains(&JobEnv::Value {
            name: EVENT_ENV.into(),
            value: r#"{"project":"sockshop"}"#.into()
        }));
    }
}
