use thiserror::Error;

use crate::driver::DriverError;

#[derive(Debug, Error)]
pub enum JobExecError {
    #[error("invalid job config: {0}")]
    InvalidConfig(String),

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("invalid image pattern '{pattern}': {reason}")]
    InvalidImagePattern { pattern: String, reason: String },

    #[error("property '{0}' not found in event")]
    PropertyNotFound(String),

    #[error("error while connecting to cluster: {0}")]
    Connection(DriverError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, JobExecError>;
