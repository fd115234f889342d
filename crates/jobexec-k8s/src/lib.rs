//! `jobexec-k8s` runs task jobs as Kubernetes `batch/v1` Jobs.
//!
//! ```text
//! JobSpec ──► job_manifest ──► Api<Job>::create
//!                                  │
//!                 poll Api<Job>::get until completion_of(job) or timeout
//!                                  │
//!             Api<Pod>::list(job-name=<job>) ──► logs, oldest pod first
//! ```

pub mod driver;
pub mod manifest;

pub use driver::{KubeDriver, KubeSettings};
pub use manifest::{completion_of, job_manifest};

pub type Result<T> = std::result::Result<T, jobexec_core::DriverError>;
