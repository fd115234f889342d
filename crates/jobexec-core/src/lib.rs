//! `jobexec-core` runs the containerized tasks of an action for one
//! inbound lifecycle event and reports the outcome back to the event bus.
//!
//! # Architecture
//!
//! ```text
//! InboundEvent ──► EventHandler ──► JobConfig::find_action_for
//!                                        │
//!                                        ▼
//!                               ActionOrchestrator
//!                      ┌────────────┼──────────────┐
//!                      ▼            ▼              ▼
//!                 ImageFilter  ClusterClient  LifecycleEmitter ──► EventSender
//! ```
//!
//! The cluster and the event transport are traits; `jobexec-k8s` provides
//! the Kubernetes driver and [`sender`] the HTTP/stdout transports.

pub mod config;
pub mod driver;
pub mod env;
pub mod error;
pub mod event;
pub mod filter;
pub mod handler;
pub mod lifecycle;
pub mod orchestrator;
pub mod outcome;
pub mod path;
pub mod resolve;
pub mod sender;
pub mod settings;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{Action, ConfigSource, FileConfigSource, JobConfig, StaticConfigSource, Task};
pub use driver::{ClusterClient, DriverError, JobCompletion, JobEnv, JobIdentity, JobSpec};
pub use error::{JobExecError, Result};
pub use event::{CloudEventMapper, EventData, EventMapper, InboundEvent};
pub use filter::{AllowAll, DenyAll, ImageFilter, PatternFilter};
pub use handler::{EventHandler, HandleOutcome};
pub use lifecycle::{EventContext, EventSender, LifecycleEmitter, OutboundEvent, SendError};
pub use orchestrator::ActionOrchestrator;
pub use outcome::{ActionReport, EventResult, EventStatus, TaskOutcome, TaskReport};
pub use settings::JobSettings;
