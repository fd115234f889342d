use std::sync::Arc;

use jobexec_core::config::ConfigSource;
use jobexec_core::driver::ClusterClient;
use jobexec_core::event::{CloudEventMapper, EventMapper};
use jobexec_core::filter::ImageFilter;
use jobexec_core::lifecycle::EventSender;
use jobexec_core::settings::JobSettings;
use jobexec_k8s::{KubeDriver, KubeSettings};

/// Hands out one cluster driver per inbound event.
pub trait DriverFactory: Send + Sync {
    fn driver(&self) -> Arc<dyn ClusterClient>;
}

impl DriverFactory for KubeSettings {
    fn driver(&self) -> Arc<dyn ClusterClient> {
        Arc::new(KubeDriver::new(self.clone()))
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<JobSettings>,
    pub configs: Arc<dyn ConfigSource>,
    pub mapper: Arc<dyn EventMapper>,
    pub filter: Arc<dyn ImageFilter>,
    pub sender: Arc<dyn EventSender>,
    pub drivers: Arc<dyn DriverFactory>,
}

impl AppState {
    pub fn new(
        settings: JobSettings,
        configs: Arc<dyn ConfigSource>,
        filter: Arc<dyn ImageFilter>,
        sender: Arc<dyn EventSender>,
        drivers: Arc<dyn DriverFactory>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            configs,
            mapper: Arc::new(CloudEventMapper),
            filter,
            sender,
            drivers,
        }
    }
}
