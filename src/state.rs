use std::sync::Arc;

use crate::config::settings::GatewaySettings;
use crate::infrastructure::storage::BlobStore;
use crate::modules::media::service::Producer;

#[derive(Clone)]
pub struct AppState {
    pub settings: GatewaySettings,
    pub producer: Producer,
    pub results: Arc<dyn BlobStore>,
}

impl AppState {
    pub fn new(settings: GatewaySettings, producer: Producer, results: Arc<dyn BlobStore>) -> Self {
        Self {
            settings,
            producer,
            results,
        }
    }
}
