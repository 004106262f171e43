//! Application state shared across handlers

use crate::insight::DatasetAdvisor;

use super::ServerConfig;

/// Request-stateless shared context. Holds only the configuration and the
/// insight advisor; uploaded data never outlives its request.
pub struct AppState {
    pub config: ServerConfig,
    pub advisor: DatasetAdvisor,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let advisor = DatasetAdvisor::new(config.gemini_api_key.clone());
        Self { config, advisor }
    }
}
