//! Application state for the decaf service.

use std::sync::Arc;

use common::config::AppConfig;

use crate::backend::Backends;
use crate::bond::BondClient;
use crate::pool::PoolSettings;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backends: Backends,
    pub bond: BondClient,
}

impl AppState {
    /// Creates the production state: managed connectors and a Bond client
    /// sharing `http_client`.
    pub fn new(config: AppConfig, http_client: reqwest::Client) -> Self {
        let backends = Backends::managed(
            config.connector.clone(),
            PoolSettings::new(config.connect_timeout_secs),
        );
        let bond = BondClient::with_client(config.bond_url.clone(), http_client);
        Self::with_backends(config, backends, bond)
    }

    /// Creates state from explicit parts.
    pub fn with_backends(config: AppConfig, backends: Backends, bond: BondClient) -> Self {
        Self {
            config: Arc::new(config),
            backends,
            bond,
        }
    }
}
