// Application state
// Shared handles to the gateway registry, dashboard poller, CLI runner and stores

use crate::config::Config;
use crate::dashboard::DashboardPoller;
use crate::executor::CliRunner;
use crate::gateway::{Connector, GatewayRegistry, GatewaySettings, WsConnector};
use crate::services::WorkspaceService;
use crate::state::persistence::{PersistenceError, SettingsStore};
use std::sync::Arc;
use tracing::warn;

/// State shared by every handler
pub type SharedState = Arc<AppState>;

/// Application state
///
/// Every member synchronizes internally, so handlers share it without a lock.
#[derive(Debug)]
pub struct AppState {
    /// Shared gateway client and its settings
    pub gateway: Arc<GatewayRegistry>,
    /// Latest dashboard snapshot and refresh logic
    pub poller: Arc<DashboardPoller>,
    /// Gateway CLI
    pub cli: CliRunner,
    /// Saved gateway settings
    pub settings_store: SettingsStore,
    /// Agent runtime files
    pub workspace: WorkspaceService,
    /// HTTP client for plain reachability probes
    pub http: reqwest::Client,
}

impl AppState {
    /// Build the state from configuration, talking WebSocket to the gateway
    ///
    /// An unreadable settings file is logged and replaced by the defaults.
    pub fn from_config(config: &Config) -> Self {
        let store = SettingsStore::new(config.settings_path());
        let settings = match store.load_or(config.default_gateway_settings()) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    path = %store.path().display(),
                    error = %e,
                    "Ignoring unreadable gateway settings"
                );
                config.default_gateway_settings()
            }
        };
        Self::new(config, settings, store, Arc::new(WsConnector))
    }

    /// Build the state with explicit settings and connector
    pub fn new(
        config: &Config,
        settings: GatewaySettings,
        settings_store: SettingsStore,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let gateway = Arc::new(GatewayRegistry::new(settings, connector));
        let poller = Arc::new(DashboardPoller::new(
            Arc::clone(&gateway),
            config.idle_threshold(),
        ));

        Self {
            gateway,
            poller,
            cli: CliRunner::new(&config.cli.program, config.cli.timeout_secs),
            settings_store,
            workspace: WorkspaceService::new(&config.workspace_dir),
            http: reqwest::Client::new(),
        }
    }

    /// Persist `settings` and publish them to the registry
    ///
    /// Returns whether the settings changed.
    pub fn update_gateway_settings(
        &self,
        settings: GatewaySettings,
    ) -> Result<bool, PersistenceError> {
        self.settings_store.save(&settings)?;
        Ok(self.gateway.set_settings(settings))
    }
}
