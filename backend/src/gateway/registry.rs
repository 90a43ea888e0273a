//! Shared gateway client registry
//!
//! Owns the one client the rest of the backend talks through, plus the
//! endpoint settings it is built from. Settings changes are published on a
//! `watch` channel; the client itself is only replaced through
//! [`GatewayRegistry::reset`] or [`GatewayRegistry::invalidate_and_reconnect`].

use super::client::GatewayClient;
use super::error::GatewayError;
use super::settings::GatewaySettings;
use super::transport::{Connector, WsConnector};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info};

/// Lazily-built shared client plus its settings
pub struct GatewayRegistry {
    connector: Arc<dyn Connector>,
    settings: watch::Sender<GatewaySettings>,
    client: Mutex<Option<GatewayClient>>,
}

impl std::fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRegistry")
            .field("settings", &*self.settings.borrow())
            .field("has_client", &self.lock().is_some())
            .finish()
    }
}

impl GatewayRegistry {
    /// Create a registry that opens sockets through `connector`
    pub fn new(settings: GatewaySettings, connector: Arc<dyn Connector>) -> Self {
        let (settings, _) = watch::channel(settings);
        Self {
            connector,
            settings,
            client: Mutex::new(None),
        }
    }

    /// Create a registry backed by real WebSocket connections
    pub fn websocket(settings: GatewaySettings) -> Self {
        Self::new(settings, Arc::new(WsConnector))
    }

    fn lock(&self) -> MutexGuard<'_, Option<GatewayClient>> {
        self.client.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The shared client, built from the current settings on first use
    pub fn get(&self) -> GatewayClient {
        let mut slot = self.lock();
        if let Some(client) = slot.as_ref() {
            return client.clone();
        }
        let client = GatewayClient::new(self.settings(), Arc::clone(&self.connector));
        debug!(url = %client.settings().url, "Created shared gateway client");
        *slot = Some(client.clone());
        client
    }

    /// Whether a shared client currently exists
    pub fn has_client(&self) -> bool {
        self.lock().is_some()
    }

    /// Disconnect and discard the shared client; the next `get` builds a new one
    pub fn reset(&self) {
        if let Some(client) = self.lock().take() {
            client.disconnect();
            debug!("Discarded shared gateway client");
        }
    }

    /// Current settings
    pub fn settings(&self) -> GatewaySettings {
        self.settings.borrow().clone()
    }

    /// Watch for settings changes
    pub fn subscribe(&self) -> watch::Receiver<GatewaySettings> {
        self.settings.subscribe()
    }

    /// Replace the endpoint URL
    pub fn set_url(&self, url: impl Into<String>) -> bool {
        let url = url.into();
        self.settings.send_if_modified(|current| {
            if current.url == url {
                return false;
            }
            current.url = url;
            true
        })
    }

    /// Replace the credential; an empty token clears it
    pub fn set_token(&self, token: impl Into<String>) -> bool {
        let token = token.into();
        self.settings.send_if_modified(|current| {
            if current.token == token {
                return false;
            }
            current.token = token;
            true
        })
    }

    /// Replace both endpoint and credential
    ///
    /// Returns whether anything changed. Subscribers are notified only on a
    /// change; the existing client keeps its connection until reset.
    pub fn set_settings(&self, settings: GatewaySettings) -> bool {
        let changed = self.settings.send_if_modified(|current| {
            if *current == settings {
                return false;
            }
            *current = settings;
            true
        });
        if changed {
            info!(url = %self.settings.borrow().url, "Gateway settings updated");
        }
        changed
    }

    /// Drop the shared client and connect a fresh one with the current settings
    pub async fn invalidate_and_reconnect(&self) -> Result<(), GatewayError> {
        self.reset();
        self.get().connect().await
    }

    /// Connector used for new clients
    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::transport::ChannelConnector;

    fn registry() -> GatewayRegistry {
        let (connector, _peers) = ChannelConnector::new();
        GatewayRegistry::new(
            GatewaySettings::new("ws://gateway.test", Some("tok")),
            Arc::new(connector),
        )
    }

    #[test]
    fn test_get_returns_same_client_until_reset() {
        let registry = registry();
        assert!(!registry.has_client());

        let first = registry.get();
        first.disconnect();
        assert!(registry.has_client());
        assert_eq!(registry.get().settings(), first.settings());

        registry.reset();
        assert!(!registry.has_client());
        registry.set_url("ws://other.test");
        assert_eq!(registry.get().settings().url, "ws://other.test");
    }

    #[test]
    fn test_setters_notify_only_on_change() {
        let registry = registry();
        let mut rx = registry.subscribe();

        assert!(!registry.set_url("ws://gateway.test"));
        assert!(!rx.has_changed().unwrap());

        assert!(registry.set_token("new-token"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().token, "new-token");

        assert!(registry.set_settings(GatewaySettings::new("wss://x.test", None)));
        assert_eq!(rx.borrow_and_update().url, "wss://x.test");
        assert!(!registry.set_settings(GatewaySettings::new("wss://x.test", None)));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_settings_change_keeps_existing_client() {
        let registry = registry();
        let client = registry.get();
        registry.set_url("ws://elsewhere.test");
        assert_eq!(client.settings().url, "ws://gateway.test");
        assert!(registry.has_client());
    }
}
