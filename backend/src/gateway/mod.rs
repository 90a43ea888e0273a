//! Gateway client
//!
//! Persistent, multiplexed request/response connection to the agent gateway:
//! wire protocol, connection lifecycle, pending-call table, and the typed
//! `health` / `status` / `cron.list` surface used by the dashboard.

pub mod api;
pub mod client;
pub mod error;
pub mod pending;
pub mod protocol;
pub mod registry;
pub mod settings;
pub mod state;
pub mod transport;

pub use api::{test_connection, CronJob, CronList, HealthSnapshot, StatusSnapshot};
pub use client::{GatewayClient, CALL_TIMEOUT, HANDSHAKE_TIMEOUT};
pub use error::GatewayError;
pub use registry::GatewayRegistry;
pub use settings::GatewaySettings;
pub use state::ConnectionState;
pub use transport::{ChannelConnector, ChannelPeer, Connector, WsConnector};
