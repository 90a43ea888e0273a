// State management module
// Handles shared application state and settings persistence

/// Shared handles used by the HTTP handlers
pub mod app_state;
/// Gateway settings file
pub mod persistence;

pub use app_state::{AppState, SharedState};
pub use persistence::{PersistenceError, SettingsStore};
