//! Agent Dashboard Backend Library
//!
//! Gateway client, dashboard poller and the HTTP/WebSocket surface built on
//! them. The server binary lives in `src/main.rs`.

pub mod api;
pub mod config;
/// Dashboard snapshot derivation and polling
pub mod dashboard;
pub mod error;
pub mod executor;
/// Gateway connection, protocol and typed call surface
pub mod gateway;
pub mod services;
/// Application state management
///
/// Handles the shared handles used by HTTP handlers and settings persistence.
pub mod state;
pub mod websocket;
