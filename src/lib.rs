//! Library crate for heads-up-back, exposing modules for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Wire types exchanged over REST, SSE and WebSocket.
pub mod dto;
/// Session building blocks: shuffling, gesture classification and countdowns.
pub mod engine;
/// Service and HTTP error types.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Application services behind the routes.
pub mod services;
/// Shared application state.
pub mod state;
