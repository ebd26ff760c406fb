/// Deck picker operations.
pub mod deck_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Per-session gameplay loop driving countdowns, gestures and the deck.
pub mod gameplay;
/// Sensor host backed by a connected headset.
pub mod headset;
/// Health check service.
pub mod health_service;
/// Session lifecycle commands issued over REST.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
