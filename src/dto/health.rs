use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status, always "ok" while the process serves requests.
    pub status: String,
    /// Whether a session is currently running.
    pub session_running: bool,
    /// Number of headsets connected over WebSocket.
    pub connected_headsets: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(session_running: bool, connected_headsets: usize) -> Self {
        Self {
            status: "ok".to_string(),
            session_running,
            connected_headsets,
        }
    }
}
