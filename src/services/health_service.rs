use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness along with the session and headset counters.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let session_running = state.runtime().lock().await.is_some();
    HealthResponse::ok(session_running, state.sensor_hosts().len())
}
