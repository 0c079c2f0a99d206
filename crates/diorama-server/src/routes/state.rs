use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// GET /api/state: current scene and the number of background tasks still
/// moving hardware.
pub async fn get_state(State(app): State<AppState>) -> Json<serde_json::Value> {
    let orch = &app.orchestrator;
    Json(serde_json::json!({
        "scene": orch.current_scene(),
        "in_flight": orch.in_flight(),
    }))
}
