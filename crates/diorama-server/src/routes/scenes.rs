use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::state::AppState;

/// GET /api/scenes: primary scenes and aliases from the loaded table.
pub async fn list_scenes(State(app): State<AppState>) -> Json<serde_json::Value> {
    let table = app.orchestrator.executor().table();
    let aliases: Vec<serde_json::Value> = table
        .aliases()
        .into_iter()
        .map(|(alias, target)| serde_json::json!({ "alias": alias, "target": target }))
        .collect();
    Json(serde_json::json!({
        "scenes": table.primary_scenes(),
        "aliases": aliases,
    }))
}

/// POST /api/scenes/{name}/trigger: jump straight to a scene.
///
/// Unknown names are accepted: the state follows and the executor logs
/// that there is nothing to run. `known` tells the caller which case it hit.
pub async fn trigger_scene(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let known = app.orchestrator.executor().table().contains(&name);
    let scene = app.orchestrator.execute_scene_by_name(&name).await;
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "scene": scene, "known": known })),
    )
}
