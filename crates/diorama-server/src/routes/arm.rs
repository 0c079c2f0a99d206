use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ArmPositionBody {
    pub p1: i64,
    pub p2: i64,
    pub p3: i64,
}

/// POST /api/arm/move: move the arm directly and enter manual override.
pub async fn move_arm(
    State(app): State<AppState>,
    Json(body): Json<ArmPositionBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let scene = app
        .orchestrator
        .execute_manual_arm_move(body.p1, body.p2, body.p3)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "scene": scene })),
    ))
}
