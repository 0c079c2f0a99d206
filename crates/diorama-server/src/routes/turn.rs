use axum::extract::State;
use axum::Json;
use diorama_core::TurnOutcome;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TurnBody {
    pub text: String,
}

/// POST /api/turn: run one user turn. Decision-service faults still return
/// 200 with an apology narrative; see `status` in the body.
pub async fn post_turn(
    State(app): State<AppState>,
    Json(body): Json<TurnBody>,
) -> Result<Json<TurnOutcome>, AppError> {
    let text = body.text.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("text must not be empty"));
    }
    Ok(Json(app.orchestrator.process_turn(text).await))
}
