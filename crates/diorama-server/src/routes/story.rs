use axum::extract::State;
use axum::Json;
use diorama_core::StoryOutcome;

use super::turn::TurnBody;
use crate::error::AppError;
use crate::state::AppState;

/// POST /api/story: ask for a new story plan and tell its first step.
pub async fn post_story(
    State(app): State<AppState>,
    Json(body): Json<TurnBody>,
) -> Result<Json<StoryOutcome>, AppError> {
    let text = body.text.trim();
    if text.is_empty() {
        return Err(AppError::bad_request("text must not be empty"));
    }
    Ok(Json(app.orchestrator.request_story(text).await))
}

/// POST /api/story/advance
pub async fn advance_story(State(app): State<AppState>) -> Json<StoryOutcome> {
    Json(app.orchestrator.advance().await)
}
