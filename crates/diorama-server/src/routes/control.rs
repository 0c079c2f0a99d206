use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::arm::ArmPositionBody;
use crate::error::AppError;
use crate::state::AppState;

/// Messages accepted on the operator control channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    TriggerScene { scene_name: String },
    MoveRoboticArm { params: ArmPositionBody },
}

/// POST /api/control: dispatch one control message.
pub async fn post_control(
    State(app): State<AppState>,
    Json(message): Json<ControlMessage>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let orch = &app.orchestrator;
    let scene = match message {
        ControlMessage::TriggerScene { scene_name } => {
            let name = scene_name.trim();
            if name.is_empty() {
                return Err(AppError::bad_request("scene_name must not be empty"));
            }
            orch.execute_scene_by_name(name).await
        }
        ControlMessage::MoveRoboticArm { params } => {
            orch.execute_manual_arm_move(params.p1, params.p2, params.p3)
                .await?
        }
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "scene": scene })),
    ))
}
