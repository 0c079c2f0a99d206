use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use diorama_core::hardware::{Actuator, ArmMoveRequest};
use diorama_core::{Ack, Orchestrator, OrchestratorConfig, SceneExecutor, SceneTable};
use gemini_agent::{DecisionRequest, DecisionService, GeminiAgentError};
use http_body_util::BodyExt;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Replies with queued responses in order; errors once the queue is empty.
#[derive(Default)]
struct QueuedService {
    replies: Mutex<VecDeque<String>>,
}

#[async_trait]
impl DecisionService for QueuedService {
    async fn decide(&self, _request: &DecisionRequest) -> gemini_agent::Result<String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(GeminiAgentError::EmptyResponse)
    }
}

/// Records the rendered command of every call that passes validation.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
}

impl Recorder {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn ack(&self, command: String) -> Ack {
        self.calls.lock().unwrap().push(command.clone());
        Ack::Mocked {
            target: "recorder".into(),
            command,
        }
    }
}

#[async_trait]
impl Actuator for Recorder {
    async fn trigger_scene(&self, id: i64) -> Ack {
        match diorama_core::hardware::SceneCommand::new(id) {
            Ok(cmd) => self.ack(cmd.to_string()),
            Err(e) => Ack::rejected(e),
        }
    }

    async fn move_arm(&self, request: ArmMoveRequest) -> Ack {
        match request.validate() {
            Ok(mv) => self.ack(mv.to_string()),
            Err(e) => Ack::rejected(e),
        }
    }

    async fn play_media(&self, identifier: &str) -> Ack {
        self.ack(format!("media {identifier}"))
    }

    async fn connect_all(&self) {}

    async fn close_all(&self) {}
}

fn setup(replies: &[&str]) -> (axum::Router, Arc<Orchestrator>, Arc<Recorder>) {
    let service = Arc::new(QueuedService {
        replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
    });
    let recorder = Arc::new(Recorder::default());
    let executor = SceneExecutor::new(
        recorder.clone(),
        Arc::new(SceneTable::builtin().unwrap()),
    );
    let orch = Arc::new(Orchestrator::new(
        service,
        executor,
        OrchestratorConfig::default(),
    ));
    (diorama_server::build_router(orch.clone()), orch, recorder)
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a POST request with a JSON body via `oneshot` and return (status, parsed JSON body).
async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// ---------------------------------------------------------------------------
// State and scenes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initial_state() {
    let (app, _orch, _rec) = setup(&[]);
    let (status, body) = get(app, "/api/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scene"], "AWAITING_MODE_SELECTION");
    assert_eq!(body["in_flight"], 0);
}

#[tokio::test]
async fn list_scenes_splits_aliases() {
    let (app, _orch, _rec) = setup(&[]);
    let (status, body) = get(app, "/api/scenes").await;
    assert_eq!(status, StatusCode::OK);
    let scenes: Vec<&str> = body["scenes"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(scenes.contains(&"AUMS_HOME"));
    assert!(!scenes.contains(&"GUIDED_MODE_AUMS_HOME"));
    let aliases = body["aliases"].as_array().unwrap();
    assert!(aliases
        .iter()
        .any(|a| a["alias"] == "GUIDED_MODE_MARKET" && a["target"] == "MARKET"));
}

#[tokio::test]
async fn trigger_scene_runs_actions() {
    let (app, orch, rec) = setup(&[]);
    let (status, body) = post_json(app, "/api/scenes/AUM_CRYING/trigger", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["scene"], "AUM_CRYING");
    assert_eq!(body["known"], true);

    orch.drain(Duration::from_secs(5)).await;
    assert_eq!(rec.calls(), vec!["4".to_string(), "3 50 50 50 5 5 5 2457 79 3447".to_string()]);
}

#[tokio::test]
async fn trigger_unknown_scene_still_sets_state() {
    let (app, orch, rec) = setup(&[]);
    let (status, body) = post_json(app, "/api/scenes/NOWHERE/trigger", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["known"], false);
    orch.drain(Duration::from_secs(5)).await;
    assert!(rec.calls().is_empty());
    assert_eq!(orch.current_scene().to_string(), "NOWHERE");
}

// ---------------------------------------------------------------------------
// Turns
// ---------------------------------------------------------------------------

#[tokio::test]
async fn turn_returns_narrative_and_moves_state() {
    let (app, orch, rec) = setup(&[
        "```json\n{\"narrative\":\"Welcome to the market.\",\"next_scene\":\"MARKET\"}\n```",
    ]);
    let (status, body) = post_json(app, "/api/turn", serde_json::json!({"text": "market please"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["narrative"], "Welcome to the market.");
    assert_eq!(body["scene"], "MARKET");
    assert_eq!(body["status"], "advanced");

    orch.drain(Duration::from_secs(5)).await;
    assert_eq!(
        rec.calls(),
        vec![
            "3".to_string(),
            "3 50 50 50 5 5 5 2457 68 3436".to_string(),
            "media part2_glimmer_of_hope.mp4".to_string(),
        ]
    );
}

#[tokio::test]
async fn turn_service_fault_is_an_apology() {
    let (app, orch, _rec) = setup(&[]);
    let (status, body) = post_json(app, "/api/turn", serde_json::json!({"text": "hello"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "service_error");
    assert_eq!(
        body["narrative"],
        "I seem to have gotten my wires crossed. Could you try that again?"
    );
    assert_eq!(orch.current_scene().to_string(), "AWAITING_MODE_SELECTION");
}

#[tokio::test]
async fn empty_turn_is_rejected() {
    let (app, _orch, _rec) = setup(&[]);
    let (status, body) = post_json(app, "/api/turn", serde_json::json!({"text": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

// ---------------------------------------------------------------------------
// Stories
// ---------------------------------------------------------------------------

#[tokio::test]
async fn story_is_told_step_by_step() {
    let (app, orch, rec) = setup(&[
        r#"{"story_plan":[{"narrative":"It began at the market.","location":"MARKET"},{"narrative":"And then it rained."}]}"#,
    ]);
    let (status, body) =
        post_json(app.clone(), "/api/story", serde_json::json!({"text": "a rainy day"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["narrative"], "It began at the market.");
    assert_eq!(body["scene"], "MARKET");
    assert_eq!(body["status"], "told");
    assert_eq!(body["is_finished"], false);
    orch.drain(Duration::from_secs(5)).await;
    assert_eq!(rec.calls().len(), 3);

    let (_, body) = post_json(app.clone(), "/api/story/advance", serde_json::json!({})).await;
    assert_eq!(body["narrative"], "And then it rained.");
    assert_eq!(body["is_finished"], true);

    let (_, body) = post_json(app, "/api/story/advance", serde_json::json!({})).await;
    assert_eq!(body["status"], "ended");
    assert_eq!(body["narrative"], "And that's the end of the story! I hope you enjoyed it.");
}

#[tokio::test]
async fn story_without_plan_is_a_fallback() {
    let (app, orch, _rec) = setup(&[r#"{"narrative":"hi","next_scene":"MARKET"}"#]);
    let (status, body) =
        post_json(app, "/api/story", serde_json::json!({"text": "tell me"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unparseable");
    assert_eq!(
        body["narrative"],
        "I'm sorry, I couldn't think of a story right now. Please ask me again!"
    );
    assert_eq!(body["is_finished"], true);
    assert_eq!(orch.current_scene().to_string(), "AWAITING_MODE_SELECTION");
}

#[tokio::test]
async fn advance_without_story() {
    let (app, _orch, _rec) = setup(&[]);
    let (status, body) = post_json(app, "/api/story/advance", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_story");
    assert_eq!(body["is_finished"], true);
}

// ---------------------------------------------------------------------------
// Manual overrides
// ---------------------------------------------------------------------------

#[tokio::test]
async fn arm_move_enters_manual_override() {
    let (app, orch, rec) = setup(&[]);
    let (status, body) = post_json(
        app,
        "/api/arm/move",
        serde_json::json!({"p1": 100, "p2": 200, "p3": 300}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["scene"], "MANUAL_OVERRIDE");
    orch.drain(Duration::from_secs(5)).await;
    assert_eq!(rec.calls(), vec!["3 50 50 50 5 5 5 100 200 300".to_string()]);
}

#[tokio::test]
async fn invalid_arm_move_is_400_and_state_unchanged() {
    let (app, orch, rec) = setup(&[]);
    let (status, body) = post_json(
        app,
        "/api/arm/move",
        serde_json::json!({"p1": 100, "p2": 200, "p3": 9000}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("p3"));
    assert_eq!(orch.current_scene().to_string(), "AWAITING_MODE_SELECTION");
    assert_eq!(orch.in_flight(), 0);
    assert!(rec.calls().is_empty());
}

#[tokio::test]
async fn control_channel_dispatches_messages() {
    let (app, orch, rec) = setup(&[]);
    let (status, body) = post_json(
        app.clone(),
        "/api/control",
        serde_json::json!({"type": "trigger_scene", "scene_name": "GUIDED_MODE_AUM_GROWS_UP"}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["scene"], "GUIDED_MODE_AUM_GROWS_UP");
    orch.drain(Duration::from_secs(5)).await;
    assert_eq!(rec.calls()[0], "7");

    let (status, body) = post_json(
        app.clone(),
        "/api/control",
        serde_json::json!({"type": "move_robotic_arm", "params": {"p1": 1, "p2": 2, "p3": 3}}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["scene"], "MANUAL_OVERRIDE");

    let (status, _) = post_json(
        app,
        "/api/control",
        serde_json::json!({"type": "move_robotic_arm", "params": {"p1": -1, "p2": 2, "p3": 3}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn control_channel_rejects_unknown_type() {
    let (app, _orch, _rec) = setup(&[]);
    let (status, _) = post_json(app, "/api/control", serde_json::json!({"type": "dance"})).await;
    assert!(status.is_client_error());
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn events_endpoint_is_sse() {
    let (app, _orch, _rec) = setup(&[]);
    let req = axum::http::Request::builder()
        .uri("/api/events")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ct = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(ct.starts_with("text/event-stream"), "got {ct}");
}
