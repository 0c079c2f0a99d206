pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use diorama_core::Orchestrator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(orchestrator: Arc<Orchestrator>) -> Router {
    let app_state = state::AppState::new(orchestrator);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // State
        .route("/api/state", get(routes::state::get_state))
        // Turns
        .route("/api/turn", post(routes::turn::post_turn))
        // Stories
        .route("/api/story", post(routes::story::post_story))
        .route("/api/story/advance", post(routes::story::advance_story))
        // Scenes
        .route("/api/scenes", get(routes::scenes::list_scenes))
        .route(
            "/api/scenes/{name}/trigger",
            post(routes::scenes::trigger_scene),
        )
        // Manual overrides
        .route("/api/arm/move", post(routes::arm::move_arm))
        .route("/api/control", post(routes::control::post_control))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the control server on `port`.
pub async fn serve(orchestrator: Arc<Orchestrator>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(orchestrator, listener).await
}

/// Start the control server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(
    orchestrator: Arc<Orchestrator>,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(orchestrator);

    tracing::info!("diorama control server listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
