use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::engine::Controller;
use crate::models::StatusEntry;
use crate::store::LogStore;

#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<Controller>,
    pub store: Arc<LogStore>,
}

async fn get_status(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "status": state.controller.current_status().label(),
        "host": state.controller.host(),
    }))
}

async fn get_logs(State(state): State<ApiState>) -> Json<Vec<StatusEntry>> {
    Json(state.store.read_all())
}

async fn clear_logs(State(state): State<ApiState>) -> StatusCode {
    state.store.clear();
    StatusCode::NO_CONTENT
}

async fn start_session(State(state): State<ApiState>) -> (StatusCode, Json<Value>) {
    match state.controller.start().await {
        Ok(started) => (StatusCode::OK, Json(json!({ "started": started }))),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

async fn stop_session(State(state): State<ApiState>) -> StatusCode {
    state.controller.stop().await;
    StatusCode::NO_CONTENT
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/logs", get(get_logs).delete(clear_logs))
        .route("/api/start", post(start_session))
        .route("/api/stop", post(stop_session))
        .with_state(state)
}

pub async fn start_server(port: u16, state: ApiState) {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Status API: http://localhost:{}", addr.port());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind API port");
    axum::serve(listener, app).await.unwrap();
}
