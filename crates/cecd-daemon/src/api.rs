//! REST API handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use cecd_engine::Request;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::state::AppState;

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// Query form of a command (`/?cmd=POWER_ON`)
#[derive(Debug, Default, Deserialize)]
pub struct CommandQuery {
    #[serde(default)]
    cmd: Option<String>,
    #[serde(default)]
    cec_command: Option<String>,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    count: Option<usize>,
}

impl From<CommandQuery> for Request {
    fn from(query: CommandQuery) -> Self {
        Request {
            command: query.cmd.unwrap_or_default(),
            cec_command: query.cec_command,
            input: query.input,
            count: query.count,
        }
    }
}

/// Run a command given as query parameters
pub async fn query_command(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CommandQuery>,
) -> impl IntoResponse {
    debug!(query = ?query, "HTTP command query");
    Json(state.orchestrator.execute(query.into()).await)
}

/// Run a command given as a JSON envelope
///
/// The body is taken as text so a malformed envelope is answered (and
/// recorded) like any other rejected command.
pub async fn post_command(
    State(state): State<Arc<AppState>>,
    body: String,
) -> impl IntoResponse {
    Json(state.orchestrator.execute_json(&body).await)
}

/// Scan the bus and list external devices
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.orchestrator.scan_devices().await {
        Ok(devices) => Json(devices).into_response(),
        Err(detail) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(format!("Scan failed: {}", detail))),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    count: Option<usize>,
}

/// Command log summary
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    Json(state.orchestrator.history(query.count).await)
}

/// Drop the command history
pub async fn clear_history(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    state.orchestrator.clear_history().await;
    Json(serde_json::json!({"status": "cleared"}))
}

/// Export view of successful commands
pub async fn get_export(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.orchestrator.export().await)
}

/// Write the export view to disk
pub async fn save_export(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.save_export().await {
        Ok(path) => {
            info!(path = %path.display(), "Export saved via API");
            (
                StatusCode::OK,
                Json(serde_json::json!({"status": "saved", "path": path.display().to_string()})),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(format!("Failed to save export: {:#}", e))),
        )
            .into_response(),
    }
}

/// Get current configuration
pub async fn get_config(
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.config.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::router;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use axum::Router;
    use cecd_engine::SystemClock;
    use cecd_transmit::{FrameTransmitter, ProcessOutput, TransmitError};
    use std::time::Duration;
    use tower::ServiceExt;

    /// Bus where every command succeeds and nothing is attached
    struct QuietBus;

    #[async_trait]
    impl FrameTransmitter for QuietBus {
        async fn transmit(&self, _command: &str, _timeout: Duration) -> Result<ProcessOutput, TransmitError> {
            Ok(ProcessOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: Some(0),
            })
        }

        async fn set_protocol_version(&self, _version: &str) -> Result<(), TransmitError> {
            Ok(())
        }
    }

    fn app(config: Config) -> Router {
        let state = AppState::with_transmitter(config, Arc::new(QuietBus), Arc::new(SystemClock)).unwrap();
        router(state)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let request = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_query_form() {
        let app = app(Config::default());
        let (status, json) = call(&app, "GET", "/?cmd=ping", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["result"], "pong");

        let (_, json) = call(&app, "GET", "/?cmd=DANCE", "").await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["result"], "Unknown command: DANCE");
    }

    #[tokio::test]
    async fn test_post_command_and_history() {
        let app = app(Config::default());
        let (_, json) = call(&app, "POST", "/api/command", r#"{"command":"CUSTOM","cec_command":"tx 10:04"}"#).await;
        assert_eq!(json["status"], "success");

        let (_, json) = call(&app, "POST", "/api/command", "not json").await;
        assert_eq!(json["status"], "error");

        let (_, json) = call(&app, "GET", "/api/history?count=1", "").await;
        assert_eq!(json["total_commands"], 2);
        assert_eq!(json["successful_commands"], 1);
        assert_eq!(json["recent_commands"][0]["kind"], "rejected");

        let (_, json) = call(&app, "GET", "/api/export", "").await;
        assert_eq!(json["exportFormat"][0]["payload"], "1004");

        let (_, json) = call(&app, "DELETE", "/api/history", "").await;
        assert_eq!(json["status"], "cleared");
        let (_, json) = call(&app, "GET", "/api/history", "").await;
        assert_eq!(json["total_commands"], 0);
    }

    #[tokio::test]
    async fn test_devices_and_config() {
        let app = app(Config::default());
        let (status, json) = call(&app, "GET", "/api/devices", "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.as_array().unwrap().is_empty());

        let (_, json) = call(&app, "GET", "/api/config", "").await;
        assert_eq!(json["serial"]["device"], "/dev/ttyGS0");
    }

    #[tokio::test]
    async fn test_save_export() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.export.dir = dir.path().to_path_buf();
        let app = app(config);

        let (status, json) = call(&app, "POST", "/api/export", "").await;
        assert_eq!(status, StatusCode::OK);
        let path = json["path"].as_str().unwrap();
        assert!(std::path::Path::new(path).exists());
    }
}
