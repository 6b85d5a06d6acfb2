use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::llm::gemini::{GeminiClient, GeminiError};
use crate::models::{ErrorResponse, GenerateResponse};

/// Read-only configuration shared by handler invocations. The handler itself
/// is stateless and request-scoped; concurrent invocations share nothing
/// mutable.
pub struct ServerState {
    pub api_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("the server is missing its AI provider credential")]
    MissingCredential,
    #[error("no schedule text was provided")]
    MissingInput,
    #[error("the AI provider could not process the request")]
    Upstream,
    #[error("the AI returned a response that could not be parsed - please retry")]
    MalformedAiResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::MissingInput => StatusCode::BAD_REQUEST,
            ApiError::MissingCredential
            | ApiError::Upstream
            | ApiError::MalformedAiResponse => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(%status, "{}", self);
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<GeminiError> for ApiError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::Malformed(_) | GeminiError::NoCandidates => {
                tracing::warn!(error = %err, "unparseable AI response");
                ApiError::MalformedAiResponse
            }
            GeminiError::Transport(_) | GeminiError::Status(_) => {
                // Upstream internals stay in the log, not the client reply.
                tracing::error!(error = %err, "upstream AI call failed");
                ApiError::Upstream
            }
        }
    }
}

/// Request body with the text field optional so absence maps to the 400
/// missing-input error rather than an extractor rejection.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    #[serde(default)]
    raw_schedule_text: Option<String>,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/generate-schedule", post(generate_schedule))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn generate_schedule(
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Some(api_key) = state.api_key.as_deref() else {
        return Err(ApiError::MissingCredential);
    };

    let raw_text = body.raw_schedule_text.unwrap_or_default();
    let raw_text = raw_text.trim();
    if raw_text.is_empty() {
        return Err(ApiError::MissingInput);
    }

    tracing::info!(chars = raw_text.len(), "generating schedule proposal");
    let gemini = GeminiClient::new(api_key);
    let tasks = gemini.generate_schedule(raw_text).await?;
    tracing::info!(tasks = tasks.len(), "proposal generated");

    Ok(Json(GenerateResponse { tasks }))
}

/// Runs the schedule proposal service until the process is stopped.
pub async fn run(bind: Option<String>) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "dayplan=info,tower_http=info".to_string()),
        )
        .init();

    let api_key = std::env::var("GEMINI_API_KEY").ok();
    if api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; schedule generation will fail");
    }

    let state = Arc::new(ServerState { api_key });
    let app = router(state);

    let addr = bind
        .or_else(|| std::env::var("DAYPLAN_BIND").ok())
        .unwrap_or_else(|| "0.0.0.0:8787".to_string());

    tracing::info!("starting schedule proposal service on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use tower::ServiceExt;

    fn app_without_key() -> Router {
        router(Arc::new(ServerState { api_key: None }))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/generate-schedule")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn wrong_method_is_rejected() {
        let response = app_without_key()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/api/generate-schedule")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn missing_credential_is_a_server_error() {
        let response = app_without_key()
            .oneshot(post_json(r#"{"rawScheduleText":"9:00 standup"}"#))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(json["error"].as_str().expect("error string").contains("credential"));
    }

    #[tokio::test]
    async fn missing_input_is_a_client_error() {
        let app = router(Arc::new(ServerState {
            api_key: Some("test-key".to_string()),
        }));
        let response = app.oneshot(post_json("{}")).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn blank_input_is_a_client_error() {
        let app = router(Arc::new(ServerState {
            api_key: Some("test-key".to_string()),
        }));
        let response = app
            .oneshot(post_json(r#"{"rawScheduleText":"   "}"#))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
