//! HTTP JSON API.
//!
//! Exposes the ask path over HTTP for browser frontends and scripted
//! clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | RAG answer with citations |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses follow:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::Citation;
use crate::rag;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Starts the HTTP API server.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("API server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Request validation happens in the handlers before the pipeline runs, so
/// anything failing past that point is a server-side error.
fn pipeline_error(err: anyhow::Error) -> AppError {
    internal_error(err.to_string())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    k: Option<i64>,
    #[serde(default)]
    law: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    citations: Vec<Citation>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(body): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if body.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let k = body.k.unwrap_or(state.config.retrieval.top_k);
    if k < 1 {
        return Err(bad_request("k must be >= 1"));
    }
    let law = body
        .law
        .unwrap_or_else(|| state.config.retrieval.law.clone());

    let result = rag::answer(&state.config, &body.question, k, &law)
        .await
        .map_err(pipeline_error)?;

    let answer = format!("{}\n\n{}", result.text, rag::DISCLAIMER);

    Ok(Json(AskResponse {
        answer,
        citations: result.citations,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState {
            config: Arc::new(Config::default()),
        }
    }

    fn ask(question: &str, k: Option<i64>) -> Json<AskRequest> {
        Json(AskRequest {
            question: question.to_string(),
            k,
            law: None,
        })
    }

    #[tokio::test]
    async fn empty_question_is_bad_request() {
        let err = handle_ask(State(state()), ask("   ", None))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "bad_request");
        assert!(err.message.contains("question must not be empty"));
    }

    #[tokio::test]
    async fn k_below_one_is_bad_request() {
        let err = handle_ask(State(state()), ask("Was regelt § 242?", Some(0)))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "bad_request");
        assert!(err.message.contains("k must be >= 1"));
    }

    #[test]
    fn error_body_contract_shape() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "bad_request".to_string(),
                message: "question must not be empty".to_string(),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "bad_request");
        assert_eq!(json["error"]["message"], "question must not be empty");
    }

    #[test]
    fn pipeline_errors_are_internal_regardless_of_message() {
        let err = pipeline_error(anyhow::anyhow!("law must not be empty"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "internal");
    }
}
