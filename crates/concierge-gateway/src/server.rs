use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use concierge_core::TriageRequest;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::processor::TriageProcessor;

struct AppState {
    processor: Arc<TriageProcessor>,
    auth_token: Option<String>,
    start_time: Instant,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ProcessResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ProcessResponse {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(status: StatusCode, error: impl Into<String>) -> Response {
        let body = Self {
            success: false,
            error: Some(error.into()),
        };
        (status, Json(body)).into_response()
    }
}

/// Internal HTTP surface: accepts triage requests and reports liveness.
pub struct StatusServer {
    processor: Arc<TriageProcessor>,
    auth_token: Option<String>,
}

impl StatusServer {
    pub fn new(processor: Arc<TriageProcessor>) -> Self {
        Self {
            processor,
            auth_token: None,
        }
    }

    /// When set, `POST /api/status/process` must carry a matching
    /// `Authorization: Bearer <token>` header.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            processor: self.processor.clone(),
            auth_token: self.auth_token.clone(),
            start_time: Instant::now(),
        });
        Router::new()
            .route("/api/status/process", post(process_handler))
            .route("/api/status", get(status_handler))
            .route("/health", get(health_handler))
            .with_state(state)
    }

    pub async fn start(&self, host: &str, port: u16) -> Result<(), GatewayError> {
        let app = self.router();
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| GatewayError::ServerError(e.to_string()))?;

        info!("Status server listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| GatewayError::ServerError(e.to_string()))?;

        Ok(())
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "connected",
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn authorized(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

async fn process_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<TriageRequest>, JsonRejection>,
) -> Response {
    if !authorized(&headers, state.auth_token.as_deref()) {
        return ProcessResponse::failed(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected process request");
            return ProcessResponse::failed(rejection.status(), rejection.body_text());
        }
    };
    if let Err(e) = request.validate() {
        warn!(error = %e, "Rejected process request");
        let err = GatewayError::InvalidRequest(e.to_string());
        return ProcessResponse::failed(StatusCode::BAD_REQUEST, err.to_string());
    }

    match state.processor.process(&request).await {
        Ok(_) => (StatusCode::OK, Json(ProcessResponse::ok())).into_response(),
        Err(e) => ProcessResponse::failed(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
