//! HTTP server: the client-facing question surface and the admin schema
//! operations.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/questions` | Submit a question; triggers one resolution run |
//! | `GET`  | `/questions` | Most recent questions (default 25), creation order |
//! | `GET`  | `/questions/{id}` | Fetch one question |
//! | `GET`  | `/questions/live` | SSE stream of `created`/`answered` events |
//! | `POST` | `/admin/schema/setup` | Rebuild a family's collections |
//! | `POST` | `/admin/schema/seed` | Re-ingest the hosted FAQ dataset |
//!
//! # Error Contract
//!
//! Client errors use the JSON schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Admin schema failures are different on purpose: they return the typed
//! `{ "reason": ..., "operation": "fail" | "error" }` body with a `502`
//! so the operator sees the reason verbatim.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based chat clients.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::backend::{SearchBackend, WeaviateBackend};
use crate::config::Config;
use crate::models::{ModelFamily, Question};
use crate::resolve;
use crate::schema;
use crate::store::{QuestionStore, SqliteQuestionStore};
use crate::{db, migrate};

/// Default page size for `GET /questions`.
const DEFAULT_RECENT_LIMIT: i64 = 25;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    backend: Arc<dyn SearchBackend>,
    store: Arc<dyn QuestionStore>,
    events: broadcast::Sender<QuestionEvent>,
}

/// One entry on the live stream.
#[derive(Debug, Clone, Serialize)]
struct QuestionEvent {
    kind: EventKind,
    question: Question,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum EventKind {
    Created,
    Answered,
}

impl EventKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Answered => "answered",
        }
    }
}

/// Start the server with the default Weaviate backend and SQLite store.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated. Migrations are applied on startup, so a fresh
/// database works without a separate `init`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let backend = WeaviateBackend::new(&config.search)?;
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let store = SqliteQuestionStore::new(pool);

    run_server_with(config, Arc::new(backend), Arc::new(store)).await
}

/// Start the server with injected backend and store implementations.
pub async fn run_server_with(
    config: &Config,
    backend: Arc<dyn SearchBackend>,
    store: Arc<dyn QuestionStore>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let (events, _) = broadcast::channel(64);

    let state = AppState {
        config: Arc::new(config.clone()),
        backend,
        store,
        events,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/questions", post(handle_submit).get(handle_recent))
        .route("/questions/live", get(handle_live))
        .route("/questions/{id}", get(handle_get_question))
        .route("/admin/schema/setup", post(handle_setup))
        .route("/admin/schema/seed", post(handle_seed))
        .layer(cors)
        .with_state(state);

    info!("server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body for client-facing errors.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
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

// ============ POST /questions ============

#[derive(Deserialize)]
struct SubmitRequest {
    question: String,
    asked_by: String,
}

/// Create the question record and spawn its resolution run.
///
/// The response returns immediately with the pending record; the answer
/// arrives on the live stream once resolution completes. Resolution
/// itself cannot fail the submission — at worst the canned fallback is
/// persisted.
async fn handle_submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<Question>), AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    if req.asked_by.trim().is_empty() {
        return Err(bad_request("asked_by must not be empty"));
    }

    let question = state
        .store
        .create_question(req.question.trim(), &req.asked_by)
        .await
        .map_err(internal)?;

    let _ = state.events.send(QuestionEvent {
        kind: EventKind::Created,
        question: question.clone(),
    });

    spawn_resolution(state.clone(), question.clone());

    Ok((StatusCode::CREATED, Json(question)))
}

/// One resolution run per created question, detached from the request.
fn spawn_resolution(state: AppState, question: Question) {
    tokio::spawn(async move {
        let outcome = resolve::resolve_question(
            state.backend.as_ref(),
            state.store.as_ref(),
            &state.config.resolver,
            &question,
        )
        .await;

        match outcome {
            Ok(resolve::Outcome::Resolved(_)) => {
                // Re-read so the event carries the stored response and
                // responded_at stamp.
                match state.store.get_question(&question.id).await {
                    Ok(Some(answered)) => {
                        let _ = state.events.send(QuestionEvent {
                            kind: EventKind::Answered,
                            question: answered,
                        });
                    }
                    Ok(None) => {}
                    Err(err) => {
                        error!(question = %question.id, error = %err, "failed to re-read answered question");
                    }
                }
            }
            Ok(resolve::Outcome::AlreadyResolved) => {}
            Err(err) => {
                error!(question = %question.id, error = %err, "resolution run failed");
            }
        }
    });
}

// ============ GET /questions ============

#[derive(Deserialize)]
struct RecentParams {
    limit: Option<i64>,
}

async fn handle_recent(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<Question>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    if limit < 1 {
        return Err(bad_request("limit must be >= 1"));
    }

    let questions = state
        .store
        .recent_questions(limit)
        .await
        .map_err(internal)?;
    Ok(Json(questions))
}

// ============ GET /questions/{id} ============

async fn handle_get_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Question>, AppError> {
    let question = state.store.get_question(&id).await.map_err(internal)?;
    question
        .map(Json)
        .ok_or_else(|| not_found(format!("no question with id: {}", id)))
}

// ============ GET /questions/live ============

/// Push-based subscription: every `created` and `answered` event is
/// forwarded to all connected clients. A lagging client skips missed
/// events rather than disconnecting.
async fn handle_live(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = match serde_json::to_string(&event) {
                        Ok(data) => data,
                        Err(_) => continue,
                    };
                    let sse_event = Event::default().event(event.kind.as_str()).data(data);
                    return Some((Ok(sse_event), rx));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ============ POST /admin/schema/* ============

#[derive(Deserialize)]
struct AdminRequest {
    model: ModelFamily,
}

/// Rebuild the family's collections. Failures come back as the typed
/// `{ reason, operation }` body so the UI can display `reason` directly.
async fn handle_setup(State(state): State<AppState>, Json(req): Json<AdminRequest>) -> Response {
    match schema::setup_schema(state.backend.as_ref(), req.model).await {
        Ok(description) => Json(description).into_response(),
        Err(failure) => (StatusCode::BAD_GATEWAY, Json(failure)).into_response(),
    }
}

async fn handle_seed(State(state): State<AppState>, Json(req): Json<AdminRequest>) -> Response {
    match schema::seed_schema(state.backend.as_ref(), &state.config, req.model).await {
        Ok(report) => Json(report).into_response(),
        Err(failure) => (StatusCode::BAD_GATEWAY, Json(failure)).into_response(),
    }
}
