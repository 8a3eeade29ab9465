use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post, put},
};
use lablingo::{
    AnalysisRequest, Controller, CredentialGate, EnvCredentialGate, FormInput, GeminiClient,
    LabAnalyzer, MediaType, UiState, View, encode,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    config::{GateMode, Settings},
    models::{AnalyzeRequest, SessionResponse},
    storage::{
        InMemorySessionStorage, Session, SessionHandle, SessionStorage, spawn_idle_sweeper,
    },
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn conflict_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn unsupported_media_error(message: &str, declared: &str) -> ApiError {
    (
        StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Json(json!({
            "error": message,
            "media_type": declared,
            "accepted": MediaType::accept_list()
        })),
    )
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStorage>,
    pub analyzer: Arc<dyn LabAnalyzer>,
    pub gate: Option<Arc<dyn CredentialGate>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> Self {
        let analyzer: Arc<dyn LabAnalyzer> =
            Arc::new(GeminiClient::new(settings.gemini_config()));

        let gate: Option<Arc<dyn CredentialGate>> = match settings.gate_mode {
            GateMode::Env => Some(Arc::new(EnvCredentialGate::new(
                settings.api_key_var.clone(),
            ))),
            GateMode::None => None,
        };

        Self {
            sessions: Arc::new(InMemorySessionStorage::new()),
            analyzer,
            gate,
            max_upload_bytes: settings.max_upload_bytes,
        }
    }

    fn gate(&self) -> Option<&dyn CredentialGate> {
        self.gate.as_deref()
    }
}

/// Build the router and start the idle-session sweeper. Must run inside a
/// Tokio runtime.
pub fn create_app(settings: &Settings) -> Router {
    let app_state = AppState::from_settings(settings);
    if let Some(max_idle) = settings.session_idle_ttl {
        info!(idle_secs = max_idle.as_secs(), "Idle sessions will be evicted");
        spawn_idle_sweeper(app_state.sessions.clone(), max_idle);
    }
    build_router(app_state)
}

pub fn build_router(app_state: AppState) -> Router {
    let body_limit = app_state.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route(
            "/sessions/{session_id}",
            get(get_session).delete(delete_session),
        )
        .route("/sessions/{session_id}/credential", post(select_credential))
        .route(
            "/sessions/{session_id}/file",
            put(upload_file).delete(remove_file),
        )
        .route("/sessions/{session_id}/analyze", post(analyze))
        .route("/sessions/{session_id}/reset", post(reset))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "LabLingo",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Plain-language explanations of lab results. Not a diagnosis.",
        "accepted_file_types": MediaType::accept_list(),
        "endpoints": {
            "POST /sessions": "Start a session and check the API key",
            "GET /sessions/{session_id}": "Current view of the session",
            "DELETE /sessions/{session_id}": "Close the session",
            "POST /sessions/{session_id}/credential": "Select an API key",
            "PUT /sessions/{session_id}/file": "Attach a report image or PDF (multipart field `file`)",
            "DELETE /sessions/{session_id}/file": "Remove the attached file",
            "POST /sessions/{session_id}/analyze": "Analyze pasted text and/or the attached file",
            "POST /sessions/{session_id}/reset": "Back to an empty form",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

fn session_response(session: &Session) -> SessionResponse {
    let attached_file = session.upload.media_type();
    // Pasted text only arrives with the analyze call, so the form holds the file at most.
    let form = FormInput {
        text: String::new(),
        file: attached_file,
    };
    SessionResponse {
        session_id: session.id.clone(),
        attached_file,
        view: View::from_state(session.controller.state(), &form),
    }
}

async fn load_session(state: &AppState, session_id: &str) -> Result<SessionHandle, ApiError> {
    state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| not_found_error("Session not found", session_id))
}

async fn create_session(State(state): State<AppState>) -> ApiResult<SessionResponse> {
    let mut controller = Controller::new();
    controller.check_credential(state.gate()).await;

    let session = Session::new(controller);
    info!(session_id = %session.id, "Session created");

    let handle = state.sessions.insert(session).await;
    let session = handle.lock().await;
    Ok(Json(session_response(&session)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let handle = load_session(&state, &session_id).await?;
    let session = handle.lock().await;
    Ok(Json(session_response(&session)))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    if !state.sessions.delete(&session_id).await {
        return Err(not_found_error("Session not found", &session_id));
    }
    info!(session_id = %session_id, "Session closed");
    Ok(Json(json!({
        "session_id": session_id,
        "status": "closed"
    })))
}

async fn select_credential(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let handle = load_session(&state, &session_id).await?;
    let mut session = handle.lock().await;
    session.controller.select_credential(state.gate()).await;
    Ok(Json(session_response(&session)))
}

async fn upload_file(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<SessionResponse> {
    let handle = load_session(&state, &session_id).await?;
    let (declared, bytes) = read_file_field(&mut multipart).await?;

    // Validate before touching the slot so a rejected file leaves it as it was.
    if let Err(e) = MediaType::from_mime(&declared) {
        warn!(session_id = %session_id, declared = %declared, "Rejected unsupported upload");
        return Err(unsupported_media_error(e.user_message(), &declared));
    }

    if bytes.len() > state.max_upload_bytes {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(json!({
                "error": format!(
                    "File too large. Maximum {}MB.",
                    state.max_upload_bytes / (1024 * 1024)
                )
            })),
        ));
    }

    let ticket = handle.lock().await.upload.begin();

    let file = encode(bytes, &declared).await.map_err(|e| {
        warn!(session_id = %session_id, error = %e, "Failed to encode upload");
        bad_request_error(e.user_message())
    })?;

    let session = handle.lock().await;
    if !session.upload.complete(ticket, file) {
        info!(session_id = %session_id, "Upload superseded by a newer selection");
    }
    Ok(Json(session_response(&session)))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    let multipart_error = |e: axum::extract::multipart::MultipartError| -> ApiError {
        (e.status(), Json(json!({ "error": e.body_text() })))
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let declared = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok((declared, bytes.to_vec()));
    }

    Err(bad_request_error("No file provided"))
}

async fn remove_file(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let handle = load_session(&state, &session_id).await?;
    let session = handle.lock().await;
    session.upload.clear();
    Ok(Json(session_response(&session)))
}

async fn analyze(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<SessionResponse> {
    let handle = load_session(&state, &session_id).await?;

    // The lock covers the transition only, never the model call.
    let pending = {
        let mut session = handle.lock().await;
        if !session.controller.accepts_submissions() {
            return Err(conflict_error(
                "Session is not ready for a new analysis",
                &session_id,
            ));
        }

        let draft = AnalysisRequest::new(request.text, session.upload.current());
        if draft.is_empty() {
            return Err(bad_request_error(
                "Paste report text or attach a file before analyzing",
            ));
        }

        session.upload.take();
        session.controller.begin_analysis(draft)
    };

    let Some(pending) = pending else {
        return Err(conflict_error(
            "Session is not ready for a new analysis",
            &session_id,
        ));
    };

    info!(
        session_id = %session_id,
        has_file = pending.file.is_some(),
        "Analysis started"
    );

    let outcome = state.analyzer.analyze(&pending).await;

    if state.sessions.get(&session_id).await.is_none() {
        warn!(session_id = %session_id, "Session closed during analysis, dropping result");
        return Err(not_found_error("Session not found", &session_id));
    }

    let mut session = handle.lock().await;
    session.controller.complete_analysis(outcome);

    match session.controller.state() {
        UiState::Result { response } => info!(
            session_id = %session_id,
            tests = response.tests.len(),
            "Analysis finished"
        ),
        other => error!(session_id = %session_id, state = ?other, "Analysis did not produce a result"),
    }

    Ok(Json(session_response(&session)))
}

async fn reset(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let handle = load_session(&state, &session_id).await?;
    let mut session = handle.lock().await;

    session.controller.reset();
    if matches!(session.controller.state(), UiState::Idle { .. }) {
        session.upload.clear();
    }

    Ok(Json(session_response(&session)))
}
