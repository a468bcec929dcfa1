// src/handlers/quiz.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    quiz::{Identity, QuizSession, SessionView},
    sessions::SharedSession,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub project_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: i64,
    pub option: u8,
}

/// Session snapshot returned by every quiz endpoint.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub view: SessionView,
}

impl SessionResponse {
    fn new(id: Uuid, session: &QuizSession) -> Json<Self> {
        Json(Self {
            id,
            view: session.view(),
        })
    }
}

/// Looks up a live session. Callers lock it for the whole transition.
async fn find_session(state: &AppState, id: Uuid) -> Result<SharedSession, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound("Quiz session not found".to_string()))
}

/// Opens a session on a published project, in the `start` state.
pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;

    let project = store
        .project(payload.project_id)
        .await
        .filter(|p| p.is_published)
        .ok_or(AppError::NotFound("Project not found".to_string()))?;

    let session = QuizSession::new(project, state.config.allow_guests);
    let view = session.view();
    let id = state.sessions.open(session).await;

    tracing::debug!(session_id = %id, project_id = payload.project_id, "Quiz session opened");
    Ok((StatusCode::CREATED, Json(SessionResponse { id, view })))
}

/// Current snapshot. A respondent who has submitted since is moved to `complete`.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;

    session.sync(&store).await;
    Ok(SessionResponse::new(id, &session))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !state.sessions.close(id).await {
        return Err(AppError::NotFound("Quiz session not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `start → taking` as a roster user (`{"user_id": 3}`) or a guest (`{"guest": true}`).
pub async fn set_identity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(identity): Json<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;

    session.begin(identity, &store).await?;
    Ok(SessionResponse::new(id, &session))
}

pub async fn answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;

    session.answer(payload.question_id, payload.option)?;
    Ok(SessionResponse::new(id, &session))
}

/// Grades the answers; registered respondents get an attempt recorded.
/// A second grade arriving while the first is in flight sees it applied and gets 409.
pub async fn grade(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;

    session.grade(&store).await.map_err(|e| {
        tracing::warn!(session_id = %id, "Grading failed: {}", e);
        AppError::from(e)
    })?;
    Ok(SessionResponse::new(id, &session))
}

pub async fn retry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;

    session.retry()?;
    Ok(SessionResponse::new(id, &session))
}

/// Submits after a perfect grade. On a store failure the session keeps its
/// passed grade so the respondent can submit again.
pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;

    session.submit(&store).await.map_err(|e| {
        tracing::error!(session_id = %id, "Submission failed: {}", e);
        AppError::from(e)
    })?;
    Ok(SessionResponse::new(id, &session))
}

/// Guest-only `complete → start`.
pub async fn reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let shared = find_session(&state, id).await?;
    let mut session = shared.lock().await;

    session.reset()?;
    Ok(SessionResponse::new(id, &session))
}
