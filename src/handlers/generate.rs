// src/handlers/generate.rs

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde_json::Value;
use tracing::instrument;

use crate::{error::AppError, generation::clamp_question_count, state::AppState};

/// Reports whether a generation credential is configured.
pub async fn generator_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "ready": state.generator.is_some() }))
}

/// Generates validated questions from `{transcript, questionCount?}`.
///
/// * 400 when the transcript is missing or blank, whatever `questionCount` holds.
/// * 503 when no credential is configured.
/// * 500 with the downstream message on any generation failure.
///
/// The body is read loosely so a malformed `questionCount` falls back to the default.
#[instrument(level = "info", skip(state, body), fields(body_len = body.len()))]
pub async fn generate_questions(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: Value = serde_json::from_slice(&body)?;

    let transcript = request
        .get("transcript")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if transcript.is_empty() {
        return Err(AppError::BadRequest("Transcript is required".to_string()));
    }

    let generator = state.generator.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Question generation is not configured".to_string())
    })?;

    let count = clamp_question_count(request.get("questionCount").and_then(Value::as_i64));
    let questions = generator.generate(transcript, count).await?;

    Ok(Json(serde_json::json!({ "questions": questions })))
}

/// JSON 405 for any method other than GET and POST.
pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "GET, POST")],
        Json(serde_json::json!({ "error": "Method not allowed" })),
    )
}
