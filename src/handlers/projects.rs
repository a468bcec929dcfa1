// src/handlers/projects.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::project::ProjectSummary,
    quiz::eligible_respondents,
    state::AppState,
};

/// Lists published projects for the respondent-facing picker.
/// Transcripts and answer keys are never exposed here.
pub async fn list_published(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;

    let summaries: Vec<ProjectSummary> = store
        .published_projects()
        .await
        .iter()
        .map(ProjectSummary::from)
        .collect();

    Ok(Json(summaries))
}

/// Users who may still take a published project (no submission yet).
pub async fn list_respondents(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;

    let project = store
        .project(id)
        .await
        .filter(|p| p.is_published)
        .ok_or(AppError::NotFound("Project not found".to_string()))?;

    let users = store.users().await;
    let submissions = store.submissions(Some(project.id)).await;

    Ok(Json(eligible_respondents(&users, &submissions, project.id)))
}

/// Combined readiness of the data store and the question generator.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "store_ready": state.store.is_some(),
        "generator_ready": state.generator.is_some(),
        "allow_guests": state.config.allow_guests,
    }))
}
