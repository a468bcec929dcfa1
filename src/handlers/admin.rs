// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        project::{NewProject, ProjectChanges},
        user::{NewUser, UserChanges},
    },
    roster::parse_roster,
    state::AppState,
};

/// Optional `?project_id=` filter for result listings.
#[derive(Debug, Deserialize)]
pub struct ProjectFilter {
    pub project_id: Option<i64>,
}

fn reject_blank(field: &str, value: Option<&str>) -> Result<(), AppError> {
    match value {
        Some(v) if v.trim().is_empty() => {
            Err(AppError::BadRequest(format!("{} must not be blank", field)))
        }
        _ => Ok(()),
    }
}

// --- Users ---

/// Lists the roster.
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;
    Ok(Json(store.users().await))
}

/// Adds a single user to the roster.
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let store = state.store()?;

    let user = store.add_user(&payload).await.map_err(|e| {
        tracing::error!("Failed to create user: {}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Updates a user's name and/or role.
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UserChanges>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    reject_blank("name", payload.name.as_deref())?;
    let store = state.store()?;

    if payload.is_empty() {
        let user = store
            .user(id)
            .await
            .ok_or(AppError::NotFound("User not found".to_string()))?;
        return Ok(Json(user));
    }

    let user = store.update_user(id, &payload).await?;
    Ok(Json(user))
}

/// Deletes a user by ID.
/// Refused with 409 while the user has any submission.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;

    store.delete_user(id).await.map_err(|e| {
        tracing::warn!(user_id = id, "Failed to delete user: {}", e);
        AppError::from(e)
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the roster from an uploaded `name[,role]` file.
/// Users with submissions are kept even when absent from the file.
pub async fn replace_roster(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let entries = parse_roster(&body)?;
    let store = state.store()?;

    let report = store.replace_roster(&entries).await?;

    Ok(Json(serde_json::json!({
        "added": report.added,
        "deleted": report.deleted,
        "protected": report.protected,
        "message": report.to_string(),
    })))
}

// --- Projects ---

/// Lists every project, drafts included, newest first.
pub async fn list_projects(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;
    Ok(Json(store.projects().await))
}

/// Retrieves a single project with its answer keys.
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;

    let project = store
        .project(id)
        .await
        .ok_or(AppError::NotFound("Project not found".to_string()))?;

    Ok(Json(project))
}

/// Creates a project, optionally with its initial questions.
pub async fn create_project(
    State(state): State<AppState>,
    Json(payload): Json<NewProject>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let store = state.store()?;

    let project = store.create_project(&payload).await.map_err(|e| {
        tracing::error!("Failed to create project: {}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(project)))
}

/// Updates a project. A `questions` list replaces all existing questions.
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ProjectChanges>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    reject_blank("name", payload.name.as_deref())?;
    if let Some(questions) = &payload.questions {
        for q in questions {
            q.validate()?;
        }
    }
    let store = state.store()?;

    if payload.is_empty() {
        let project = store
            .project(id)
            .await
            .ok_or(AppError::NotFound("Project not found".to_string()))?;
        return Ok(Json(project));
    }

    let project = store.update_project(id, &payload).await.map_err(|e| {
        tracing::error!(project_id = id, "Failed to update project: {}", e);
        AppError::from(e)
    })?;

    Ok(Json(project))
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub is_published: bool,
}

/// Publishes or unpublishes a project.
pub async fn set_published(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<PublishRequest>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;
    let project = store.set_published(id, payload.is_published).await?;
    Ok(Json(project))
}

/// Deletes a project with its questions and results.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;

    store.delete_project(id).await.map_err(|e| {
        tracing::error!(project_id = id, "Failed to delete project: {}", e);
        AppError::from(e)
    })?;

    Ok(StatusCode::NO_CONTENT)
}

// --- Results ---

pub async fn list_submissions(
    State(state): State<AppState>,
    Query(filter): Query<ProjectFilter>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;
    Ok(Json(store.submissions(filter.project_id).await))
}

/// Removes a submission so the respondent may take the quiz again.
pub async fn delete_submission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;
    store.delete_submission(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_attempts(
    State(state): State<AppState>,
    Query(filter): Query<ProjectFilter>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store()?;
    Ok(Json(store.attempts(filter.project_id).await))
}
