// src/db/mod.rs

//! Data store collaborator.
//!
//! `DataStore` is the request/response surface the rest of the crate talks to.
//! `SqliteStore` is the production implementation; tests may wrap or replace it.

pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use sqlx::error::ErrorKind;

use crate::models::{
    attempt::{Attempt, NewAttempt},
    project::{NewProject, Project, ProjectChanges},
    submission::{NewSubmission, Submission},
    user::{NewUser, User, UserChanges},
};

pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by the data store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The addressed record does not exist.
    NotFound(String),

    /// Integrity guard: the user is referenced by at least one submission.
    HasSubmissions { user_id: i64 },

    /// A submission already exists for the (project, user) pair.
    DuplicateSubmission { project_id: i64, user_id: i64 },

    /// Any other constraint violation.
    Conflict(String),

    /// The store could not be reached.
    Unavailable(String),

    Database(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(what) => write!(f, "{} not found", what),
            StoreError::HasSubmissions { user_id } => {
                write!(f, "user {} has submissions and cannot be deleted", user_id)
            }
            StoreError::DuplicateSubmission {
                project_id,
                user_id,
            } => write!(
                f,
                "user {} already has a submission for project {}",
                user_id, project_id
            ),
            StoreError::Conflict(msg) => write!(f, "conflict: {}", msg),
            StoreError::Unavailable(msg) => write!(f, "data store unavailable: {}", msg),
            StoreError::Database(msg) => write!(f, "database error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("record".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::CheckViolation
                | ErrorKind::NotNullViolation => StoreError::Conflict(db_err.message().to_string()),
                _ => StoreError::Database(err.to_string()),
            },
            _ => StoreError::Database(err.to_string()),
        }
    }
}

/// Collection operations over users, projects (with nested questions),
/// submissions and attempts.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn insert_user(&self, user: &NewUser) -> StoreResult<User>;
    async fn update_user(&self, id: i64, changes: &UserChanges) -> StoreResult<User>;
    /// Fails with `StoreError::HasSubmissions` when the user has any submission.
    async fn delete_user(&self, id: i64) -> StoreResult<()>;

    async fn list_projects(&self) -> StoreResult<Vec<Project>>;
    async fn get_project(&self, id: i64) -> StoreResult<Option<Project>>;
    async fn insert_project(&self, project: &NewProject) -> StoreResult<Project>;
    /// A present question list replaces every existing question of the project.
    async fn update_project(&self, id: i64, changes: &ProjectChanges) -> StoreResult<Project>;
    async fn delete_project(&self, id: i64) -> StoreResult<()>;

    async fn list_submissions(&self) -> StoreResult<Vec<Submission>>;
    async fn find_submission(&self, project_id: i64, user_id: i64)
    -> StoreResult<Option<Submission>>;
    /// Fails with `StoreError::DuplicateSubmission` if the pair already submitted.
    async fn insert_submission(&self, submission: &NewSubmission) -> StoreResult<Submission>;
    async fn delete_submission(&self, id: i64) -> StoreResult<()>;

    async fn list_attempts(&self) -> StoreResult<Vec<Attempt>>;
    async fn insert_attempt(&self, attempt: &NewAttempt) -> StoreResult<Attempt>;
    async fn count_attempts(&self, project_id: i64, user_id: i64) -> StoreResult<i64>;
}
