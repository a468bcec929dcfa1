// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'attempts' table.
/// One row per grading event of a registered respondent, pass or fail.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub project_id: i64,
    pub user_id: i64,

    /// Number of correctly answered questions.
    pub score: i64,

    pub attempted_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub project_id: i64,
    pub user_id: i64,
    pub score: i64,
    pub attempted_at: chrono::DateTime<chrono::Utc>,
}
