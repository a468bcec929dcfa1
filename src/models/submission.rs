// src/models/submission.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'submissions' table.
/// An accepted (perfect-score) completion. Unique per (project_id, user_id).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub project_id: i64,
    pub user_id: i64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,

    /// Number of attempts recorded for the pair when the submission was created.
    pub attempt_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub project_id: i64,
    pub user_id: i64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub attempt_count: i64,
}
