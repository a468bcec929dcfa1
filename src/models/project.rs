// src/models/project.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::question::{NewQuestion, Question};

/// A quiz definition: transcript, question set and publication flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub transcript: String,

    /// Ordered by position. Deleting the project deletes these.
    pub questions: Vec<Question>,

    /// Only published projects are visible to respondents.
    pub is_published: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Listing entry for respondents.
#[derive(Debug, Serialize)]
pub struct ProjectSummary {
    pub id: i64,
    pub name: String,
    pub question_count: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Project> for ProjectSummary {
    fn from(p: &Project) -> Self {
        ProjectSummary {
            id: p.id,
            name: p.name.clone(),
            question_count: p.questions.len(),
            created_at: p.created_at,
        }
    }
}

/// DTO for creating a project.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProject {
    #[validate(
        length(min = 1, max = 200),
        custom(function = crate::models::validate_not_blank)
    )]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 200000))]
    pub transcript: String,
    #[serde(default)]
    #[validate(nested)]
    pub questions: Vec<NewQuestion>,
    #[serde(default)]
    pub is_published: bool,
}

/// DTO for editing a project. A present `questions` list replaces the whole set.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProjectChanges {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 200000))]
    pub transcript: Option<String>,
    pub questions: Option<Vec<NewQuestion>>,
    pub is_published: Option<bool>,
}

impl ProjectChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.transcript.is_none()
            && self.questions.is_none()
            && self.is_published.is_none()
    }
}
