// src/models/question.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Every question carries exactly this many options.
pub const OPTION_COUNT: usize = 4;

/// A multiple-choice question owned by one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub question_text: String,

    /// Stored as a JSON array in the database.
    pub options: [String; OPTION_COUNT],

    /// 1-based index into `options`.
    pub correct_answer: u8,
}

impl Question {
    pub fn is_correct(&self, option: u8) -> bool {
        option == self.correct_answer
    }
}

/// DTO for sending a question to a respondent (excludes the answer key).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    pub options: [String; OPTION_COUNT],
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_text: q.question_text.clone(),
            options: q.options.clone(),
        }
    }
}

/// A question without an id: produced by the generator or sent by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewQuestion {
    #[validate(
        length(min = 1, max = 2000),
        custom(function = crate::models::validate_not_blank)
    )]
    pub question_text: String,
    pub options: [String; OPTION_COUNT],
    #[validate(range(min = 1, max = 4))]
    pub correct_answer: u8,
}
