// src/models/user.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Display-only classification of a roster member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Employee,
    Intern,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Employee => "employee",
            UserRole::Intern => "intern",
        }
    }

    /// Parses a stored role string. Unknown values fall back to `Employee`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "intern" => UserRole::Intern,
            _ => UserRole::Employee,
        }
    }
}

/// A registered respondent on the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Display name. Trimmed names act as the natural key during roster replace.
    pub name: String,

    pub role: Option<UserRole>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Longest accepted user name, in characters. Roster uploads use the same limit.
pub const MAX_NAME_LEN: usize = 100;

/// DTO for adding a single user to the roster.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(
        length(min = 1, max = 100, message = "Name must be between 1 and 100 characters."),
        custom(function = crate::models::validate_not_blank)
    )]
    pub name: String,
    pub role: Option<UserRole>,
}

/// DTO for editing a user. Fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserChanges {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters."))]
    pub name: Option<String>,
    pub role: Option<UserRole>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.role.is_none()
    }
}
