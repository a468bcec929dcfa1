// src/roster.rs

//! Roster upload parsing and bulk-replace reconciliation.

use std::{collections::HashSet, fmt};

use serde::Serialize;

use crate::models::{
    submission::Submission,
    user::{MAX_NAME_LEN, User, UserRole},
};

/// One line of an uploaded roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    Empty,
    /// The first header field was not `name`.
    BadHeader(String),
    /// A name on the given 1-based line exceeds `MAX_NAME_LEN` characters.
    NameTooLong { line: usize, length: usize },
    NoEntries,
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterError::Empty => write!(f, "Roster file is empty"),
            RosterError::BadHeader(found) => write!(
                f,
                "Roster header must start with 'name', found '{}'",
                found
            ),
            RosterError::NameTooLong { line, length } => write!(
                f,
                "Name on line {} is {} characters long (at most {} allowed)",
                line, length, MAX_NAME_LEN
            ),
            RosterError::NoEntries => write!(f, "Roster file contains no names"),
        }
    }
}

impl std::error::Error for RosterError {}

fn parse_role(raw: &str) -> UserRole {
    let role = raw.trim();
    if role.eq_ignore_ascii_case("intern") || role == "インターン" {
        UserRole::Intern
    } else {
        UserRole::Employee
    }
}

/// Parses `name[,role]` lines below a header whose first field is `name`.
pub fn parse_roster(text: &str) -> Result<Vec<RosterEntry>, RosterError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, l)| !l.trim().is_empty());

    let (_, header) = lines.next().ok_or(RosterError::Empty)?;
    let first_field = header.split(',').next().unwrap_or_default().trim();
    if !first_field.eq_ignore_ascii_case("name") {
        return Err(RosterError::BadHeader(first_field.to_string()));
    }

    let mut entries = Vec::new();
    for (line_no, line) in lines {
        let mut fields = line.split(',');
        let name = fields.next().unwrap_or_default().trim();
        if name.is_empty() {
            continue;
        }
        let length = name.chars().count();
        if length > MAX_NAME_LEN {
            return Err(RosterError::NameTooLong {
                line: line_no,
                length,
            });
        }
        entries.push(RosterEntry {
            name: name.to_string(),
            role: fields.next().map(parse_role).unwrap_or(UserRole::Employee),
        });
    }

    if entries.is_empty() {
        return Err(RosterError::NoEntries);
    }
    Ok(entries)
}

/// What a bulk replace will do, computed before any write.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterPlan {
    pub to_add: Vec<RosterEntry>,
    pub to_delete: Vec<User>,
    /// Absent from the upload but referenced by a submission.
    pub protected: Vec<User>,
}

/// Set reconciliation by trimmed name.
///
/// * `to_add = incoming \ existing`
/// * `to_delete = (existing \ incoming) \ protected`
/// * `protected = (existing \ incoming) ∩ users with submissions`
pub fn reconcile(
    existing: &[User],
    incoming: &[RosterEntry],
    submissions: &[Submission],
) -> RosterPlan {
    let existing_names: HashSet<&str> = existing.iter().map(|u| u.name.trim()).collect();
    let incoming_names: HashSet<&str> = incoming.iter().map(|e| e.name.trim()).collect();
    let submitters: HashSet<i64> = submissions.iter().map(|s| s.user_id).collect();

    let mut seen = HashSet::new();
    let to_add = incoming
        .iter()
        .filter(|e| {
            let name = e.name.trim();
            !name.is_empty() && !existing_names.contains(name) && seen.insert(name)
        })
        .map(|e| RosterEntry {
            name: e.name.trim().to_string(),
            role: e.role,
        })
        .collect();

    let (protected, to_delete): (Vec<User>, Vec<User>) = existing
        .iter()
        .filter(|u| !incoming_names.contains(u.name.trim()))
        .cloned()
        .partition(|u| submitters.contains(&u.id));

    RosterPlan {
        to_add,
        to_delete,
        protected,
    }
}

/// Outcome of a bulk replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RosterReport {
    pub added: usize,
    pub deleted: usize,
    pub protected: usize,
}

impl fmt::Display for RosterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Added {}, deleted {}", self.added, self.deleted)?;
        if self.protected > 0 {
            write!(f, ", kept {} with submissions", self.protected)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i64, name: &str) -> User {
        User {
            id,
            name: name.to_string(),
            role: None,
            created_at: None,
        }
    }

    fn entry(name: &str) -> RosterEntry {
        RosterEntry {
            name: name.to_string(),
            role: UserRole::Employee,
        }
    }

    fn submission(user_id: i64) -> Submission {
        Submission {
            id: user_id * 10,
            project_id: 1,
            user_id,
            submitted_at: Utc::now(),
            attempt_count: 1,
        }
    }

    #[test]
    fn test_parse_roster_roles_and_header() {
        let text = "\u{feff}Name,role\nAiko,intern\n\n Ben , Employee\nChika,インターン\nDai\n";
        let entries = parse_roster(text).unwrap();

        assert_eq!(
            entries,
            vec![
                RosterEntry { name: "Aiko".into(), role: UserRole::Intern },
                RosterEntry { name: "Ben".into(), role: UserRole::Employee },
                RosterEntry { name: "Chika".into(), role: UserRole::Intern },
                RosterEntry { name: "Dai".into(), role: UserRole::Employee },
            ]
        );
    }

    #[test]
    fn test_parse_roster_rejects_bad_input() {
        assert_eq!(parse_roster(""), Err(RosterError::Empty));
        assert_eq!(
            parse_roster("email,role\nx@y.z,intern"),
            Err(RosterError::BadHeader("email".to_string()))
        );
        assert_eq!(parse_roster("name\n , intern\n"), Err(RosterError::NoEntries));
    }

    #[test]
    fn test_parse_roster_enforces_name_length() {
        let long = "あ".repeat(MAX_NAME_LEN + 1);
        let text = format!("name,role\nAiko,intern\n\n{},employee\n", long);

        assert_eq!(
            parse_roster(&text),
            Err(RosterError::NameTooLong {
                line: 4,
                length: MAX_NAME_LEN + 1
            })
        );

        // Exactly at the limit is fine, counted in characters.
        let text = format!("name\n{}\n", "あ".repeat(MAX_NAME_LEN));
        assert_eq!(parse_roster(&text).unwrap()[0].name.chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn test_reconcile_set_difference() {
        let existing = vec![user(1, "Ami"), user(2, "Ben "), user(3, "Cho")];
        let incoming = vec![entry(" Ami"), entry("Dee"), entry("Dee"), entry("Eri")];
        let submissions = vec![submission(3)];

        let plan = reconcile(&existing, &incoming, &submissions);

        let added: Vec<&str> = plan.to_add.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(added, vec!["Dee", "Eri"]);
        assert_eq!(plan.to_delete, vec![user(2, "Ben ")]);
        assert_eq!(plan.protected, vec![user(3, "Cho")]);
    }

    #[test]
    fn test_reconcile_added_and_deleted_are_disjoint() {
        let existing = vec![user(1, "Ami"), user(2, "Ben")];
        let incoming = vec![entry("Ben"), entry("Cho")];

        let plan = reconcile(&existing, &incoming, &[]);

        for added in &plan.to_add {
            assert!(plan.to_delete.iter().all(|u| u.name.trim() != added.name));
        }
        assert!(plan.protected.is_empty());
    }

    #[test]
    fn test_report_message() {
        let report = RosterReport { added: 2, deleted: 1, protected: 0 };
        assert_eq!(report.to_string(), "Added 2, deleted 1");

        let report = RosterReport { added: 0, deleted: 0, protected: 3 };
        assert_eq!(report.to_string(), "Added 0, deleted 0, kept 3 with submissions");
    }
}
