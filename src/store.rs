// src/store.rs

//! Application state store.
//!
//! Owns the in-memory mirror of users, projects, submissions and attempts.
//! Every mutation goes to the data store first; the mirror is only updated
//! once the write succeeded. Nothing else writes to the mirror.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    db::{DataStore, StoreError, StoreResult},
    models::{
        attempt::{Attempt, NewAttempt},
        project::{NewProject, Project, ProjectChanges},
        submission::{NewSubmission, Submission},
        user::{NewUser, User, UserChanges},
    },
    roster::{self, RosterEntry, RosterReport},
};

#[derive(Debug, Default)]
struct Mirror {
    users: Vec<User>,
    projects: Vec<Project>,
    submissions: Vec<Submission>,
    attempts: Vec<Attempt>,
}

pub struct StateStore {
    db: Arc<dyn DataStore>,
    mirror: RwLock<Mirror>,
}

impl StateStore {
    /// Builds the store and fills the mirror from `db`.
    pub async fn load(db: Arc<dyn DataStore>) -> StoreResult<Self> {
        let store = StateStore {
            db,
            mirror: RwLock::new(Mirror::default()),
        };
        store.reload().await?;
        Ok(store)
    }

    /// Re-reads every collection from the data store.
    pub async fn reload(&self) -> StoreResult<()> {
        let users = self.db.list_users().await?;
        let projects = self.db.list_projects().await?;
        let submissions = self.db.list_submissions().await?;
        let attempts = self.db.list_attempts().await?;

        let mut mirror = self.mirror.write().await;
        *mirror = Mirror {
            users,
            projects,
            submissions,
            attempts,
        };
        tracing::debug!(
            users = mirror.users.len(),
            projects = mirror.projects.len(),
            "Mirror reloaded"
        );
        Ok(())
    }

    // --- Reads (mirror) ---

    pub async fn users(&self) -> Vec<User> {
        self.mirror.read().await.users.clone()
    }

    pub async fn user(&self, id: i64) -> Option<User> {
        self.mirror
            .read()
            .await
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
    }

    pub async fn projects(&self) -> Vec<Project> {
        self.mirror.read().await.projects.clone()
    }

    pub async fn published_projects(&self) -> Vec<Project> {
        self.mirror
            .read()
            .await
            .projects
            .iter()
            .filter(|p| p.is_published)
            .cloned()
            .collect()
    }

    pub async fn project(&self, id: i64) -> Option<Project> {
        self.mirror
            .read()
            .await
            .projects
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub async fn submissions(&self, project_id: Option<i64>) -> Vec<Submission> {
        self.mirror
            .read()
            .await
            .submissions
            .iter()
            .filter(|s| project_id.is_none_or(|id| s.project_id == id))
            .cloned()
            .collect()
    }

    pub async fn attempts(&self, project_id: Option<i64>) -> Vec<Attempt> {
        self.mirror
            .read()
            .await
            .attempts
            .iter()
            .filter(|a| project_id.is_none_or(|id| a.project_id == id))
            .cloned()
            .collect()
    }

    pub async fn submission_for(&self, project_id: i64, user_id: i64) -> Option<Submission> {
        self.mirror
            .read()
            .await
            .submissions
            .iter()
            .find(|s| s.project_id == project_id && s.user_id == user_id)
            .cloned()
    }

    // --- Users ---

    pub async fn add_user(&self, user: &NewUser) -> StoreResult<User> {
        let created = self.db.insert_user(user).await?;
        self.mirror.write().await.users.push(created.clone());
        Ok(created)
    }

    pub async fn update_user(&self, id: i64, changes: &UserChanges) -> StoreResult<User> {
        let updated = self.db.update_user(id, changes).await?;
        let mut mirror = self.mirror.write().await;
        if let Some(slot) = mirror.users.iter_mut().find(|u| u.id == id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }

    /// Deletes a user unless they have a submission.
    pub async fn delete_user(&self, id: i64) -> StoreResult<()> {
        if self
            .mirror
            .read()
            .await
            .submissions
            .iter()
            .any(|s| s.user_id == id)
        {
            return Err(StoreError::HasSubmissions { user_id: id });
        }

        self.db.delete_user(id).await?;

        let mut mirror = self.mirror.write().await;
        mirror.users.retain(|u| u.id != id);
        mirror.attempts.retain(|a| a.user_id != id);
        Ok(())
    }

    /// Replaces the roster with `incoming`, keeping anyone who has submitted.
    pub async fn replace_roster(&self, incoming: &[RosterEntry]) -> StoreResult<RosterReport> {
        let plan = {
            let mirror = self.mirror.read().await;
            roster::reconcile(&mirror.users, incoming, &mirror.submissions)
        };

        let mut report = RosterReport {
            added: 0,
            deleted: 0,
            protected: plan.protected.len(),
        };

        for entry in &plan.to_add {
            self.add_user(&NewUser {
                name: entry.name.clone(),
                role: Some(entry.role),
            })
            .await?;
            report.added += 1;
        }

        for user in &plan.to_delete {
            match self.delete_user(user.id).await {
                Ok(()) => report.deleted += 1,
                // Submitted after the plan was computed.
                Err(StoreError::HasSubmissions { .. }) => report.protected += 1,
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            added = report.added,
            deleted = report.deleted,
            protected = report.protected,
            "Roster replaced"
        );
        Ok(report)
    }

    // --- Projects ---

    pub async fn create_project(&self, project: &NewProject) -> StoreResult<Project> {
        let created = self.db.insert_project(project).await?;
        self.mirror.write().await.projects.insert(0, created.clone());
        Ok(created)
    }

    pub async fn update_project(&self, id: i64, changes: &ProjectChanges) -> StoreResult<Project> {
        let updated = self.db.update_project(id, changes).await?;
        let mut mirror = self.mirror.write().await;
        match mirror.projects.iter_mut().find(|p| p.id == id) {
            Some(slot) => *slot = updated.clone(),
            None => mirror.projects.insert(0, updated.clone()),
        }
        Ok(updated)
    }

    pub async fn set_published(&self, id: i64, is_published: bool) -> StoreResult<Project> {
        self.update_project(
            id,
            &ProjectChanges {
                is_published: Some(is_published),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete_project(&self, id: i64) -> StoreResult<()> {
        self.db.delete_project(id).await?;

        let mut mirror = self.mirror.write().await;
        mirror.projects.retain(|p| p.id != id);
        mirror.submissions.retain(|s| s.project_id != id);
        mirror.attempts.retain(|a| a.project_id != id);
        Ok(())
    }

    // --- Results ---

    pub async fn record_attempt(
        &self,
        project_id: i64,
        user_id: i64,
        score: i64,
    ) -> StoreResult<Attempt> {
        let attempt = self
            .db
            .insert_attempt(&NewAttempt {
                project_id,
                user_id,
                score,
                attempted_at: Utc::now(),
            })
            .await?;
        self.mirror.write().await.attempts.push(attempt.clone());
        Ok(attempt)
    }

    /// Attempt count read from the data store, never from the mirror.
    pub async fn count_attempts(&self, project_id: i64, user_id: i64) -> StoreResult<i64> {
        self.db.count_attempts(project_id, user_id).await
    }

    pub async fn create_submission(
        &self,
        project_id: i64,
        user_id: i64,
        attempt_count: i64,
    ) -> StoreResult<Submission> {
        let submission = self
            .db
            .insert_submission(&NewSubmission {
                project_id,
                user_id,
                submitted_at: Utc::now(),
                attempt_count,
            })
            .await?;
        self.remember_submission(submission.clone()).await;
        Ok(submission)
    }

    /// Reads the stored submission for a pair and mirrors it.
    pub async fn fetch_submission(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> StoreResult<Option<Submission>> {
        let found = self.db.find_submission(project_id, user_id).await?;
        if let Some(submission) = &found {
            self.remember_submission(submission.clone()).await;
        }
        Ok(found)
    }

    pub async fn delete_submission(&self, id: i64) -> StoreResult<()> {
        self.db.delete_submission(id).await?;
        self.mirror.write().await.submissions.retain(|s| s.id != id);
        Ok(())
    }

    async fn remember_submission(&self, submission: Submission) {
        let mut mirror = self.mirror.write().await;
        if !mirror.submissions.iter().any(|s| s.id == submission.id) {
            mirror.submissions.push(submission);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::SqliteStore,
        models::{question::NewQuestion, user::UserRole},
    };

    async fn setup() -> StateStore {
        let db = SqliteStore::in_memory().await.unwrap();
        StateStore::load(Arc::new(db)).await.unwrap()
    }

    fn entry(name: &str) -> RosterEntry {
        RosterEntry {
            name: name.to_string(),
            role: UserRole::Employee,
        }
    }

    async fn published_project(store: &StateStore) -> Project {
        store
            .create_project(&NewProject {
                name: "Retro".to_string(),
                transcript: String::new(),
                questions: vec![NewQuestion {
                    question_text: "Q?".to_string(),
                    options: ["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_answer: 3,
                }],
                is_published: true,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_writes_are_mirrored() {
        let store = setup().await;
        let user = store
            .add_user(&NewUser {
                name: "  Chika ".to_string(),
                role: None,
            })
            .await
            .unwrap();

        assert_eq!(user.name, "Chika");
        assert_eq!(store.users().await, vec![user.clone()]);

        let renamed = store
            .update_user(
                user.id,
                &UserChanges {
                    name: Some("Chika S.".to_string()),
                    role: Some(UserRole::Intern),
                },
            )
            .await
            .unwrap();
        assert_eq!(store.user(user.id).await, Some(renamed));
    }

    #[tokio::test]
    async fn test_delete_user_with_submission_keeps_everything() {
        let store = setup().await;
        let project = published_project(&store).await;
        let user = store
            .add_user(&NewUser {
                name: "Dai".to_string(),
                role: None,
            })
            .await
            .unwrap();
        store.record_attempt(project.id, user.id, 1).await.unwrap();
        store.create_submission(project.id, user.id, 1).await.unwrap();

        let err = store.delete_user(user.id).await.unwrap_err();

        assert_eq!(err, StoreError::HasSubmissions { user_id: user.id });
        assert_eq!(store.users().await.len(), 1);
        assert_eq!(store.submissions(None).await.len(), 1);
        assert_eq!(store.attempts(None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_roster_protects_submitters() {
        let store = setup().await;
        let project = published_project(&store).await;
        for name in ["Ami", "Ben", "Cho"] {
            store
                .add_user(&NewUser {
                    name: name.to_string(),
                    role: None,
                })
                .await
                .unwrap();
        }
        let ben = store
            .users()
            .await
            .into_iter()
            .find(|u| u.name == "Ben")
            .unwrap();
        store.create_submission(project.id, ben.id, 1).await.unwrap();

        let report = store
            .replace_roster(&[entry("Ami"), entry("Dee")])
            .await
            .unwrap();

        assert_eq!(
            report,
            RosterReport {
                added: 1,
                deleted: 1,
                protected: 1
            }
        );
        let mut names: Vec<String> = store.users().await.into_iter().map(|u| u.name).collect();
        names.sort();
        assert_eq!(names, vec!["Ami", "Ben", "Dee"]);

        // The mirror agrees with the data store.
        store.reload().await.unwrap();
        assert_eq!(store.users().await.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_project_drops_results_from_mirror() {
        let store = setup().await;
        let project = published_project(&store).await;
        let user = store
            .add_user(&NewUser {
                name: "Eri".to_string(),
                role: None,
            })
            .await
            .unwrap();
        store.record_attempt(project.id, user.id, 0).await.unwrap();

        store.delete_project(project.id).await.unwrap();

        assert!(store.project(project.id).await.is_none());
        assert!(store.attempts(Some(project.id)).await.is_empty());
        // Without submissions the user can now be removed.
        store.delete_user(user.id).await.unwrap();
    }
}
