// tests/quiz_failure_tests.rs

mod common;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use common::{
    answer, create_project, create_user, open_session, question_ids, session_action, spawn_with,
    state_store, test_config,
};
use serde_json::{Value, json};
use transcript_quiz::{
    db::{DataStore, SqliteStore, StoreError, StoreResult},
    models::{
        attempt::{Attempt, NewAttempt},
        project::{NewProject, Project, ProjectChanges},
        submission::{NewSubmission, Submission},
        user::{NewUser, User, UserChanges},
    },
};

/// Wraps a real store; while `down` is set, result writes and counts fail as unreachable.
struct FlakyStore {
    inner: SqliteStore,
    down: Arc<AtomicBool>,
}

impl FlakyStore {
    fn check(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DataStore for FlakyStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.inner.list_users().await
    }
    async fn insert_user(&self, user: &NewUser) -> StoreResult<User> {
        self.inner.insert_user(user).await
    }
    async fn update_user(&self, id: i64, changes: &UserChanges) -> StoreResult<User> {
        self.inner.update_user(id, changes).await
    }
    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        self.inner.delete_user(id).await
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        self.inner.list_projects().await
    }
    async fn get_project(&self, id: i64) -> StoreResult<Option<Project>> {
        self.inner.get_project(id).await
    }
    async fn insert_project(&self, project: &NewProject) -> StoreResult<Project> {
        self.inner.insert_project(project).await
    }
    async fn update_project(&self, id: i64, changes: &ProjectChanges) -> StoreResult<Project> {
        self.inner.update_project(id, changes).await
    }
    async fn delete_project(&self, id: i64) -> StoreResult<()> {
        self.inner.delete_project(id).await
    }

    async fn list_submissions(&self) -> StoreResult<Vec<Submission>> {
        self.inner.list_submissions().await
    }
    async fn find_submission(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> StoreResult<Option<Submission>> {
        self.check()?;
        self.inner.find_submission(project_id, user_id).await
    }
    async fn insert_submission(&self, submission: &NewSubmission) -> StoreResult<Submission> {
        self.check()?;
        self.inner.insert_submission(submission).await
    }
    async fn delete_submission(&self, id: i64) -> StoreResult<()> {
        self.inner.delete_submission(id).await
    }

    async fn list_attempts(&self) -> StoreResult<Vec<Attempt>> {
        self.inner.list_attempts().await
    }
    async fn insert_attempt(&self, attempt: &NewAttempt) -> StoreResult<Attempt> {
        self.check()?;
        self.inner.insert_attempt(attempt).await
    }
    async fn count_attempts(&self, project_id: i64, user_id: i64) -> StoreResult<i64> {
        self.check()?;
        self.inner.count_attempts(project_id, user_id).await
    }
}

async fn spawn_flaky_app() -> (String, Arc<AtomicBool>) {
    let down = Arc::new(AtomicBool::new(false));
    let db = FlakyStore {
        inner: SqliteStore::in_memory()
            .await
            .expect("Failed to open in-memory database"),
        down: down.clone(),
    };
    let store = state_store(Arc::new(db)).await;
    (spawn_with(Some(store), test_config(None)).await, down)
}

#[tokio::test]
async fn failed_submit_keeps_passed_grade_and_can_be_retried() {
    // Arrange: a respondent with a perfect grade.
    let (address, down) = spawn_flaky_app().await;
    let client = reqwest::Client::new();
    let project = create_project(&client, &address, &[3]).await;
    let user = create_user(&client, &address, "Yui").await;

    let session = open_session(&client, &address, project["id"].as_i64().unwrap()).await;
    session_action(&client, &address, &session, "identity", Some(json!({ "user_id": user["id"] }))).await;
    answer(&client, &address, &session, question_ids(&project)[0], 3).await;
    let (status, _) = session_action(&client, &address, &session, "grade", None).await;
    assert_eq!(status, 200);

    // Act: the store goes away during submit.
    down.store(true, Ordering::SeqCst);
    let (status, body) = session_action(&client, &address, &session, "submit", None).await;

    // Assert: error surfaced, still taking, grade intact.
    assert_eq!(status, 503);
    assert!(body["error"].is_string());

    let view: Value = client
        .get(&format!("{}/api/quiz/sessions/{}", address, session))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(view["state"], "taking");
    assert_eq!(view["grade"], json!({ "score": 1, "total": 1 }));
    assert_eq!(view["actions"], json!(["submit"]));

    // Once the store is back the same session submits.
    down.store(false, Ordering::SeqCst);
    let (status, view) = session_action(&client, &address, &session, "submit", None).await;
    assert_eq!(status, 200);
    assert_eq!(view["state"], "complete");
    assert_eq!(view["submission"]["attempt_count"], 1);
}

#[tokio::test]
async fn failed_attempt_write_leaves_session_ungraded() {
    let (address, down) = spawn_flaky_app().await;
    let client = reqwest::Client::new();
    let project = create_project(&client, &address, &[1]).await;
    let user = create_user(&client, &address, "Rin").await;

    let session = open_session(&client, &address, project["id"].as_i64().unwrap()).await;
    session_action(&client, &address, &session, "identity", Some(json!({ "user_id": user["id"] }))).await;
    answer(&client, &address, &session, question_ids(&project)[0], 2).await;

    down.store(true, Ordering::SeqCst);
    let (status, _) = session_action(&client, &address, &session, "grade", None).await;
    assert_eq!(status, 503);

    down.store(false, Ordering::SeqCst);
    let view: Value = client
        .get(&format!("{}/api/quiz/sessions/{}", address, session))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert_eq!(view["state"], "taking");
    assert!(view["grade"].is_null());

    let attempts: Vec<Value> = client
        .get(&format!("{}/api/admin/attempts", address))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .unwrap();
    assert!(attempts.is_empty());
}
