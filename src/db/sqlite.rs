// src/db/sqlite.rs

use std::{collections::HashMap, str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    FromRow, Sqlite, SqlitePool, Transaction,
    error::ErrorKind,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    types::Json,
};

use super::{DataStore, StoreError, StoreResult};
use crate::models::{
    attempt::{Attempt, NewAttempt},
    project::{NewProject, Project, ProjectChanges},
    question::{NewQuestion, Question},
    submission::{NewSubmission, Submission},
    user::{NewUser, User, UserChanges, UserRole},
};

#[derive(FromRow)]
struct UserRow {
    id: i64,
    name: String,
    role: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            role: row.role.as_deref().map(UserRole::from_db),
            created_at: Some(row.created_at),
        }
    }
}

#[derive(FromRow)]
struct ProjectRow {
    id: i64,
    name: String,
    transcript: String,
    is_published: bool,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    project_id: i64,
    question_text: String,
    options: Json<Vec<String>>,
    correct_answer: i64,
}

impl TryFrom<QuestionRow> for Question {
    type Error = StoreError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let options = row.options.0.try_into().map_err(|opts: Vec<String>| {
            StoreError::Database(format!(
                "question {} has {} options stored",
                row.id,
                opts.len()
            ))
        })?;
        let correct_answer = u8::try_from(row.correct_answer).map_err(|_| {
            StoreError::Database(format!("question {} has an invalid answer key", row.id))
        })?;

        Ok(Question {
            id: row.id,
            question_text: row.question_text,
            options,
            correct_answer,
        })
    }
}

fn assemble(project: ProjectRow, questions: Vec<Question>) -> Project {
    Project {
        id: project.id,
        name: project.name,
        transcript: project.transcript,
        questions,
        is_published: project.is_published,
        created_at: project.created_at,
    }
}

/// SQLite-backed `DataStore`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `url` with foreign keys enforced.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Private in-memory database, migrated and ready to use.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // Every connection to `:memory:` is a separate database, so pin one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_user(&self, id: i64) -> StoreResult<User> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, name, role, created_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::from)
        .ok_or_else(|| StoreError::NotFound("User".to_string()))
    }

    async fn fetch_questions(&self, project_id: i64) -> StoreResult<Vec<Question>> {
        sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, project_id, question_text, options, correct_answer
            FROM questions
            WHERE project_id = ?1
            ORDER BY position
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Question::try_from)
        .collect()
    }
}

/// Inserts `questions` in order. Callers own the transaction.
async fn insert_questions(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: i64,
    questions: &[NewQuestion],
) -> StoreResult<()> {
    for (position, q) in questions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO questions (project_id, position, question_text, options, correct_answer)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(project_id)
        .bind(position as i64)
        .bind(&q.question_text)
        .bind(Json(q.options.to_vec()))
        .bind(q.correct_answer as i64)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, role, created_at FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn insert_user(&self, user: &NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, role, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id, name, role, created_at
            "#,
        )
        .bind(user.name.trim())
        .bind(user.role.map(|r| r.as_str()))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update_user(&self, id: i64, changes: &UserChanges) -> StoreResult<User> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?1, name),
                role = COALESCE(?2, role)
            WHERE id = ?3
            "#,
        )
        .bind(changes.name.as_deref().map(str::trim))
        .bind(changes.role.map(|r| r.as_str()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("User".to_string()));
        }

        self.fetch_user(id).await
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let (submissions,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM submissions WHERE user_id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        if submissions > 0 {
            return Err(StoreError::HasSubmissions { user_id: id });
        }

        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.kind() == ErrorKind::ForeignKeyViolation => {
                    StoreError::HasSubmissions { user_id: id }
                }
                _ => StoreError::from(e),
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("User".to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let projects = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, name, transcript, is_published, created_at FROM projects ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let question_rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, project_id, question_text, options, correct_answer
            FROM questions
            ORDER BY project_id, position
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_project: HashMap<i64, Vec<Question>> = HashMap::new();
        for row in question_rows {
            let project_id = row.project_id;
            by_project
                .entry(project_id)
                .or_default()
                .push(Question::try_from(row)?);
        }

        Ok(projects
            .into_iter()
            .map(|p| {
                let questions = by_project.remove(&p.id).unwrap_or_default();
                assemble(p, questions)
            })
            .collect())
    }

    async fn get_project(&self, id: i64) -> StoreResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, name, transcript, is_published, created_at FROM projects WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(p) => {
                let questions = self.fetch_questions(p.id).await?;
                Ok(Some(assemble(p, questions)))
            }
            None => Ok(None),
        }
    }

    async fn insert_project(&self, project: &NewProject) -> StoreResult<Project> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO projects (name, transcript, is_published, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            "#,
        )
        .bind(project.name.trim())
        .bind(&project.transcript)
        .bind(project.is_published)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        insert_questions(&mut tx, id, &project.questions).await?;
        tx.commit().await?;

        self.get_project(id)
            .await?
            .ok_or_else(|| StoreError::NotFound("Project".to_string()))
    }

    async fn update_project(&self, id: i64, changes: &ProjectChanges) -> StoreResult<Project> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE projects SET
                name = COALESCE(?1, name),
                transcript = COALESCE(?2, transcript),
                is_published = COALESCE(?3, is_published)
            WHERE id = ?4
            "#,
        )
        .bind(changes.name.as_deref().map(str::trim))
        .bind(changes.transcript.as_deref())
        .bind(changes.is_published)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Project".to_string()));
        }

        // No merge path: the question list is replaced wholesale.
        if let Some(questions) = &changes.questions {
            sqlx::query("DELETE FROM questions WHERE project_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_questions(&mut tx, id, questions).await?;
        }

        tx.commit().await?;

        self.get_project(id)
            .await?
            .ok_or_else(|| StoreError::NotFound("Project".to_string()))
    }

    async fn delete_project(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Project".to_string()));
        }
        Ok(())
    }

    async fn list_submissions(&self) -> StoreResult<Vec<Submission>> {
        let submissions = sqlx::query_as::<_, Submission>(
            "SELECT id, project_id, user_id, submitted_at, attempt_count FROM submissions ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(submissions)
    }

    async fn find_submission(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> StoreResult<Option<Submission>> {
        let submission = sqlx::query_as::<_, Submission>(
            r#"
            SELECT id, project_id, user_id, submitted_at, attempt_count
            FROM submissions
            WHERE project_id = ?1 AND user_id = ?2
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(submission)
    }

    async fn insert_submission(&self, submission: &NewSubmission) -> StoreResult<Submission> {
        sqlx::query_as::<_, Submission>(
            r#"
            INSERT INTO submissions (project_id, user_id, submitted_at, attempt_count)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, project_id, user_id, submitted_at, attempt_count
            "#,
        )
        .bind(submission.project_id)
        .bind(submission.user_id)
        .bind(submission.submitted_at)
        .bind(submission.attempt_count)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.kind() == ErrorKind::UniqueViolation => {
                StoreError::DuplicateSubmission {
                    project_id: submission.project_id,
                    user_id: submission.user_id,
                }
            }
            _ => StoreError::from(e),
        })
    }

    async fn delete_submission(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM submissions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Submission".to_string()));
        }
        Ok(())
    }

    async fn list_attempts(&self) -> StoreResult<Vec<Attempt>> {
        let attempts = sqlx::query_as::<_, Attempt>(
            "SELECT id, project_id, user_id, score, attempted_at FROM attempts ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(attempts)
    }

    async fn insert_attempt(&self, attempt: &NewAttempt) -> StoreResult<Attempt> {
        let attempt = sqlx::query_as::<_, Attempt>(
            r#"
            INSERT INTO attempts (project_id, user_id, score, attempted_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, project_id, user_id, score, attempted_at
            "#,
        )
        .bind(attempt.project_id)
        .bind(attempt.user_id)
        .bind(attempt.score)
        .bind(attempt.attempted_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn count_attempts(&self, project_id: i64, user_id: i64) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM attempts WHERE project_id = ?1 AND user_id = ?2",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
