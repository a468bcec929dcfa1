// src/quiz.rs

//! Quiz-taking state machine: `start → taking → complete`.
//!
//! A `QuizSession` follows one respondent through one project. Registered
//! respondents leave an Attempt per grading and at most one Submission;
//! guests never touch the data store.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    db::StoreError,
    models::{
        project::Project,
        question::{OPTION_COUNT, PublicQuestion, Question},
        submission::Submission,
        user::User,
    },
    store::StateStore,
};

/// Who is taking the quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Respondent {
    Registered { user_id: i64, name: String },
    Guest,
}

impl Respondent {
    fn user_id(&self) -> Option<i64> {
        match self {
            Respondent::Registered { user_id, .. } => Some(*user_id),
            Respondent::Guest => None,
        }
    }
}

/// Identity chosen on the start screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Identity {
    User { user_id: i64 },
    Guest { guest: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grade {
    pub score: usize,
    pub total: usize,
}

impl Grade {
    pub fn is_perfect(&self) -> bool {
        self.score == self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizState {
    Start,
    Taking,
    Complete,
}

impl fmt::Display for QuizState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuizState::Start => "start",
            QuizState::Taking => "taking",
            QuizState::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Actions the respondent may trigger from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizAction {
    SelectIdentity,
    Answer,
    Grade,
    Retry,
    Submit,
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuizError {
    InvalidTransition {
        action: &'static str,
        state: QuizState,
    },
    GuestsDisabled,
    /// Neither a roster user nor `guest: true` was chosen.
    InvalidIdentity,
    UnknownUser(i64),
    UnknownQuestion(i64),
    InvalidOption(u8),
    NoQuestions,
    Incomplete {
        answered: usize,
        total: usize,
    },
    /// Answers are locked once graded; retry first.
    AlreadyGraded,
    NotPassed,
    Store(StoreError),
}

impl fmt::Display for QuizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizError::InvalidTransition { action, state } => {
                write!(f, "Cannot {} while the quiz is in state '{}'", action, state)
            }
            QuizError::GuestsDisabled => write!(f, "Guest mode is disabled"),
            QuizError::InvalidIdentity => {
                write!(f, "Choose a user from the roster or continue as a guest")
            }
            QuizError::UnknownUser(id) => write!(f, "User {} is not on the roster", id),
            QuizError::UnknownQuestion(id) => {
                write!(f, "Question {} is not part of this quiz", id)
            }
            QuizError::InvalidOption(option) => {
                write!(f, "Option {} is out of range 1-{}", option, OPTION_COUNT)
            }
            QuizError::NoQuestions => write!(f, "This quiz has no questions"),
            QuizError::Incomplete { answered, total } => {
                write!(f, "Answer every question first ({}/{})", answered, total)
            }
            QuizError::AlreadyGraded => write!(f, "Answers are locked after grading"),
            QuizError::NotPassed => write!(f, "A perfect score is required to submit"),
            QuizError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for QuizError {}

impl From<StoreError> for QuizError {
    fn from(err: StoreError) -> Self {
        QuizError::Store(err)
    }
}

/// Users who may still take `project_id`: everyone without a submission for it.
pub fn eligible_respondents(
    users: &[User],
    submissions: &[Submission],
    project_id: i64,
) -> Vec<User> {
    users
        .iter()
        .filter(|u| {
            !submissions
                .iter()
                .any(|s| s.project_id == project_id && s.user_id == u.id)
        })
        .cloned()
        .collect()
}

/// Counts questions whose recorded option equals the answer key.
/// Unanswered questions count as incorrect.
pub fn grade_answers(questions: &[Question], answers: &HashMap<i64, u8>) -> Grade {
    let score = questions
        .iter()
        .filter(|q| answers.get(&q.id).is_some_and(|&a| q.is_correct(a)))
        .count();

    Grade {
        score,
        total: questions.len(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Start,
    Taking {
        respondent: Respondent,
        answers: HashMap<i64, u8>,
        grade: Option<Grade>,
    },
    Complete {
        respondent: Respondent,
        submission: Option<Submission>,
    },
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub state: QuizState,
    pub project_id: i64,
    pub project_name: String,
    pub respondent: Option<Respondent>,
    pub questions: Vec<PublicQuestion>,
    pub answers: HashMap<i64, u8>,
    pub grade: Option<Grade>,
    pub no_questions: bool,
    pub actions: Vec<QuizAction>,
    pub submission: Option<Submission>,
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    project: Project,
    allow_guests: bool,
    phase: Phase,
}

impl QuizSession {
    /// The transcript is not needed to take the quiz and is dropped from the copy.
    pub fn new(mut project: Project, allow_guests: bool) -> Self {
        project.transcript = String::new();
        Self {
            project,
            allow_guests,
            phase: Phase::Start,
        }
    }

    pub fn state(&self) -> QuizState {
        match self.phase {
            Phase::Start => QuizState::Start,
            Phase::Taking { .. } => QuizState::Taking,
            Phase::Complete { .. } => QuizState::Complete,
        }
    }

    pub fn project_id(&self) -> i64 {
        self.project.id
    }

    fn invalid(&self, action: &'static str) -> QuizError {
        QuizError::InvalidTransition {
            action,
            state: self.state(),
        }
    }

    /// `start → taking`. A registered respondent who already submitted goes
    /// straight to `complete`.
    pub async fn begin(&mut self, identity: Identity, store: &StateStore) -> Result<(), QuizError> {
        if !matches!(self.phase, Phase::Start) {
            return Err(self.invalid("select an identity"));
        }

        let respondent = match identity {
            Identity::User { user_id } => {
                let user = store
                    .user(user_id)
                    .await
                    .ok_or(QuizError::UnknownUser(user_id))?;
                Respondent::Registered {
                    user_id: user.id,
                    name: user.name,
                }
            }
            Identity::Guest { guest: false } => return Err(QuizError::InvalidIdentity),
            Identity::Guest { .. } if !self.allow_guests => return Err(QuizError::GuestsDisabled),
            Identity::Guest { .. } => Respondent::Guest,
        };

        self.phase = Phase::Taking {
            respondent,
            answers: HashMap::new(),
            grade: None,
        };
        self.sync(store).await;
        Ok(())
    }

    /// Forces `complete` if the respondent already has a submission.
    /// Safe to call any number of times.
    pub async fn sync(&mut self, store: &StateStore) {
        let Phase::Taking { respondent, .. } = &self.phase else {
            return;
        };
        let Some(user_id) = respondent.user_id() else {
            return;
        };

        if let Some(submission) = store.submission_for(self.project.id, user_id).await {
            tracing::debug!(
                project_id = self.project.id,
                user_id,
                "Respondent already submitted, completing session"
            );
            self.phase = Phase::Complete {
                respondent: respondent.clone(),
                submission: Some(submission),
            };
        }
    }

    /// Records (or overwrites) the chosen option for a question.
    pub fn answer(&mut self, question_id: i64, option: u8) -> Result<(), QuizError> {
        if !(1..=OPTION_COUNT as u8).contains(&option) {
            return Err(QuizError::InvalidOption(option));
        }
        if !self.project.questions.iter().any(|q| q.id == question_id) {
            return Err(QuizError::UnknownQuestion(question_id));
        }

        let Phase::Taking { answers, grade, .. } = &mut self.phase else {
            return Err(self.invalid("answer"));
        };
        if grade.is_some() {
            return Err(QuizError::AlreadyGraded);
        }
        answers.insert(question_id, option);
        Ok(())
    }

    /// Grades the current answers. Registered respondents get an Attempt
    /// recorded; if that write fails the grade is not applied.
    pub async fn grade(&mut self, store: &StateStore) -> Result<Grade, QuizError> {
        let (respondent, result) = match &self.phase {
            Phase::Taking {
                grade: Some(_), ..
            } => return Err(QuizError::AlreadyGraded),
            Phase::Taking {
                respondent,
                answers,
                ..
            } => {
                let total = self.project.questions.len();
                if total == 0 {
                    return Err(QuizError::NoQuestions);
                }
                let answered = self
                    .project
                    .questions
                    .iter()
                    .filter(|q| answers.contains_key(&q.id))
                    .count();
                if answered < total {
                    return Err(QuizError::Incomplete { answered, total });
                }
                (
                    respondent.clone(),
                    grade_answers(&self.project.questions, answers),
                )
            }
            _ => return Err(self.invalid("grade")),
        };

        if let Some(user_id) = respondent.user_id() {
            store
                .record_attempt(self.project.id, user_id, result.score as i64)
                .await?;
        }

        if let Phase::Taking { grade, .. } = &mut self.phase {
            *grade = Some(result);
        }
        tracing::info!(
            project_id = self.project.id,
            score = result.score,
            total = result.total,
            "Quiz graded"
        );
        Ok(result)
    }

    /// Clears every answer after a failed grade.
    pub fn retry(&mut self) -> Result<(), QuizError> {
        match &mut self.phase {
            Phase::Taking { answers, grade, .. } if grade.is_some_and(|g| !g.is_perfect()) => {
                answers.clear();
                *grade = None;
                Ok(())
            }
            _ => Err(self.invalid("retry")),
        }
    }

    /// `taking → complete` after a perfect grade.
    ///
    /// Registered respondents get exactly one Submission whose `attempt_count`
    /// is read from the data store. On any store failure the session stays in
    /// `taking` with its passed grade.
    pub async fn submit(&mut self, store: &StateStore) -> Result<(), QuizError> {
        let respondent = match &self.phase {
            Phase::Taking {
                respondent,
                grade: Some(grade),
                ..
            } if grade.is_perfect() => respondent.clone(),
            Phase::Taking { .. } => return Err(QuizError::NotPassed),
            _ => return Err(self.invalid("submit")),
        };

        let Some(user_id) = respondent.user_id() else {
            self.phase = Phase::Complete {
                respondent,
                submission: None,
            };
            return Ok(());
        };
        let project_id = self.project.id;

        if let Some(existing) = store.submission_for(project_id, user_id).await {
            self.phase = Phase::Complete {
                respondent,
                submission: Some(existing),
            };
            return Ok(());
        }

        let attempt_count = store.count_attempts(project_id, user_id).await?;
        let submission = match store
            .create_submission(project_id, user_id, attempt_count)
            .await
        {
            Ok(submission) => submission,
            Err(err @ StoreError::DuplicateSubmission { .. }) => {
                tracing::warn!(project_id, user_id, "Concurrent submission detected");
                store
                    .fetch_submission(project_id, user_id)
                    .await?
                    .ok_or(QuizError::Store(err))?
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            project_id,
            user_id,
            attempt_count = submission.attempt_count,
            "Submission recorded"
        );
        self.phase = Phase::Complete {
            respondent,
            submission: Some(submission),
        };
        Ok(())
    }

    /// `complete → start`, guests only.
    pub fn reset(&mut self) -> Result<(), QuizError> {
        match &self.phase {
            Phase::Complete {
                respondent: Respondent::Guest,
                ..
            } => {
                self.phase = Phase::Start;
                Ok(())
            }
            _ => Err(self.invalid("return to start")),
        }
    }

    pub fn actions(&self) -> Vec<QuizAction> {
        match &self.phase {
            Phase::Start => vec![QuizAction::SelectIdentity],
            Phase::Taking { .. } if self.project.questions.is_empty() => Vec::new(),
            Phase::Taking {
                grade: Some(grade), ..
            } => {
                if grade.is_perfect() {
                    vec![QuizAction::Submit]
                } else {
                    vec![QuizAction::Retry]
                }
            }
            Phase::Taking { answers, .. } => {
                let all_answered = self
                    .project
                    .questions
                    .iter()
                    .all(|q| answers.contains_key(&q.id));
                if all_answered {
                    vec![QuizAction::Answer, QuizAction::Grade]
                } else {
                    vec![QuizAction::Answer]
                }
            }
            Phase::Complete {
                respondent: Respondent::Guest,
                ..
            } => vec![QuizAction::Reset],
            Phase::Complete { .. } => Vec::new(),
        }
    }

    pub fn view(&self) -> SessionView {
        let (respondent, answers, grade, submission) = match &self.phase {
            Phase::Start => (None, HashMap::new(), None, None),
            Phase::Taking {
                respondent,
                answers,
                grade,
            } => (Some(respondent.clone()), answers.clone(), *grade, None),
            Phase::Complete {
                respondent,
                submission,
            } => (Some(respondent.clone()), HashMap::new(), None, submission.clone()),
        };

        let questions = match self.phase {
            Phase::Taking { .. } => self.project.questions.iter().map(PublicQuestion::from).collect(),
            _ => Vec::new(),
        };

        SessionView {
            state: self.state(),
            project_id: self.project.id,
            project_name: self.project.name.clone(),
            respondent,
            questions,
            answers,
            grade,
            no_questions: self.project.questions.is_empty(),
            actions: self.actions(),
            submission,
        }
    }
}
