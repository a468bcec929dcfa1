// src/sessions.rs

//! Registry of live quiz sessions.
//!
//! Each session sits behind its own lock, held for the whole of a transition
//! including store I/O, so two requests on one session never interleave.
//! Sessions idle longer than the TTL expire; when the registry is full the
//! least recently used session is evicted.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{sync::Mutex, time::Instant};
use uuid::Uuid;

use crate::quiz::QuizSession;

pub type SharedSession = Arc<Mutex<QuizSession>>;

struct Entry {
    session: SharedSession,
    touched: Instant,
}

pub struct SessionRegistry {
    entries: Mutex<HashMap<Uuid, Entry>>,
    ttl: Duration,
    capacity: usize,
}

impl SessionRegistry {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Registers a new session, making room first if the registry is full.
    pub async fn open(&self, session: QuizSession) -> Uuid {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        self.sweep(&mut entries, now);

        while entries.len() >= self.capacity {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.touched)
                .map(|(id, _)| *id)
            else {
                break;
            };
            entries.remove(&oldest);
            tracing::debug!(session_id = %oldest, "Session registry full, evicted oldest session");
        }

        let id = Uuid::new_v4();
        entries.insert(
            id,
            Entry {
                session: Arc::new(Mutex::new(session)),
                touched: now,
            },
        );
        id
    }

    /// Looks a session up and marks it as used. Expired sessions are dropped.
    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let expired = entries
            .get(&id)
            .is_some_and(|e| now.duration_since(e.touched) >= self.ttl);
        if expired {
            entries.remove(&id);
            return None;
        }

        let entry = entries.get_mut(&id)?;
        entry.touched = now;
        Some(entry.session.clone())
    }

    /// Removes a session. Transitions already holding it finish on their own copy.
    pub async fn close(&self, id: Uuid) -> bool {
        self.entries.lock().await.remove(&id).is_some()
    }

    /// Drops every expired session, returning how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        self.sweep(&mut entries, Instant::now())
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    fn sweep(&self, entries: &mut HashMap<Uuid, Entry>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.touched) < self.ttl);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::Project;

    fn session() -> QuizSession {
        QuizSession::new(
            Project {
                id: 1,
                name: "Kickoff".to_string(),
                transcript: "x".repeat(1000),
                questions: Vec::new(),
                is_published: true,
                created_at: chrono::Utc::now(),
            },
            true,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_expire() {
        let registry = SessionRegistry::new(Duration::from_secs(60), 10);
        let idle = registry.open(session()).await;
        let active = registry.open(session()).await;

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(registry.get(active).await.is_some());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(registry.get(idle).await.is_none());
        assert!(registry.get(active).await.is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(registry.sweep_expired().await, 1);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_registry_evicts_least_recently_used() {
        let registry = SessionRegistry::new(Duration::from_secs(3600), 2);
        let first = registry.open(session()).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        let second = registry.open(session()).await;
        tokio::time::advance(Duration::from_secs(1)).await;

        // Touching the first makes the second the oldest.
        assert!(registry.get(first).await.is_some());
        tokio::time::advance(Duration::from_secs(1)).await;
        let third = registry.open(session()).await;

        assert_eq!(registry.len().await, 2);
        assert!(registry.get(second).await.is_none());
        assert!(registry.get(first).await.is_some());
        assert!(registry.get(third).await.is_some());
    }

    #[tokio::test]
    async fn test_close_removes_session() {
        let registry = SessionRegistry::new(Duration::from_secs(60), 10);
        let id = registry.open(session()).await;

        assert!(registry.close(id).await);
        assert!(!registry.close(id).await);
        assert!(registry.get(id).await.is_none());
    }
}
