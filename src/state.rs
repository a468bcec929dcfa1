// src/state.rs

use std::sync::Arc;

use crate::{
    config::Config, error::AppError, generation::QuestionGenerator, sessions::SessionRegistry,
    store::StateStore,
};

#[derive(Clone)]
pub struct AppState {
    /// `None` when the data store is not configured or was unreachable at startup.
    pub store: Option<Arc<StateStore>>,
    /// `None` when no generation credential is configured.
    pub generator: Option<QuestionGenerator>,
    pub sessions: Arc<SessionRegistry>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        store: Option<Arc<StateStore>>,
        generator: Option<QuestionGenerator>,
        config: Config,
    ) -> Self {
        Self {
            store,
            generator,
            sessions: Arc::new(SessionRegistry::new(
                config.session_ttl,
                config.max_sessions,
            )),
            config,
        }
    }

    /// The state store, or a 503 telling the caller the store is not configured.
    pub fn store(&self) -> Result<Arc<StateStore>, AppError> {
        self.store.clone().ok_or_else(|| {
            AppError::ServiceUnavailable("The data store is not configured".to_string())
        })
    }
}
