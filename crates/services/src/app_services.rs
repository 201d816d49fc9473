use std::sync::Arc;

use course_core::model::LearnerId;
use storage::repository::Storage;
use storage::rest::RestConfig;
use tokio::sync::mpsc;

use crate::Clock;
use crate::error::AppServicesError;
use crate::realtime::{ChangeEvent, RealtimeSync};
use crate::session::LearnerSession;

/// Assembles the learner session over a chosen storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    session: Arc<LearnerSession>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, running migrations.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        learner_id: LearnerId,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, learner_id))
    }

    /// Build services backed by the hosted HTTP API.
    #[must_use]
    pub fn new_rest(config: RestConfig, clock: Clock, learner_id: LearnerId) -> Self {
        Self::from_storage(Storage::rest(config), clock, learner_id)
    }

    #[must_use]
    pub fn in_memory(clock: Clock, learner_id: LearnerId) -> Self {
        Self::from_storage(Storage::in_memory(), clock, learner_id)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, learner_id: LearnerId) -> Self {
        let session = Arc::new(LearnerSession::new(learner_id, clock, storage.clone()));
        Self { storage, session }
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn session(&self) -> Arc<LearnerSession> {
        Arc::clone(&self.session)
    }

    /// Spawn a task that applies change events to the session until the
    /// returned sender is dropped.
    #[must_use]
    pub fn spawn_realtime(&self, buffer: usize) -> (mpsc::Sender<ChangeEvent>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer);
        let sync = RealtimeSync::new(self.session());
        let handle = tokio::spawn(sync.run(rx));
        (tx, handle)
    }
}
