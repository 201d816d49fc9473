use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use course_core::Clock;
use course_core::model::{CompletionRecord, CompletionState, CourseId, LearnerId, LessonId};
use storage::repository::CompletionRepository;
use tracing::{debug, info, warn};

use crate::error::CourseError;
use crate::revision::{Revision, lock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Mark,
    Unmark,
}

/// Result of a completion mutation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The store accepted the write and the mirror reflects it.
    Applied,
    /// Another mutation for the same lesson is still pending; nothing was sent.
    AlreadyPending,
}

#[derive(Debug, Clone, Copy)]
struct JournalEntry {
    seq: u64,
    lesson_id: LessonId,
    mutation: Mutation,
}

#[derive(Debug, Default)]
struct StoreState {
    completed: HashSet<LessonId>,
    loaded: bool,
    in_flight: HashMap<LessonId, Mutation>,
    load_issued: u64,
    load_applied: u64,
    outstanding_loads: usize,
    write_seq: u64,
    // writes that landed while a load was outstanding
    journal: Vec<JournalEntry>,
}

impl StoreState {
    fn apply(&mut self, lesson_id: LessonId, mutation: Mutation) {
        match mutation {
            Mutation::Mark => self.completed.insert(lesson_id),
            Mutation::Unmark => self.completed.remove(&lesson_id),
        };
    }

    fn record_write(&mut self, lesson_id: LessonId, mutation: Mutation) {
        self.apply(lesson_id, mutation);
        self.write_seq += 1;
        if self.outstanding_loads > 0 {
            self.journal.push(JournalEntry {
                seq: self.write_seq,
                lesson_id,
                mutation,
            });
        }
    }
}

struct LoadGuard<'a> {
    state: &'a Mutex<StoreState>,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        state.outstanding_loads -= 1;
        if state.outstanding_loads == 0 {
            state.journal.clear();
        }
    }
}

struct InFlight<'a> {
    state: &'a Mutex<StoreState>,
    lesson_id: LessonId,
    armed: bool,
}

impl InFlight<'_> {
    fn finish(&mut self, state: &mut StoreState) {
        state.in_flight.remove(&self.lesson_id);
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.state).in_flight.remove(&self.lesson_id);
        }
    }
}

/// Which lessons of one course a learner has finished.
///
/// The backing store is the source of truth; this type keeps a mirror that is
/// changed only after the store confirms a write, and allows at most one
/// pending mutation per lesson.
pub struct CompletionStore {
    learner_id: LearnerId,
    course_id: CourseId,
    clock: Clock,
    repo: Arc<dyn CompletionRepository>,
    state: Mutex<StoreState>,
    revision: Arc<Revision>,
}

impl CompletionStore {
    pub(crate) fn new(
        learner_id: LearnerId,
        course_id: CourseId,
        clock: Clock,
        repo: Arc<dyn CompletionRepository>,
        revision: Arc<Revision>,
    ) -> Self {
        Self {
            learner_id,
            course_id,
            clock,
            repo,
            state: Mutex::new(StoreState::default()),
            revision,
        }
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    /// Replace the mirror with the learner's stored completions for the course.
    ///
    /// Writes confirmed while the fetch was outstanding are replayed on top of
    /// the fetched set, and a fetch overtaken by a newer one is dropped.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Fetch` on transport failure; the previous mirror
    /// is kept.
    pub async fn load(&self) -> Result<HashSet<LessonId>, CourseError> {
        let (ticket, started_at) = {
            let mut state = lock(&self.state);
            state.load_issued += 1;
            state.outstanding_loads += 1;
            (state.load_issued, state.write_seq)
        };
        let guard = LoadGuard { state: &self.state };

        let records = match self
            .repo
            .completions_for(self.learner_id, self.course_id)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(course_id = %self.course_id, error = %e, "completion load failed, keeping previous mirror");
                return Err(CourseError::fetch("completions")(e));
            }
        };

        let applied = {
            let mut state = lock(&self.state);
            if ticket > state.load_applied {
                let fetched: HashSet<LessonId> = records.iter().map(|r| r.lesson_id).collect();
                let replay: Vec<JournalEntry> = state
                    .journal
                    .iter()
                    .filter(|entry| entry.seq > started_at)
                    .copied()
                    .collect();
                state.completed = fetched;
                for entry in replay {
                    state.apply(entry.lesson_id, entry.mutation);
                }
                state.loaded = true;
                state.load_applied = ticket;
                true
            } else {
                false
            }
        };
        drop(guard);

        if applied {
            debug!(course_id = %self.course_id, count = self.completed_count(), "completions loaded");
            self.revision.bump();
        } else {
            debug!(course_id = %self.course_id, ticket, "dropping out-of-order completion load");
        }
        Ok(self.completed_ids())
    }

    /// Upsert a completion for `lesson_id` stamped with the store's clock.
    ///
    /// Marking an already completed lesson refreshes its timestamp.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Persist` if the store rejects the write; the
    /// mirror is left untouched.
    pub async fn mark_complete(&self, lesson_id: LessonId) -> Result<MutationOutcome, CourseError> {
        let record = CompletionRecord::new(
            self.learner_id,
            self.course_id,
            lesson_id,
            self.clock.now(),
        );
        self.mutate(lesson_id, Mutation::Mark, async {
            self.repo.upsert_completion(&record).await.map(|()| true)
        })
        .await
    }

    /// Remove the completion for `lesson_id`. A missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::Persist` if the store cannot be reached.
    pub async fn unmark_complete(
        &self,
        lesson_id: LessonId,
    ) -> Result<MutationOutcome, CourseError> {
        self.mutate(lesson_id, Mutation::Unmark, async {
            self.repo
                .delete_completion(self.learner_id, self.course_id, lesson_id)
                .await
        })
        .await
    }

    async fn mutate<F>(
        &self,
        lesson_id: LessonId,
        mutation: Mutation,
        write: F,
    ) -> Result<MutationOutcome, CourseError>
    where
        F: Future<Output = Result<bool, storage::repository::StorageError>>,
    {
        {
            let mut state = lock(&self.state);
            if let Some(pending) = state.in_flight.get(&lesson_id) {
                warn!(%lesson_id, ?pending, ?mutation, "completion mutation already pending, ignoring");
                return Ok(MutationOutcome::AlreadyPending);
            }
            state.in_flight.insert(lesson_id, mutation);
        }
        let mut in_flight = InFlight {
            state: &self.state,
            lesson_id,
            armed: true,
        };
        self.revision.bump();

        match write.await {
            Ok(changed) => {
                {
                    let mut state = lock(&self.state);
                    in_flight.finish(&mut state);
                    state.record_write(lesson_id, mutation);
                }
                info!(%lesson_id, ?mutation, changed, "completion saved");
                self.revision.bump();
                Ok(MutationOutcome::Applied)
            }
            Err(e) => {
                drop(in_flight);
                warn!(%lesson_id, ?mutation, error = %e, "completion write failed");
                self.revision.bump();
                Err(CourseError::persist("completion")(e))
            }
        }
    }

    /// False until the first successful load.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        lock(&self.state).loaded
    }

    #[must_use]
    pub fn is_completed(&self, lesson_id: LessonId) -> bool {
        lock(&self.state).completed.contains(&lesson_id)
    }

    #[must_use]
    pub fn is_pending(&self, lesson_id: LessonId) -> bool {
        lock(&self.state).in_flight.contains_key(&lesson_id)
    }

    /// Size of the mirror, including completions of lessons no longer in the catalog.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        lock(&self.state).completed.len()
    }

    #[must_use]
    pub fn completed_ids(&self) -> HashSet<LessonId> {
        lock(&self.state).completed.clone()
    }

    #[must_use]
    pub fn completion_state(&self, lesson_id: LessonId) -> CompletionState {
        let state = lock(&self.state);
        CompletionState::derive(
            state.loaded,
            state.completed.contains(&lesson_id),
            state.in_flight.get(&lesson_id) == Some(&Mutation::Mark),
        )
    }
}
