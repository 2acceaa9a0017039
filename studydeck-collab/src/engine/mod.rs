//! Collab engine
//!
//! The service facade the API layer calls into. Holds the database pool,
//! the event bus, the profanity censor seam, and the per-study-set
//! publish locks. Operations live in submodules:
//! - [`attempt`]: seed a new draft submission from the prior one
//! - [`merge`]: validate, sanitize and publish a submission

mod attempt;
mod merge;

use std::sync::Arc;

use sqlx::SqlitePool;
use studydeck_common::events::EventBus;

use crate::locks::StudySetLocks;
use crate::sanitize::{Censor, WordListCensor};

/// Collaborative term merge engine
pub struct CollabEngine {
    db: SqlitePool,
    events: EventBus,
    censor: Arc<dyn Censor>,
    locks: StudySetLocks,
}

impl CollabEngine {
    /// Create an engine with the default word-list censor
    pub fn new(db: SqlitePool, events: EventBus) -> Self {
        Self::with_censor(db, events, Arc::new(WordListCensor::default()))
    }

    /// Create an engine with an injected censor implementation
    pub fn with_censor(db: SqlitePool, events: EventBus, censor: Arc<dyn Censor>) -> Self {
        Self {
            db,
            events,
            censor,
            locks: StudySetLocks::new(),
        }
    }

    pub(crate) fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) fn censor(&self) -> &dyn Censor {
        self.censor.as_ref()
    }

    pub(crate) fn locks(&self) -> &StudySetLocks {
        &self.locks
    }
}
