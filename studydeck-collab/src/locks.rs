//! Per-study-set publish serialization
//!
//! The published-rank sequence is the one shared mutable resource with a
//! correctness-critical invariant. Reading the published count and then
//! writing offset ranks is only correct if no other publish runs between
//! the two, so every publish for a study set takes that set's async lock
//! for the duration of the count-then-append. Publishes against
//! different study sets never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// Registry handing out one async mutex per study set id, created lazily
#[derive(Clone, Default)]
pub struct StudySetLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
}

impl StudySetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the publish lock for a study set, waiting if another
    /// publish on the same set holds it. The guard releases on drop.
    pub async fn acquire(&self, study_set_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("study set lock registry poisoned");
            map.entry(study_set_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
