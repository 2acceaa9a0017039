//! Event types and the broadcast EventBus
//!
//! Events are emitted by the collab service after state changes and can be
//! serialized for SSE transmission to interested consumers (e.g. a search
//! indexer watching for staleness).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Application event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AppEvent {
    /// A study set's published term sequence changed; dependent caches
    /// (e.g. the search index) should treat the set as stale.
    ///
    /// Best-effort: emitted after a successful merge, never rolls one back.
    StudySetStale {
        study_set_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A submission's accepted terms were published into its study set
    SubmissionMerged {
        submission_id: Uuid,
        study_set_id: Uuid,
        /// Published term count of the study set after the merge
        published_count: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A new attempt (draft submission) was created for a member
    AttemptStarted {
        submission_id: Uuid,
        assignment_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl AppEvent {
    /// Event type string for SSE `event:` fields
    pub fn type_str(&self) -> &'static str {
        match self {
            AppEvent::StudySetStale { .. } => "StudySetStale",
            AppEvent::SubmissionMerged { .. } => "SubmissionMerged",
            AppEvent::AttemptStarted { .. } => "AttemptStarted",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: AppEvent) -> Result<usize, broadcast::error::SendError<AppEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    ///
    /// For fire-and-forget notifications where it is acceptable that no
    /// component is currently subscribed.
    pub fn emit_lossy(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
