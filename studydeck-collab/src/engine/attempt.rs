//! Attempt initialization
//!
//! A member who already submitted can start a fresh attempt. The new
//! draft is seeded with copies of the most recently submitted
//! submission's terms so the member continues from what was handed in,
//! not from a blank slate.

use studydeck_common::events::AppEvent;
use studydeck_common::{Error, Result};
use uuid::Uuid;

use super::CollabEngine;
use crate::store::submissions;

impl CollabEngine {
    /// Start a new attempt for `caller_id` against a collaborative
    /// assignment, seeded from the caller's latest submitted submission.
    ///
    /// Returns the new draft submission's id.
    ///
    /// Fails NotFound when no collaborative assignment exists or the
    /// caller has nothing submitted to re-attempt. A caller that reaches
    /// this point without a class membership row is an upstream
    /// authorization invariant violation and reports as Internal.
    pub async fn initialize_attempt(&self, assignment_id: Uuid, caller_id: &str) -> Result<Uuid> {
        let assignment = submissions::collab_assignment(self.db(), assignment_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("assignment {} not found", assignment_id))
            })?;

        let member = submissions::class_member(self.db(), &assignment.class_id, caller_id)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "authorized caller {} has no membership row in class {}",
                    caller_id, assignment.class_id
                ))
            })?;

        let prior =
            submissions::latest_submitted_submission(self.db(), &assignment.guid, &member.guid)
                .await?
                .ok_or_else(|| {
                    Error::NotFound("no submitted submission to re-attempt".to_string())
                })?;

        // Draft order (rank ascending). The prior submission's numbering
        // may have gaps from partial edits; copies are re-ranked by
        // position. Empty-content terms are copied too: they are only
        // filtered at submit time, so the member can fill them in.
        let seed_terms = submissions::submission_terms(self.db(), &prior.guid).await?;

        let submission_id = submissions::create_seeded_submission(
            self.db(),
            &assignment.guid,
            &member.guid,
            caller_id,
            &seed_terms,
        )
        .await?;

        let submission_uuid = Uuid::parse_str(&submission_id)
            .map_err(|e| Error::Internal(format!("invalid submission GUID: {}", e)))?;

        self.events().emit_lossy(AppEvent::AttemptStarted {
            submission_id: submission_uuid,
            assignment_id,
            timestamp: chrono::Utc::now(),
        });

        tracing::info!(
            submission_id = %submission_uuid,
            assignment_id = %assignment_id,
            seeded_terms = seed_terms.len(),
            "New attempt initialized"
        );

        Ok(submission_uuid)
    }
}
