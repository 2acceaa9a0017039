//! Submission merge
//!
//! The core of the service: validate a draft submission against its
//! collaboration constraints, sanitize its content, and publish the
//! accepted terms into the study set's ranked sequence. Either the whole
//! merge lands or nothing does; readers never observe a partial publish.

use studydeck_common::db::models::{AssignmentType, MergeStrategy};
use studydeck_common::events::AppEvent;
use studydeck_common::{Error, Result};
use uuid::Uuid;

use super::CollabEngine;
use crate::sanitize;
use crate::store::{submissions, terms};

impl CollabEngine {
    /// Merge a draft submission into its study set.
    ///
    /// Preconditions, checked in order:
    /// 1. The submission exists, belongs to the caller, and its
    ///    assignment is collaborative (NotFound otherwise).
    /// 2. The study set carries a collab config (NotFound otherwise).
    /// 3. The merge strategy is one we implement (NotImplemented
    ///    otherwise - an unknown strategy is never guessed at).
    /// 4. The submission is still a draft (NotFound otherwise; a retry
    ///    of an already-merged submission must not double-publish).
    /// 5. The count of accepted terms - non-empty word or definition
    ///    after trimming - lies within the configured per-user bounds
    ///    (PreconditionFailed otherwise).
    pub async fn submit_attempt(&self, submission_id: Uuid, caller_id: &str) -> Result<()> {
        let ctx = submissions::load_submission_context(self.db(), submission_id, caller_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("submission {} not found", submission_id)))?;

        if AssignmentType::from_db(&ctx.assignment_type) != Some(AssignmentType::Collab) {
            return Err(Error::NotFound(format!(
                "submission {} not found",
                submission_id
            )));
        }

        let collab = ctx.collab.as_ref().ok_or_else(|| {
            Error::NotFound(format!(
                "study set {} has no collaboration config",
                ctx.study_set_id
            ))
        })?;

        match MergeStrategy::from_db(&collab.merge_strategy) {
            Some(MergeStrategy::Default) => {}
            None => {
                return Err(Error::NotImplemented(format!(
                    "merge strategy '{}'",
                    collab.merge_strategy
                )));
            }
        }

        if ctx.submitted {
            return Err(Error::NotFound(format!(
                "submission {} is not in draft state",
                submission_id
            )));
        }

        // Draft order (rank ascending)
        let draft_terms =
            submissions::submission_terms(self.db(), &submission_id.to_string()).await?;

        let accepted_ids: Vec<String> = draft_terms
            .iter()
            .filter(|t| !t.word.trim().is_empty() || !t.definition.trim().is_empty())
            .map(|t| t.guid.clone())
            .collect();

        let min = collab.min_terms_per_user.unwrap_or(0);
        let max = collab.max_terms_per_user.unwrap_or(0);
        let accepted_count = accepted_ids.len() as i64;
        if accepted_count < min || accepted_count > max {
            return Err(Error::PreconditionFailed(
                "Submission does not meet term requirements.".to_string(),
            ));
        }

        // Content correction applies uniformly to every term of the
        // submission, including rejected ones - they stay visible as
        // submission history even though they will not be published.
        let sanitized = draft_terms
            .iter()
            .map(|term| sanitize::sanitize_term(self.censor(), term))
            .collect::<Result<Vec<_>>>()?;
        terms::bulk_update_content(self.db(), ctx.study_set_id, &sanitized).await?;

        // Publish under the study set's lock: the count-then-append must
        // not interleave with another publish against the same set.
        let published_count = {
            let _guard = self.locks().acquire(ctx.study_set_id).await;
            terms::append_published(self.db(), ctx.study_set_id, &accepted_ids).await?
        };

        // Staleness notification is best-effort: a merge never fails or
        // rolls back because nobody is listening.
        if self
            .events()
            .emit(AppEvent::StudySetStale {
                study_set_id: ctx.study_set_id,
                timestamp: chrono::Utc::now(),
            })
            .is_err()
        {
            tracing::debug!(
                study_set_id = %ctx.study_set_id,
                "No subscribers for staleness notification"
            );
        }

        self.events().emit_lossy(AppEvent::SubmissionMerged {
            submission_id,
            study_set_id: ctx.study_set_id,
            published_count,
            timestamp: chrono::Utc::now(),
        });

        // Finalize. Idempotent: if this fails after a successful publish,
        // re-running finalize alone recovers; the publish is not re-run.
        submissions::mark_submitted(self.db(), submission_id).await?;

        tracing::info!(
            submission_id = %submission_id,
            study_set_id = %ctx.study_set_id,
            accepted = accepted_count,
            published_count = published_count,
            "Submission merged"
        );

        Ok(())
    }
}
