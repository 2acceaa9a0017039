//! Submission store
//!
//! Queries over submissions, their terms, and the assignment/membership
//! rows the merge preconditions depend on. Cross-entity linkage is by id
//! plus lookup; nothing here hands out live references between entities.

use sqlx::{Row, SqlitePool};
use studydeck_common::db::models::{Assignment, ClassMember, CollabConfig, Submission, Term};
use studydeck_common::{Error, Result};
use uuid::Uuid;

/// Everything the merge preconditions need about one submission
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    pub submission_id: Uuid,
    pub assignment_id: String,
    pub assignment_type: String,
    pub study_set_id: Uuid,
    /// True once `submitted_at` is set; the submission is then immutable
    pub submitted: bool,
    /// None when the study set carries no collab config row
    pub collab: Option<CollabConfig>,
}

/// Load a submission together with its assignment and collab config,
/// scoped to the calling user. Returns None when the submission does not
/// exist or does not belong to the caller.
pub async fn load_submission_context(
    pool: &SqlitePool,
    submission_id: Uuid,
    caller_id: &str,
) -> Result<Option<SubmissionContext>> {
    let row = sqlx::query(
        r#"
        SELECT s.submitted_at,
               a.guid AS assignment_id,
               a.assignment_type,
               a.study_set_id,
               c.merge_strategy,
               c.min_terms_per_user,
               c.max_terms_per_user,
               c.study_set_id IS NOT NULL AS has_collab
        FROM submissions s
        JOIN class_members m ON m.guid = s.member_id
        JOIN assignments a ON a.guid = s.assignment_id
        LEFT JOIN collab_configs c ON c.study_set_id = a.study_set_id
        WHERE s.guid = ? AND m.user_id = ?
        "#,
    )
    .bind(submission_id.to_string())
    .bind(caller_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let study_set_id_raw: String = row.get("study_set_id");
    let study_set_id = parse_uuid(&study_set_id_raw)?;
    let collab = if row.get::<bool, _>("has_collab") {
        Some(CollabConfig {
            study_set_id: study_set_id_raw,
            merge_strategy: row.get("merge_strategy"),
            min_terms_per_user: row.get("min_terms_per_user"),
            max_terms_per_user: row.get("max_terms_per_user"),
        })
    } else {
        None
    };

    Ok(Some(SubmissionContext {
        submission_id,
        assignment_id: row.get("assignment_id"),
        assignment_type: row.get("assignment_type"),
        study_set_id,
        submitted: row.get::<Option<String>, _>("submitted_at").is_some(),
        collab,
    }))
}

/// Load a collaborative assignment by id. Assignments of any other type
/// are treated as absent.
pub async fn collab_assignment(
    pool: &SqlitePool,
    assignment_id: Uuid,
) -> Result<Option<Assignment>> {
    let row = sqlx::query(
        "SELECT guid, class_id, study_set_id, assignment_type FROM assignments \
         WHERE guid = ? AND assignment_type = 'collab'",
    )
    .bind(assignment_id.to_string())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Assignment {
        guid: row.get("guid"),
        class_id: row.get("class_id"),
        study_set_id: row.get("study_set_id"),
        assignment_type: row.get("assignment_type"),
    }))
}

/// Membership row for a user within a class, if one exists
pub async fn class_member(
    pool: &SqlitePool,
    class_id: &str,
    user_id: &str,
) -> Result<Option<ClassMember>> {
    let row = sqlx::query(
        "SELECT guid, class_id, user_id FROM class_members WHERE class_id = ? AND user_id = ?",
    )
    .bind(class_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| ClassMember {
        guid: row.get("guid"),
        class_id: row.get("class_id"),
        user_id: row.get("user_id"),
    }))
}

/// The member's most recently started submission that has been submitted,
/// for one assignment. Drafts are ignored.
pub async fn latest_submitted_submission(
    pool: &SqlitePool,
    assignment_id: &str,
    member_id: &str,
) -> Result<Option<Submission>> {
    let row = sqlx::query(
        "SELECT guid, assignment_id, member_id, started_at, submitted_at FROM submissions \
         WHERE assignment_id = ? AND member_id = ? AND submitted_at IS NOT NULL \
         ORDER BY started_at DESC, rowid DESC \
         LIMIT 1",
    )
    .bind(assignment_id)
    .bind(member_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Submission {
        guid: row.get("guid"),
        assignment_id: row.get("assignment_id"),
        member_id: row.get("member_id"),
        started_at: row.get("started_at"),
        submitted_at: row.get("submitted_at"),
    }))
}

/// All terms of a submission, draft order (rank ascending)
pub async fn submission_terms(pool: &SqlitePool, submission_id: &str) -> Result<Vec<Term>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, word, definition, word_rich_text, definition_rich_text,
               rank, study_set_id, author_id, ephemeral, submission_id
        FROM terms
        WHERE submission_id = ?
        ORDER BY rank ASC
        "#,
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Term {
            guid: row.get("guid"),
            word: row.get("word"),
            definition: row.get("definition"),
            word_rich_text: row.get("word_rich_text"),
            definition_rich_text: row.get("definition_rich_text"),
            rank: row.get("rank"),
            study_set_id: row.get("study_set_id"),
            author_id: row.get("author_id"),
            ephemeral: row.get("ephemeral"),
            submission_id: row.get("submission_id"),
        })
        .collect())
}

/// Create a new draft submission seeded with copies of prior terms.
///
/// `seed_terms` must already be in the desired order; each copy gets a
/// fresh id, its position as rank, the new submission as owner, the
/// caller as author, and `ephemeral` forced on. Rich-text passes through
/// unchanged when present. The submission row and all copies are written
/// in one transaction.
pub async fn create_seeded_submission(
    pool: &SqlitePool,
    assignment_id: &str,
    member_id: &str,
    author_id: &str,
    seed_terms: &[Term],
) -> Result<String> {
    let submission_id = Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO submissions (guid, assignment_id, member_id) VALUES (?, ?, ?)")
        .bind(&submission_id)
        .bind(assignment_id)
        .bind(member_id)
        .execute(&mut *tx)
        .await?;

    for (position, term) in seed_terms.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO terms (guid, word, definition, word_rich_text, definition_rich_text,
                               rank, study_set_id, author_id, ephemeral, submission_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&term.word)
        .bind(&term.definition)
        .bind(&term.word_rich_text)
        .bind(&term.definition_rich_text)
        .bind(position as i64)
        .bind(&term.study_set_id)
        .bind(author_id)
        .bind(&submission_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(
        submission_id = %submission_id,
        assignment_id = %assignment_id,
        seeded_terms = seed_terms.len(),
        "Draft submission created"
    );

    Ok(submission_id)
}

/// Finalize a submission. Idempotent: only a draft transitions, a second
/// call is a no-op, so the finalize step can be re-run safely after a
/// publish that succeeded but did not finalize.
pub async fn mark_submitted(pool: &SqlitePool, submission_id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE submissions SET submitted_at = CURRENT_TIMESTAMP \
         WHERE guid = ? AND submitted_at IS NULL",
    )
    .bind(submission_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        tracing::debug!(submission_id = %submission_id, "Submission already finalized");
    }

    Ok(())
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("invalid GUID in database: {}", e)))
}
