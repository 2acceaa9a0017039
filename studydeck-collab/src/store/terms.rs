//! Term store primitives
//!
//! The study set's ranked term sequence is mutated only through the two
//! primitives here. Content updates and publishing are intentionally
//! separate operations so a failure in one never corrupts ranking:
//! `bulk_update_content` touches word/definition/rich-text and nothing
//! else, `append_published` touches rank/ephemeral and nothing else.

use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use studydeck_common::{Error, Result};
use uuid::Uuid;

/// Content columns of a term row, keyed by id
#[derive(Debug, Clone)]
pub struct TermContent {
    pub guid: String,
    pub word: String,
    pub definition: String,
    pub word_rich_text: Option<String>,
    pub definition_rich_text: Option<String>,
}

/// Number of published (non-ephemeral) terms in a study set
pub async fn count_published(pool: &SqlitePool, study_set_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM terms WHERE study_set_id = ? AND ephemeral = 0")
            .bind(study_set_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Publish existing ephemeral terms into the study set's ranked sequence.
///
/// Assigns contiguous ranks starting at the current published count, in
/// the order of `term_ids`, and flips `ephemeral` off - all inside one
/// transaction, so readers observe either none or all of the appended
/// terms. Returns the published count after the append.
///
/// Publishing is an update of rows that already exist. A row that does
/// not match means a term was lost between validation and publish; that
/// is a data-integrity fault and rolls the whole append back.
///
/// Caller contract: hold the study set's publish lock across this call.
/// The count-then-update sequence is only correct while no concurrent
/// publish runs against the same study set.
pub async fn append_published(
    pool: &SqlitePool,
    study_set_id: Uuid,
    term_ids: &[String],
) -> Result<i64> {
    let mut conn = pool.acquire().await?;

    // IMMEDIATE takes the write lock before the count is read, so the
    // count cannot go stale inside the transaction when some other
    // writer commits between the read and the rank updates.
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

    match append_in_tx(&mut *conn, study_set_id, term_ids).await {
        Ok(published) => {
            sqlx::query("COMMIT").execute(&mut *conn).await?;

            tracing::debug!(
                study_set_id = %study_set_id,
                appended = term_ids.len(),
                published_count = published,
                "Published terms appended"
            );
            Ok(published)
        }
        Err(e) => {
            if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                tracing::warn!(
                    study_set_id = %study_set_id,
                    error = %rollback_err,
                    "Rollback after failed publish also failed"
                );
            }
            Err(e)
        }
    }
}

async fn append_in_tx(
    conn: &mut SqliteConnection,
    study_set_id: Uuid,
    term_ids: &[String],
) -> Result<i64> {
    let base: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM terms WHERE study_set_id = ? AND ephemeral = 0")
            .bind(study_set_id.to_string())
            .fetch_one(&mut *conn)
            .await?;

    for (offset, term_id) in term_ids.iter().enumerate() {
        let result = sqlx::query(
            r#"
            UPDATE terms
            SET rank = ?, ephemeral = 0, updated_at = CURRENT_TIMESTAMP
            WHERE guid = ? AND study_set_id = ?
            "#,
        )
        .bind(base + offset as i64)
        .bind(term_id)
        .bind(study_set_id.to_string())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() != 1 {
            return Err(Error::Internal(format!(
                "publish matched {} rows for term {} in study set {}",
                result.rows_affected(),
                term_id,
                study_set_id
            )));
        }
    }

    Ok(base + term_ids.len() as i64)
}

/// Overwrite content columns of term rows by id.
///
/// Never touches rank or ephemeral, so it is safe to reuse from plain
/// editing flows as well as the merge path. Scoped to a study set: rows
/// belonging to another set are not modified and are reported as lost.
pub async fn bulk_update_content(
    pool: &SqlitePool,
    study_set_id: Uuid,
    terms: &[TermContent],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for term in terms {
        let result = sqlx::query(
            r#"
            UPDATE terms
            SET word = ?, definition = ?, word_rich_text = ?, definition_rich_text = ?,
                updated_at = CURRENT_TIMESTAMP
            WHERE guid = ? AND study_set_id = ?
            "#,
        )
        .bind(&term.word)
        .bind(&term.definition)
        .bind(&term.word_rich_text)
        .bind(&term.definition_rich_text)
        .bind(&term.guid)
        .bind(study_set_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(Error::Internal(format!(
                "content update matched {} rows for term {} in study set {}",
                result.rows_affected(),
                term.guid,
                study_set_id
            )));
        }
    }

    tx.commit().await?;
    Ok(())
}
