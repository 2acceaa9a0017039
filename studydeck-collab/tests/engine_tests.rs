//! Collab engine integration tests
//!
//! Exercises attempt initialization and submission merge against real
//! SQLite pools: validation failures leave no writes behind, published
//! ranks stay dense and unique, and concurrent merges against the same
//! study set never collide on rank.

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use studydeck_collab::CollabEngine;
use studydeck_common::db::init::{connect_options, create_schema};
use studydeck_common::events::{AppEvent, EventBus};
use studydeck_common::Error;
use uuid::Uuid;

/// In-memory pool with the full schema. Single connection so every query
/// sees the same database.
async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    create_schema(&pool).await.unwrap();
    pool
}

/// One class + study set + collab assignment, with an engine on top
struct Fixture {
    pool: SqlitePool,
    engine: Arc<CollabEngine>,
    events: EventBus,
    class_id: String,
    study_set_id: Uuid,
    assignment_id: Uuid,
}

async fn setup(pool: SqlitePool, min: Option<i64>, max: Option<i64>, strategy: &str) -> Fixture {
    let class_id = Uuid::new_v4().to_string();
    let study_set_id = Uuid::new_v4();
    let assignment_id = Uuid::new_v4();

    sqlx::query("INSERT INTO classes (guid, name) VALUES (?, 'Period 3')")
        .bind(&class_id)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO study_sets (guid, title) VALUES (?, 'Cell Biology')")
        .bind(study_set_id.to_string())
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO collab_configs (study_set_id, merge_strategy, min_terms_per_user, max_terms_per_user) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(study_set_id.to_string())
    .bind(strategy)
    .bind(min)
    .bind(max)
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO assignments (guid, class_id, study_set_id, assignment_type) \
         VALUES (?, ?, ?, 'collab')",
    )
    .bind(assignment_id.to_string())
    .bind(&class_id)
    .bind(study_set_id.to_string())
    .execute(&pool)
    .await
    .unwrap();

    let events = EventBus::new(16);
    let engine = Arc::new(CollabEngine::new(pool.clone(), events.clone()));

    Fixture {
        pool,
        engine,
        events,
        class_id,
        study_set_id,
        assignment_id,
    }
}

impl Fixture {
    async fn add_member(&self, user_id: &str) -> String {
        let member_id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO class_members (guid, class_id, user_id) VALUES (?, ?, ?)")
            .bind(&member_id)
            .bind(&self.class_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .unwrap();
        member_id
    }

    async fn create_draft(&self, member_id: &str) -> Uuid {
        let submission_id = Uuid::new_v4();
        sqlx::query("INSERT INTO submissions (guid, assignment_id, member_id) VALUES (?, ?, ?)")
            .bind(submission_id.to_string())
            .bind(self.assignment_id.to_string())
            .bind(member_id)
            .execute(&self.pool)
            .await
            .unwrap();
        submission_id
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_term(
        &self,
        submission_id: Option<Uuid>,
        rank: i64,
        word: &str,
        definition: &str,
        word_rich_text: Option<&str>,
        definition_rich_text: Option<&str>,
        ephemeral: bool,
        author_id: &str,
    ) -> String {
        let guid = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO terms (guid, word, definition, word_rich_text, definition_rich_text, \
                                rank, study_set_id, author_id, ephemeral, submission_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&guid)
        .bind(word)
        .bind(definition)
        .bind(word_rich_text)
        .bind(definition_rich_text)
        .bind(rank)
        .bind(self.study_set_id.to_string())
        .bind(author_id)
        .bind(ephemeral)
        .bind(submission_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await
        .unwrap();
        guid
    }

    async fn add_draft_term(&self, submission_id: Uuid, rank: i64, word: &str, definition: &str) -> String {
        self.insert_term(Some(submission_id), rank, word, definition, None, None, true, "user-1")
            .await
    }

    async fn seed_published_terms(&self, count: i64) {
        for rank in 0..count {
            self.insert_term(None, rank, "seed", "seeded term", None, None, false, "instructor-1")
                .await;
        }
    }

    async fn published_ranks(&self) -> Vec<i64> {
        sqlx::query_scalar(
            "SELECT rank FROM terms WHERE study_set_id = ? AND ephemeral = 0 ORDER BY rank",
        )
        .bind(self.study_set_id.to_string())
        .fetch_all(&self.pool)
        .await
        .unwrap()
    }

    async fn submitted_at(&self, submission_id: Uuid) -> Option<String> {
        sqlx::query_scalar("SELECT submitted_at FROM submissions WHERE guid = ?")
            .bind(submission_id.to_string())
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    async fn term_row(&self, guid: &str) -> (String, String, Option<String>, i64, bool) {
        sqlx::query_as(
            "SELECT word, definition, definition_rich_text, rank, ephemeral FROM terms WHERE guid = ?",
        )
        .bind(guid)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }
}

// ============================================================================
// Merge
// ============================================================================

#[tokio::test]
async fn merge_publishes_accepted_terms_at_the_next_ranks() {
    let fx = setup(memory_pool().await, Some(1), Some(5), "default").await;
    let member = fx.add_member("user-1").await;
    let submission = fx.create_draft(&member).await;

    fx.seed_published_terms(10).await;

    let a = fx.add_draft_term(submission, 0, "nucleus", "control center").await;
    let b = fx.add_draft_term(submission, 1, "ribosome", "makes proteins").await;
    let c = fx.add_draft_term(submission, 2, "vacuole", "storage").await;
    let empty1 = fx.add_draft_term(submission, 3, "", "").await;
    let empty2 = fx.add_draft_term(submission, 4, "   ", "").await;

    fx.engine.submit_attempt(submission, "user-1").await.unwrap();

    // Dense, unique, zero-based ranks; the three accepted terms follow
    // the ten that were already published
    assert_eq!(fx.published_ranks().await, (0..13).collect::<Vec<i64>>());
    assert_eq!(fx.term_row(&a).await.3, 10);
    assert_eq!(fx.term_row(&b).await.3, 11);
    assert_eq!(fx.term_row(&c).await.3, 12);

    // Empty terms stay ephemeral and unpublished
    assert!(fx.term_row(&empty1).await.4);
    assert!(fx.term_row(&empty2).await.4);

    assert!(fx.submitted_at(submission).await.is_some());
}

#[tokio::test]
async fn merge_below_minimum_fails_without_writes() {
    let fx = setup(memory_pool().await, Some(2), Some(5), "default").await;
    let member = fx.add_member("user-1").await;
    let submission = fx.create_draft(&member).await;
    let term = fx.add_draft_term(submission, 0, "damn nucleus", "control center").await;

    let err = fx.engine.submit_attempt(submission, "user-1").await.unwrap_err();
    assert!(matches!(err, Error::PreconditionFailed(_)));

    assert!(fx.published_ranks().await.is_empty());
    assert!(fx.submitted_at(submission).await.is_none());
    // Validation failed before sanitization: content untouched
    assert_eq!(fx.term_row(&term).await.0, "damn nucleus");
}

#[tokio::test]
async fn merge_above_maximum_fails_without_writes() {
    let fx = setup(memory_pool().await, Some(1), Some(2), "default").await;
    let member = fx.add_member("user-1").await;
    let submission = fx.create_draft(&member).await;
    for rank in 0..3 {
        fx.add_draft_term(submission, rank, "word", "definition").await;
    }

    let err = fx.engine.submit_attempt(submission, "user-1").await.unwrap_err();
    assert!(matches!(err, Error::PreconditionFailed(_)));
    assert!(fx.published_ranks().await.is_empty());
    assert!(fx.submitted_at(submission).await.is_none());
}

#[tokio::test]
async fn absent_bounds_default_to_zero() {
    // No bounds configured: any non-empty submission exceeds max 0
    let fx = setup(memory_pool().await, None, None, "default").await;
    let member = fx.add_member("user-1").await;
    let submission = fx.create_draft(&member).await;
    fx.add_draft_term(submission, 0, "word", "definition").await;

    let err = fx.engine.submit_attempt(submission, "user-1").await.unwrap_err();
    assert!(matches!(err, Error::PreconditionFailed(_)));
}

#[tokio::test]
async fn unknown_merge_strategy_is_not_implemented() {
    let fx = setup(memory_pool().await, Some(1), Some(5), "vote").await;
    let member = fx.add_member("user-1").await;
    let submission = fx.create_draft(&member).await;
    fx.add_draft_term(submission, 0, "word", "definition").await;

    let err = fx.engine.submit_attempt(submission, "user-1").await.unwrap_err();
    assert!(matches!(err, Error::NotImplemented(_)));
    assert!(fx.published_ranks().await.is_empty());
    assert!(fx.submitted_at(submission).await.is_none());
}

#[tokio::test]
async fn missing_collab_config_is_not_found() {
    let fx = setup(memory_pool().await, Some(1), Some(5), "default").await;
    sqlx::query("DELETE FROM collab_configs WHERE study_set_id = ?")
        .bind(fx.study_set_id.to_string())
        .execute(&fx.pool)
        .await
        .unwrap();

    let member = fx.add_member("user-1").await;
    let submission = fx.create_draft(&member).await;
    fx.add_draft_term(submission, 0, "word", "definition").await;

    let err = fx.engine.submit_attempt(submission, "user-1").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn foreign_submission_is_not_found() {
    let fx = setup(memory_pool().await, Some(1), Some(5), "default").await;
    let member = fx.add_member("user-1").await;
    fx.add_member("user-2").await;
    let submission = fx.create_draft(&member).await;
    fx.add_draft_term(submission, 0, "word", "definition").await;

    let err = fx.engine.submit_attempt(submission, "user-2").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn resubmitting_fails_fast_and_changes_nothing() {
    let fx = setup(memory_pool().await, Some(1), Some(5), "default").await;
    let member = fx.add_member("user-1").await;
    let submission = fx.create_draft(&member).await;
    fx.add_draft_term(submission, 0, "nucleus", "control center").await;

    fx.engine.submit_attempt(submission, "user-1").await.unwrap();
    let ranks_after_first = fx.published_ranks().await;
    let submitted_at_first = fx.submitted_at(submission).await;

    let err = fx.engine.submit_attempt(submission, "user-1").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert_eq!(fx.published_ranks().await, ranks_after_first);
    assert_eq!(fx.submitted_at(submission).await, submitted_at_first);
}

#[tokio::test]
async fn merge_censors_plain_and_rich_text_content() {
    let fx = setup(memory_pool().await, Some(1), Some(5), "default").await;
    let member = fx.add_member("user-1").await;
    let submission = fx.create_draft(&member).await;

    let rich = r#"{"type":"doc","content":[{"type":"paragraph","attrs":{"textAlign":"left"},"content":[{"type":"text","text":"damn important","marks":[{"type":"bold"}]}]}]}"#;
    let accepted = fx
        .insert_term(
            Some(submission),
            0,
            "damn nucleus",
            "the damn control center",
            None,
            Some(rich),
            true,
            "user-1",
        )
        .await;
    // Rejected (empty) term still gets its content corrected
    let rejected = fx
        .insert_term(Some(submission), 1, "", "", None, Some(rich), true, "user-1")
        .await;

    fx.engine.submit_attempt(submission, "user-1").await.unwrap();

    let (word, definition, definition_rich, _, ephemeral) = fx.term_row(&accepted).await;
    assert_eq!(word, "**** nucleus");
    assert_eq!(definition, "the **** control center");
    assert!(!ephemeral);

    let doc: serde_json::Value = serde_json::from_str(&definition_rich.unwrap()).unwrap();
    let leaf = &doc["content"][0]["content"][0];
    assert_eq!(leaf["text"], "**** important");
    // Non-profane structure and formatting preserved
    assert_eq!(leaf["marks"][0]["type"], "bold");
    assert_eq!(doc["content"][0]["attrs"]["textAlign"], "left");

    let (_, _, rejected_rich, _, rejected_ephemeral) = fx.term_row(&rejected).await;
    assert!(rejected_ephemeral);
    let rejected_doc: serde_json::Value = serde_json::from_str(&rejected_rich.unwrap()).unwrap();
    assert_eq!(rejected_doc["content"][0]["content"][0]["text"], "**** important");
}

#[tokio::test]
async fn merge_emits_staleness_notification() {
    let fx = setup(memory_pool().await, Some(1), Some(5), "default").await;
    let member = fx.add_member("user-1").await;
    let submission = fx.create_draft(&member).await;
    fx.add_draft_term(submission, 0, "nucleus", "control center").await;

    let mut rx = fx.events.subscribe();
    fx.engine.submit_attempt(submission, "user-1").await.unwrap();

    match rx.recv().await.unwrap() {
        AppEvent::StudySetStale { study_set_id, .. } => {
            assert_eq!(study_set_id, fx.study_set_id);
        }
        other => panic!("expected StudySetStale first, got {:?}", other),
    }
    match rx.recv().await.unwrap() {
        AppEvent::SubmissionMerged {
            submission_id,
            published_count,
            ..
        } => {
            assert_eq!(submission_id, submission);
            assert_eq!(published_count, 1);
        }
        other => panic!("expected SubmissionMerged, got {:?}", other),
    }
}

// ============================================================================
// Attempt initialization
// ============================================================================

#[tokio::test]
async fn reattempt_copies_latest_submitted_terms_reranked() {
    let fx = setup(memory_pool().await, Some(1), Some(5), "default").await;
    let member = fx.add_member("user-1").await;

    // A submitted submission whose term ranks have gaps (published at
    // 0 and 5, one empty draft leftover at 9)
    let prior = fx.create_draft(&member).await;
    let rich = r#"{"type":"doc","content":[{"type":"text","text":"membrane"}]}"#;
    let t0 = fx
        .insert_term(Some(prior), 0, "cell", "basic unit", Some(rich), None, false, "user-1")
        .await;
    let t5 = fx
        .insert_term(Some(prior), 5, "osmosis", "water diffusion", None, None, false, "user-1")
        .await;
    let t9 = fx
        .insert_term(Some(prior), 9, "", "", None, None, true, "user-1")
        .await;
    sqlx::query("UPDATE submissions SET submitted_at = CURRENT_TIMESTAMP WHERE guid = ?")
        .bind(prior.to_string())
        .execute(&fx.pool)
        .await
        .unwrap();

    let new_submission = fx
        .engine
        .initialize_attempt(fx.assignment_id, "user-1")
        .await
        .unwrap();
    assert_ne!(new_submission, prior);

    let copies: Vec<(String, String, Option<String>, i64, bool, String)> = sqlx::query_as(
        "SELECT guid, word, word_rich_text, rank, ephemeral, author_id FROM terms \
         WHERE submission_id = ? ORDER BY rank",
    )
    .bind(new_submission.to_string())
    .fetch_all(&fx.pool)
    .await
    .unwrap();

    // All terms copied - including the empty one - re-ranked 0..n
    // contiguously in source rank order
    assert_eq!(copies.len(), 3);
    assert_eq!(
        copies.iter().map(|c| c.3).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(copies[0].1, "cell");
    assert_eq!(copies[1].1, "osmosis");
    assert_eq!(copies[2].1, "");

    // Fresh ids, ephemeral, authored by the caller, rich text verbatim
    for copy in &copies {
        assert!(copy.4, "copies must be ephemeral");
        assert_eq!(copy.5, "user-1");
        assert!(![t0.clone(), t5.clone(), t9.clone()].contains(&copy.0));
    }
    assert_eq!(copies[0].2.as_deref(), Some(rich));
    assert_eq!(copies[1].2, None);

    // Prior submission untouched
    let prior_terms: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM terms WHERE submission_id = ?")
            .bind(prior.to_string())
            .fetch_one(&fx.pool)
            .await
            .unwrap();
    assert_eq!(prior_terms, 3);
}

#[tokio::test]
async fn reattempt_without_submitted_submission_is_not_found() {
    let fx = setup(memory_pool().await, Some(1), Some(5), "default").await;
    let member = fx.add_member("user-1").await;

    // Only a draft exists - nothing to re-attempt
    fx.create_draft(&member).await;

    let err = fx
        .engine
        .initialize_attempt(fx.assignment_id, "user-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn reattempt_without_membership_is_internal() {
    let fx = setup(memory_pool().await, Some(1), Some(5), "default").await;

    // Caller reached the engine without a membership row: authorization
    // upstream should have excluded this
    let err = fx
        .engine
        .initialize_attempt(fx.assignment_id, "user-outsider")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
}

#[tokio::test]
async fn reattempt_on_unknown_assignment_is_not_found() {
    let fx = setup(memory_pool().await, Some(1), Some(5), "default").await;
    fx.add_member("user-1").await;

    let err = fx
        .engine
        .initialize_attempt(Uuid::new_v4(), "user-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn concurrent_merges_never_collide_on_rank() {
    // File-backed database: concurrent tasks need real connections that
    // all see the same data
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("engine_test.db");
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(&db_path))
        .await
        .unwrap();
    create_schema(&pool).await.unwrap();

    let fx = setup(pool, Some(1), Some(5), "default").await;

    let member_a = fx.add_member("user-a").await;
    let member_b = fx.add_member("user-b").await;
    let submission_a = fx.create_draft(&member_a).await;
    let submission_b = fx.create_draft(&member_b).await;
    for rank in 0..2 {
        fx.add_draft_term(submission_a, rank, "alpha", "first").await;
        fx.add_draft_term(submission_b, rank, "beta", "second").await;
    }

    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let task_a = {
        let engine = fx.engine.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            engine.submit_attempt(submission_a, "user-a").await
        })
    };
    let task_b = {
        let engine = fx.engine.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            engine.submit_attempt(submission_b, "user-b").await
        })
    };

    task_a.await.unwrap().unwrap();
    task_b.await.unwrap().unwrap();

    // Four published terms, ranks exactly {0,1,2,3}, regardless of
    // which merge committed first
    assert_eq!(fx.published_ranks().await, vec![0, 1, 2, 3]);

    // Each submission's pair is adjacent: the appends did not interleave
    let pairs: Vec<(String, i64)> = sqlx::query_as(
        "SELECT submission_id, rank FROM terms WHERE ephemeral = 0 ORDER BY rank",
    )
    .fetch_all(&fx.pool)
    .await
    .unwrap();
    assert_eq!(pairs[0].0, pairs[1].0);
    assert_eq!(pairs[2].0, pairs[3].0);
}
