//! Database initialization
//!
//! Creates the database on first run and brings the schema up idempotently.
//! All mutations here are `CREATE TABLE IF NOT EXISTS` / `INSERT OR IGNORE`
//! so initialization is safe to run on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(connect_options(db_path))
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Connection options for the service database.
///
/// These are applied to every pooled connection. WAL allows concurrent
/// readers with one writer; the busy timeout makes contending writers
/// wait instead of failing immediately, which matters when several
/// submissions publish against the database at once.
pub fn connect_options(db_path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000))
        .foreign_keys(true)
}

/// Create all tables and indexes (idempotent - safe to call multiple times)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_study_sets_table(pool).await?;
    create_collab_configs_table(pool).await?;
    create_classes_table(pool).await?;
    create_class_members_table(pool).await?;
    create_assignments_table(pool).await?;
    create_submissions_table(pool).await?;
    create_terms_table(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores service configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all required settings exist with default values.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "event_channel_capacity", "256").await?;
    ensure_setting(pool, "http_request_timeout_ms", "30000").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE handles concurrent initialization races
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?;

    Ok(())
}

/// Read an integer setting, falling back to a default when absent
pub async fn get_setting_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    let value: Option<i64> =
        sqlx::query_scalar("SELECT CAST(value AS INTEGER) FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.unwrap_or(default))
}

/// Create the study_sets table
pub async fn create_study_sets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS study_sets (
            guid TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the collab_configs table
///
/// One row per study set that is the target of a collaborative assignment.
/// Bounds are inclusive; a NULL bound defaults to 0 at validation time.
pub async fn create_collab_configs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collab_configs (
            study_set_id TEXT PRIMARY KEY REFERENCES study_sets(guid) ON DELETE CASCADE,
            merge_strategy TEXT NOT NULL DEFAULT 'default',
            min_terms_per_user INTEGER,
            max_terms_per_user INTEGER,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (min_terms_per_user IS NULL OR min_terms_per_user >= 0),
            CHECK (max_terms_per_user IS NULL OR max_terms_per_user >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_classes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classes (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the class_members table
pub async fn create_class_members_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS class_members (
            guid TEXT PRIMARY KEY,
            class_id TEXT NOT NULL REFERENCES classes(guid) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_class_members_class_user \
         ON class_members(class_id, user_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the assignments table
pub async fn create_assignments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS assignments (
            guid TEXT PRIMARY KEY,
            class_id TEXT NOT NULL REFERENCES classes(guid) ON DELETE CASCADE,
            study_set_id TEXT NOT NULL REFERENCES study_sets(guid) ON DELETE CASCADE,
            assignment_type TEXT NOT NULL CHECK (assignment_type IN ('collab')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_assignments_study_set ON assignments(study_set_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the submissions table
///
/// `submitted_at` is NULL while the submission is a draft and is set
/// exactly once on successful merge. After that the submission is
/// immutable history.
pub async fn create_submissions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            guid TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL REFERENCES assignments(guid) ON DELETE CASCADE,
            member_id TEXT NOT NULL REFERENCES class_members(guid) ON DELETE CASCADE,
            started_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            submitted_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_submissions_assignment_member \
         ON submissions(assignment_id, member_id, started_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the terms table
///
/// While `ephemeral` is 1 a term is owned by its submission and does not
/// participate in the study set's published ranking. Publishing flips
/// `ephemeral` to 0 and assigns the term its rank; the submission linkage
/// then remains as historical metadata only.
pub async fn create_terms_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS terms (
            guid TEXT PRIMARY KEY,
            word TEXT NOT NULL DEFAULT '',
            definition TEXT NOT NULL DEFAULT '',
            word_rich_text TEXT,
            definition_rich_text TEXT,
            rank INTEGER NOT NULL DEFAULT 0,
            study_set_id TEXT NOT NULL REFERENCES study_sets(guid) ON DELETE CASCADE,
            author_id TEXT NOT NULL,
            ephemeral INTEGER NOT NULL DEFAULT 0,
            submission_id TEXT REFERENCES submissions(guid) ON DELETE SET NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (rank >= 0),
            CHECK (ephemeral IN (0, 1))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_terms_study_set_published \
         ON terms(study_set_id, ephemeral, rank)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_terms_submission ON terms(submission_id)")
        .execute(pool)
        .await?;

    Ok(())
}
