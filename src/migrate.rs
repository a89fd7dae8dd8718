//! Store bootstrap.
//!
//! Creates the `profiles` table, its full-text index, and secondary indexes.
//! Every statement is idempotent, so `harvest init` can run repeatedly.
//!
//! The table constraints double as the schema gate: a profile without a
//! name, or whose email does not look like `x@y`, is rejected by SQLite.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            source_platform TEXT NOT NULL,
            source_id TEXT NOT NULL,
            name TEXT NOT NULL CHECK (length(name) > 0),
            headline TEXT NOT NULL DEFAULT '',
            location TEXT NOT NULL DEFAULT '',
            current_affiliation TEXT NOT NULL DEFAULT '',
            website TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL CHECK (email LIKE '_%@_%'),
            metrics_json TEXT NOT NULL DEFAULT '{}',
            skills_json TEXT NOT NULL DEFAULT '[]',
            affiliations_json TEXT NOT NULL DEFAULT '[]',
            publications_json TEXT NOT NULL DEFAULT '[]',
            reputation_score INTEGER NOT NULL DEFAULT -1,
            contribution_count INTEGER NOT NULL DEFAULT -1,
            followers INTEGER NOT NULL DEFAULT -1,
            name_folded TEXT NOT NULL DEFAULT '',
            headline_folded TEXT NOT NULL DEFAULT '',
            location_folded TEXT NOT NULL DEFAULT '',
            skills_folded_json TEXT NOT NULL DEFAULT '[]',
            updated_at INTEGER NOT NULL,
            UNIQUE(source_platform, source_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    add_folded_columns(pool).await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='profiles_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE profiles_fts USING fts5(
                source_platform UNINDEXED,
                source_id UNINDEXED,
                name,
                headline,
                skills
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_profiles_platform ON profiles(source_platform)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_profiles_location_folded ON profiles(location_folded)",
    )
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_profiles_reputation ON profiles(source_platform, reputation_score DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Lowercased search columns for stores created before they existed.
///
/// The backfill uses SQLite `lower()`, which only folds ASCII; the next
/// write of each profile replaces it with the full Unicode folding.
async fn add_folded_columns(pool: &SqlitePool) -> Result<()> {
    let present: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('profiles') WHERE name = 'name_folded'",
    )
    .fetch_one(pool)
    .await?;
    if present {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for column in ["name_folded", "headline_folded", "location_folded"] {
        sqlx::query(&format!(
            "ALTER TABLE profiles ADD COLUMN {} TEXT NOT NULL DEFAULT ''",
            column
        ))
        .execute(&mut *tx)
        .await?;
    }
    sqlx::query("ALTER TABLE profiles ADD COLUMN skills_folded_json TEXT NOT NULL DEFAULT '[]'")
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        r#"
        UPDATE profiles SET
            name_folded = lower(name),
            headline_folded = lower(headline),
            location_folded = lower(location),
            skills_folded_json = lower(skills_json)
        "#,
    )
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}
