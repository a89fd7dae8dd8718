//! SQLite-backed [`ProfileStore`].
//!
//! One row per identity in `profiles`. Metrics, skills and the reserved
//! sequences are stored as JSON text; the three sort keys used by the
//! analytic tools are also copied into plain integer columns, and the
//! substring-searched text is copied lowercased into `*_folded` columns.
//! Every write refreshes the matching `profiles_fts` row in the same
//! transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{Basics, CanonicalProfile, Metric, Metrics, SourcePlatform};

use super::ProfileStore;

/// Column list shared by every query that materializes a profile.
pub const PROFILE_COLUMNS: &str = "source_platform, source_id, name, headline, location, \
     current_affiliation, website, email, metrics_json, skills_json, affiliations_json, \
     publications_json";

#[derive(Clone)]
pub struct SqliteProfileStore {
    pool: SqlitePool,
}

impl SqliteProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn exists(&self, platform: SourcePlatform, source_id: &str) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM profiles WHERE source_platform = ? AND source_id = ?",
        )
        .bind(platform.as_str())
        .bind(source_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn replace(&self, profile: &CanonicalProfile) -> Result<()> {
        let metrics_json = serde_json::to_string(&profile.metrics)?;
        let skills: Vec<&String> = profile.skills.iter().collect();
        let skills_json = serde_json::to_string(&skills)?;
        let affiliations_json = serde_json::to_string(&profile.affiliations)?;
        let publications_json = serde_json::to_string(&profile.publications)?;
        let skills_folded: Vec<String> = profile.skills.iter().map(|s| s.to_lowercase()).collect();
        let skills_folded_json = serde_json::to_string(&skills_folded)?;
        let now = chrono::Utc::now().timestamp();
        let basics = &profile.basics;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO profiles (source_platform, source_id, name, headline, location,
                current_affiliation, website, email, metrics_json, skills_json,
                affiliations_json, publications_json, reputation_score, contribution_count,
                followers, name_folded, headline_folded, location_folded, skills_folded_json,
                updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_platform, source_id) DO UPDATE SET
                name = excluded.name,
                headline = excluded.headline,
                location = excluded.location,
                current_affiliation = excluded.current_affiliation,
                website = excluded.website,
                email = excluded.email,
                metrics_json = excluded.metrics_json,
                skills_json = excluded.skills_json,
                affiliations_json = excluded.affiliations_json,
                publications_json = excluded.publications_json,
                reputation_score = excluded.reputation_score,
                contribution_count = excluded.contribution_count,
                followers = excluded.followers,
                name_folded = excluded.name_folded,
                headline_folded = excluded.headline_folded,
                location_folded = excluded.location_folded,
                skills_folded_json = excluded.skills_folded_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(profile.source_platform.as_str())
        .bind(&profile.source_id)
        .bind(&basics.name)
        .bind(&basics.headline)
        .bind(&basics.location)
        .bind(&basics.current_affiliation)
        .bind(&basics.website)
        .bind(&basics.email)
        .bind(&metrics_json)
        .bind(&skills_json)
        .bind(&affiliations_json)
        .bind(&publications_json)
        .bind(profile.metrics.reputation_score)
        .bind(profile.metrics.contribution_count)
        .bind(profile.metrics.followers)
        .bind(basics.name.to_lowercase())
        .bind(basics.headline.to_lowercase())
        .bind(basics.location.to_lowercase())
        .bind(&skills_folded_json)
        .bind(now)
        .execute(&mut *tx)
        .await
        .with_context(|| {
            format!(
                "Failed to write profile {}:{}",
                profile.source_platform, profile.source_id
            )
        })?;

        sqlx::query("DELETE FROM profiles_fts WHERE source_platform = ? AND source_id = ?")
            .bind(profile.source_platform.as_str())
            .bind(&profile.source_id)
            .execute(&mut *tx)
            .await?;

        let skills_text = profile
            .skills
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        sqlx::query(
            "INSERT INTO profiles_fts (source_platform, source_id, name, headline, skills) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(profile.source_platform.as_str())
        .bind(&profile.source_id)
        .bind(&basics.name)
        .bind(&basics.headline)
        .bind(&skills_text)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn lowest_metric(&self, platform: SourcePlatform, metric: Metric) -> Result<Option<i64>> {
        let lowest: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MIN(CAST(json_extract(metrics_json, ?) AS INTEGER))
            FROM profiles
            WHERE source_platform = ?
              AND CAST(json_extract(metrics_json, ?) AS INTEGER) >= 0
            "#,
        )
        .bind(metric.json_path())
        .bind(platform.as_str())
        .bind(metric.json_path())
        .fetch_one(&self.pool)
        .await?;
        Ok(lowest)
    }

    async fn count(&self) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}

/// Rebuild a [`CanonicalProfile`] from a row selected with [`PROFILE_COLUMNS`].
pub fn profile_from_row(row: &SqliteRow) -> Result<CanonicalProfile> {
    let platform: String = row.try_get("source_platform")?;
    let metrics_json: String = row.try_get("metrics_json")?;
    let skills_json: String = row.try_get("skills_json")?;
    let affiliations_json: String = row.try_get("affiliations_json")?;
    let publications_json: String = row.try_get("publications_json")?;

    let basics = Basics {
        name: row.try_get("name")?,
        headline: row.try_get("headline")?,
        location: row.try_get("location")?,
        current_affiliation: row.try_get("current_affiliation")?,
        website: row.try_get("website")?,
        email: row.try_get("email")?,
    };

    let metrics: Metrics = serde_json::from_str(&metrics_json)
        .with_context(|| format!("Corrupt metrics_json: {}", metrics_json))?;
    let skills: Vec<String> = serde_json::from_str(&skills_json).unwrap_or_default();

    let mut profile = CanonicalProfile::new(
        platform.parse::<SourcePlatform>()?,
        row.try_get::<String, _>("source_id")?,
        basics,
    )
    .with_metrics(metrics)
    .with_skills(skills);
    profile.affiliations = serde_json::from_str(&affiliations_json).unwrap_or_default();
    profile.publications = serde_json::from_str(&publications_json).unwrap_or_default();
    Ok(profile)
}
