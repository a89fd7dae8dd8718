//! Read-only aggregate queries over stored profiles.
//!
//! Every operation is a single SQL statement against `profiles` (or its
//! FTS index). An empty result is an empty `Vec`, never an error; errors
//! are reserved for invalid parameters (an unknown metric name) and store
//! failures.
//!
//! Numeric fields keep the `-1` sentinel. Sorting descending puts unknown
//! values last, and averages only include known values.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::models::{CanonicalProfile, Metric, SourcePlatform};
use crate::store::sqlite::{profile_from_row, PROFILE_COLUMNS};

/// Number of entries returned by [`Analytics::skill_distribution`].
pub const SKILL_DISTRIBUTION_SIZE: i64 = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformCount {
    pub platform: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoBucket {
    pub platform: String,
    pub count: i64,
    /// Mean reputation over profiles that report one; `None` if none do.
    pub avg_reputation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillCount {
    pub skill: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordHit {
    pub score: f64,
    #[serde(flatten)]
    pub profile: CanonicalProfile,
}

#[derive(Clone)]
pub struct Analytics {
    pool: SqlitePool,
}

/// Lowercased `%needle%` with LIKE wildcards escaped by `\`, for matching
/// against the `*_folded` columns. A blank needle matches everything.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Profile columns qualified with a table alias.
fn columns(alias: &str) -> String {
    PROFILE_COLUMNS
        .split(',')
        .map(|c| format!("{}.{}", alias, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// FTS5 query that ANDs every word of `text` as a quoted phrase.
fn fts_query(text: &str) -> String {
    text.split_whitespace()
        .map(|word| format!("\"{}\"", word.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Analytics {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Case-insensitive substring match on name, headline, location,
    /// platform, and skills. A blank query matches every profile.
    pub async fn search_profiles(&self, query: &str, limit: i64) -> Result<Vec<CanonicalProfile>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let pattern = like_pattern(query);
        let sql = format!(
            r#"
            SELECT {cols} FROM profiles p
            WHERE p.name_folded LIKE ? ESCAPE '\'
               OR p.headline_folded LIKE ? ESCAPE '\'
               OR p.location_folded LIKE ? ESCAPE '\'
               OR p.source_platform LIKE ? ESCAPE '\'
               OR EXISTS (SELECT 1 FROM json_each(p.skills_folded_json) s WHERE s.value LIKE ? ESCAPE '\')
            ORDER BY p.updated_at DESC, p.source_platform, p.source_id
            LIMIT ?
            "#,
            cols = columns("p")
        );
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(profile_from_row).collect()
    }

    /// Full-text search over name, headline, and skills, best match first.
    pub async fn keyword_search(&self, query: &str, limit: i64) -> Result<Vec<KeywordHit>> {
        let fts = fts_query(query);
        if fts.is_empty() || limit <= 0 {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT {cols}, bm25(profiles_fts) AS bm25_score
            FROM profiles_fts
            JOIN profiles p
              ON p.source_platform = profiles_fts.source_platform
             AND p.source_id = profiles_fts.source_id
            WHERE profiles_fts MATCH ?
            ORDER BY bm25_score
            LIMIT ?
            "#,
            cols = columns("p")
        );
        let rows = sqlx::query(&sql)
            .bind(&fts)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<KeywordHit> {
                let raw: f64 = row.try_get("bm25_score")?;
                Ok(KeywordHit {
                    score: -raw,
                    profile: profile_from_row(row)?,
                })
            })
            .collect()
    }

    /// Profile count per platform, largest first.
    pub async fn platform_stats(&self) -> Result<Vec<PlatformCount>> {
        let rows = sqlx::query(
            r#"
            SELECT source_platform, COUNT(*) AS count
            FROM profiles
            GROUP BY source_platform
            ORDER BY count DESC, source_platform
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<PlatformCount> {
                Ok(PlatformCount {
                    platform: row.try_get("source_platform")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    /// Profiles of `platform` sorted by `metric`, highest first.
    ///
    /// An unknown metric is an error; an unknown platform matches nothing.
    pub async fn top_contributors(
        &self,
        platform: &str,
        metric: &str,
        limit: i64,
    ) -> Result<Vec<CanonicalProfile>> {
        let metric: Metric = metric.parse()?;
        let Ok(platform) = platform.parse::<SourcePlatform>() else {
            return Ok(Vec::new());
        };
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT {cols} FROM profiles p
            WHERE p.source_platform = ?
            ORDER BY CAST(json_extract(p.metrics_json, ?) AS INTEGER) DESC, p.source_id
            LIMIT ?
            "#,
            cols = columns("p")
        );
        let rows = sqlx::query(&sql)
            .bind(platform.as_str())
            .bind(metric.json_path())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(profile_from_row).collect()
    }

    /// Profiles whose skills or headline mention `skill`, ranked by
    /// reputation, then contributions, then followers. A blank skill ranks
    /// every profile.
    pub async fn top_experts(&self, skill: &str, limit: i64) -> Result<Vec<CanonicalProfile>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let pattern = like_pattern(skill);
        let sql = format!(
            r#"
            SELECT {cols} FROM profiles p
            WHERE p.headline_folded LIKE ? ESCAPE '\'
               OR EXISTS (SELECT 1 FROM json_each(p.skills_folded_json) s WHERE s.value LIKE ? ESCAPE '\')
            ORDER BY p.reputation_score DESC,
                     p.contribution_count DESC,
                     p.followers DESC,
                     p.source_platform,
                     p.source_id
            LIMIT ?
            "#,
            cols = columns("p")
        );
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(profile_from_row).collect()
    }

    /// Per-platform count and mean known reputation for a location
    /// substring. A blank location buckets every profile.
    pub async fn geo_density(&self, location: &str) -> Result<Vec<GeoBucket>> {
        let rows = sqlx::query(
            r#"
            SELECT source_platform,
                   COUNT(*) AS count,
                   AVG(CASE WHEN reputation_score >= 0 THEN reputation_score END) AS avg_reputation
            FROM profiles
            WHERE location_folded LIKE ? ESCAPE '\'
            GROUP BY source_platform
            ORDER BY count DESC, source_platform
            "#,
        )
        .bind(like_pattern(location))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<GeoBucket> {
                Ok(GeoBucket {
                    platform: row.try_get("source_platform")?,
                    count: row.try_get("count")?,
                    avg_reputation: row.try_get("avg_reputation")?,
                })
            })
            .collect()
    }

    /// The most common skills across all profiles.
    pub async fn skill_distribution(&self) -> Result<Vec<SkillCount>> {
        let rows = sqlx::query(
            r#"
            SELECT s.value AS skill, COUNT(*) AS count
            FROM profiles p, json_each(p.skills_json) s
            GROUP BY s.value
            ORDER BY count DESC, skill
            LIMIT ?
            "#,
        )
        .bind(SKILL_DISTRIBUTION_SIZE)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<SkillCount> {
                Ok(SkillCount {
                    skill: row.try_get("skill")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    pub async fn total(&self) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}
