//! Store statistics.
//!
//! `harvest stats` prints where the store lives, how many profiles it holds,
//! and a per-platform breakdown with the time of the most recent write.

use anyhow::Result;
use sqlx::Row;

use crate::analytics::Analytics;
use crate::config::Config;
use crate::db;
use crate::migrate;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let analytics = Analytics::new(pool.clone());

    let path = config.db.path();
    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    let total = analytics.total().await?;
    let platforms = analytics.platform_stats().await?;

    let last_writes = sqlx::query(
        "SELECT source_platform, MAX(updated_at) AS last_write FROM profiles GROUP BY source_platform",
    )
    .fetch_all(&pool)
    .await?;
    let last_write_of = |platform: &str| -> Option<i64> {
        last_writes
            .iter()
            .find(|row| row.get::<String, _>("source_platform") == platform)
            .map(|row| row.get::<i64, _>("last_write"))
    };

    println!("Profile Harvest Store");
    println!("=====================");
    println!();
    println!("  Store:     {}", path.display());
    println!("  Size:      {}", format_bytes(size));
    println!("  Profiles:  {}", total);

    if !platforms.is_empty() {
        println!();
        println!("  {:<24} {:>8}   {}", "PLATFORM", "PROFILES", "LAST WRITE");
        println!("  {}", "-".repeat(56));
        for p in &platforms {
            let last = last_write_of(&p.platform)
                .map(format_ts_relative)
                .unwrap_or_else(|| "never".to_string());
            println!("  {:<24} {:>8}   {}", p.platform, p.count, last);
        }
    }
    println!();

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Unix timestamp as "3 hours ago", or a date once it is a month old.
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }
    let plural = |n: i64| if n == 1 { "" } else { "s" };
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, plural(mins))
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, plural(hours))
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, plural(days))
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
