//! Read commands for the CLI: `harvest search` and `harvest query`.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::analytics::Analytics;
use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::{CanonicalProfile, Metric};
use crate::traits::{ToolContext, ToolRegistry, DEFAULT_LIMIT};

/// Search stored profiles and print one line per hit.
///
/// `substring` matches name, headline, location, platform, and skills;
/// `keyword` ranks full-text matches with bm25.
pub async fn run_search(config: &Config, query: &str, mode: &str, limit: Option<i64>) -> Result<()> {
    if !matches!(mode, "substring" | "keyword") {
        bail!("Unknown search mode: {}. Use substring or keyword.", mode);
    }
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let analytics = Analytics::new(pool.clone());
    let limit = limit.unwrap_or(DEFAULT_LIMIT);

    let hits: Vec<(Option<f64>, CanonicalProfile)> = if mode == "keyword" {
        analytics
            .keyword_search(query, limit)
            .await?
            .into_iter()
            .map(|hit| (Some(hit.score), hit.profile))
            .collect()
    } else {
        analytics
            .search_profiles(query, limit)
            .await?
            .into_iter()
            .map(|p| (None, p))
            .collect()
    };

    if hits.is_empty() {
        println!("No results.");
    }
    for (i, (score, profile)) in hits.iter().enumerate() {
        let score = score.map(|s| format!(" [{:.2}]", s)).unwrap_or_default();
        println!(
            "{}.{} {} ({}:{})",
            i + 1,
            score,
            profile.basics.name,
            profile.source_platform.key(),
            profile.source_id
        );
        if !profile.basics.headline.is_empty() {
            println!("    {}", profile.basics.headline);
        }
        if !profile.basics.location.is_empty() {
            println!("    location: {}", profile.basics.location);
        }
        if !profile.skills.is_empty() {
            let skills: Vec<&str> = profile.skills.iter().map(String::as_str).collect();
            println!("    skills: {}", skills.join(", "));
        }
        let known: Vec<String> = Metric::ALL
            .iter()
            .filter_map(|m| profile.metrics.known(*m).map(|v| format!("{}={}", m, v)))
            .collect();
        if !known.is_empty() {
            println!("    {}", known.join(" "));
        }
    }

    pool.close().await;
    Ok(())
}

/// Turn `--param key=value` pairs into a JSON object. Values that parse as
/// JSON (numbers, booleans) keep their type; anything else is a string.
pub fn params_from_pairs(pairs: &[(String, String)]) -> Value {
    let map = pairs
        .iter()
        .map(|(k, v)| {
            let value = serde_json::from_str::<Value>(v).unwrap_or_else(|_| Value::String(v.clone()));
            (k.clone(), value)
        })
        .collect();
    Value::Object(map)
}

/// Call one analytic tool and print its JSON result.
pub async fn run_query(config: &Config, tool: &str, params: &[(String, String)]) -> Result<()> {
    let registry = ToolRegistry::with_builtins();
    if registry.find(tool).is_none() {
        let names: Vec<&str> = registry.tools().iter().map(|t| t.name()).collect();
        bail!("Unknown tool: '{}'. Available: {}", tool, names.join(", "));
    }

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let ctx = ToolContext::new(Analytics::new(pool.clone()));

    let result = registry.call(tool, &params_from_pairs(params), &ctx).await;
    pool.close().await;

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pairs_keep_json_types() {
        let pairs = vec![
            ("skill".to_string(), "Rust".to_string()),
            ("limit".to_string(), "3".to_string()),
            ("platform".to_string(), "GitHub".to_string()),
        ];
        assert_eq!(
            params_from_pairs(&pairs),
            json!({"skill": "Rust", "limit": 3, "platform": "GitHub"})
        );
    }
}
