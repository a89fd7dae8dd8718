//! Ingestion pass orchestration.
//!
//! Runs the selected adapters one after another in a fixed order, with a
//! randomized pause between them. A failing adapter is logged and recorded
//! in the report; the pass always continues with the next one.

use anyhow::{bail, Result};
use std::fmt;

use crate::adapter::{Adapter, RunStats};
use crate::config::Config;
use crate::db;
use crate::governor;
use crate::migrate;
use crate::models::SourcePlatform;
use crate::store::sqlite::SqliteProfileStore;
use crate::store::ProfileStore;

/// Execution order of a full pass.
pub const ADAPTER_ORDER: [SourcePlatform; 5] = [
    SourcePlatform::QnaSite,
    SourcePlatform::CodeHost,
    SourcePlatform::ResearchRegistry,
    SourcePlatform::CompetitionPlatform,
    SourcePlatform::ProfessionalNetwork,
];

/// Which adapters a pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    All,
    One(SourcePlatform),
}

impl Selection {
    pub fn parse(name: &str) -> Result<Self> {
        if name.eq_ignore_ascii_case("all") {
            return Ok(Selection::All);
        }
        match name.parse::<SourcePlatform>() {
            Ok(platform) => Ok(Selection::One(platform)),
            Err(_) => bail!(
                "Unknown adapter: '{}'. Available: all, github, stackoverflow, orcid, kaggle, linkedin",
                name
            ),
        }
    }

    fn includes(&self, platform: SourcePlatform) -> bool {
        match self {
            Selection::All => true,
            Selection::One(p) => *p == platform,
        }
    }
}

/// What happened to one adapter in a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterReport {
    Ran(RunStats),
    Skipped {
        platform: SourcePlatform,
        reason: String,
    },
    Failed {
        platform: SourcePlatform,
        error: String,
    },
}

impl AdapterReport {
    pub fn platform(&self) -> SourcePlatform {
        match self {
            AdapterReport::Ran(stats) => stats.platform,
            AdapterReport::Skipped { platform, .. } | AdapterReport::Failed { platform, .. } => {
                *platform
            }
        }
    }
}

impl fmt::Display for AdapterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterReport::Ran(s) => write!(
                f,
                "{}: saved {}, duplicates {}, skipped {} ({})",
                s.platform, s.saved, s.duplicates, s.skipped, s.outcome
            ),
            AdapterReport::Skipped { platform, reason } => {
                write!(f, "{}: not run ({})", platform, reason)
            }
            AdapterReport::Failed { platform, error } => write!(f, "{}: failed ({})", platform, error),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub adapters: Vec<AdapterReport>,
}

impl SyncReport {
    pub fn total_saved(&self) -> usize {
        self.adapters
            .iter()
            .map(|r| match r {
                AdapterReport::Ran(stats) => stats.saved,
                _ => 0,
            })
            .sum()
    }
}

/// Run one ingestion pass against `store`.
///
/// `target_override` replaces the configured target of every selected
/// adapter.
pub async fn run_ingestion(
    config: &Config,
    store: &dyn ProfileStore,
    selection: Selection,
    target_override: Option<usize>,
) -> SyncReport {
    let mut report = SyncReport::default();
    let selected: Vec<SourcePlatform> = ADAPTER_ORDER
        .into_iter()
        .filter(|p| selection.includes(*p))
        .collect();

    for (i, platform) in selected.iter().copied().enumerate() {
        let entry = run_one(config, store, platform, target_override).await;
        let ran = matches!(entry, AdapterReport::Ran(_) | AdapterReport::Failed { .. });
        report.adapters.push(entry);

        if ran && i + 1 < selected.len() {
            governor::pause(config.pacing.adapter_pause).await;
        }
    }
    report
}

async fn run_one(
    config: &Config,
    store: &dyn ProfileStore,
    platform: SourcePlatform,
    target_override: Option<usize>,
) -> AdapterReport {
    if !config.sources.enabled(platform) {
        return AdapterReport::Skipped {
            platform,
            reason: "disabled".to_string(),
        };
    }

    let mut adapter = match Adapter::from_config(platform, config) {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(platform = %platform, error = %e, "adapter setup failed");
            return AdapterReport::Failed {
                platform,
                error: e.to_string(),
            };
        }
    };

    if let Some(missing) = adapter.missing_prerequisite() {
        tracing::warn!(platform = %platform, missing, "prerequisite missing, skipping");
        return AdapterReport::Skipped {
            platform,
            reason: format!("missing {}", missing),
        };
    }

    let target = target_override.unwrap_or_else(|| config.sources.target(platform));
    tracing::info!(platform = %platform, target, "starting adapter");
    match adapter.discover(store, &config.pacing, target).await {
        Ok(stats) => AdapterReport::Ran(stats),
        Err(e) => {
            tracing::error!(platform = %platform, error = %e, "adapter failed");
            AdapterReport::Failed {
                platform,
                error: format!("{:#}", e),
            }
        }
    }
}

/// `harvest sync`: open the store, run a pass, print the summary.
pub async fn run_sync(config: &Config, adapter: &str, target: Option<usize>) -> Result<()> {
    let selection = Selection::parse(adapter)?;
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let store = SqliteProfileStore::new(pool.clone());

    let report = run_ingestion(config, &store, selection, target).await;

    println!("sync {}", adapter);
    for entry in &report.adapters {
        println!("  {}", entry);
    }
    println!("  new profiles: {}", report.total_saved());
    println!("  total stored: {}", store.count().await?);
    println!("ok");

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SleepWindow;
    use crate::store::memory::MemoryProfileStore;

    #[test]
    fn selection_parses_names() {
        assert_eq!(Selection::parse("all").unwrap(), Selection::All);
        assert_eq!(
            Selection::parse("GitHub").unwrap(),
            Selection::One(SourcePlatform::CodeHost)
        );
        assert!(Selection::parse("friendster").is_err());
    }

    #[test]
    fn order_is_fixed() {
        assert_eq!(ADAPTER_ORDER[0], SourcePlatform::QnaSite);
        assert_eq!(ADAPTER_ORDER[4], SourcePlatform::ProfessionalNetwork);
    }

    #[tokio::test]
    async fn disabled_and_uncredentialed_adapters_are_skipped() {
        let mut config = Config::default();
        config.pacing.adapter_pause = SleepWindow::zero();
        for platform in SourcePlatform::ALL {
            match platform {
                SourcePlatform::ProfessionalNetwork => config.sources.linkedin.enabled = true,
                SourcePlatform::CodeHost => config.sources.github.enabled = false,
                SourcePlatform::QnaSite => config.sources.stackoverflow.enabled = false,
                SourcePlatform::ResearchRegistry => config.sources.orcid.enabled = false,
                SourcePlatform::CompetitionPlatform => config.sources.kaggle.enabled = false,
            }
        }
        let store = MemoryProfileStore::new();
        let report = run_ingestion(&config, &store, Selection::All, None).await;

        assert_eq!(report.adapters.len(), 5);
        let platforms: Vec<SourcePlatform> = report.adapters.iter().map(|r| r.platform()).collect();
        assert_eq!(platforms, ADAPTER_ORDER.to_vec());
        match &report.adapters[4] {
            AdapterReport::Skipped { reason, .. } => assert!(reason.contains("session cookie")),
            other => panic!("expected skip, got {:?}", other),
        }
        assert_eq!(report.total_saved(), 0);
    }
}
