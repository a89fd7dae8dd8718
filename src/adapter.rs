//! Source adapters and the shared discovery loop.
//!
//! Each upstream is one variant of the closed [`Adapter`] enum. A variant
//! supplies a discovery strategy (pages of candidate identities) and a
//! detail strategy (one candidate to one [`CanonicalProfile`]) through the
//! internal [`Discovery`] trait; [`drive`] runs the common
//! fetch → normalize → save → pace loop and decides when to stop.
//!
//! # Stop conditions
//!
//! | Outcome | Cause |
//! |---------|-------|
//! | `TargetReached` | newly inserted profiles reached the target |
//! | `SourceExhausted` | discovery produced no further pages |
//! | `DuplicateSaturated` | too many duplicate saves in a row |
//! | `Fatal(_)` | rate limit exceeded, auth wall, or missing credential |
//!
//! Per-candidate failures (network errors, bad payloads, rejected profiles)
//! are skips and never stop the loop.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

use crate::adapter_github::GitHubAdapter;
use crate::adapter_kaggle::KaggleAdapter;
use crate::adapter_linkedin::LinkedInAdapter;
use crate::adapter_orcid::OrcidAdapter;
use crate::adapter_stackoverflow::StackOverflowAdapter;
use crate::config::{Config, PacingConfig, SleepWindow};
use crate::governor::{self, RateGovernor};
use crate::models::{CanonicalProfile, SourcePlatform};
use crate::store::{save_profile, ProfileStore};

/// Conditions that end an adapter run immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FatalReason {
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("authentication wall detected")]
    AuthWall,
    #[error("required credential missing")]
    MissingCredential,
}

/// Loop status checked after every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Continue,
    TargetReached,
    SourceExhausted,
    DuplicateSaturated,
    Fatal(FatalReason),
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Continue => f.write_str("running"),
            RunOutcome::TargetReached => f.write_str("target reached"),
            RunOutcome::SourceExhausted => f.write_str("source exhausted"),
            RunOutcome::DuplicateSaturated => f.write_str("already synced"),
            RunOutcome::Fatal(reason) => write!(f, "stopped: {}", reason),
        }
    }
}

/// Counters for one adapter run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub platform: SourcePlatform,
    /// Newly inserted profiles.
    pub saved: usize,
    /// Profiles not inserted (already stored, or the write failed).
    pub duplicates: usize,
    /// Candidates that produced no profile.
    pub skipped: usize,
    pub outcome: RunOutcome,
}

impl RunStats {
    pub fn new(platform: SourcePlatform) -> Self {
        Self {
            platform,
            saved: 0,
            duplicates: 0,
            skipped: 0,
            outcome: RunOutcome::Continue,
        }
    }
}

/// Mutable state shared by one run's requests.
pub(crate) struct Session<'a> {
    pub governor: RateGovernor,
    pub store: &'a dyn ProfileStore,
}

/// One step of discovery.
pub(crate) enum Page<C> {
    Candidates(Vec<C>),
    Exhausted,
    Fatal(FatalReason),
}

/// Result of fetching one candidate.
pub(crate) enum Detail {
    Profile(Box<CanonicalProfile>),
    Miss,
    Fatal(FatalReason),
}

#[async_trait]
pub(crate) trait Discovery: Send {
    type Candidate: Send + Sync + fmt::Display;

    fn platform(&self) -> SourcePlatform;

    /// Reset the cursor for a fresh pass. Runs once per `discover` call.
    async fn begin(&mut self, _session: &mut Session<'_>) -> Result<()> {
        Ok(())
    }

    /// Next batch of candidates. Empty batches are allowed and simply
    /// advance the cursor.
    async fn next_page(&mut self, session: &mut Session<'_>) -> Page<Self::Candidate>;

    async fn fetch_detail(
        &mut self,
        session: &mut Session<'_>,
        candidate: &Self::Candidate,
    ) -> Detail;

    /// Sleep window between two candidates.
    fn candidate_pause(&self) -> SleepWindow;

    /// Sleep window between two discovery pages.
    fn page_pause(&self) -> SleepWindow {
        SleepWindow::zero()
    }
}

/// Run the shared discovery loop for `source` until a stop condition.
pub(crate) async fn drive<D: Discovery>(
    source: &mut D,
    store: &dyn ProfileStore,
    pacing: &PacingConfig,
    target: usize,
) -> Result<RunStats> {
    let platform = source.platform();
    let mut stats = RunStats::new(platform);
    if target == 0 {
        stats.outcome = RunOutcome::TargetReached;
        return Ok(stats);
    }

    let mut session = Session {
        governor: RateGovernor::new(pacing),
        store,
    };
    source.begin(&mut session).await?;

    let outcome = 'pages: loop {
        let candidates = match source.next_page(&mut session).await {
            Page::Candidates(c) => c,
            Page::Exhausted => break RunOutcome::SourceExhausted,
            Page::Fatal(reason) => break RunOutcome::Fatal(reason),
        };

        let count = candidates.len();
        for (i, candidate) in candidates.iter().enumerate() {
            let step = process(source, &mut session, candidate, &mut stats, target).await;
            if step != RunOutcome::Continue {
                break 'pages step;
            }
            if i + 1 < count {
                governor::pause(source.candidate_pause()).await;
            }
        }

        if count > 0 {
            tracing::info!(
                platform = %platform,
                saved = stats.saved,
                target,
                "progress"
            );
        }
        governor::pause(source.page_pause()).await;
    };

    stats.outcome = outcome;
    match outcome {
        RunOutcome::Fatal(reason) => {
            tracing::error!(platform = %platform, saved = stats.saved, %reason, "adapter aborted")
        }
        other => tracing::info!(platform = %platform, saved = stats.saved, outcome = %other, "adapter finished"),
    }
    Ok(stats)
}

async fn process<D: Discovery>(
    source: &mut D,
    session: &mut Session<'_>,
    candidate: &D::Candidate,
    stats: &mut RunStats,
    target: usize,
) -> RunOutcome {
    match source.fetch_detail(session, candidate).await {
        Detail::Profile(profile) => {
            let inserted = save_profile(session.store, &profile).await;
            session.governor.record_save(inserted);
            if inserted {
                stats.saved += 1;
            } else {
                stats.duplicates += 1;
            }
            if stats.saved >= target {
                RunOutcome::TargetReached
            } else if session.governor.check_duplicate_stop() {
                RunOutcome::DuplicateSaturated
            } else {
                RunOutcome::Continue
            }
        }
        Detail::Miss => {
            tracing::debug!(platform = %source.platform(), %candidate, "no usable profile");
            stats.skipped += 1;
            RunOutcome::Continue
        }
        Detail::Fatal(reason) => RunOutcome::Fatal(reason),
    }
}

/// Decode a JSON body; a malformed body is a miss, not an error.
pub(crate) fn parse_json(platform: SourcePlatform, body: &str) -> Option<serde_json::Value> {
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(platform = %platform, error = %e, "malformed JSON body");
            None
        }
    }
}

/// One upstream source, selected from a closed set.
pub enum Adapter {
    CodeHost(GitHubAdapter),
    QnaSite(StackOverflowAdapter),
    ResearchRegistry(OrcidAdapter),
    CompetitionPlatform(KaggleAdapter),
    ProfessionalNetwork(LinkedInAdapter),
}

impl Adapter {
    pub fn from_config(platform: SourcePlatform, config: &Config) -> Result<Self> {
        let timeout = config.pacing.request_timeout_secs;
        let sources = &config.sources;
        Ok(match platform {
            SourcePlatform::CodeHost => {
                Adapter::CodeHost(GitHubAdapter::new(sources.github.clone(), timeout)?)
            }
            SourcePlatform::QnaSite => {
                Adapter::QnaSite(StackOverflowAdapter::new(sources.stackoverflow.clone(), timeout)?)
            }
            SourcePlatform::ResearchRegistry => {
                Adapter::ResearchRegistry(OrcidAdapter::new(sources.orcid.clone(), timeout)?)
            }
            SourcePlatform::CompetitionPlatform => {
                Adapter::CompetitionPlatform(KaggleAdapter::new(sources.kaggle.clone(), timeout)?)
            }
            SourcePlatform::ProfessionalNetwork => Adapter::ProfessionalNetwork(
                LinkedInAdapter::new(sources.linkedin.clone(), timeout)?,
            ),
        })
    }

    pub fn platform(&self) -> SourcePlatform {
        match self {
            Adapter::CodeHost(_) => SourcePlatform::CodeHost,
            Adapter::QnaSite(_) => SourcePlatform::QnaSite,
            Adapter::ResearchRegistry(_) => SourcePlatform::ResearchRegistry,
            Adapter::CompetitionPlatform(_) => SourcePlatform::CompetitionPlatform,
            Adapter::ProfessionalNetwork(_) => SourcePlatform::ProfessionalNetwork,
        }
    }

    /// Name of the missing configuration prerequisite, if any.
    pub fn missing_prerequisite(&self) -> Option<&'static str> {
        match self {
            Adapter::ProfessionalNetwork(a) if !a.has_session() => {
                Some("session cookie (SCRAPE_LINKEDIN_COOKIE)")
            }
            _ => None,
        }
    }

    /// Run one discovery pass, saving up to `target` new profiles.
    pub async fn discover(
        &mut self,
        store: &dyn ProfileStore,
        pacing: &PacingConfig,
        target: usize,
    ) -> Result<RunStats> {
        match self {
            Adapter::CodeHost(a) => drive(a, store, pacing, target).await,
            Adapter::QnaSite(a) => drive(a, store, pacing, target).await,
            Adapter::ResearchRegistry(a) => drive(a, store, pacing, target).await,
            Adapter::CompetitionPlatform(a) => drive(a, store, pacing, target).await,
            Adapter::ProfessionalNetwork(a) => drive(a, store, pacing, target).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Basics;
    use crate::store::memory::MemoryProfileStore;

    /// Scripted source: pages of ids; ids prefixed with `miss` produce no profile.
    struct Scripted {
        pages: Vec<Vec<String>>,
        fatal_on: Option<String>,
    }

    #[async_trait]
    impl Discovery for Scripted {
        type Candidate = String;

        fn platform(&self) -> SourcePlatform {
            SourcePlatform::QnaSite
        }

        async fn next_page(&mut self, _session: &mut Session<'_>) -> Page<String> {
            if self.pages.is_empty() {
                Page::Exhausted
            } else {
                Page::Candidates(self.pages.remove(0))
            }
        }

        async fn fetch_detail(&mut self, _session: &mut Session<'_>, id: &String) -> Detail {
            if self.fatal_on.as_deref() == Some(id.as_str()) {
                return Detail::Fatal(FatalReason::RateLimitExceeded);
            }
            if id.starts_with("miss") {
                return Detail::Miss;
            }
            let basics = Basics {
                name: format!("user {}", id),
                email: format!("{}@no-email.stackoverflow.com", id),
                ..Basics::default()
            };
            Detail::Profile(Box::new(CanonicalProfile::new(
                SourcePlatform::QnaSite,
                id.clone(),
                basics,
            )))
        }

        fn candidate_pause(&self) -> SleepWindow {
            SleepWindow::zero()
        }
    }

    fn ids(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| i.to_string()).collect()
    }

    fn pacing() -> PacingConfig {
        PacingConfig {
            backoff: SleepWindow::zero(),
            adapter_pause: SleepWindow::zero(),
            ..PacingConfig::default()
        }
    }

    #[tokio::test]
    async fn stops_at_target() {
        let store = MemoryProfileStore::new();
        let mut source = Scripted {
            pages: vec![ids(0..10), ids(10..20)],
            fatal_on: None,
        };
        let stats = drive(&mut source, &store, &pacing(), 12).await.unwrap();
        assert_eq!(stats.saved, 12);
        assert_eq!(stats.outcome, RunOutcome::TargetReached);
        assert_eq!(store.count().await.unwrap(), 12);
    }

    #[tokio::test]
    async fn exhausts_and_counts_misses() {
        let store = MemoryProfileStore::new();
        let mut source = Scripted {
            pages: vec![vec!["1".into(), "miss-a".into()], vec![], vec!["2".into()]],
            fatal_on: None,
        };
        let stats = drive(&mut source, &store, &pacing(), 100).await.unwrap();
        assert_eq!(stats.saved, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.outcome, RunOutcome::SourceExhausted);
    }

    #[tokio::test]
    async fn duplicate_saturation_stops_early() {
        let store = MemoryProfileStore::new();
        let mut first = Scripted {
            pages: vec![ids(0..60)],
            fatal_on: None,
        };
        drive(&mut first, &store, &pacing(), 1000).await.unwrap();

        let mut again = Scripted {
            pages: vec![ids(0..60), ids(60..70)],
            fatal_on: None,
        };
        let stats = drive(&mut again, &store, &pacing(), 1000).await.unwrap();
        assert_eq!(stats.outcome, RunOutcome::DuplicateSaturated);
        assert_eq!(stats.duplicates, 50);
        assert_eq!(stats.saved, 0);
    }

    #[tokio::test]
    async fn fatal_detail_ends_run() {
        let store = MemoryProfileStore::new();
        let mut source = Scripted {
            pages: vec![ids(0..5)],
            fatal_on: Some("2".into()),
        };
        let stats = drive(&mut source, &store, &pacing(), 100).await.unwrap();
        assert_eq!(stats.saved, 2);
        assert_eq!(
            stats.outcome,
            RunOutcome::Fatal(FatalReason::RateLimitExceeded)
        );
    }

    #[tokio::test]
    async fn zero_target_does_nothing() {
        let store = MemoryProfileStore::new();
        let mut source = Scripted {
            pages: vec![ids(0..5)],
            fatal_on: None,
        };
        let stats = drive(&mut source, &store, &pacing(), 0).await.unwrap();
        assert_eq!(stats.outcome, RunOutcome::TargetReached);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[test]
    fn linkedin_without_cookie_reports_prerequisite() {
        let config = Config::default();
        let adapter = Adapter::from_config(SourcePlatform::ProfessionalNetwork, &config).unwrap();
        assert!(adapter.missing_prerequisite().is_some());
        let github = Adapter::from_config(SourcePlatform::CodeHost, &config).unwrap();
        assert!(github.missing_prerequisite().is_none());
    }
}
