//! Core data models used throughout the harvester.
//!
//! [`CanonicalProfile`] is the unit of storage: one person's identity on one
//! source platform. Every adapter produces it, the store persists it, and the
//! analytic tools return it.
//!
//! Numeric metrics use [`UNKNOWN`] (`-1`) for "not produced by this source",
//! which is distinct from a measured zero.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Sentinel for a metric the source does not provide.
pub const UNKNOWN: i64 = -1;

/// Upstream data origin. The serialized form is the stored platform tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourcePlatform {
    #[serde(rename = "GitHub")]
    CodeHost,
    #[serde(rename = "StackOverflow")]
    QnaSite,
    #[serde(rename = "ORCID")]
    ResearchRegistry,
    #[serde(rename = "Kaggle")]
    CompetitionPlatform,
    #[serde(rename = "LinkedIn")]
    ProfessionalNetwork,
}

impl SourcePlatform {
    pub const ALL: [SourcePlatform; 5] = [
        SourcePlatform::CodeHost,
        SourcePlatform::QnaSite,
        SourcePlatform::ResearchRegistry,
        SourcePlatform::CompetitionPlatform,
        SourcePlatform::ProfessionalNetwork,
    ];

    /// Stored tag, e.g. `"GitHub"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePlatform::CodeHost => "GitHub",
            SourcePlatform::QnaSite => "StackOverflow",
            SourcePlatform::ResearchRegistry => "ORCID",
            SourcePlatform::CompetitionPlatform => "Kaggle",
            SourcePlatform::ProfessionalNetwork => "LinkedIn",
        }
    }

    /// Config section and CLI name, e.g. `"github"`.
    pub fn key(&self) -> &'static str {
        match self {
            SourcePlatform::CodeHost => "github",
            SourcePlatform::QnaSite => "stackoverflow",
            SourcePlatform::ResearchRegistry => "orcid",
            SourcePlatform::CompetitionPlatform => "kaggle",
            SourcePlatform::ProfessionalNetwork => "linkedin",
        }
    }

    /// Domain used for synthetic placeholder emails.
    pub fn email_domain(&self) -> &'static str {
        match self {
            SourcePlatform::CodeHost => "github.com",
            SourcePlatform::QnaSite => "stackoverflow.com",
            SourcePlatform::ResearchRegistry => "orcid.org",
            SourcePlatform::CompetitionPlatform => "kaggle.com",
            SourcePlatform::ProfessionalNetwork => "linkedin.com",
        }
    }
}

impl fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourcePlatform {
    type Err = anyhow::Error;

    /// Accepts either the stored tag or the config key, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        SourcePlatform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(needle) || p.key().eq_ignore_ascii_case(needle))
            .ok_or_else(|| anyhow::anyhow!("invalid platform: '{}'", s))
    }
}

/// Biographical fields shared by every source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Basics {
    pub name: String,
    pub headline: String,
    pub location: String,
    pub current_affiliation: String,
    pub website: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medals {
    pub gold: i64,
    pub silver: i64,
    pub bronze: i64,
}

impl Default for Medals {
    fn default() -> Self {
        Self {
            gold: UNKNOWN,
            silver: UNKNOWN,
            bronze: UNKNOWN,
        }
    }
}

/// Per-source measurements. Every numeric field defaults to [`UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    pub followers: i64,
    pub following: i64,
    pub contribution_count: i64,
    pub reputation_score: i64,
    pub citation_count: i64,
    pub h_index: i64,
    pub publication_count: i64,
    pub competitions_count: i64,
    pub profile_views: i64,
    pub tier: String,
    pub medals: Medals,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            followers: UNKNOWN,
            following: UNKNOWN,
            contribution_count: UNKNOWN,
            reputation_score: UNKNOWN,
            citation_count: UNKNOWN,
            h_index: UNKNOWN,
            publication_count: UNKNOWN,
            competitions_count: UNKNOWN,
            profile_views: UNKNOWN,
            tier: String::new(),
            medals: Medals::default(),
        }
    }
}

impl Metrics {
    /// Raw value including the sentinel.
    pub fn get(&self, metric: Metric) -> i64 {
        match metric {
            Metric::Followers => self.followers,
            Metric::Following => self.following,
            Metric::ContributionCount => self.contribution_count,
            Metric::ReputationScore => self.reputation_score,
            Metric::CitationCount => self.citation_count,
            Metric::HIndex => self.h_index,
            Metric::PublicationCount => self.publication_count,
            Metric::CompetitionsCount => self.competitions_count,
            Metric::ProfileViews => self.profile_views,
            Metric::MedalsGold => self.medals.gold,
            Metric::MedalsSilver => self.medals.silver,
            Metric::MedalsBronze => self.medals.bronze,
        }
    }

    /// `None` when the source did not produce this metric.
    pub fn known(&self, metric: Metric) -> Option<i64> {
        let value = self.get(metric);
        (value != UNKNOWN).then_some(value)
    }
}

/// Named numeric metric, addressable from tool parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Followers,
    Following,
    ContributionCount,
    ReputationScore,
    CitationCount,
    HIndex,
    PublicationCount,
    CompetitionsCount,
    ProfileViews,
    MedalsGold,
    MedalsSilver,
    MedalsBronze,
}

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::Followers,
        Metric::Following,
        Metric::ContributionCount,
        Metric::ReputationScore,
        Metric::CitationCount,
        Metric::HIndex,
        Metric::PublicationCount,
        Metric::CompetitionsCount,
        Metric::ProfileViews,
        Metric::MedalsGold,
        Metric::MedalsSilver,
        Metric::MedalsBronze,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Metric::Followers => "followers",
            Metric::Following => "following",
            Metric::ContributionCount => "contribution_count",
            Metric::ReputationScore => "reputation_score",
            Metric::CitationCount => "citation_count",
            Metric::HIndex => "h_index",
            Metric::PublicationCount => "publication_count",
            Metric::CompetitionsCount => "competitions_count",
            Metric::ProfileViews => "profile_views",
            Metric::MedalsGold => "medals.gold",
            Metric::MedalsSilver => "medals.silver",
            Metric::MedalsBronze => "medals.bronze",
        }
    }

    /// SQLite JSON path into the stored metrics object.
    pub fn json_path(&self) -> String {
        format!("$.{}", self.key())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().trim_start_matches("metrics.");
        Metric::ALL
            .into_iter()
            .find(|m| m.key().eq_ignore_ascii_case(needle))
            .ok_or_else(|| {
                let allowed: Vec<&str> = Metric::ALL.iter().map(|m| m.key()).collect();
                anyhow::anyhow!(
                    "invalid metric: '{}' (expected one of {})",
                    s,
                    allowed.join(", ")
                )
            })
    }
}

/// One person's identity on one source platform.
///
/// `(source_platform, source_id)` is the identity key. Skills are a set;
/// `affiliations` and `publications` are reserved and currently empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProfile {
    pub source_platform: SourcePlatform,
    pub source_id: String,
    pub basics: Basics,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default)]
    pub affiliations: Vec<serde_json::Value>,
    #[serde(default)]
    pub publications: Vec<serde_json::Value>,
}

impl CanonicalProfile {
    pub fn new(source_platform: SourcePlatform, source_id: impl Into<String>, basics: Basics) -> Self {
        Self {
            source_platform,
            source_id: source_id.into(),
            basics,
            metrics: Metrics::default(),
            skills: BTreeSet::new(),
            affiliations: Vec::new(),
            publications: Vec::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills.extend(skills.into_iter().map(Into::into));
        self
    }
}
