//! Configuration parsing and validation.
//!
//! Settings come from an optional TOML file (default `./config/harvest.toml`)
//! and are then overridden by environment variables. A `.env` file in the
//! working directory is loaded by the binary before [`load_config`] runs.
//!
//! # Environment Overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `HARVEST_DB_DIR` | `db.dir` |
//! | `HARVEST_DB_NAME` | `db.name` |
//! | `HARVEST_BIND` | `server.bind` |
//! | `SCRAPE_GITHUB_TOKEN` | `sources.github.token` |
//! | `SCRAPE_LINKEDIN_COOKIE` | `sources.linkedin.session_cookie` |
//!
//! # Example
//!
//! ```toml
//! [db]
//! dir = "./data"
//! name = "profile_scraper"
//!
//! [pacing]
//! max_consecutive_throttles = 3
//! duplicate_stop_threshold = 50
//! backoff = { min_secs = 60.0, max_secs = 120.0 }
//! adapter_pause = { min_secs = 10.0, max_secs = 20.0 }
//!
//! [sources.github]
//! target = 5000
//! topics = ["rust", "go"]
//!
//! [sources.linkedin]
//! enabled = false
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::SourcePlatform;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Directory holding the store file.
    #[serde(default = "default_db_dir")]
    pub dir: PathBuf,
    /// Database name; the store file is `{dir}/{name}.sqlite`.
    #[serde(default = "default_db_name")]
    pub name: String,
}

impl DbConfig {
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.sqlite", self.name))
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dir: default_db_dir(),
            name: default_db_name(),
        }
    }
}

fn default_db_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_db_name() -> String {
    "profile_scraper".to_string()
}

/// A randomized sleep range in seconds. A zero-width window at zero disables the pause.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct SleepWindow {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl SleepWindow {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    fn validate(&self, field: &str) -> Result<()> {
        if self.min_secs < 0.0 || self.max_secs < self.min_secs {
            bail!(
                "{} must satisfy 0 <= min_secs <= max_secs (got {}..{})",
                field,
                self.min_secs,
                self.max_secs
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PacingConfig {
    /// Throttle responses tolerated in a row; one more aborts the adapter.
    #[serde(default = "default_max_throttles")]
    pub max_consecutive_throttles: u32,
    /// Consecutive duplicate saves after which a source counts as fully synced.
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_stop_threshold: u32,
    /// Base throttle backoff window, scaled by the consecutive throttle count.
    #[serde(default = "default_backoff")]
    pub backoff: SleepWindow,
    /// Pause between two adapters in one ingestion pass.
    #[serde(default = "default_adapter_pause")]
    pub adapter_pause: SleepWindow,
    /// Per-request timeout for upstream calls.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            max_consecutive_throttles: default_max_throttles(),
            duplicate_stop_threshold: default_duplicate_threshold(),
            backoff: default_backoff(),
            adapter_pause: default_adapter_pause(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_max_throttles() -> u32 {
    3
}
fn default_duplicate_threshold() -> u32 {
    50
}
fn default_backoff() -> SleepWindow {
    SleepWindow::new(60.0, 120.0)
}
fn default_adapter_pause() -> SleepWindow {
    SleepWindow::new(10.0, 20.0)
}
fn default_request_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub github: GitHubSourceConfig,
    #[serde(default)]
    pub stackoverflow: StackOverflowSourceConfig,
    #[serde(default)]
    pub orcid: OrcidSourceConfig,
    #[serde(default)]
    pub kaggle: KaggleSourceConfig,
    #[serde(default)]
    pub linkedin: LinkedInSourceConfig,
}

impl SourcesConfig {
    /// Whether the adapter for `platform` is switched on.
    pub fn enabled(&self, platform: SourcePlatform) -> bool {
        match platform {
            SourcePlatform::CodeHost => self.github.enabled,
            SourcePlatform::QnaSite => self.stackoverflow.enabled,
            SourcePlatform::ResearchRegistry => self.orcid.enabled,
            SourcePlatform::CompetitionPlatform => self.kaggle.enabled,
            SourcePlatform::ProfessionalNetwork => self.linkedin.enabled,
        }
    }

    /// Configured target count for the adapter of `platform`.
    pub fn target(&self, platform: SourcePlatform) -> usize {
        match platform {
            SourcePlatform::CodeHost => self.github.target,
            SourcePlatform::QnaSite => self.stackoverflow.target,
            SourcePlatform::ResearchRegistry => self.orcid.target,
            SourcePlatform::CompetitionPlatform => self.kaggle.target,
            SourcePlatform::ProfessionalNetwork => self.linkedin.target,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubSourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_github_target")]
    pub target: usize,
    #[serde(default = "default_github_api")]
    pub api_base: String,
    #[serde(default = "default_github_topics")]
    pub topics: Vec<String>,
    #[serde(default = "default_github_pause")]
    pub pause: SleepWindow,
    /// Access token sent as a bearer credential. Optional; without it the
    /// upstream applies its anonymous rate limit.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for GitHubSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: default_github_target(),
            api_base: default_github_api(),
            topics: default_github_topics(),
            pause: default_github_pause(),
            token: None,
        }
    }
}

fn default_github_target() -> usize {
    5000
}
fn default_github_api() -> String {
    "https://api.github.com".to_string()
}
fn default_github_topics() -> Vec<String> {
    [
        "python",
        "javascript",
        "machine-learning",
        "react",
        "go",
        "rust",
        "data-science",
        "devops",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_github_pause() -> SleepWindow {
    SleepWindow::new(1.5, 3.0)
}

#[derive(Debug, Deserialize, Clone)]
pub struct StackOverflowSourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_so_target")]
    pub target: usize,
    #[serde(default = "default_so_api")]
    pub api_base: String,
    #[serde(default = "default_so_site")]
    pub site: String,
    #[serde(default = "default_so_page_size")]
    pub page_size: u32,
    /// Pause between listing pages (candidates arrive inline with the page).
    #[serde(default = "default_so_pause")]
    pub pause: SleepWindow,
}

impl Default for StackOverflowSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: default_so_target(),
            api_base: default_so_api(),
            site: default_so_site(),
            page_size: default_so_page_size(),
            pause: default_so_pause(),
        }
    }
}

fn default_so_target() -> usize {
    3000
}
fn default_so_api() -> String {
    "https://api.stackexchange.com/2.3".to_string()
}
fn default_so_site() -> String {
    "stackoverflow".to_string()
}
fn default_so_page_size() -> u32 {
    100
}
fn default_so_pause() -> SleepWindow {
    SleepWindow::new(2.0, 4.0)
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrcidSourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_orcid_target")]
    pub target: usize,
    #[serde(default = "default_orcid_api")]
    pub api_base: String,
    #[serde(default = "default_orcid_keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "default_orcid_rows")]
    pub rows: u32,
    /// Search offset cap per keyword.
    #[serde(default = "default_orcid_max_start")]
    pub max_start: u32,
    #[serde(default = "default_orcid_pause")]
    pub pause: SleepWindow,
}

impl Default for OrcidSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: default_orcid_target(),
            api_base: default_orcid_api(),
            keywords: default_orcid_keywords(),
            rows: default_orcid_rows(),
            max_start: default_orcid_max_start(),
            pause: default_orcid_pause(),
        }
    }
}

fn default_orcid_target() -> usize {
    2000
}
fn default_orcid_api() -> String {
    "https://pub.orcid.org/v3.0".to_string()
}
fn default_orcid_keywords() -> Vec<String> {
    [
        "Machine Learning",
        "Quantum Computing",
        "Data Science",
        "Bioinformatics",
        "Cybersecurity",
        "Blockchain",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_orcid_rows() -> u32 {
    50
}
fn default_orcid_max_start() -> u32 {
    500
}
fn default_orcid_pause() -> SleepWindow {
    SleepWindow::new(1.0, 2.0)
}

#[derive(Debug, Deserialize, Clone)]
pub struct KaggleSourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_kaggle_target")]
    pub target: usize,
    #[serde(default = "default_kaggle_web")]
    pub web_base: String,
    /// Feed path scraped for profile links.
    #[serde(default = "default_kaggle_feed")]
    pub feed_path: String,
    #[serde(default = "default_kaggle_pause")]
    pub pause: SleepWindow,
}

impl Default for KaggleSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: default_kaggle_target(),
            web_base: default_kaggle_web(),
            feed_path: default_kaggle_feed(),
            pause: default_kaggle_pause(),
        }
    }
}

fn default_kaggle_target() -> usize {
    500
}
fn default_kaggle_web() -> String {
    "https://www.kaggle.com".to_string()
}
fn default_kaggle_feed() -> String {
    "/code".to_string()
}
fn default_kaggle_pause() -> SleepWindow {
    SleepWindow::new(3.0, 6.0)
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinkedInSourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_linkedin_target")]
    pub target: usize,
    #[serde(default = "default_linkedin_web")]
    pub web_base: String,
    #[serde(default = "default_linkedin_keywords")]
    pub keywords: Vec<String>,
    /// Result pages fetched per keyword.
    #[serde(default = "default_linkedin_pages")]
    pub max_pages: u32,
    #[serde(default = "default_linkedin_pause")]
    pub pause: SleepWindow,
    /// Session cookie (`li_at`). Without it the adapter does nothing.
    #[serde(default)]
    pub session_cookie: Option<String>,
}

impl Default for LinkedInSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: default_linkedin_target(),
            web_base: default_linkedin_web(),
            keywords: default_linkedin_keywords(),
            max_pages: default_linkedin_pages(),
            pause: default_linkedin_pause(),
            session_cookie: None,
        }
    }
}

fn default_linkedin_target() -> usize {
    300
}
fn default_linkedin_web() -> String {
    "https://www.linkedin.com".to_string()
}
fn default_linkedin_keywords() -> Vec<String> {
    ["Software Engineer", "Data Scientist", "Machine Learning Engineer"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_linkedin_pages() -> u32 {
    10
}
fn default_linkedin_pause() -> SleepWindow {
    SleepWindow::new(5.0, 10.0)
}

/// Load configuration from `path` (if present), apply environment
/// overrides, and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Config::default()
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Apply `HARVEST_*` / `SCRAPE_*` overrides. `lookup` returns the value of
/// a variable, if set; blank values are ignored.
pub fn apply_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(dir) = get("HARVEST_DB_DIR") {
        config.db.dir = PathBuf::from(dir);
    }
    if let Some(name) = get("HARVEST_DB_NAME") {
        config.db.name = name;
    }
    if let Some(bind) = get("HARVEST_BIND") {
        config.server.bind = bind;
    }
    if let Some(token) = get("SCRAPE_GITHUB_TOKEN") {
        config.sources.github.token = Some(token);
    }
    if let Some(cookie) = get("SCRAPE_LINKEDIN_COOKIE") {
        config.sources.linkedin.session_cookie = Some(cookie);
    }
}

pub fn validate(config: &Config) -> Result<()> {
    if config.db.name.trim().is_empty() {
        bail!("db.name must not be empty");
    }

    let pacing = &config.pacing;
    if pacing.max_consecutive_throttles == 0 {
        bail!("pacing.max_consecutive_throttles must be >= 1");
    }
    if pacing.duplicate_stop_threshold == 0 {
        bail!("pacing.duplicate_stop_threshold must be >= 1");
    }
    if pacing.request_timeout_secs == 0 {
        bail!("pacing.request_timeout_secs must be > 0");
    }
    pacing.backoff.validate("pacing.backoff")?;
    pacing.adapter_pause.validate("pacing.adapter_pause")?;

    let sources = &config.sources;
    sources.github.pause.validate("sources.github.pause")?;
    sources.stackoverflow.pause.validate("sources.stackoverflow.pause")?;
    sources.orcid.pause.validate("sources.orcid.pause")?;
    sources.kaggle.pause.validate("sources.kaggle.pause")?;
    sources.linkedin.pause.validate("sources.linkedin.pause")?;

    if sources.stackoverflow.page_size == 0 || sources.stackoverflow.page_size > 100 {
        bail!("sources.stackoverflow.page_size must be in 1..=100");
    }
    if sources.orcid.rows == 0 {
        bail!("sources.orcid.rows must be > 0");
    }

    Ok(())
}
