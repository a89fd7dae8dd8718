//! Competition-platform adapter (Kaggle web pages).
//!
//! Discovery scrapes one public feed page for single-segment profile links.
//! Detail reads the profile page's JSON-LD block.

use anyhow::Result;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::adapter::{Detail, Discovery, Page, Session};
use crate::config::{KaggleSourceConfig, SleepWindow};
use crate::http::{Fetch, HttpFetcher, Request};
use crate::models::{Basics, CanonicalProfile, Metrics, SourcePlatform};
use crate::normalize::{clean_str, extract_skills, resolve_email};

/// Top-level paths that look like profiles but are site sections.
const RESERVED_PATHS: &[&str] = &[
    "code",
    "datasets",
    "competitions",
    "discussion",
    "discussions",
    "learn",
    "models",
    "terms",
    "privacy",
    "about",
    "contact",
    "search",
    "rankings",
    "account",
];

pub struct KaggleAdapter {
    config: KaggleSourceConfig,
    http: HttpFetcher,
    feed_done: bool,
}

impl KaggleAdapter {
    pub fn new(config: KaggleSourceConfig, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            config,
            http: HttpFetcher::new(timeout_secs)?,
            feed_done: false,
        })
    }

    fn web(&self, path: &str) -> String {
        format!("{}{}", self.config.web_base.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Discovery for KaggleAdapter {
    type Candidate = String;

    fn platform(&self) -> SourcePlatform {
        SourcePlatform::CompetitionPlatform
    }

    async fn begin(&mut self, _session: &mut Session<'_>) -> Result<()> {
        self.feed_done = false;
        Ok(())
    }

    async fn next_page(&mut self, session: &mut Session<'_>) -> Page<String> {
        if self.feed_done {
            return Page::Exhausted;
        }
        self.feed_done = true;

        let request = Request::get(self.web(&self.config.feed_path))
            .referer("https://www.google.com/")
            .html();
        match self.http.get(&mut session.governor, &request).await {
            Fetch::Body(html) => {
                let users = profile_links(&html);
                tracing::info!(platform = "Kaggle", candidates = users.len(), "feed scraped");
                Page::Candidates(users.into_iter().collect())
            }
            Fetch::Skip(reason) => {
                tracing::warn!(platform = "Kaggle", ?reason, "feed unavailable");
                Page::Exhausted
            }
            Fetch::Fatal(reason) => Page::Fatal(reason),
        }
    }

    async fn fetch_detail(&mut self, session: &mut Session<'_>, username: &String) -> Detail {
        let request = Request::get(self.web(&format!("/{}", username)))
            .referer(self.web(&self.config.feed_path))
            .html();
        match self.http.get(&mut session.governor, &request).await {
            Fetch::Body(html) => {
                let data = json_ld(&html).unwrap_or(Value::Null);
                let website = self.web(&format!("/{}", username));
                Detail::Profile(Box::new(normalize_profile(&data, username, website)))
            }
            Fetch::Skip(_) => Detail::Miss,
            Fetch::Fatal(reason) => Detail::Fatal(reason),
        }
    }

    fn candidate_pause(&self) -> SleepWindow {
        self.config.pause
    }
}

/// Distinct usernames from `/{user}` links on a feed page.
pub fn profile_links(html: &str) -> BTreeSet<String> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return BTreeSet::new();
    };
    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let user = href.strip_prefix('/')?;
            let user = user.trim_end_matches('/');
            if user.is_empty() || user.contains(['/', '?', '#']) {
                return None;
            }
            if RESERVED_PATHS.contains(&user.to_ascii_lowercase().as_str()) {
                return None;
            }
            Some(user.to_string())
        })
        .collect()
}

/// First parseable `application/ld+json` block on the page.
pub fn json_ld(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    document
        .select(&selector)
        .find_map(|script| serde_json::from_str(&script.inner_html()).ok())
}

/// Performance tier as stated in the profile description.
pub fn tier_from_description(description: &str) -> &'static str {
    if description.contains("Grandmaster") {
        "Grandmaster"
    } else if description.contains("Master") {
        "Master"
    } else {
        "Contributor"
    }
}

/// Map JSON-LD profile data to a profile. Pages without structured data
/// still produce a minimal profile keyed by username.
pub fn normalize_profile(data: &Value, username: &str, website: String) -> CanonicalProfile {
    let description = clean_str(&data["description"]);
    let name = clean_str(&data["name"]);

    let basics = Basics {
        name: if name.is_empty() {
            username.to_string()
        } else {
            name
        },
        headline: description.clone(),
        location: clean_str(&data["address"]["addressLocality"]),
        current_affiliation: clean_str(&data["worksFor"]["name"]),
        website,
        email: resolve_email(&data["email"], username, SourcePlatform::CompetitionPlatform),
    };

    let metrics = Metrics {
        tier: tier_from_description(&description).to_string(),
        ..Metrics::default()
    };

    CanonicalProfile::new(SourcePlatform::CompetitionPlatform, username, basics)
        .with_metrics(metrics)
        .with_skills(["Data Science".to_string()])
        .with_skills(extract_skills(&description))
}
