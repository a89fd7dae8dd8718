//! Code-host adapter (GitHub REST API).
//!
//! Discovery searches repositories per configured topic, sorted by stars,
//! and yields each distinct repository owner. Detail fetches the owner's
//! user record. Accounts with no bio, location, or company are dropped as
//! too thin to be useful.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use crate::adapter::{parse_json, Detail, Discovery, Page, Session};
use crate::config::{GitHubSourceConfig, SleepWindow};
use crate::http::{Fetch, HttpFetcher, Request};
use crate::models::{Basics, CanonicalProfile, Metrics, SourcePlatform};
use crate::normalize::{clean_int, clean_str, extract_skills, first_non_empty, resolve_email};

const SEARCH_PAGE_SIZE: u32 = 100;

/// A repository owner found under a topic.
#[derive(Debug, Clone)]
pub struct OwnerRef {
    pub login: String,
    pub topic: String,
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.login)
    }
}

pub struct GitHubAdapter {
    config: GitHubSourceConfig,
    http: HttpFetcher,
    next_topic: usize,
    seen: HashSet<String>,
}

impl GitHubAdapter {
    pub fn new(config: GitHubSourceConfig, timeout_secs: u64) -> Result<Self> {
        let mut http = HttpFetcher::new(timeout_secs)?
            .with_header("X-GitHub-Api-Version", "2022-11-28");
        match config.token.as_deref() {
            Some(token) => http = http.with_header("Authorization", format!("Bearer {}", token)),
            None => tracing::warn!("no GitHub token configured; anonymous rate limits apply"),
        }
        Ok(Self {
            config,
            http,
            next_topic: 0,
            seen: HashSet::new(),
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Discovery for GitHubAdapter {
    type Candidate = OwnerRef;

    fn platform(&self) -> SourcePlatform {
        SourcePlatform::CodeHost
    }

    async fn begin(&mut self, _session: &mut Session<'_>) -> Result<()> {
        self.next_topic = 0;
        self.seen.clear();
        Ok(())
    }

    async fn next_page(&mut self, session: &mut Session<'_>) -> Page<OwnerRef> {
        let Some(topic) = self.config.topics.get(self.next_topic).cloned() else {
            return Page::Exhausted;
        };
        self.next_topic += 1;
        tracing::info!(platform = "GitHub", %topic, "searching repositories");

        let request = Request::get(self.api("/search/repositories"))
            .query("q", format!("topic:{}", topic))
            .query("sort", "stars")
            .query("order", "desc")
            .query("per_page", SEARCH_PAGE_SIZE)
            .referer("https://github.com/search");

        let body = match self.http.get(&mut session.governor, &request).await {
            Fetch::Body(body) => body,
            Fetch::Skip(reason) => {
                tracing::warn!(platform = "GitHub", %topic, ?reason, "repository search failed");
                return Page::Candidates(Vec::new());
            }
            Fetch::Fatal(reason) => return Page::Fatal(reason),
        };

        let Some(json) = parse_json(SourcePlatform::CodeHost, &body) else {
            return Page::Candidates(Vec::new());
        };
        let owners = owners_from_search(&json)
            .into_iter()
            .filter(|login| self.seen.insert(login.clone()))
            .map(|login| OwnerRef {
                login,
                topic: topic.clone(),
            })
            .collect();
        Page::Candidates(owners)
    }

    async fn fetch_detail(&mut self, session: &mut Session<'_>, owner: &OwnerRef) -> Detail {
        let request =
            Request::get(self.api(&format!("/users/{}", owner.login))).referer("https://github.com/");
        match self.http.get(&mut session.governor, &request).await {
            Fetch::Body(body) => parse_json(SourcePlatform::CodeHost, &body)
                .and_then(|raw| normalize_user(&raw, &owner.topic))
                .map(|p| Detail::Profile(Box::new(p)))
                .unwrap_or(Detail::Miss),
            Fetch::Skip(_) => Detail::Miss,
            Fetch::Fatal(reason) => Detail::Fatal(reason),
        }
    }

    fn candidate_pause(&self) -> SleepWindow {
        self.config.pause
    }
}

/// Distinct owner logins from a repository search response, in rank order.
pub fn owners_from_search(json: &Value) -> Vec<String> {
    let mut seen = HashSet::new();
    json.get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|repo| clean_str(&repo["owner"]["login"]))
                .filter(|login| !login.is_empty() && seen.insert(login.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Map a user record to a profile. `None` when the record has no id or no
/// biographical signal at all.
pub fn normalize_user(raw: &Value, topic: &str) -> Option<CanonicalProfile> {
    let bio = clean_str(&raw["bio"]);
    let location = clean_str(&raw["location"]);
    let company = clean_str(&raw["company"]);
    if bio.is_empty() && location.is_empty() && company.is_empty() {
        return None;
    }

    let source_id = clean_str(&raw["id"]);
    if source_id.is_empty() {
        return None;
    }
    let login = clean_str(&raw["login"]);
    let handle = if login.is_empty() { &source_id } else { &login };

    let basics = Basics {
        name: first_non_empty([&raw["name"], &raw["login"], &raw["id"]]),
        headline: bio.clone(),
        location,
        current_affiliation: company,
        website: clean_str(&raw["blog"]),
        email: resolve_email(&raw["email"], handle, SourcePlatform::CodeHost),
    };

    let metrics = Metrics {
        followers: clean_int(&raw["followers"]),
        following: clean_int(&raw["following"]),
        contribution_count: clean_int(&raw["public_repos"]),
        ..Metrics::default()
    };

    Some(
        CanonicalProfile::new(SourcePlatform::CodeHost, source_id, basics)
            .with_metrics(metrics)
            .with_skills(extract_skills(&bio))
            .with_skills(extract_skills(topic)),
    )
}
