//! Professional-network adapter (LinkedIn web pages).
//!
//! Only runs with a session cookie; without one, discovery stops at once
//! with [`FatalReason::MissingCredential`]. Discovery walks people-search
//! result pages per keyword and collects `/in/{slug}` links; detail reads
//! the public profile's JSON-LD `Person`.
//!
//! Any response that lands on a login or challenge page ends the run.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::adapter::{Detail, Discovery, FatalReason, Page, Session};
use crate::adapter_kaggle::json_ld;
use crate::config::{LinkedInSourceConfig, SleepWindow};
use crate::http::{Fetch, HttpFetcher, Request};
use crate::models::{Basics, CanonicalProfile, Metrics, SourcePlatform};
use crate::normalize::{clean_int, clean_str, extract_skills, resolve_email};

pub const AUTH_WALL_MARKERS: &[&str] = &["/checkpoint/challenge", "authwall"];

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/in/([A-Za-z0-9][A-Za-z0-9\-_%]*)").expect("profile slug pattern is valid")
    })
}

pub struct LinkedInAdapter {
    config: LinkedInSourceConfig,
    http: HttpFetcher,
    keyword: usize,
    page: u32,
    seen: HashSet<String>,
}

impl LinkedInAdapter {
    pub fn new(config: LinkedInSourceConfig, timeout_secs: u64) -> Result<Self> {
        let mut http = HttpFetcher::new(timeout_secs)?.with_auth_markers(AUTH_WALL_MARKERS);
        if let Some(cookie) = config.session_cookie.as_deref() {
            http = http.with_header("Cookie", format!("li_at={}", cookie));
        }
        Ok(Self {
            config,
            http,
            keyword: 0,
            page: 1,
            seen: HashSet::new(),
        })
    }

    pub fn has_session(&self) -> bool {
        self.config
            .session_cookie
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty())
    }

    fn web(&self, path: &str) -> String {
        format!("{}{}", self.config.web_base.trim_end_matches('/'), path)
    }

    fn advance_keyword(&mut self) {
        self.keyword += 1;
        self.page = 1;
    }
}

#[async_trait]
impl Discovery for LinkedInAdapter {
    type Candidate = String;

    fn platform(&self) -> SourcePlatform {
        SourcePlatform::ProfessionalNetwork
    }

    async fn begin(&mut self, _session: &mut Session<'_>) -> Result<()> {
        self.keyword = 0;
        self.page = 1;
        self.seen.clear();
        Ok(())
    }

    async fn next_page(&mut self, session: &mut Session<'_>) -> Page<String> {
        if !self.has_session() {
            return Page::Fatal(FatalReason::MissingCredential);
        }
        let Some(keyword) = self.config.keywords.get(self.keyword).cloned() else {
            return Page::Exhausted;
        };
        if self.page > self.config.max_pages {
            self.advance_keyword();
            return Page::Candidates(Vec::new());
        }

        let request = Request::get(self.web("/search/results/people/"))
            .query("keywords", &keyword)
            .query("page", self.page)
            .referer(self.web("/feed/"))
            .html();
        let html = match self.http.get(&mut session.governor, &request).await {
            Fetch::Body(html) => html,
            Fetch::Skip(reason) => {
                tracing::warn!(platform = "LinkedIn", %keyword, page = self.page, ?reason, "search page failed");
                self.advance_keyword();
                return Page::Candidates(Vec::new());
            }
            Fetch::Fatal(reason) => return Page::Fatal(reason),
        };

        let slugs: Vec<String> = profile_slugs(&html)
            .into_iter()
            .filter(|slug| self.seen.insert(slug.clone()))
            .collect();
        if slugs.is_empty() {
            self.advance_keyword();
        } else {
            self.page += 1;
        }
        Page::Candidates(slugs)
    }

    async fn fetch_detail(&mut self, session: &mut Session<'_>, slug: &String) -> Detail {
        let request = Request::get(self.web(&format!("/in/{}/", slug)))
            .referer(self.web("/search/results/people/"))
            .html();
        match self.http.get(&mut session.governor, &request).await {
            Fetch::Body(html) => json_ld(&html)
                .and_then(|data| find_person(&data).cloned())
                .and_then(|person| normalize_person(&person, slug, self.web(&format!("/in/{}", slug))))
                .map(|p| Detail::Profile(Box::new(p)))
                .unwrap_or(Detail::Miss),
            Fetch::Skip(_) => Detail::Miss,
            Fetch::Fatal(reason) => Detail::Fatal(reason),
        }
    }

    fn candidate_pause(&self) -> SleepWindow {
        self.config.pause
    }

    fn page_pause(&self) -> SleepWindow {
        self.config.pause
    }
}

/// Distinct profile slugs linked from a page, in first-seen order.
pub fn profile_slugs(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    slug_pattern()
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .filter(|slug| seen.insert(slug.clone()))
        .collect()
}

/// The `Person` node of a JSON-LD document, at the top level or in `@graph`.
pub fn find_person(data: &Value) -> Option<&Value> {
    let is_person = |v: &&Value| v["@type"].as_str() == Some("Person");
    if is_person(&data) {
        return Some(data);
    }
    data["@graph"].as_array()?.iter().find(is_person)
}

/// String or first element of a string array.
fn first_text(value: &Value) -> String {
    match value {
        Value::Array(items) => items.first().map(clean_str).unwrap_or_default(),
        other => clean_str(other),
    }
}

/// Follower count from `interactionStatistic` entries of type `FollowAction`.
fn follower_count(person: &Value) -> i64 {
    let stats = &person["interactionStatistic"];
    let entries: Vec<&Value> = match stats {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![stats],
        _ => Vec::new(),
    };
    entries
        .into_iter()
        .find(|s| {
            s["interactionType"]
                .as_str()
                .or_else(|| s["interactionType"]["@type"].as_str())
                .is_some_and(|t| t.ends_with("FollowAction"))
        })
        .map(|s| clean_int(&s["userInteractionCount"]))
        .unwrap_or(crate::models::UNKNOWN)
}

/// Map a JSON-LD `Person` to a profile. `None` without a name.
pub fn normalize_person(person: &Value, slug: &str, website: String) -> Option<CanonicalProfile> {
    let name = clean_str(&person["name"]);
    if name.is_empty() {
        return None;
    }
    let headline = first_text(&person["jobTitle"]);
    let description = clean_str(&person["description"]);
    let works_for = match &person["worksFor"] {
        Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
        other => other.clone(),
    };

    let basics = Basics {
        name,
        headline: headline.clone(),
        location: clean_str(&person["address"]["addressLocality"]),
        current_affiliation: clean_str(&works_for["name"]),
        website,
        email: resolve_email(&person["email"], slug, SourcePlatform::ProfessionalNetwork),
    };

    let metrics = Metrics {
        followers: follower_count(person),
        ..Metrics::default()
    };

    Some(
        CanonicalProfile::new(SourcePlatform::ProfessionalNetwork, slug, basics)
            .with_metrics(metrics)
            .with_skills(extract_skills(&headline))
            .with_skills(extract_skills(&description)),
    )
}
