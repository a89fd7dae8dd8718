//! Researcher-registry adapter (ORCID public API).
//!
//! Discovery runs the registry search for each configured keyword, paging
//! by `rows` up to `max_start`. Detail fetches the full public record.
//! Records without a name are dropped.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::adapter::{parse_json, Detail, Discovery, Page, Session};
use crate::config::{OrcidSourceConfig, SleepWindow};
use crate::http::{Fetch, HttpFetcher, Request};
use crate::models::{Basics, CanonicalProfile, Metrics, SourcePlatform, UNKNOWN};
use crate::normalize::{clean_str, extract_skills, resolve_email};

const HEADLINE: &str = "Researcher";

/// An ORCID iD found by a keyword search.
#[derive(Debug, Clone)]
pub struct OrcidRef {
    pub id: String,
    pub keyword: String,
}

impl fmt::Display for OrcidRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

pub struct OrcidAdapter {
    config: OrcidSourceConfig,
    http: HttpFetcher,
    keyword: usize,
    start: u32,
}

impl OrcidAdapter {
    pub fn new(config: OrcidSourceConfig, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            config,
            http: HttpFetcher::new(timeout_secs)?,
            keyword: 0,
            start: 0,
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn advance_keyword(&mut self) {
        self.keyword += 1;
        self.start = 0;
    }
}

#[async_trait]
impl Discovery for OrcidAdapter {
    type Candidate = OrcidRef;

    fn platform(&self) -> SourcePlatform {
        SourcePlatform::ResearchRegistry
    }

    async fn begin(&mut self, _session: &mut Session<'_>) -> Result<()> {
        self.keyword = 0;
        self.start = 0;
        Ok(())
    }

    async fn next_page(&mut self, session: &mut Session<'_>) -> Page<OrcidRef> {
        let Some(keyword) = self.config.keywords.get(self.keyword).cloned() else {
            return Page::Exhausted;
        };
        if self.start >= self.config.max_start {
            self.advance_keyword();
            return Page::Candidates(Vec::new());
        }
        if self.start == 0 {
            tracing::info!(platform = "ORCID", %keyword, "querying registry");
        }

        let request = Request::get(self.api("/search"))
            .query("q", &keyword)
            .query("rows", self.config.rows)
            .query("start", self.start);

        let body = match self.http.get(&mut session.governor, &request).await {
            Fetch::Body(body) => body,
            Fetch::Skip(reason) => {
                tracing::warn!(platform = "ORCID", %keyword, ?reason, "search failed");
                self.advance_keyword();
                return Page::Candidates(Vec::new());
            }
            Fetch::Fatal(reason) => return Page::Fatal(reason),
        };

        let ids = parse_json(SourcePlatform::ResearchRegistry, &body)
            .map(|json| ids_from_search(&json))
            .unwrap_or_default();
        if ids.is_empty() {
            self.advance_keyword();
            return Page::Candidates(Vec::new());
        }

        self.start += self.config.rows;
        Page::Candidates(
            ids.into_iter()
                .map(|id| OrcidRef {
                    id,
                    keyword: keyword.clone(),
                })
                .collect(),
        )
    }

    async fn fetch_detail(&mut self, session: &mut Session<'_>, orcid: &OrcidRef) -> Detail {
        let request = Request::get(self.api(&format!("/{}", orcid.id))).referer("https://orcid.org/");
        match self.http.get(&mut session.governor, &request).await {
            Fetch::Body(body) => parse_json(SourcePlatform::ResearchRegistry, &body)
                .and_then(|raw| normalize_record(&raw, &orcid.id, &orcid.keyword))
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

/// iDs listed in a search response.
pub fn ids_from_search(json: &Value) -> Vec<String> {
    json["result"]
        .as_array()
        .map(|results| {
            results
                .iter()
                .map(|r| clean_str(&r["orcid-identifier"]["path"]))
                .filter(|id| !id.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Organization name of the first employment. Handles both the grouped
/// (`affiliation-group`) and the flat (`employment-summary`) record shapes.
fn first_employer(activities: &Value) -> String {
    let employments = &activities["employments"];
    let grouped = &employments["affiliation-group"][0]["summaries"][0]["employment-summary"];
    let flat = &employments["employment-summary"][0];
    [grouped, flat]
        .into_iter()
        .map(|summary| clean_str(&summary["organization"]["name"]))
        .find(|name| !name.is_empty())
        .unwrap_or_default()
}

/// Map a full record to a profile. `None` when the person has no name.
pub fn normalize_record(raw: &Value, orcid_id: &str, keyword: &str) -> Option<CanonicalProfile> {
    let person = &raw["person"];
    let name = &person["name"];
    let full_name = [
        clean_str(&name["given-names"]["value"]),
        clean_str(&name["family-name"]["value"]),
    ]
    .iter()
    .filter(|part| !part.is_empty())
    .cloned()
    .collect::<Vec<_>>()
    .join(" ");
    if full_name.is_empty() {
        return None;
    }

    let activities = &raw["activities-summary"];
    let location = clean_str(&person["addresses"]["address"][0]["country"]["value"]);

    let basics = Basics {
        name: full_name,
        headline: HEADLINE.to_string(),
        location,
        current_affiliation: first_employer(activities),
        website: format!("https://orcid.org/{}", orcid_id),
        email: resolve_email(
            &person["emails"]["email"][0]["email"],
            orcid_id,
            SourcePlatform::ResearchRegistry,
        ),
    };

    let publication_count = activities["works"]["group"]
        .as_array()
        .map(|groups| groups.len() as i64)
        .unwrap_or(UNKNOWN);
    let metrics = Metrics {
        publication_count,
        ..Metrics::default()
    };

    let mut skills: BTreeSet<String> = extract_skills(keyword);
    if let Some(keywords) = person["keywords"]["keyword"].as_array() {
        for entry in keywords {
            skills.extend(extract_skills(&clean_str(&entry["content"])));
        }
    }
    skills.extend(extract_skills(&clean_str(&person["biography"]["content"])));

    Some(
        CanonicalProfile::new(SourcePlatform::ResearchRegistry, orcid_id, basics)
            .with_metrics(metrics)
            .with_skills(skills),
    )
}
