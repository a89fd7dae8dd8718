//! Q&A-site adapter (Stack Exchange API).
//!
//! Discovery pages through users sorted by reputation, highest first. The
//! listing already carries everything a profile needs, so the detail step
//! is a pure normalization with no extra request.
//!
//! Resume: before the first page, the store is asked for the lowest
//! reputation already saved for this platform, and the listing is capped
//! at that value (`max=`). Users at exactly that reputation are seen again
//! and land as duplicates. This assumes the listing is monotonically
//! non-increasing in reputation; ties at a page boundary or an unsorted
//! upstream can skip users.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::adapter::{parse_json, Detail, Discovery, Page, Session};
use crate::config::{SleepWindow, StackOverflowSourceConfig};
use crate::http::{Fetch, HttpFetcher, Request, SkipReason};
use crate::models::{Basics, CanonicalProfile, Metric, Metrics, SourcePlatform};
use crate::normalize::{clean_int, clean_str, placeholder_email};

const HEADLINE: &str = "Professional Developer";
/// Failed listing pages tolerated in a row before discovery gives up.
const MAX_FAILED_PAGES: u32 = 3;

/// One user entry from the listing.
#[derive(Debug, Clone)]
pub struct ListedUser(pub Value);

impl fmt::Display for ListedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", clean_str(&self.0["user_id"]))
    }
}

pub struct StackOverflowAdapter {
    config: StackOverflowSourceConfig,
    http: HttpFetcher,
    page: u32,
    max_reputation: Option<i64>,
    has_more: bool,
    failed_pages: u32,
    backoff: Option<Duration>,
}

impl StackOverflowAdapter {
    pub fn new(config: StackOverflowSourceConfig, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            config,
            http: HttpFetcher::new(timeout_secs)?,
            page: 1,
            max_reputation: None,
            has_more: true,
            failed_pages: 0,
            backoff: None,
        })
    }

    fn listing_request(&self) -> Request {
        let url = format!("{}/users", self.config.api_base.trim_end_matches('/'));
        let mut request = Request::get(url)
            .query("site", &self.config.site)
            .query("page", self.page)
            .query("pagesize", self.config.page_size)
            .query("order", "desc")
            .query("sort", "reputation")
            .referer("https://stackoverflow.com/users");
        if let Some(max) = self.max_reputation {
            request = request.query("max", max);
        }
        request
    }
}

#[async_trait]
impl Discovery for StackOverflowAdapter {
    type Candidate = ListedUser;

    fn platform(&self) -> SourcePlatform {
        SourcePlatform::QnaSite
    }

    async fn begin(&mut self, session: &mut Session<'_>) -> Result<()> {
        self.page = 1;
        self.has_more = true;
        self.failed_pages = 0;
        self.backoff = None;
        self.max_reputation = session
            .store
            .lowest_metric(SourcePlatform::QnaSite, Metric::ReputationScore)
            .await
            .context("Failed to read resume point")?;
        if let Some(max) = self.max_reputation {
            tracing::info!(platform = "StackOverflow", max_reputation = max, "resuming below stored reputation");
        }
        Ok(())
    }

    async fn next_page(&mut self, session: &mut Session<'_>) -> Page<ListedUser> {
        if !self.has_more {
            return Page::Exhausted;
        }
        if let Some(delay) = self.backoff.take() {
            tracing::info!(platform = "StackOverflow", secs = delay.as_secs(), "honoring API backoff");
            tokio::time::sleep(delay).await;
        }

        let request = self.listing_request();
        let body = match self.http.get(&mut session.governor, &request).await {
            Fetch::Body(body) => body,
            Fetch::Skip(SkipReason::Status(400)) => return Page::Exhausted,
            Fetch::Skip(reason) => {
                self.failed_pages += 1;
                tracing::warn!(platform = "StackOverflow", page = self.page, ?reason, "listing page failed");
                if self.failed_pages >= MAX_FAILED_PAGES {
                    return Page::Exhausted;
                }
                return Page::Candidates(Vec::new());
            }
            Fetch::Fatal(reason) => return Page::Fatal(reason),
        };
        self.failed_pages = 0;

        let Some(json) = parse_json(SourcePlatform::QnaSite, &body) else {
            return Page::Exhausted;
        };
        let items: Vec<ListedUser> = json["items"]
            .as_array()
            .map(|items| items.iter().cloned().map(ListedUser).collect())
            .unwrap_or_default();
        if items.is_empty() {
            return Page::Exhausted;
        }

        self.has_more = json["has_more"].as_bool().unwrap_or(true);
        self.backoff = json["backoff"]
            .as_u64()
            .map(Duration::from_secs);
        self.page += 1;
        Page::Candidates(items)
    }

    async fn fetch_detail(&mut self, _session: &mut Session<'_>, user: &ListedUser) -> Detail {
        normalize_user(&user.0)
            .map(|p| Detail::Profile(Box::new(p)))
            .unwrap_or(Detail::Miss)
    }

    fn candidate_pause(&self) -> SleepWindow {
        SleepWindow::zero()
    }

    fn page_pause(&self) -> SleepWindow {
        self.config.pause
    }
}

/// Map a listing entry to a profile. The API never exposes emails, so the
/// placeholder is always used.
pub fn normalize_user(raw: &Value) -> Option<CanonicalProfile> {
    let source_id = clean_str(&raw["user_id"]);
    if source_id.is_empty() {
        return None;
    }
    let name = clean_str(&raw["display_name"]);

    let basics = Basics {
        name: if name.is_empty() {
            format!("user{}", source_id)
        } else {
            name
        },
        headline: HEADLINE.to_string(),
        location: clean_str(&raw["location"]),
        current_affiliation: String::new(),
        website: clean_str(&raw["website_url"]),
        email: placeholder_email(&source_id, SourcePlatform::QnaSite),
    };

    let metrics = Metrics {
        reputation_score: clean_int(&raw["reputation"]),
        profile_views: clean_int(&raw["view_count"]),
        ..Metrics::default()
    };

    Some(CanonicalProfile::new(SourcePlatform::QnaSite, source_id, basics).with_metrics(metrics))
}
