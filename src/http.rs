//! Upstream HTTP access shared by all adapters.
//!
//! [`HttpFetcher`] wraps one `reqwest::Client` per adapter run, rotates
//! browser-like request headers, and classifies every response into a
//! [`Fetch`] tri-state. Throttle responses (403/429) are fed to the
//! adapter's [`RateGovernor`] and retried here, so callers only ever see a
//! body, a skip, or a fatal stop.

use anyhow::Result;
use rand::seq::IndexedRandom;
use std::time::Duration;

use crate::adapter::FatalReason;
use crate::governor::{RateGovernor, ThrottleDecision};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/119.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
];

const ACCEPT_JSON: &str = "application/json, text/plain, */*";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Why a single request produced nothing usable.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Non-2xx status other than a throttle.
    Status(u16),
    /// Connection, timeout, or body read failure.
    Network(String),
}

/// Outcome of one logical GET, after throttle retries.
#[derive(Debug)]
pub enum Fetch {
    Body(String),
    Skip(SkipReason),
    Fatal(FatalReason),
}

/// One outgoing GET.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub referer: Option<String>,
    pub accept_html: bool,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            referer: None,
            accept_html: false,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn html(mut self) -> Self {
        self.accept_html = true;
        self
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
    extra_headers: Vec<(&'static str, String)>,
    auth_markers: &'static [&'static str],
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            extra_headers: Vec::new(),
            auth_markers: &[],
        })
    }

    /// Attach a header to every request (credentials, session cookies).
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.extra_headers.push((name, value.into()));
        self
    }

    /// Substrings that identify a login or challenge page. Seeing one in the
    /// final URL or body is an immediate fatal stop.
    pub fn with_auth_markers(mut self, markers: &'static [&'static str]) -> Self {
        self.auth_markers = markers;
        self
    }

    /// Perform `request`, retrying throttle responses as `governor` allows.
    pub async fn get(&self, governor: &mut RateGovernor, request: &Request) -> Fetch {
        loop {
            let response = match self.build(request).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(url = %request.url, error = %e, "request failed");
                    return Fetch::Skip(SkipReason::Network(e.to_string()));
                }
            };

            let status = response.status().as_u16();
            if self.hits_auth_wall(response.url().as_str()) {
                return Fetch::Fatal(FatalReason::AuthWall);
            }

            if status == 403 || status == 429 {
                match governor.record_throttle() {
                    ThrottleDecision::Backoff(delay) => {
                        tracing::warn!(
                            url = %request.url,
                            status,
                            attempt = governor.consecutive_throttles(),
                            delay_secs = delay.as_secs_f64(),
                            "throttled, backing off"
                        );
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        continue;
                    }
                    ThrottleDecision::Fatal => {
                        tracing::error!(url = %request.url, status, "rate limit exceeded");
                        return Fetch::Fatal(FatalReason::RateLimitExceeded);
                    }
                }
            }

            governor.record_response();

            let body = match response.text().await {
                Ok(b) => b,
                Err(e) => return Fetch::Skip(SkipReason::Network(e.to_string())),
            };

            if self.hits_auth_wall(&body) {
                return Fetch::Fatal(FatalReason::AuthWall);
            }

            if !(200..300).contains(&status) {
                tracing::debug!(url = %request.url, status, "non-success status, skipping");
                return Fetch::Skip(SkipReason::Status(status));
            }

            return Fetch::Body(body);
        }
    }

    fn build(&self, request: &Request) -> reqwest::RequestBuilder {
        let mut rng = rand::rng();
        let agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
        let accept = if request.accept_html {
            ACCEPT_HTML
        } else {
            ACCEPT_JSON
        };

        let mut builder = self
            .client
            .get(&request.url)
            .header("User-Agent", agent)
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Accept", accept);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(referer) = &request.referer {
            builder = builder.header("Referer", referer);
        }
        for (name, value) in &self.extra_headers {
            builder = builder.header(*name, value);
        }
        builder
    }

    fn hits_auth_wall(&self, text: &str) -> bool {
        self.auth_markers.iter().any(|m| text.contains(m))
    }
}
