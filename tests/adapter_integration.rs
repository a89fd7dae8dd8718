//! End-to-end adapter runs against a local fake upstream.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use profile_harvest::adapter::{Adapter, FatalReason, RunOutcome};
use profile_harvest::config::{Config, SleepWindow};
use profile_harvest::models::{Basics, CanonicalProfile, Metric, SourcePlatform};
use profile_harvest::store::memory::MemoryProfileStore;
use profile_harvest::store::ProfileStore;

/// Serve `app` on an ephemeral port and return its base URL.
async fn spawn_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Defaults with every sleep window at zero.
fn fast_config() -> Config {
    let mut config = Config::default();
    config.pacing.backoff = SleepWindow::zero();
    config.pacing.adapter_pause = SleepWindow::zero();
    config.pacing.request_timeout_secs = 5;
    config.sources.github.pause = SleepWindow::zero();
    config.sources.stackoverflow.pause = SleepWindow::zero();
    config.sources.orcid.pause = SleepWindow::zero();
    config.sources.kaggle.pause = SleepWindow::zero();
    config.sources.linkedin.pause = SleepWindow::zero();
    config
}

// ============ Code host ============

async fn github_search(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(q.get("q").map(String::as_str), Some("topic:rust"));
    assert_eq!(q.get("sort").map(String::as_str), Some("stars"));
    Json(json!({
        "items": [
            {"name": "one", "owner": {"login": "abc"}},
            {"name": "two", "owner": {"login": "ghost"}},
            {"name": "three", "owner": {"login": "abc"}}
        ]
    }))
}

async fn github_user(Path(login): Path<String>) -> impl IntoResponse {
    match login.as_str() {
        "abc" => Json(json!({
            "login": "abc",
            "id": 7,
            "bio": "Python and Go dev",
            "followers": 10,
            "following": 2,
            "public_repos": 31,
            "email": null
        }))
        .into_response(),
        "ghost" => Json(json!({"login": "ghost", "id": 8, "bio": null})).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn github_config(base: &str) -> Config {
    let mut config = fast_config();
    config.sources.github.api_base = base.to_string();
    config.sources.github.topics = vec!["rust".to_string()];
    config
}

#[tokio::test]
async fn test_github_run_saves_owner_profiles() {
    let base = spawn_upstream(
        Router::new()
            .route("/search/repositories", get(github_search))
            .route("/users/{login}", get(github_user)),
    )
    .await;
    let config = github_config(&base);
    let store = MemoryProfileStore::new();

    let mut adapter = Adapter::from_config(SourcePlatform::CodeHost, &config).unwrap();
    let stats = adapter.discover(&store, &config.pacing, 10).await.unwrap();

    assert_eq!(stats.saved, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.outcome, RunOutcome::SourceExhausted);

    let profile = store.get(SourcePlatform::CodeHost, "7").unwrap();
    assert_eq!(profile.basics.email, "abc@no-email.github.com");
    assert_eq!(profile.metrics.followers, 10);
    assert_eq!(profile.metrics.contribution_count, 31);
    assert!(profile.skills.contains("Python"));
    assert!(profile.skills.contains("Go"));
    assert!(profile.skills.contains("Rust"));

    // A second pass only finds what it already has.
    let mut again = Adapter::from_config(SourcePlatform::CodeHost, &config).unwrap();
    let stats = again.discover(&store, &config.pacing, 10).await.unwrap();
    assert_eq!(stats.saved, 0);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_github_stops_at_target() {
    let base = spawn_upstream(
        Router::new()
            .route("/search/repositories", get(github_search))
            .route("/users/{login}", get(github_user)),
    )
    .await;
    let config = github_config(&base);
    let store = MemoryProfileStore::new();

    let mut adapter = Adapter::from_config(SourcePlatform::CodeHost, &config).unwrap();
    let stats = adapter.discover(&store, &config.pacing, 1).await.unwrap();
    assert_eq!(stats.saved, 1);
    assert_eq!(stats.outcome, RunOutcome::TargetReached);
}

async fn always_throttled(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::TOO_MANY_REQUESTS
}

#[tokio::test]
async fn test_repeated_throttling_is_fatal() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_upstream(
        Router::new()
            .route("/search/repositories", get(always_throttled))
            .with_state(hits.clone()),
    )
    .await;
    let config = github_config(&base);
    let store = MemoryProfileStore::new();

    let mut adapter = Adapter::from_config(SourcePlatform::CodeHost, &config).unwrap();
    let stats = adapter.discover(&store, &config.pacing, 10).await.unwrap();

    assert_eq!(stats.outcome, RunOutcome::Fatal(FatalReason::RateLimitExceeded));
    // Three backoffs, then the fourth throttle aborts.
    assert_eq!(hits.load(Ordering::SeqCst), 4);
    assert_eq!(store.count().await.unwrap(), 0);
}

async fn throttled_twice(
    State(hits): State<Arc<AtomicUsize>>,
    Query(q): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
        return StatusCode::FORBIDDEN.into_response();
    }
    github_search(Query(q)).await.into_response()
}

#[tokio::test]
async fn test_throttle_recovers_after_success() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_upstream(
        Router::new()
            .route("/search/repositories", get(throttled_twice))
            .route("/users/{login}", get(github_user))
            .with_state(hits.clone()),
    )
    .await;
    let config = github_config(&base);
    let store = MemoryProfileStore::new();

    let mut adapter = Adapter::from_config(SourcePlatform::CodeHost, &config).unwrap();
    let stats = adapter.discover(&store, &config.pacing, 10).await.unwrap();
    assert_eq!(stats.saved, 1);
    assert_eq!(stats.outcome, RunOutcome::SourceExhausted);
}

// ============ Q&A site ============

#[derive(Clone, Default)]
struct Listing {
    max_params: Arc<Mutex<Vec<Option<String>>>>,
}

async fn so_users(State(state): State<Listing>, Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(q.get("sort").map(String::as_str), Some("reputation"));
    assert_eq!(q.get("site").map(String::as_str), Some("stackoverflow"));
    state.max_params.lock().unwrap().push(q.get("max").cloned());
    Json(json!({
        "items": [
            {"user_id": 1, "display_name": "Already Here", "reputation": 500},
            {"user_id": 2, "display_name": "New Person", "reputation": 450, "location": "Oslo", "view_count": 12}
        ],
        "has_more": false
    }))
}

fn stored_user(id: &str, reputation: i64) -> CanonicalProfile {
    let mut p = CanonicalProfile::new(
        SourcePlatform::QnaSite,
        id,
        Basics {
            name: "Already Here".to_string(),
            email: format!("{}@no-email.stackoverflow.com", id),
            ..Basics::default()
        },
    );
    p.metrics.reputation_score = reputation;
    p
}

#[tokio::test]
async fn test_stackoverflow_resumes_below_stored_reputation() {
    let state = Listing::default();
    let base = spawn_upstream(Router::new().route("/users", get(so_users)).with_state(state.clone())).await;
    let mut config = fast_config();
    config.sources.stackoverflow.api_base = base;

    let store = MemoryProfileStore::new();
    store.replace(&stored_user("1", 500)).await.unwrap();

    let mut adapter = Adapter::from_config(SourcePlatform::QnaSite, &config).unwrap();
    let stats = adapter.discover(&store, &config.pacing, 10).await.unwrap();

    assert_eq!(state.max_params.lock().unwrap().clone(), vec![Some("500".to_string())]);
    assert_eq!(stats.saved, 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.outcome, RunOutcome::SourceExhausted);

    let fresh = store.get(SourcePlatform::QnaSite, "2").unwrap();
    assert_eq!(fresh.basics.headline, "Professional Developer");
    assert_eq!(fresh.basics.email, "2@no-email.stackoverflow.com");
    assert_eq!(fresh.metrics.reputation_score, 450);
    assert_eq!(fresh.metrics.profile_views, 12);
    assert_eq!(
        store
            .lowest_metric(SourcePlatform::QnaSite, Metric::ReputationScore)
            .await
            .unwrap(),
        Some(450)
    );
}

#[tokio::test]
async fn test_stackoverflow_first_run_has_no_cap() {
    let state = Listing::default();
    let base = spawn_upstream(Router::new().route("/users", get(so_users)).with_state(state.clone())).await;
    let mut config = fast_config();
    config.sources.stackoverflow.api_base = base;
    let store = MemoryProfileStore::new();

    let mut adapter = Adapter::from_config(SourcePlatform::QnaSite, &config).unwrap();
    let stats = adapter.discover(&store, &config.pacing, 10).await.unwrap();
    assert_eq!(state.max_params.lock().unwrap().clone(), vec![None]);
    assert_eq!(stats.saved, 2);
}

#[tokio::test]
async fn test_stackoverflow_bad_request_ends_discovery() {
    let base = spawn_upstream(
        Router::new().route("/users", get(|| async { StatusCode::BAD_REQUEST })),
    )
    .await;
    let mut config = fast_config();
    config.sources.stackoverflow.api_base = base;
    let store = MemoryProfileStore::new();

    let mut adapter = Adapter::from_config(SourcePlatform::QnaSite, &config).unwrap();
    let stats = adapter.discover(&store, &config.pacing, 10).await.unwrap();
    assert_eq!(stats.saved, 0);
    assert_eq!(stats.outcome, RunOutcome::SourceExhausted);
}

// ============ Research registry ============

#[derive(Clone, Default)]
struct SearchLog {
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

/// Two pages of two iDs per keyword, then an empty page. `Broken` fails.
async fn orcid_search(
    State(log): State<SearchLog>,
    Query(q): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    assert_eq!(q.get("rows").map(String::as_str), Some("2"));
    let keyword = q.get("q").cloned().unwrap_or_default();
    let start: u32 = q.get("start").and_then(|s| s.parse().ok()).unwrap();
    log.calls.lock().unwrap().push((keyword.clone(), start.to_string()));

    if keyword == "Broken" {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let ids: Vec<Value> = if start < 4 {
        (start..start + 2)
            .map(|i| json!({"orcid-identifier": {"path": format!("{}-{}", keyword.to_lowercase(), i)}}))
            .collect()
    } else {
        Vec::new()
    };
    Json(json!({"result": ids, "num-found": 4})).into_response()
}

async fn orcid_record(Path(id): Path<String>) -> Json<Value> {
    if id == "python-3" {
        return Json(json!({"person": {"name": null}}));
    }
    Json(json!({
        "person": {
            "name": {"given-names": {"value": id}, "family-name": {"value": "Researcher"}},
            "emails": {"email": []}
        },
        "activities-summary": {"works": {"group": [{}]}}
    }))
}

fn orcid_config(base: &str, keywords: &[&str]) -> Config {
    let mut config = fast_config();
    config.sources.orcid.api_base = base.to_string();
    config.sources.orcid.keywords = keywords.iter().map(|k| k.to_string()).collect();
    config.sources.orcid.rows = 2;
    config.sources.orcid.max_start = 100;
    config
}

async fn orcid_upstream(log: &SearchLog) -> String {
    spawn_upstream(
        Router::new()
            .route("/search", get(orcid_search))
            .route("/{id}", get(orcid_record))
            .with_state(log.clone()),
    )
    .await
}

#[tokio::test]
async fn test_orcid_pages_keywords_until_empty() {
    let log = SearchLog::default();
    let base = orcid_upstream(&log).await;
    let config = orcid_config(&base, &["Rust", "Broken", "Python"]);
    let store = MemoryProfileStore::new();

    let mut adapter = Adapter::from_config(SourcePlatform::ResearchRegistry, &config).unwrap();
    let stats = adapter.discover(&store, &config.pacing, 100).await.unwrap();

    assert_eq!(stats.saved, 7);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.outcome, RunOutcome::SourceExhausted);

    let calls: Vec<(String, String)> = log.calls.lock().unwrap().clone();
    let expected: Vec<(String, String)> = [
        ("Rust", "0"),
        ("Rust", "2"),
        ("Rust", "4"),
        ("Broken", "0"),
        ("Python", "0"),
        ("Python", "2"),
        ("Python", "4"),
    ]
    .iter()
    .map(|(k, s)| (k.to_string(), s.to_string()))
    .collect();
    assert_eq!(calls, expected);

    let profile = store.get(SourcePlatform::ResearchRegistry, "rust-3").unwrap();
    assert_eq!(profile.basics.name, "rust-3 Researcher");
    assert_eq!(profile.basics.headline, "Researcher");
    assert_eq!(profile.basics.email, "rust-3@no-email.orcid.org");
    assert_eq!(profile.metrics.publication_count, 1);
    assert!(profile.skills.contains("Rust"));
    assert!(store.get(SourcePlatform::ResearchRegistry, "python-3").is_none());
}

#[tokio::test]
async fn test_orcid_offset_cap_moves_to_next_keyword() {
    let log = SearchLog::default();
    let base = orcid_upstream(&log).await;
    let mut config = orcid_config(&base, &["Rust", "Python"]);
    config.sources.orcid.max_start = 2;
    let store = MemoryProfileStore::new();

    let mut adapter = Adapter::from_config(SourcePlatform::ResearchRegistry, &config).unwrap();
    let stats = adapter.discover(&store, &config.pacing, 100).await.unwrap();

    assert_eq!(stats.saved, 4);
    assert_eq!(stats.outcome, RunOutcome::SourceExhausted);
    let starts: Vec<String> = log
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|(k, s)| format!("{}@{}", k, s))
        .collect();
    assert_eq!(starts, vec!["Rust@0", "Python@0"]);
}

// ============ Competition platform ============

const KAGGLE_FEED: &str = r#"
<html><body>
  <a href="/alice">Alice</a>
  <a href="/code">Code</a>
  <a href="/alice/some-notebook">Notebook</a>
  <a href="/competitions">Competitions</a>
</body></html>
"#;

const KAGGLE_PROFILE: &str = r#"
<html><head>
<script type="application/ld+json">
{"@type": "Person", "name": "Alice A.", "description": "Kaggle Grandmaster working on Python and PyTorch"}
</script>
</head><body></body></html>
"#;

#[tokio::test]
async fn test_kaggle_feed_to_profile() {
    let base = spawn_upstream(
        Router::new()
            .route("/code", get(|| async { Html(KAGGLE_FEED) }))
            .route("/{user}", get(|| async { Html(KAGGLE_PROFILE) })),
    )
    .await;
    let mut config = fast_config();
    config.sources.kaggle.web_base = base.clone();
    let store = MemoryProfileStore::new();

    let mut adapter = Adapter::from_config(SourcePlatform::CompetitionPlatform, &config).unwrap();
    let stats = adapter.discover(&store, &config.pacing, 10).await.unwrap();
    assert_eq!(stats.saved, 1);
    assert_eq!(stats.outcome, RunOutcome::SourceExhausted);

    let alice = store.get(SourcePlatform::CompetitionPlatform, "alice").unwrap();
    assert_eq!(alice.basics.name, "Alice A.");
    assert_eq!(alice.basics.website, format!("{}/alice", base));
    assert_eq!(alice.metrics.tier, "Grandmaster");
    assert!(alice.skills.contains("Data Science"));
    assert!(alice.skills.contains("Python"));
}

// ============ Professional network ============

#[tokio::test]
async fn test_linkedin_without_cookie_makes_no_requests() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = spawn_upstream(
        Router::new()
            .route("/search/results/people/", get(always_throttled))
            .with_state(hits.clone()),
    )
    .await;
    let mut config = fast_config();
    config.sources.linkedin.web_base = base;
    config.sources.linkedin.session_cookie = None;
    let store = MemoryProfileStore::new();

    let mut adapter = Adapter::from_config(SourcePlatform::ProfessionalNetwork, &config).unwrap();
    assert!(adapter.missing_prerequisite().is_some());
    let stats = adapter.discover(&store, &config.pacing, 10).await.unwrap();
    assert_eq!(stats.outcome, RunOutcome::Fatal(FatalReason::MissingCredential));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

async fn auth_wall(headers: HeaderMap) -> Html<&'static str> {
    assert_eq!(
        headers.get("cookie").and_then(|v| v.to_str().ok()),
        Some("li_at=test-session")
    );
    Html(r#"<html><body><a href="/authwall?trk=login">Sign in</a></body></html>"#)
}

#[tokio::test]
async fn test_linkedin_auth_wall_is_fatal() {
    let base = spawn_upstream(Router::new().route("/search/results/people/", get(auth_wall))).await;
    let mut config = fast_config();
    config.sources.linkedin.web_base = base;
    config.sources.linkedin.session_cookie = Some("test-session".to_string());
    let store = MemoryProfileStore::new();

    let mut adapter = Adapter::from_config(SourcePlatform::ProfessionalNetwork, &config).unwrap();
    assert!(adapter.missing_prerequisite().is_none());
    let stats = adapter.discover(&store, &config.pacing, 10).await.unwrap();
    assert_eq!(stats.outcome, RunOutcome::Fatal(FatalReason::AuthWall));
    assert_eq!(store.count().await.unwrap(), 0);
}

const LINKEDIN_RESULTS: &str = r#"
<html><body>
  <a href="/in/jane-doe-123/">Jane</a>
  <a href="/in/jane-doe-123/">Jane again</a>
</body></html>
"#;

const LINKEDIN_PROFILE: &str = r#"
<html><head>
<script type="application/ld+json">
{"@context": "http://schema.org", "@graph": [
  {"@type": "WebPage", "name": "Jane Doe"},
  {"@type": "Person", "name": "Jane Doe", "jobTitle": ["Machine Learning Engineer"],
   "address": {"addressLocality": "Toronto"}, "worksFor": [{"name": "Acme"}],
   "interactionStatistic": {"@type": "InteractionCounter", "interactionType": "https://schema.org/FollowAction", "userInteractionCount": 812}}
]}
</script>
</head><body></body></html>
"#;

#[tokio::test]
async fn test_linkedin_search_to_profile() {
    let base = spawn_upstream(
        Router::new()
            .route("/search/results/people/", get(|| async { Html(LINKEDIN_RESULTS) }))
            .route("/in/{slug}/", get(|| async { Html(LINKEDIN_PROFILE) })),
    )
    .await;
    let mut config = fast_config();
    config.sources.linkedin.web_base = base;
    config.sources.linkedin.session_cookie = Some("test-session".to_string());
    config.sources.linkedin.keywords = vec!["Machine Learning".to_string()];
    let store = MemoryProfileStore::new();

    let mut adapter = Adapter::from_config(SourcePlatform::ProfessionalNetwork, &config).unwrap();
    let stats = adapter.discover(&store, &config.pacing, 10).await.unwrap();
    assert_eq!(stats.saved, 1);
    assert_eq!(stats.outcome, RunOutcome::SourceExhausted);

    let jane = store.get(SourcePlatform::ProfessionalNetwork, "jane-doe-123").unwrap();
    assert_eq!(jane.basics.headline, "Machine Learning Engineer");
    assert_eq!(jane.basics.location, "Toronto");
    assert_eq!(jane.basics.current_affiliation, "Acme");
    assert_eq!(jane.basics.email, "jane-doe-123@no-email.linkedin.com");
    assert_eq!(jane.metrics.followers, 812);
}
