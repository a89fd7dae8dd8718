//! Tool server tests: a real listener on an ephemeral port over a temp store.

use serde_json::{json, Value};
use tempfile::TempDir;

use profile_harvest::analytics::Analytics;
use profile_harvest::config::Config;
use profile_harvest::models::{Basics, CanonicalProfile, SourcePlatform};
use profile_harvest::server::router;
use profile_harvest::store::sqlite::SqliteProfileStore;
use profile_harvest::store::ProfileStore;
use profile_harvest::{db, migrate};

fn expert(id: &str, reputation: i64, location: &str) -> CanonicalProfile {
    let mut p = CanonicalProfile::new(
        SourcePlatform::QnaSite,
        id,
        Basics {
            name: format!("user {}", id),
            headline: "Professional Developer".to_string(),
            location: location.to_string(),
            email: format!("{}@no-email.stackoverflow.com", id),
            ..Basics::default()
        },
    )
    .with_skills(["Rust"]);
    p.metrics.reputation_score = reputation;
    p
}

/// Seed a store, start the server, and return its base URL.
async fn start_server(tmp: &TempDir) -> String {
    let mut config = Config::default();
    config.db.dir = tmp.path().to_path_buf();
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();

    let store = SqliteProfileStore::new(pool.clone());
    for (id, rep, location) in [("1", 50, "Lisbon"), ("2", 200, "Porto"), ("3", 10, "Lisbon")] {
        store.replace(&expert(id, rep, location)).await.unwrap();
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(Analytics::new(pool));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn call(base: &str, tool: &str, params: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/tools/{}", base, tool))
        .json(&params)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health_and_tool_list() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;

    let health: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let list: Value = reqwest::get(format!("{}/tools/list", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = list["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert_eq!(names.len(), 6);
    assert!(names.contains(&"find_top_experts"));
    assert!(names.contains(&"get_skill_distribution"));
}

#[tokio::test]
async fn test_top_experts_over_http() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;

    let (status, body) = call(&base, "find_top_experts", json!({"skill": "Rust"})).await;
    assert_eq!(status, 200);
    let reps: Vec<i64> = body["result"]["profiles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["metrics"]["reputation_score"].as_i64().unwrap())
        .collect();
    assert_eq!(reps, vec![200, 50, 10]);

    let (status, body) = call(&base, "find_top_experts", json!({"skill": "Rust", "limit": 1})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["profiles"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_blank_filters_match_every_profile() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;

    let (status, body) = call(&base, "find_top_experts", json!({"skill": "  "})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["profiles"].as_array().unwrap().len(), 3);

    let (status, body) = call(&base, "search_profiles", json!({"query": "", "limit": 2})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["profiles"].as_array().unwrap().len(), 2);

    let (status, body) = call(&base, "get_geo_density", json!({"location": " "})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["platforms"][0]["count"], 3);
}

#[tokio::test]
async fn test_aggregate_tools_over_http() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;

    let (status, body) = call(&base, "get_platform_stats", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["platforms"][0]["platform"], "StackOverflow");
    assert_eq!(body["result"]["platforms"][0]["count"], 3);

    let (status, body) = call(&base, "get_geo_density", json!({"location": "lisbon"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["platforms"][0]["count"], 2);
    assert_eq!(body["result"]["platforms"][0]["avg_reputation"], 30.0);

    let (status, body) = call(&base, "get_skill_distribution", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["skills"], json!([{"skill": "Rust", "count": 3}]));

    let (status, body) = call(
        &base,
        "get_top_contributors",
        json!({"platform": "Friendster", "metric": "followers"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["profiles"], json!([]));
}

#[tokio::test]
async fn test_error_envelope() {
    let tmp = TempDir::new().unwrap();
    let base = start_server(&tmp).await;

    let (status, body) = call(&base, "no_such_tool", json!({})).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = call(&base, "find_top_experts", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = call(
        &base,
        "get_top_contributors",
        json!({"platform": "  ", "metric": "followers"}),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("must not be empty"));

    let (status, body) = call(
        &base,
        "get_top_contributors",
        json!({"platform": "GitHub", "metric": "karma"}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}
