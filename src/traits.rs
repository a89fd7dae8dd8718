//! Analytic tools exposed to language-model clients.
//!
//! Each tool is a [`Tool`] implementation with a JSON-Schema parameter
//! description and an async `execute`. The [`ToolRegistry`] collects them
//! and is shared by the HTTP server (`POST /tools/{name}`), the MCP bridge,
//! and `harvest query`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                ToolRegistry                  │
//! │  search_profiles      get_platform_stats     │
//! │  get_top_contributors find_top_experts       │
//! │  get_geo_density      get_skill_distribution │
//! └──────────────┬───────────────────────────────┘
//!                ▼
//!        ToolContext → Analytics → profiles
//! ```
//!
//! Numeric metrics in results use `-1` for "not reported by this source".
//! Clients must read it as unknown, not as a low value.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::analytics::Analytics;
use crate::models::Metric;

/// Default `limit` for tools that return profiles.
pub const DEFAULT_LIMIT: i64 = 5;

/// A callable, read-only analytic operation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name (`POST /tools/{name}`), lowercase with underscores.
    fn name(&self) -> &str;

    /// One-line description for client discovery.
    fn description(&self) -> &str;

    /// JSON Schema of the parameters object.
    fn parameters_schema(&self) -> Value;

    /// Run with parameters already checked by [`validate_params`].
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Store access handed to every tool call.
#[derive(Clone)]
pub struct ToolContext {
    analytics: Analytics,
}

impl ToolContext {
    pub fn new(analytics: Analytics) -> Self {
        Self { analytics }
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }
}

/// Serializable tool info for the `/tools/list` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        }
    }
}

fn limit_schema() -> Value {
    json!({
        "type": "integer",
        "description": "Maximum number of results",
        "default": DEFAULT_LIMIT
    })
}

fn limit_param(params: &Value) -> i64 {
    params["limit"].as_i64().unwrap_or(DEFAULT_LIMIT)
}

/// A non-blank string parameter.
fn text_param<'a>(params: &'a Value, name: &str) -> Result<&'a str> {
    let value = filter_param(params, name);
    if value.is_empty() {
        bail!("{} must not be empty", name);
    }
    Ok(value)
}

/// A substring filter; blank means no filtering.
fn filter_param<'a>(params: &'a Value, name: &str) -> &'a str {
    params[name].as_str().unwrap_or("").trim()
}

const PROFILE_NOTE: &str =
    "Numeric metrics are -1 when the source does not report them; treat -1 as unknown.";

// ═══════════════════════════════════════════════════════════════════════
// Built-in tools
// ═══════════════════════════════════════════════════════════════════════

pub struct SearchProfilesTool;

#[async_trait]
impl Tool for SearchProfilesTool {
    fn name(&self) -> &str {
        "search_profiles"
    }

    fn description(&self) -> &str {
        "Search profiles by name, headline, location, skill, or platform (case-insensitive substring)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "description": PROFILE_NOTE,
            "properties": {
                "query": { "type": "string", "description": "Text to look for; blank matches every profile" },
                "limit": limit_schema()
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = filter_param(&params, "query");
        let profiles = ctx
            .analytics
            .search_profiles(query, limit_param(&params))
            .await?;
        Ok(json!({ "profiles": profiles }))
    }
}

pub struct PlatformStatsTool;

#[async_trait]
impl Tool for PlatformStatsTool {
    fn name(&self) -> &str {
        "get_platform_stats"
    }

    fn description(&self) -> &str {
        "Count stored profiles per source platform"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let platforms = ctx.analytics.platform_stats().await?;
        Ok(json!({ "platforms": platforms }))
    }
}

pub struct TopContributorsTool;

#[async_trait]
impl Tool for TopContributorsTool {
    fn name(&self) -> &str {
        "get_top_contributors"
    }

    fn description(&self) -> &str {
        "Top profiles on one platform ranked by a metric, highest first"
    }

    fn parameters_schema(&self) -> Value {
        let metrics: Vec<&str> = Metric::ALL.iter().map(|m| m.key()).collect();
        json!({
            "type": "object",
            "description": PROFILE_NOTE,
            "properties": {
                "platform": {
                    "type": "string",
                    "description": "GitHub, StackOverflow, ORCID, Kaggle, or LinkedIn"
                },
                "metric": {
                    "type": "string",
                    "enum": metrics,
                    "description": "Metric to rank by; profiles reporting -1 rank last"
                },
                "limit": limit_schema()
            },
            "required": ["platform", "metric"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let platform = text_param(&params, "platform")?;
        let metric = text_param(&params, "metric")?;
        let profiles = ctx
            .analytics
            .top_contributors(platform, metric, limit_param(&params))
            .await?;
        Ok(json!({ "profiles": profiles }))
    }
}

pub struct TopExpertsTool;

#[async_trait]
impl Tool for TopExpertsTool {
    fn name(&self) -> &str {
        "find_top_experts"
    }

    fn description(&self) -> &str {
        "Profiles matching a skill, ranked by reputation, then contributions, then followers"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "description": PROFILE_NOTE,
            "properties": {
                "skill": { "type": "string", "description": "Skill or headline keyword; blank ranks every profile" },
                "limit": limit_schema()
            },
            "required": ["skill"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let skill = filter_param(&params, "skill");
        let profiles = ctx
            .analytics
            .top_experts(skill, limit_param(&params))
            .await?;
        Ok(json!({ "profiles": profiles }))
    }
}

pub struct GeoDensityTool;

#[async_trait]
impl Tool for GeoDensityTool {
    fn name(&self) -> &str {
        "get_geo_density"
    }

    fn description(&self) -> &str {
        "Profile count and average known reputation per platform for a location"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": { "type": "string", "description": "Location substring, e.g. a city or country; blank covers every profile" }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let location = filter_param(&params, "location");
        let buckets = ctx.analytics.geo_density(location).await?;
        Ok(json!({ "location": location, "platforms": buckets }))
    }
}

pub struct SkillDistributionTool;

#[async_trait]
impl Tool for SkillDistributionTool {
    fn name(&self) -> &str {
        "get_skill_distribution"
    }

    fn description(&self) -> &str {
        "The 20 most common skills across all profiles"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let skills = ctx.analytics.skill_distribution().await?;
        Ok(json!({ "skills": skills }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of callable tools.
///
/// ```rust
/// use profile_harvest::traits::ToolRegistry;
///
/// let tools = ToolRegistry::with_builtins();
/// assert!(tools.find("find_top_experts").is_some());
/// ```
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with the six analytic tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchProfilesTool));
        registry.register(Box::new(PlatformStatsTool));
        registry.register(Box::new(TopContributorsTool));
        registry.register(Box::new(TopExpertsTool));
        registry.register(Box::new(GeoDensityTool));
        registry.register(Box::new(SkillDistributionTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Validate `params` against the tool's schema and run it.
    pub async fn call(&self, name: &str, params: &Value, ctx: &ToolContext) -> Result<Value> {
        let tool = self
            .find(name)
            .ok_or_else(|| anyhow::anyhow!("no tool registered with name: {} (not found)", name))?;
        let params = validate_params(&tool.parameters_schema(), params)?;
        tool.execute(params, ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter validation
// ═══════════════════════════════════════════════════════════════════════

/// Check required fields, types, and enums; fill in defaults.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => bail!("invalid parameters: expected an object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for field in &required {
        if !params_obj.contains_key(*field) {
            bail!("invalid parameters: missing required parameter: {}", field);
        }
    }

    let mut result = params_obj.clone();
    for (prop_name, prop_schema) in &properties {
        let Some(value) = params_obj.get(prop_name) else {
            if let Some(default) = prop_schema.get("default") {
                result.insert(prop_name.clone(), default.clone());
            }
            continue;
        };

        if let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected_type {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                bail!(
                    "invalid parameters: '{}' must be of type '{}', got {}",
                    prop_name,
                    expected_type,
                    json_type_name(value)
                );
            }
        }

        if let Some(enum_values) = prop_schema.get("enum").and_then(|e| e.as_array()) {
            if !enum_values.contains(value) {
                let allowed: Vec<String> = enum_values.iter().map(|v| v.to_string()).collect();
                bail!(
                    "invalid parameters: '{}' must be one of [{}], got {}",
                    prop_name,
                    allowed.join(", "),
                    value
                );
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_six_tools() {
        let tools = ToolRegistry::with_builtins();
        assert_eq!(tools.len(), 6);
        for name in [
            "search_profiles",
            "get_platform_stats",
            "get_top_contributors",
            "find_top_experts",
            "get_geo_density",
            "get_skill_distribution",
        ] {
            assert!(tools.find(name).is_some(), "missing {}", name);
        }
        assert!(tools.find("delete_everything").is_none());
    }

    #[test]
    fn limit_defaults_to_five() {
        let schema = TopExpertsTool.parameters_schema();
        let params = validate_params(&schema, &json!({"skill": "Rust"})).unwrap();
        assert_eq!(params["limit"], 5);
    }

    #[test]
    fn missing_required_parameter_is_rejected() {
        let schema = TopContributorsTool.parameters_schema();
        let err = validate_params(&schema, &json!({"platform": "GitHub"})).unwrap_err();
        assert!(err.to_string().contains("missing required parameter: metric"));
    }

    #[test]
    fn unknown_metric_is_rejected_by_enum() {
        let schema = TopContributorsTool.parameters_schema();
        let err = validate_params(&schema, &json!({"platform": "GitHub", "metric": "karma"}))
            .unwrap_err();
        assert!(err.to_string().contains("must be one of"));
        assert!(validate_params(&schema, &json!({"platform": "GitHub", "metric": "followers"})).is_ok());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let schema = SearchProfilesTool.parameters_schema();
        let err = validate_params(&schema, &json!({"query": "go", "limit": "ten"})).unwrap_err();
        assert!(err.to_string().contains("must be of type 'integer'"));
        assert!(validate_params(&schema, &json!([1, 2])).is_err());
    }

    #[test]
    fn blank_platform_is_an_error_but_blank_filter_is_not() {
        let params = json!({"platform": "   ", "skill": "  rust "});
        let err = text_param(&params, "platform").unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
        assert_eq!(filter_param(&params, "skill"), "rust");
        assert_eq!(filter_param(&json!({"skill": " "}), "skill"), "");
        assert_eq!(filter_param(&json!({}), "skill"), "");
    }
}
