//! Conversion of loosely-typed upstream fields into canonical scalars.
//!
//! Everything here is pure: no I/O, no state, deterministic output.

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::models::{SourcePlatform, UNKNOWN};

/// Canonical skill name and the lowercase spellings that map to it.
const SKILL_VOCABULARY: &[(&str, &[&str])] = &[
    ("Python", &["python"]),
    ("JavaScript", &["javascript", "js"]),
    ("TypeScript", &["typescript"]),
    ("Java", &["java"]),
    ("Go", &["go", "golang"]),
    ("Rust", &["rust"]),
    ("C++", &["c++", "cpp"]),
    ("C#", &["c#", "csharp"]),
    ("Ruby", &["ruby"]),
    ("PHP", &["php"]),
    ("Swift", &["swift"]),
    ("Kotlin", &["kotlin"]),
    ("Scala", &["scala"]),
    ("Elixir", &["elixir"]),
    ("Haskell", &["haskell"]),
    ("SQL", &["sql", "postgresql", "mysql"]),
    ("React", &["react", "reactjs"]),
    ("Angular", &["angular"]),
    ("Vue", &["vue", "vuejs", "vue.js"]),
    ("Node.js", &["node.js", "nodejs"]),
    ("Django", &["django"]),
    ("Flask", &["flask"]),
    ("Rails", &["rails"]),
    ("Docker", &["docker"]),
    ("Kubernetes", &["kubernetes", "k8s"]),
    ("AWS", &["aws"]),
    ("Azure", &["azure"]),
    ("GCP", &["gcp"]),
    ("Linux", &["linux"]),
    ("DevOps", &["devops"]),
    ("Machine Learning", &["machine learning", "machine-learning"]),
    ("Deep Learning", &["deep learning", "deep-learning"]),
    ("Data Science", &["data science", "data-science"]),
    ("NLP", &["nlp", "natural language processing"]),
    ("Computer Vision", &["computer vision"]),
    ("TensorFlow", &["tensorflow"]),
    ("PyTorch", &["pytorch"]),
    ("Blockchain", &["blockchain"]),
    ("Cybersecurity", &["cybersecurity", "security"]),
    ("Quantum Computing", &["quantum computing"]),
    ("Bioinformatics", &["bioinformatics"]),
];

fn skill_matchers() -> &'static [(&'static str, Regex)] {
    static MATCHERS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        SKILL_VOCABULARY
            .iter()
            .map(|(canonical, spellings)| {
                let alternatives: Vec<String> = spellings.iter().map(|s| regex::escape(s)).collect();
                // Word boundaries are spelled out because `\b` does not fire
                // after non-word characters such as the `+` in "C++".
                let pattern = format!(
                    r"(?i)(?:^|[^\p{{L}}\p{{N}}_])(?:{})(?:$|[^\p{{L}}\p{{N}}_+#])",
                    alternatives.join("|")
                );
                let regex = Regex::new(&pattern).expect("skill vocabulary pattern is valid");
                (*canonical, regex)
            })
            .collect()
    })
}

/// Trimmed string form of a raw value; empty for null, false, or containers.
pub fn clean_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "true".to_string(),
        _ => String::new(),
    }
}

/// Integer form of a raw value, or [`UNKNOWN`] when it is not numeric.
///
/// Strings may carry thousands separators and a trailing `+` (`"1,234+"`).
/// Booleans are not counts and map to [`UNKNOWN`].
pub fn clean_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(UNKNOWN),
        Value::String(s) => parse_count(s),
        _ => UNKNOWN,
    }
}

/// Parse a human-formatted count such as `"1,234+"`; [`UNKNOWN`] otherwise.
pub fn parse_count(text: &str) -> i64 {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '+')
        .collect();
    cleaned.trim().parse::<i64>().unwrap_or(UNKNOWN)
}

/// Known skill keywords found in `text` by case-insensitive whole-word match.
pub fn extract_skills(text: &str) -> BTreeSet<String> {
    if text.trim().is_empty() {
        return BTreeSet::new();
    }
    skill_matchers()
        .iter()
        .filter(|(_, regex)| regex.is_match(text))
        .map(|(canonical, _)| canonical.to_string())
        .collect()
}

/// Whether `email` matches `.+@.+` on a single line.
pub fn is_valid_email(email: &str) -> bool {
    if email.contains('\n') {
        return false;
    }
    email
        .char_indices()
        .any(|(i, c)| c == '@' && i > 0 && i + 1 < email.len())
}

/// Deterministic stand-in address: `{handle}@no-email.{platform-domain}`.
pub fn placeholder_email(handle: &str, platform: SourcePlatform) -> String {
    format!("{}@no-email.{}", handle, platform.email_domain())
}

/// Use the upstream address when it is valid, otherwise the placeholder.
pub fn resolve_email(raw: &Value, handle: &str, platform: SourcePlatform) -> String {
    let found = clean_str(raw);
    if is_valid_email(&found) {
        found
    } else {
        placeholder_email(handle, platform)
    }
}

/// First non-empty cleaned string among `candidates`.
pub fn first_non_empty<'a, I>(candidates: I) -> String
where
    I: IntoIterator<Item = &'a Value>,
{
    candidates
        .into_iter()
        .map(clean_str)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}
