//! Wire types shared by the raincheck server and CLI.
//!
//! Field names are fixed by deployed clients; change them only together with
//! every consumer.

use serde::{Deserialize, Deserializer, Serialize};

/// Header carrying an issued token or the static service secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the verified subject of a federated identity token.
/// Set by the server only; any client-supplied value is discarded.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Largest accepted request body for code analysis.
pub const MAX_CODE_BODY_BYTES: usize = 10 * 1024 * 1024;

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response of the `/api/apikey` endpoints. An empty key means the user
/// holds none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

/// Body of `POST /api/analyze-code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

/// Service counters reported by `GET /api/stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub visitors: u64,
    pub analyses: u64,
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    /// Zero when the finding is not tied to a line.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "is_zero"
    )]
    pub line: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suggestion: String,
}

/// Score and findings for one review dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<Issue>,
}

/// A complete code review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub overall_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub security: Category,
    #[serde(default, deserialize_with = "null_as_default")]
    pub performance: Category,
    #[serde(default, deserialize_with = "null_as_default")]
    pub code_quality: Category,
    #[serde(default, deserialize_with = "null_as_default")]
    pub maintainability: Category,
    #[serde(default, deserialize_with = "null_as_default")]
    pub best_practices: Category,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suggestions: Vec<String>,
}

impl AnalysisResponse {
    /// Categories in display order with their human-readable names.
    pub fn categories(&self) -> [(&'static str, &Category); 5] {
        [
            ("Security", &self.security),
            ("Performance", &self.performance),
            ("Code Quality", &self.code_quality),
            ("Maintainability", &self.maintainability),
            ("Best Practices", &self.best_practices),
        ]
    }

    /// Total findings across all categories.
    pub fn issue_count(&self) -> usize {
        self.categories().iter().map(|(_, c)| c.issues.len()).sum()
    }
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// `null` reads the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_uses_camel_case() {
        let body = serde_json::to_string(&ApiKeyResponse {
            api_key: "abc".into(),
        })
        .unwrap();
        assert_eq!(body, r#"{"apiKey":"abc"}"#);
    }

    #[test]
    fn analysis_parses_model_output_shape() {
        let raw = r#"{
            "overall_score": 7.5,
            "security": {"score": 6, "issues": [
                {"severity": "high", "type": "Injection", "description": "raw SQL",
                 "line": 12, "suggestion": "bind parameters"}
            ]},
            "performance": {"score": 8, "issues": []},
            "code_quality": {"score": 7, "issues": []},
            "maintainability": {"score": 7, "issues": []},
            "best_practices": {"score": 9, "issues": []},
            "suggestions": ["add tests"]
        }"#;

        let analysis: AnalysisResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(analysis.overall_score, 7.5);
        assert_eq!(analysis.security.issues[0].kind, "Injection");
        assert_eq!(analysis.security.issues[0].line, 12);
        assert_eq!(analysis.issue_count(), 1);
        assert_eq!(analysis.categories()[2].0, "Code Quality");
    }

    #[test]
    fn null_optional_fields_read_as_empty() {
        let raw = r#"{
            "overall_score": 5,
            "security": {"score": 4, "issues": [
                {"severity": "low", "type": "Style", "description": "d",
                 "line": null, "suggestion": null}
            ]},
            "performance": {"score": 5, "issues": null},
            "code_quality": null,
            "suggestions": null
        }"#;

        let analysis: AnalysisResponse = serde_json::from_str(raw).unwrap();
        let issue = &analysis.security.issues[0];
        assert_eq!(issue.line, 0);
        assert!(issue.suggestion.is_empty());
        assert!(analysis.performance.issues.is_empty());
        assert_eq!(analysis.code_quality, Category::default());
        assert!(analysis.suggestions.is_empty());
    }

    #[test]
    fn line_is_omitted_when_absent() {
        let issue = Issue {
            severity: "low".into(),
            kind: "Style".into(),
            description: "long line".into(),
            line: 0,
            suggestion: String::new(),
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert!(json.get("line").is_none());
        assert_eq!(json["type"], "Style");
    }
}
