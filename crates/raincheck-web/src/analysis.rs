//! Code analysis backends.
//!
//! The server hands review requests to an [`AnalysisBackend`]. The default
//! backend prompts an OpenAI-compatible chat completion endpoint and parses
//! the model's JSON answer.

use std::time::Duration;

use async_trait::async_trait;
use raincheck_protocol::AnalysisResponse;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{AnalysisConfig, SecretString};

/// Score substituted when the model reports one outside 1..=10.
const FALLBACK_SCORE: f64 = 5.0;

const MAX_COMPLETION_TOKENS: u32 = 2_000;

const PROMPT: &str = r#"You are a code review expert. Analyze the following code and respond ONLY in the following JSON format. Make sure to provide detailed, specific feedback for each category:

{
  "overall_score": float (1-10),
  "security": {
    "score": float (1-10),
    "issues": [
      {
        "severity": "high|medium|low",
        "type": "specific issue category",
        "description": "detailed description",
        "line": line number (if applicable),
        "suggestion": "specific fix suggestion"
      }
    ]
  },
  "performance": { "score": float (1-10), "issues": [...] },
  "code_quality": { "score": float (1-10), "issues": [...] },
  "maintainability": { "score": float (1-10), "issues": [...] },
  "best_practices": { "score": float (1-10), "issues": [...] },
  "suggestions": ["specific improvement suggestions..."]
}

Code to analyze:

"#;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no analysis backend is configured")]
    NotConfigured,

    #[error("failed to contact analysis backend: {0}")]
    Request(#[from] reqwest::Error),

    #[error("analysis backend returned status {0}")]
    Status(u16),

    #[error("analysis backend returned no choices")]
    Empty,

    #[error("model output is not a valid analysis: {0}")]
    Malformed(String),

    #[error("model returned an incomplete analysis")]
    Incomplete,
}

/// Produces a review for a piece of source code.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(&self, code: &str) -> Result<AnalysisResponse, AnalysisError>;
}

/// Backend used when none is configured. Every call fails.
#[derive(Debug, Default)]
pub struct DisabledBackend;

#[async_trait]
impl AnalysisBackend for DisabledBackend {
    async fn analyze(&self, _code: &str) -> Result<AnalysisResponse, AnalysisError> {
        Err(AnalysisError::NotConfigured)
    }
}

// ---------------------------------------------------------------------------
// Chat completion backend
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_completion_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

/// [`AnalysisBackend`] over an OpenAI-compatible `/chat/completions` URL.
pub struct ChatCompletionBackend {
    client: reqwest::Client,
    url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl ChatCompletionBackend {
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl AnalysisBackend for ChatCompletionBackend {
    async fn analyze(&self, code: &str) -> Result<AnalysisResponse, AnalysisError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: format!("{PROMPT}{code}"),
            }],
            max_completion_tokens: MAX_COMPLETION_TOKENS,
            temperature: 0.1,
            stream: false,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose());
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "analysis backend returned an error status");
            return Err(AnalysisError::Status(status.as_u16()));
        }

        let chat: ChatResponse = resp.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(AnalysisError::Empty)?;

        debug!(chars = content.len(), "received model output");
        parse_analysis(&content)
    }
}

impl std::fmt::Debug for ChatCompletionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionBackend")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Model output parsing
// ---------------------------------------------------------------------------

/// The span from the first `{` to the last `}`, if there is one.
///
/// Models often wrap their JSON in prose or code fences.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Parse and sanity-check a model answer.
///
/// An analysis with a zero overall score, or with no findings in any
/// category, is rejected as incomplete. An overall score outside 1..=10 is
/// replaced by a neutral one.
pub fn parse_analysis(content: &str) -> Result<AnalysisResponse, AnalysisError> {
    let json = extract_json_object(content).unwrap_or(content);
    let mut analysis: AnalysisResponse =
        serde_json::from_str(json).map_err(|e| AnalysisError::Malformed(e.to_string()))?;

    if analysis.overall_score == 0.0 || analysis.issue_count() == 0 {
        return Err(AnalysisError::Incomplete);
    }
    if !(1.0..=10.0).contains(&analysis.overall_score) {
        analysis.overall_score = FALLBACK_SCORE;
    }
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANSWER: &str = r#"{
        "overall_score": 6.5,
        "security": {"score": 5, "issues": [
            {"severity": "high", "type": "Secrets", "description": "hard-coded key", "suggestion": "read from env"}
        ]},
        "performance": {"score": 8, "issues": []},
        "code_quality": {"score": 7, "issues": []},
        "maintainability": {"score": 6, "issues": []},
        "best_practices": {"score": 6, "issues": []},
        "suggestions": []
    }"#;

    #[test]
    fn extracts_object_from_surrounding_prose() {
        let wrapped = format!("Sure! Here is the review:\n```json\n{ANSWER}\n```\nHope it helps.");
        let analysis = parse_analysis(&wrapped).unwrap();
        assert_eq!(analysis.overall_score, 6.5);
        assert_eq!(analysis.security.issues[0].kind, "Secrets");
    }

    #[test]
    fn extract_requires_ordered_braces() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
        assert_eq!(extract_json_object("a {\"x\":1} b"), Some("{\"x\":1}"));
    }

    #[test]
    fn analysis_without_findings_is_incomplete() {
        let empty = r#"{"overall_score": 9, "security": {"score": 9, "issues": []}}"#;
        assert!(matches!(parse_analysis(empty), Err(AnalysisError::Incomplete)));

        let zero = ANSWER.replace("6.5", "0");
        assert!(matches!(parse_analysis(&zero), Err(AnalysisError::Incomplete)));
    }

    #[test]
    fn out_of_range_score_is_neutralised() {
        let high = ANSWER.replace("6.5", "42");
        assert_eq!(parse_analysis(&high).unwrap().overall_score, FALLBACK_SCORE);
    }

    #[test]
    fn null_line_and_suggestion_are_accepted() {
        let answer = r#"{
            "overall_score": 7,
            "security": {"score": 6, "issues": [
                {"severity": "medium", "type": "Validation", "description": "unchecked input",
                 "line": null, "suggestion": null}
            ]},
            "performance": {"score": 8, "issues": null},
            "suggestions": null
        }"#;

        let analysis = parse_analysis(answer).unwrap();
        let issue = &analysis.security.issues[0];
        assert_eq!(issue.line, 0);
        assert_eq!(issue.suggestion, "");
        assert!(analysis.performance.issues.is_empty());
        assert_eq!(analysis.issue_count(), 1);
    }

    #[test]
    fn prose_only_is_malformed() {
        assert!(matches!(
            parse_analysis("I cannot review this code."),
            Err(AnalysisError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn disabled_backend_always_fails() {
        assert!(matches!(
            DisabledBackend.analyze("fn main() {}").await,
            Err(AnalysisError::NotConfigured)
        ));
    }
}
