//! HTTP client for the raincheck server.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use raincheck_protocol::{API_KEY_HEADER, AnalysisResponse, CodeRequest, ErrorBody};
use tracing::debug;

/// Server used when neither `--server` nor `RAINCHECK_SERVER` is given.
pub const DEFAULT_SERVER: &str = "http://localhost:1000";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends review requests authenticated with the user's API key.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// `POST /api/analyze-code`.
    ///
    /// Non-success statuses become errors carrying the server's message.
    pub async fn analyze_code(&self, code: &str) -> Result<AnalysisResponse> {
        let url = format!("{}/api/analyze-code", self.base_url);
        debug!(%url, bytes = code.len(), "sending analysis request");

        let resp = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&CodeRequest {
                code: code.to_string(),
            })
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.base_url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            bail!("API request failed with status {}: {message}", status.as_u16());
        }

        resp.json()
            .await
            .context("failed to decode analysis response")
    }
}

#[cfg(test)]
mod tests {
    use axum::Json;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use raincheck_protocol::{Category, CodeRequest};
    use tokio::net::TcpListener;

    use super::*;

    const KEY: &str = "a1b2c3";

    async fn analyze(
        headers: HeaderMap,
        Json(req): Json<CodeRequest>,
    ) -> Result<Json<AnalysisResponse>, (StatusCode, Json<ErrorBody>)> {
        if headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) != Some(KEY) {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody::new("Invalid API key")),
            ));
        }
        Ok(Json(AnalysisResponse {
            overall_score: 9.0,
            suggestions: vec![format!("{} bytes reviewed", req.code.len())],
            security: Category {
                score: 9.0,
                issues: vec![],
            },
            ..Default::default()
        }))
    }

    async fn start_fake_server() -> String {
        let app = Router::new().route("/api/analyze-code", post(analyze));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn sends_key_and_decodes_report() {
        let base = start_fake_server().await;
        let client = ApiClient::new(&base, KEY).unwrap();

        let report = client.analyze_code("print('hi')").await.unwrap();
        assert_eq!(report.overall_score, 9.0);
        assert_eq!(report.suggestions, vec!["11 bytes reviewed".to_string()]);
    }

    #[tokio::test]
    async fn server_message_is_surfaced() {
        let base = start_fake_server().await;
        let client = ApiClient::new(&base, "wrong").unwrap();

        let err = client.analyze_code("x").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "API request failed with status 401: Invalid API key"
        );
    }
}
