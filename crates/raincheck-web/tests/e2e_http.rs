//! End-to-end tests over real HTTP.
//!
//! These tests start the **real** server built from a [`ServerConfig`] on an
//! OS-assigned ephemeral port, backed by an on-disk token database and a
//! stand-in chat completion endpoint, and drive it with `reqwest`.

use std::net::SocketAddr;

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Serialize;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

use raincheck_web::WebServer;
use raincheck_web::config::{AnalysisConfig, IdentityConfig, ServerConfig};

const SERVICE_SECRET: &str = "svc-secret";
const UPSTREAM_KEY: &str = "upstream-key";
const IDP_SECRET: &str = "idp-signing-secret";
const ISSUER: &str = "https://idp.example";
const AUDIENCE: &str = "raincheck";

// ── helpers ──────────────────────────────────────────────────────────────────

/// Stand-in for the model endpoint: answers with prose-wrapped JSON.
async fn fake_completions(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    let expected = format!("Bearer {UPSTREAM_KEY}");
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let analysis = json!({
        "overall_score": 7.0,
        "security": {"score": 6.0, "issues": [{
            "severity": "medium",
            "type": "Input validation",
            "description": "unchecked index",
            "line": 2,
            "suggestion": "use get()"
        }]},
        "performance": {"score": 8.0, "issues": []},
        "code_quality": {"score": 7.0, "issues": []},
        "maintainability": {"score": 7.0, "issues": []},
        "best_practices": {"score": 7.0, "issues": []},
        "suggestions": ["add tests"]
    });
    Ok(Json(json!({
        "choices": [{"message": {"content": format!("Here is my review:\n{analysis}\nDone.")}}]
    })))
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind to port 0");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

/// Start the fake model and the real server; return the server base URL.
async fn start_test_server(dir: &TempDir) -> String {
    let upstream = spawn(Router::new().route("/v1/chat/completions", post(fake_completions))).await;

    let config = ServerConfig {
        api_key: Some(SERVICE_SECRET.into()),
        database_path: Some(dir.path().join("data").join("tokens.db")),
        analysis: Some(AnalysisConfig {
            url: format!("http://{upstream}/v1/chat/completions"),
            api_key: Some(UPSTREAM_KEY.into()),
            ..Default::default()
        }),
        identity: Some(IdentityConfig {
            issuer: ISSUER.into(),
            audience: AUDIENCE.into(),
            hmac_secret: Some(IDP_SECRET.into()),
            rsa_pem: None,
        }),
        ..Default::default()
    };
    config.validate().unwrap();

    let server = WebServer::from_config(&config).await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind to port 0");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server.serve(listener).await.ok();
    });

    // Small yield so the listener is ready.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    format!("http://{addr}")
}

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    iss: &'a str,
    aud: &'a str,
    exp: i64,
}

fn id_token(sub: &str) -> String {
    let claims = Claims {
        sub,
        iss: ISSUER,
        aud: AUDIENCE,
        exp: chrono::Utc::now().timestamp() + 600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(IDP_SECRET.as_bytes()),
    )
    .unwrap()
}

// ── full lifecycle ───────────────────────────────────────────────────────────

#[tokio::test]
async fn issue_analyze_revoke_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_server(&dir).await;
    let client = reqwest::Client::new();
    let bearer = format!("Bearer {}", id_token("user-42"));

    // Issue a key with the federated identity.
    let resp = client
        .post(format!("{base}/api/apikey"))
        .header("authorization", &bearer)
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("invalid JSON");
    let api_key = body["apiKey"].as_str().unwrap().to_string();
    assert_eq!(api_key.len(), 64);

    // Use it for analysis.
    let resp = client
        .post(format!("{base}/api/analyze-code"))
        .header("x-api-key", &api_key)
        .json(&json!({"code": "fn main() { let v = vec![1]; v[3]; }"}))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status(), 200);
    let analysis: Value = resp.json().await.expect("invalid JSON");
    assert_eq!(analysis["overall_score"], 7.0);
    assert_eq!(analysis["security"]["issues"][0]["line"], 2);

    // The service secret sees the counter move.
    let stats: Value = client
        .get(format!("{base}/api/stats"))
        .header("x-api-key", SERVICE_SECRET)
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("invalid JSON");
    assert_eq!(stats["analyses"], 1);

    // Revoke, then the key is dead.
    let resp = client
        .delete(format!("{base}/api/apikey"))
        .header("authorization", &bearer)
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status(), 204);

    let resp = client
        .post(format!("{base}/api/analyze-code"))
        .header("x-api-key", &api_key)
        .json(&json!({"code": "x"}))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status(), 401);
    let err: Value = resp.json().await.expect("invalid JSON");
    assert_eq!(err["message"], "Invalid API key");
}

#[tokio::test]
async fn tampered_id_token_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_server(&dir).await;

    let mut token = id_token("user-42");
    token.push('x');

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/apikey"))
        .header("authorization", format!("Bearer {token}"))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status(), 401);
    let err: Value = resp.json().await.expect("invalid JSON");
    assert_eq!(err["message"], "Invalid ID token");
}

#[tokio::test]
async fn cors_preflight_allows_api_key_header() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_server(&dir).await;

    let resp = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{base}/api/analyze-code"))
        .header("origin", "https://raincheck.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "x-api-key, content-type")
        .send()
        .await
        .expect("request failed");

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    let allowed = resp
        .headers()
        .get("access-control-allow-headers")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    assert!(allowed.contains("x-api-key"), "allowed headers: {allowed}");
}
