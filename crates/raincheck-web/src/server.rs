//! Main web server setup and startup.
//!
//! [`WebServer`] builds the shared state and the per-route gates from a
//! [`ServerConfig`], composes the Axum router and runs the listener.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Method, header};
use axum::middleware;
use axum::routing::{get, post};
use raincheck_protocol::{API_KEY_HEADER, MAX_CODE_BODY_BYTES};
use raincheck_store::{CredentialStore, Database};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::analysis::{AnalysisBackend, ChatCompletionBackend, DisabledBackend};
use crate::api;
use crate::auth::{self, AuthGate, JwtVerifier};
use crate::config::{AnalyzeAuth, ServerConfig};
use crate::state::AppState;

/// Gates guarding each group of routes.
#[derive(Debug, Clone)]
pub struct RouteGates {
    /// `POST /api/analyze-code`.
    pub analyze: AuthGate,
    /// `/api/stats`.
    pub service: AuthGate,
    /// `/api/apikey`. The routes are not mounted without it.
    pub account: Option<AuthGate>,
}

/// Build the Axum router with all routes registered.
pub fn router(state: AppState, gates: RouteGates) -> Router {
    let analyze = Router::new()
        .route("/api/analyze-code", post(api::analyze_code))
        .layer(DefaultBodyLimit::max(MAX_CODE_BODY_BYTES))
        .route_layer(middleware::from_fn_with_state(gates.analyze, auth::require_auth));

    let service = Router::new()
        .route("/api/stats", get(api::get_stats).post(api::set_stats))
        .route_layer(middleware::from_fn_with_state(gates.service, auth::require_auth));

    let mut app = Router::new()
        .route("/health", get(api::health))
        .merge(analyze)
        .merge(service);

    match gates.account {
        Some(gate) => {
            let account = Router::new()
                .route(
                    "/api/apikey",
                    get(api::get_api_key)
                        .post(api::issue_api_key)
                        .delete(api::revoke_api_key),
                )
                .route_layer(middleware::from_fn_with_state(gate, auth::require_auth));
            app = app.merge(account);
        }
        None => warn!("no identity provider configured, /api/apikey is disabled"),
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(Arc::new(state))
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            header::AUTHORIZATION,
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .expose_headers([header::AUTHORIZATION])
}

/// The raincheck HTTP server.
pub struct WebServer {
    addr: String,
    state: AppState,
    gates: RouteGates,
}

impl WebServer {
    /// Assemble state and gates from configuration.
    ///
    /// Opens (and migrates) the token database when one is configured.
    pub async fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let credentials = match &config.database_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                let db = Database::open_and_migrate(path.clone()).await?;
                info!(path = %path.display(), "token store initialized");
                CredentialStore::sqlite(db)
            }
            None => {
                warn!("RAINCHECK_DB not set, issued tokens are kept in memory");
                CredentialStore::in_memory()
            }
        };

        let analysis: Arc<dyn AnalysisBackend> = match &config.analysis {
            Some(analysis) => Arc::new(ChatCompletionBackend::new(analysis)?),
            None => {
                warn!("ANALYSIS_URL not set, code analysis is disabled");
                Arc::new(DisabledBackend)
            }
        };

        let timeout = config.auth_timeout();
        let secret = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("API_KEY must be set"))?;
        let service = AuthGate::static_secret(secret);

        let analyze = match config.analyze_auth {
            AnalyzeAuth::Issued => AuthGate::issued_token(credentials.clone()).with_timeout(timeout),
            AnalyzeAuth::Static => service.clone(),
        };

        let account = match &config.identity {
            Some(identity) => {
                let verifier = JwtVerifier::from_config(identity)?;
                Some(AuthGate::federated(Arc::new(verifier)).with_timeout(timeout))
            }
            None => None,
        };

        Ok(Self {
            addr: config.addr(),
            state: AppState::new(credentials, analysis).with_store_timeout(timeout),
            gates: RouteGates {
                analyze,
                service,
                account,
            },
        })
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn router(&self) -> Router {
        router(self.state.clone(), self.gates.clone())
    }

    /// Bind the configured address and serve until the process exits.
    pub async fn start(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let local = listener.local_addr()?;
        info!(
            addr = %local,
            analyze_gate = ?self.gates.analyze.strategy(),
            "starting web server"
        );
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
