//! Request authentication.
//!
//! An [`AuthGate`] decides, per request, whether the caller may reach the
//! route behind it. Each gate runs exactly one [`VerificationStrategy`]. The
//! router installs gates per route with [`require_auth`]:
//!
//! ```ignore
//! Router::new()
//!     .route("/api/stats", get(api::get_stats))
//!     .route_layer(middleware::from_fn_with_state(gate, auth::require_auth))
//! ```
//!
//! On success the resolved [`AuthenticatedIdentity`] is inserted into the
//! request extensions. On failure the gate answers with `{"message": ...}`
//! and the handler never runs.

pub mod federated;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use raincheck_protocol::{API_KEY_HEADER, USER_ID_HEADER};
use raincheck_store::{CredentialStore, StoreError, fingerprint};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::config::SecretString;
use crate::error::ApiError;

pub use federated::{IdentityVerifier, JwtVerifier, VerifyError};

/// Bound on store and identity provider calls when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Who the caller turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticatedIdentity {
    /// Holder of the shared service secret.
    Service,
    /// Holder of a token issued to this user.
    User(String),
    /// Subject of a verified federated identity token.
    Federated(String),
}

impl AuthenticatedIdentity {
    /// The user this identity acts for, if any.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Service => None,
            Self::User(id) | Self::Federated(id) => Some(id),
        }
    }
}

/// How a gate checks the caller.
#[derive(Clone)]
pub enum VerificationStrategy {
    /// `X-API-Key` compared in constant time against one shared secret.
    StaticSecret(SecretString),
    /// `X-API-Key` resolved to a user through the credential store.
    IssuedToken(CredentialStore),
    /// `Authorization: Bearer` checked by an identity provider.
    FederatedIdentity(Arc<dyn IdentityVerifier>),
}

impl VerificationStrategy {
    fn name(&self) -> &'static str {
        match self {
            Self::StaticSecret(_) => "static",
            Self::IssuedToken(_) => "issued",
            Self::FederatedIdentity(_) => "federated",
        }
    }
}

impl std::fmt::Debug for VerificationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// AuthGate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AuthGate {
    strategy: VerificationStrategy,
    timeout: Duration,
}

impl AuthGate {
    pub fn new(strategy: VerificationStrategy) -> Self {
        Self {
            strategy,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn static_secret(secret: impl Into<SecretString>) -> Self {
        Self::new(VerificationStrategy::StaticSecret(secret.into()))
    }

    pub fn issued_token(store: CredentialStore) -> Self {
        Self::new(VerificationStrategy::IssuedToken(store))
    }

    pub fn federated(verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self::new(VerificationStrategy::FederatedIdentity(verifier))
    }

    /// Bound on each store or provider call. Expiry counts as an outage.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn strategy(&self) -> &VerificationStrategy {
        &self.strategy
    }

    /// Decide whether the request carrying `headers` may proceed.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedIdentity, ApiError> {
        match &self.strategy {
            VerificationStrategy::StaticSecret(secret) => check_static(secret, headers),
            VerificationStrategy::IssuedToken(store) => self.check_issued(store, headers).await,
            VerificationStrategy::FederatedIdentity(verifier) => {
                self.check_federated(verifier.as_ref(), headers).await
            }
        }
    }

    async fn check_issued(
        &self,
        store: &CredentialStore,
        headers: &HeaderMap,
    ) -> Result<AuthenticatedIdentity, ApiError> {
        let token = api_key(headers)?;

        match tokio::time::timeout(self.timeout, store.find_user_by_token(token)).await {
            Ok(Ok(user_id)) => {
                debug!(user_id = %user_id, "issued token accepted");
                Ok(AuthenticatedIdentity::User(user_id))
            }
            Ok(Err(StoreError::InvalidToken)) => {
                debug!(token = %fingerprint(token), "unknown issued token");
                Err(ApiError::Unauthenticated("Invalid API key"))
            }
            Ok(Err(err)) => {
                warn!(token = %fingerprint(token), error = %err, "credential store failed during authentication");
                Err(ApiError::UpstreamUnavailable("Authentication service unavailable"))
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "credential store timed out");
                Err(ApiError::UpstreamUnavailable("Authentication service unavailable"))
            }
        }
    }

    async fn check_federated(
        &self,
        verifier: &dyn IdentityVerifier,
        headers: &HeaderMap,
    ) -> Result<AuthenticatedIdentity, ApiError> {
        let token = bearer_token(headers)?;

        match tokio::time::timeout(self.timeout, verifier.verify(token)).await {
            Ok(Ok(subject)) => {
                debug!(subject = %subject, "identity token accepted");
                Ok(AuthenticatedIdentity::Federated(subject))
            }
            Ok(Err(VerifyError::Rejected(reason))) => {
                debug!(token = %fingerprint(token), reason = %reason, "identity token rejected");
                Err(ApiError::Unauthenticated("Invalid ID token"))
            }
            Ok(Err(err)) => {
                warn!(error = %err, "identity provider failed during authentication");
                Err(ApiError::UpstreamUnavailable("Identity provider unavailable"))
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "identity provider timed out");
                Err(ApiError::UpstreamUnavailable("Identity provider unavailable"))
            }
        }
    }
}

fn check_static(secret: &SecretString, headers: &HeaderMap) -> Result<AuthenticatedIdentity, ApiError> {
    let presented = api_key(headers)?;

    // A blank configured secret never authenticates anyone.
    if secret.is_empty() {
        return Err(ApiError::Unauthenticated("Invalid API key"));
    }

    if bool::from(presented.as_bytes().ct_eq(secret.expose().as_bytes())) {
        Ok(AuthenticatedIdentity::Service)
    } else {
        debug!(token = %fingerprint(presented), "static secret mismatch");
        Err(ApiError::Unauthenticated("Invalid API key"))
    }
}

// ---------------------------------------------------------------------------
// Header extraction
// ---------------------------------------------------------------------------

/// The `X-API-Key` value. Absent and empty are the same.
fn api_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    let Some(value) = headers.get(API_KEY_HEADER) else {
        return Err(ApiError::Unauthenticated("API key is required"));
    };
    match value.to_str() {
        Ok("") => Err(ApiError::Unauthenticated("API key is required")),
        Ok(key) => Ok(key),
        Err(_) => Err(ApiError::Unauthenticated("Invalid API key")),
    }
}

/// The token from `Authorization: Bearer <token>`.
///
/// The header must split on single spaces into exactly two parts, the first
/// being literally `Bearer`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(ApiError::Unauthenticated("Authorization header is required"));
    };
    let malformed = ApiError::Unauthenticated("Invalid authorization header format");
    let Ok(value) = value.to_str() else {
        return Err(malformed);
    };

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(*token),
        _ => Err(malformed),
    }
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Axum middleware running `gate` in front of the wrapped routes.
///
/// A client-supplied `X-User-ID` is always discarded. When the gate resolves
/// a federated subject, that subject is written back as `X-User-ID`.
pub async fn require_auth(State(gate): State<AuthGate>, mut req: Request, next: Next) -> Response {
    req.headers_mut().remove(USER_ID_HEADER);

    let identity = match gate.authenticate(req.headers()).await {
        Ok(identity) => identity,
        Err(err) => return err.into_response(),
    };

    if let AuthenticatedIdentity::Federated(subject) = &identity {
        match HeaderValue::from_str(subject) {
            Ok(value) => {
                req.headers_mut().insert(USER_ID_HEADER, value);
            }
            Err(_) => {
                warn!("identity subject is not a valid header value");
                return ApiError::Unauthenticated("Invalid ID token").into_response();
            }
        }
    }

    req.extensions_mut().insert(identity);
    next.run(req).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
