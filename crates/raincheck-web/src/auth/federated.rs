//! Verification of identity tokens issued by an external provider.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use thiserror::Error;

use crate::config::IdentityConfig;

/// Clock skew tolerated on `exp`, in seconds.
const LEEWAY_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum VerifyError {
    /// The token is not acceptable: bad signature, expired, wrong issuer
    /// or audience, or missing subject.
    #[error("identity token rejected: {0}")]
    Rejected(String),

    /// The provider could not be consulted.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    /// The verifier itself is misconfigured.
    #[error("invalid verifier configuration: {0}")]
    Config(String),
}

/// Checks a bearer token and returns the subject it identifies.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, VerifyError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Verifies signed JWTs locally against a configured key.
///
/// Signature, `exp`, `iss` and `aud` are all checked. The `sub` claim must
/// be present and non-empty.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// HS256 tokens signed with a shared secret.
    pub fn hmac(secret: &[u8], issuer: &str, audience: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: validation(Algorithm::HS256, issuer, audience),
        }
    }

    /// RS256 tokens checked against a PEM-encoded RSA public key.
    pub fn rsa_pem(pem: &[u8], issuer: &str, audience: &str) -> Result<Self, VerifyError> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| VerifyError::Config(format!("invalid RSA public key: {e}")))?;
        Ok(Self {
            key,
            validation: validation(Algorithm::RS256, issuer, audience),
        })
    }

    /// Build from the `[identity]` section of the server configuration.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, VerifyError> {
        match (&config.hmac_secret, &config.rsa_pem) {
            (Some(secret), None) => Ok(Self::hmac(
                secret.expose().as_bytes(),
                &config.issuer,
                &config.audience,
            )),
            (None, Some(pem)) => Self::rsa_pem(pem.as_bytes(), &config.issuer, &config.audience),
            _ => Err(VerifyError::Config(
                "exactly one of hmac_secret and rsa_pem must be set".into(),
            )),
        }
    }
}

fn validation(alg: Algorithm, issuer: &str, audience: &str) -> Validation {
    let mut validation = Validation::new(alg);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    validation.validate_exp = true;
    validation.leeway = LEEWAY_SECS;
    validation
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<String, VerifyError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| VerifyError::Rejected(e.to_string()))?;

        if data.claims.sub.is_empty() {
            return Err(VerifyError::Rejected("empty subject".into()));
        }
        Ok(data.claims.sub)
    }
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}
