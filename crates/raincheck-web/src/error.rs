//! HTTP-facing error type.
//!
//! Every failure leaving the server is rendered as `{"message": "..."}`.
//! Messages are fixed strings or caller-facing validation text; internal
//! detail goes to the log, never to the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use raincheck_protocol::ErrorBody;
use raincheck_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The caller's credential is missing, malformed or rejected.
    #[error("{0}")]
    Unauthenticated(&'static str),

    /// A dependency needed to decide the request failed or timed out.
    #[error("{0}")]
    UpstreamUnavailable(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("request body too large")]
    PayloadTooLarge,

    /// The analysis backend answered but the answer was unusable.
    #[error("analysis failed")]
    AnalysisFailed,

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::AnalysisFailed => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidArgument(msg) => Self::BadRequest(msg),
            other => {
                tracing::error!(error = %other, "credential store failure");
                Self::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_distinguish_bad_credentials_from_outages() {
        assert_eq!(
            ApiError::Unauthenticated("Invalid API key").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::UpstreamUnavailable("down").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn store_internals_are_not_exposed() {
        let err: ApiError = StoreError::Migration {
            version: 2,
            message: "disk I/O error at /var/lib/raincheck".into(),
        }
        .into();
        assert!(matches!(err, ApiError::Internal));
        assert_eq!(err.to_string(), "internal server error");
    }
}
