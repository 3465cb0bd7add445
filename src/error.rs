//! HTTP-facing error taxonomy (§7). A [`BridgeError`] is the only error type a
//! [`crate::http`] handler ever returns; session and registry code map `rdkafka`/internal
//! failures into one of its variants at the boundary, the way
//! `wasmcloud-provider-http-server`'s `HttpServerError` separates "what went wrong" from "how
//! bootstrap failures are reported" (which stays on `anyhow::Result` throughout `main.rs`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::format::CONTENT_TYPE_V2;

/// Error surfaced to an HTTP client. Each variant carries the exact message that should appear
/// in the `{error_code, message}` envelope.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Malformed or schema-rejected request body → 400.
    #[error("{0}")]
    Validation(String),
    /// Well-formed but semantically forbidden request → 422.
    #[error("{0}")]
    Semantic(String),
    /// Conflicting request state (duplicate instance, mutually exclusive fields) → 409.
    #[error("{0}")]
    Conflict(String),
    /// Referenced instance/partition does not exist → 404.
    #[error("{0}")]
    NotFound(String),
    /// `Accept` header does not match the instance's embedded format, or inbound JSON failed to
    /// decode → 406.
    #[error("{0}")]
    NotAcceptable(String),
    /// Broker/library failure with no more specific mapping → 500, message passed through
    /// verbatim from the underlying failure.
    #[error("{0}")]
    Internal(String),
}

impl BridgeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Self::Semantic(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn not_acceptable(message: impl Into<String>) -> Self {
        Self::NotAcceptable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status this error maps to. `error_code` in the JSON envelope always equals this.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Semantic(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wire representation of a [`BridgeError`]: `{error_code, message}`, `error_code` equal to the
/// HTTP status.
#[derive(Serialize)]
struct ErrorEnvelope {
    error_code: u16,
    message: String,
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status();

        tracing::debug!(status = status.as_u16(), error = %self, "request failed");

        let body = ErrorEnvelope {
            error_code: status.as_u16(),
            message: self.to_string(),
        };

        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static(CONTENT_TYPE_V2),
        );
        response
    }
}

/// Maps a [`crate::kafka::KafkaOpError`] surfaced by a session operation to a [`BridgeError`].
/// Every broker failure that isn't otherwise distinguished becomes [`BridgeError::Internal`],
/// per §7's propagation policy.
impl From<crate::kafka::KafkaOpError> for BridgeError {
    fn from(value: crate::kafka::KafkaOpError) -> Self {
        match value {
            crate::kafka::KafkaOpError::NotAssigned { topic, partition } => BridgeError::not_found(
                format!("partition {partition} of topic {topic} is not currently assigned"),
            ),
            crate::kafka::KafkaOpError::Broker(message) => BridgeError::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(
            BridgeError::validation("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BridgeError::semantic("x").status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(BridgeError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(BridgeError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            BridgeError::not_acceptable("x").status(),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(
            BridgeError::internal("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
