use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;

/// Error codes surfaced to callers, each with an HTTP-style status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidPrompt,
    GenerationFailed,
    Timeout,
    RateLimit,
    NotFound,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPrompt => "INVALID_PROMPT",
            Self::GenerationFailed => "GENERATION_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::RateLimit => "RATE_LIMIT",
            Self::NotFound => "NOT_FOUND",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPrompt => StatusCode::BAD_REQUEST,
            Self::GenerationFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// What the user can do about it.
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Self::InvalidPrompt => &[
                "Describe the object in 1 to 5000 characters",
                "Use quality low, medium or high and style realistic, stylized or abstract",
            ],
            Self::GenerationFailed => &[
                "Try a simpler prompt",
                "Try a lower quality setting",
                "Try again in a few moments",
            ],
            Self::Timeout => &[
                "Try a lower quality setting",
                "Try a simpler prompt with fewer details",
            ],
            Self::RateLimit => &["Wait a minute before sending another request"],
            Self::NotFound => &["Generate the model again, cached models expire after 24 hours"],
        }
    }
}

/// Caller error: the request never reaches the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid request: {}", describe_fields(.fields))]
pub struct ValidationFailure {
    pub fields: BTreeMap<String, String>,
}

impl ValidationFailure {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        Self {
            fields: BTreeMap::from([(field.to_string(), message.into())]),
        }
    }
}

fn describe_fields(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<validator::ValidationErrors> for ValidationFailure {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let message = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{field} is invalid"));
                (field.to_string(), message)
            })
            .collect();
        Self { fields }
    }
}

/// Terminal failures of the generation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation failed after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: BackendError,
    },
    #[error("generation cancelled by caller")]
    Cancelled,
}

impl GenerationError {
    /// Exhaustion is reported as a timeout only when the last attempt timed out.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Exhausted {
                last_error: BackendError::Timeout(_),
                ..
            } => ErrorCode::Timeout,
            Self::Exhausted { .. } | Self::Cancelled => ErrorCode::GenerationFailed,
        }
    }
}

/// Error returned from HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("model {0} not found")]
    NotFound(String),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::InvalidPrompt,
            Self::Generation(e) => e.code(),
            Self::NotFound(_) => ErrorCode::NotFound,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let mut body = json!({
            "error": self.to_string(),
            "code": code.as_str(),
            "suggestions": code.suggestions(),
        });

        match &self {
            ApiError::Validation(failure) => {
                body["details"] = json!(failure.fields);
            }
            ApiError::Generation(e) => {
                tracing::error!(error = %e, code = code.as_str(), "Generation failed");
            }
            ApiError::NotFound(_) => {}
        }

        (code.status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn error_to_response(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn codes_map_to_status_classes() {
        assert_eq!(ErrorCode::InvalidPrompt.status().as_u16(), 400);
        assert_eq!(ErrorCode::GenerationFailed.status().as_u16(), 500);
        assert_eq!(ErrorCode::Timeout.status().as_u16(), 504);
        assert_eq!(ErrorCode::RateLimit.status().as_u16(), 429);
        assert_eq!(ErrorCode::NotFound.status().as_u16(), 404);
    }

    #[test]
    fn exhaustion_code_follows_last_cause() {
        let timed_out = GenerationError::Exhausted {
            attempts: 3,
            last_error: BackendError::Timeout(30_000),
        };
        let rejected = GenerationError::Exhausted {
            attempts: 3,
            last_error: BackendError::Rejected("status=500".into()),
        };
        assert_eq!(timed_out.code(), ErrorCode::Timeout);
        assert_eq!(rejected.code(), ErrorCode::GenerationFailed);
        assert_eq!(GenerationError::Cancelled.code(), ErrorCode::GenerationFailed);
    }

    #[tokio::test]
    async fn validation_failure_returns_400_with_details() {
        let err = ApiError::from(ValidationFailure::single("prompt", "Prompt is required"));

        let (status, json) = error_to_response(err).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INVALID_PROMPT");
        assert_eq!(json["details"]["prompt"], "Prompt is required");
        assert!(!json["suggestions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn timeout_exhaustion_returns_504() {
        let err = ApiError::from(GenerationError::Exhausted {
            attempts: 3,
            last_error: BackendError::Timeout(15_000),
        });

        let (status, json) = error_to_response(err).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json["code"], "TIMEOUT");
        assert!(json.get("details").is_none());
        assert_eq!(json["suggestions"][0], "Try a lower quality setting");
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let (status, json) = error_to_response(ApiError::NotFound("abc".into())).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["error"], "model abc not found");
    }
}
