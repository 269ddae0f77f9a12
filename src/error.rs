use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation error: {0}")]
    Validation(String),
}

/// Client-supplied data failed a range, format or enum constraint.
/// Always answered with 400 and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{pair} range is invalid: maximum ({max}) must be greater than or equal to minimum ({min})")]
    RangeInvalid { pair: &'static str, min: u32, max: u32 },
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum { field: &'static str, min: u32, value: u32 },
    #[error("{field} must be at most {max}, got {value}")]
    AboveMaximum { field: &'static str, max: u32, value: u32 },
    #[error("post count {requested} exceeds the per-batch limit of {limit}")]
    TooManyPosts { requested: u32, limit: u32 },
    #[error("unknown category id {0}")]
    UnknownCategory(i64),
    #[error("Topic is required for AI post generation")]
    MissingTopic,
    #[error("Gemini API key not configured. Please add your API key first.")]
    ApiKeyNotConfigured,
    #[error("Invalid API key format. Please check your Gemini API key.")]
    InvalidKeyFormat,
    #[error("API key is required for testing")]
    MissingKey,
    #[error("No API key configured")]
    NoKeyConfigured,
}

/// Failure talking to the generative text provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered, but with a non-success status or an unexpected payload.
    #[error("{0}")]
    Upstream(String),
    /// The request never got a response (timeout, DNS, connection refused).
    /// Built through `From`, which drops the URL since it carries the API key.
    #[error("request failed: {0}")]
    Transport(reqwest::Error),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.without_url())
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Failed to save settings: {0}")]
    Persistence(String),
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Failed to save API key: {0}")]
    Persistence(String),
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Every item in the batch failed; carries the concatenated per-item errors.
    #[error("{0}")]
    NothingCreated(String),
    #[error("content store unavailable: {0}")]
    Store(String),
}

/// Error rendered as the `{success: false, message}` envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<SettingsError> for ApiError {
    fn from(e: SettingsError) -> Self {
        match e {
            SettingsError::Validation(v) => v.into(),
            SettingsError::Persistence(_) => Self::internal(e.to_string()),
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(e: BatchError) -> Self {
        match e {
            BatchError::Validation(v) => v.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::Validation(v) => v.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = %format!("{e:#}"), "request failed");
        Self::internal("Internal error")
    }
}
