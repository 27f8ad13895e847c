use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("invalid request: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("too many requests from {key}")]
    QuotaExceeded { key: String },

    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("upstream error from {provider}: {message}")]
    Upstream {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("auth failed for {provider}: {message}")]
    AuthFailed { provider: String, message: String },

    #[error("schema parse error: {0}")]
    SchemaParse(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl ForgeError {
    /// Extract provider name from structured error variants.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::RateLimited { provider } => Some(provider),
            Self::Upstream { provider, .. } => Some(provider),
            Self::AuthFailed { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// HTTP status this error is surfaced with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Produce a sanitized message safe for returning to browser clients.
    /// Upstream detail (URLs, bodies, provider messages) never leaves the process.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::QuotaExceeded { .. } => "Too Many Requests".to_string(),
            _ => "Internal Server Error".to_string(),
        }
    }
}

impl IntoResponse for ForgeError {
    fn into_response(self) -> Response {
        match &self {
            Self::Validation { .. } => {}
            Self::QuotaExceeded { key } => {
                tracing::warn!(key = %key, "request quota exhausted");
                return (self.status(), self.user_message()).into_response();
            }
            other => {
                let provider = other.provider().unwrap_or("none");
                tracing::error!(provider, error = %other, "request failed");
            }
        }

        let body = serde_json::json!({ "error": self.user_message() });
        (self.status(), Json(body)).into_response()
    }
}

pub type ForgeResult<T> = Result<T, ForgeError>;
