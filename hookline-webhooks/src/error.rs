//! Error types for webhook delivery

use thiserror::Error;

/// Errors that can occur while delivering webhooks
#[derive(Error, Debug)]
pub enum WebhookError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The endpoint answered with a non-2xx status
    #[error("Unexpected response status {status}")]
    UnexpectedStatus { status: u16, body: Option<String> },

    /// Webhook URL missing or empty
    #[error("Webhook URL is required")]
    UrlRequired,

    /// A field could not be decoded or applied
    #[error("Invalid webhook field `{field}`: {message}")]
    InvalidField { field: String, message: String },

    /// Payload serialization/deserialization failed
    #[error("Payload error: {0}")]
    PayloadError(String),

    /// The stack ran out of middleware before a result was produced
    #[error("No next middleware for index {0}")]
    NoNextMiddleware(usize),

    /// Async dispatch was attempted for a webhook the store did not identify
    #[error(
        "Webhook must be persisted and have a unique identifier before being sent asynchronously, \
         verify the WebhookResultStore implementation sets this identifier"
    )]
    WebhookIdRequiredForAsync,

    /// Result store failure
    #[error("Store error: {0}")]
    StoreError(String),

    /// Lock service failure
    #[error("Lock error: {0}")]
    LockError(String),

    /// Async dispatcher failure
    #[error("Async dispatch failed: {0}")]
    DispatchError(String),

    /// Signature verification failed
    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Timestamp validation failed
    #[error("Timestamp validation failed: {0}")]
    TimestampInvalid(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl WebhookError {
    /// Errors caused by a misconfigured pipeline rather than a delivery problem
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoNextMiddleware(_) | Self::WebhookIdRequiredForAsync
        )
    }

    pub(crate) fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::PayloadError(err.to_string())
    }
}
