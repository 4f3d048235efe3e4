//! Outcome of one pass through the middleware stack

use crate::{Webhook, WebhookError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response descriptor captured from a delivered webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// HTTP status code
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Response body (truncated)
    pub body: Option<String>,
}

impl WebhookResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// What happened to the webhook during the pass
#[derive(Debug)]
pub enum WebhookOutcome {
    /// No request was made: stored, dispatched, deferred or skipped
    NotSent,

    /// The endpoint accepted the webhook
    Sent(WebhookResponse),

    /// The request failed or was rejected
    Failed(WebhookError),
}

/// Result of a webhook pass, owning the (possibly updated) webhook
#[derive(Debug)]
pub struct WebhookResult {
    webhook: Webhook,
    outcome: WebhookOutcome,
}

impl WebhookResult {
    /// A result for a webhook that was not sent during this pass
    pub fn new(webhook: Webhook) -> Self {
        Self {
            webhook,
            outcome: WebhookOutcome::NotSent,
        }
    }

    pub fn sent(webhook: Webhook, response: WebhookResponse) -> Self {
        Self {
            webhook,
            outcome: WebhookOutcome::Sent(response),
        }
    }

    pub fn failed(webhook: Webhook, error: WebhookError) -> Self {
        Self {
            webhook,
            outcome: WebhookOutcome::Failed(error),
        }
    }

    pub fn webhook(&self) -> &Webhook {
        &self.webhook
    }

    pub fn webhook_mut(&mut self) -> &mut Webhook {
        &mut self.webhook
    }

    pub fn into_webhook(self) -> Webhook {
        self.webhook
    }

    pub fn outcome(&self) -> &WebhookOutcome {
        &self.outcome
    }

    pub fn response(&self) -> Option<&WebhookResponse> {
        match &self.outcome {
            WebhookOutcome::Sent(response) => Some(response),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&WebhookError> {
        match &self.outcome {
            WebhookOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.outcome, WebhookOutcome::Sent(_))
    }

    /// A request was made, successfully or not
    pub fn is_attempted(&self) -> bool {
        !matches!(self.outcome, WebhookOutcome::NotSent)
    }
}
