//! Persistence of webhook state between attempts

use crate::{Result, Webhook, WebhookResult, WebhookStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persists webhooks and the outcome of their attempts.
///
/// `store` assigns an id to webhooks that have none and returns the result
/// carrying the stored webhook.
#[async_trait]
pub trait WebhookResultStore: Send + Sync {
    async fn store(&self, result: WebhookResult) -> Result<WebhookResult>;

    async fn find(&self, id: &str) -> Result<Option<Webhook>>;

    /// Webhooks due at `now`, earliest first: pending ones past their
    /// `send_after` and failed ones past their `retry_after`

    async fn find_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Webhook>>;
}

/// Store that keeps nothing and never assigns ids
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWebhookResultStore;

#[async_trait]
impl WebhookResultStore for NullWebhookResultStore {
    async fn store(&self, result: WebhookResult) -> Result<WebhookResult> {
        Ok(result)
    }

    async fn find(&self, _id: &str) -> Result<Option<Webhook>> {
        Ok(None)
    }

    async fn find_due(&self, _now: DateTime<Utc>, _limit: usize) -> Result<Vec<Webhook>> {
        Ok(Vec::new())
    }
}

/// One recorded delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAttempt {
    pub attempt: u32,
    pub status: WebhookStatus,
    pub response_status: Option<u16>,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredWebhook {
    webhook: Webhook,
    attempts: Vec<WebhookAttempt>,
}

/// Process-local store keyed by UUID
#[derive(Debug, Default)]
pub struct InMemoryWebhookResultStore {
    webhooks: DashMap<String, StoredWebhook>,
}

impl InMemoryWebhookResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.webhooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.webhooks.is_empty()
    }

    /// Attempt history of a webhook, oldest first
    pub fn attempts(&self, id: &str) -> Vec<WebhookAttempt> {
        self.webhooks
            .get(id)
            .map(|stored| stored.attempts.clone())
            .unwrap_or_default()
    }

    fn attempt_of(result: &WebhookResult) -> Option<WebhookAttempt> {
        if !result.is_attempted() {
            return None;
        }

        let webhook = result.webhook();
        Some(WebhookAttempt {
            attempt: webhook.current_attempt(),
            status: webhook.status(),
            response_status: result.response().map(|response| response.status),
            error: result.error().map(ToString::to_string),
            recorded_at: Utc::now(),
        })
    }
}

#[async_trait]
impl WebhookResultStore for InMemoryWebhookResultStore {
    async fn store(&self, mut result: WebhookResult) -> Result<WebhookResult> {
        let id = match result.webhook().id() {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                result.webhook_mut().set_id(id.clone());
                id
            }
        };

        let attempt = Self::attempt_of(&result);
        let webhook = result.webhook().clone();

        self.webhooks
            .entry(id)
            .and_modify(|stored| {
                stored.webhook = webhook.clone();
                stored.attempts.extend(attempt.clone());
            })
            .or_insert_with(|| StoredWebhook {
                webhook,
                attempts: attempt.into_iter().collect(),
            });

        Ok(result)
    }

    async fn find(&self, id: &str) -> Result<Option<Webhook>> {
        Ok(self.webhooks.get(id).map(|stored| stored.webhook.clone()))
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Webhook>> {
        let mut due: Vec<(DateTime<Utc>, Webhook)> = self
            .webhooks
            .iter()
            .filter_map(|entry| {
                let webhook = &entry.value().webhook;
                let due_at = match webhook.status() {
                    WebhookStatus::Pending => webhook.send_after(),
                    WebhookStatus::FailedPendingRetry => webhook.retry_after(),
                    _ => None,
                }?;
                (due_at <= now).then(|| (due_at, webhook.clone()))
            })
            .collect();

        due.sort_by_key(|(due_at, _)| *due_at);
        Ok(due
            .into_iter()
            .take(limit)
            .map(|(_, webhook)| webhook)
            .collect())
    }
}
