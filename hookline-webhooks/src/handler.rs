//! Post-send state transitions

use crate::{Result, RetryStrategy, WebhookResult, WebhookResultStore, WebhookStatus};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Decides attempt count and status after a send, then persists the result.
///
/// A failure with attempts left gets a `retry_after` from the retry strategy.
/// Results that were never attempted are persisted untouched.
#[derive(Clone)]
pub struct WebhookResultHandler {
    store: Arc<dyn WebhookResultStore>,
    retry: Arc<dyn RetryStrategy>,
}

impl WebhookResultHandler {
    pub fn new(store: Arc<dyn WebhookResultStore>, retry: Arc<dyn RetryStrategy>) -> Self {
        Self { store, retry }
    }

    pub async fn handle(&self, mut result: WebhookResult) -> Result<WebhookResult> {
        if result.is_attempted() {
            let successful = result.is_successful();
            let webhook = result.webhook_mut();
            webhook.increment_attempt();

            let status = if successful {
                WebhookStatus::Success
            } else if webhook.current_attempt() >= webhook.max_attempt() {
                WebhookStatus::Failed
            } else {
                WebhookStatus::FailedPendingRetry
            };
            webhook.set_status(status);

            let retry_after = match status {
                WebhookStatus::FailedPendingRetry => {
                    chrono::Duration::from_std(self.retry.next_delay(webhook))
                        .ok()
                        .and_then(|delay| Utc::now().checked_add_signed(delay))
                }
                _ => None,
            };
            webhook.set_retry_after(retry_after);

            debug!(
                webhook_id = webhook.id().unwrap_or_default(),
                attempt = webhook.current_attempt(),
                max_attempt = webhook.max_attempt(),
                status = %status,
                "Webhook attempt recorded"
            );
        }

        self.store.store(result).await
    }
}
