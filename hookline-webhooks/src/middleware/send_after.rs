use super::pass_on;
use crate::{Result, Stack, Webhook, WebhookResult, WebhookResultStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Defers webhooks whose `send_after` is still in the future.
///
/// The webhook is persisted as pending and picked up later by
/// [`WebhookClient::send_due_webhooks`](crate::WebhookClient::send_due_webhooks).
#[derive(Clone)]
pub struct SendAfterMiddleware {
    store: Arc<dyn WebhookResultStore>,
}

impl SendAfterMiddleware {
    pub fn new(store: Arc<dyn WebhookResultStore>) -> Self {
        Self { store }
    }

    pub async fn process(&self, webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        let deferred = webhook
            .send_after()
            .is_some_and(|send_after| send_after > Utc::now());

        if deferred && !webhook.is_bypass_send_after() {
            info!(
                webhook_id = webhook.id().unwrap_or_default(),
                send_after = ?webhook.send_after(),
                "Deferring webhook until send_after"
            );
            return self.store.store(WebhookResult::new(webhook)).await;
        }

        pass_on(webhook, stack).await
    }
}
