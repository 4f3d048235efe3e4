use super::pass_on;
use crate::{Result, Stack, Webhook, WebhookResult};
use tracing::warn;

/// Keeps terminal webhooks from being sent again unless reruns are allowed
#[derive(Debug, Clone, Default)]
pub struct RerunMiddleware;

impl RerunMiddleware {
    pub fn new() -> Self {
        Self
    }

    pub async fn process(&self, webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        if webhook.status().is_terminal() && !webhook.is_rerun_allowed() {
            warn!(
                webhook_id = webhook.id().unwrap_or_default(),
                status = %webhook.status(),
                "Webhook already processed and reruns are not allowed, skipping"
            );
            return Ok(WebhookResult::new(webhook));
        }

        pass_on(webhook, stack).await
    }
}
