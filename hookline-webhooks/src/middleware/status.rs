use super::pass_on;
use crate::{Result, Stack, Webhook, WebhookResult, WebhookResultHandler};

/// Applies the attempt count and status once the send result comes back
#[derive(Clone)]
pub struct StatusAndAttemptMiddleware {
    handler: WebhookResultHandler,
}

impl StatusAndAttemptMiddleware {
    pub fn new(handler: WebhookResultHandler) -> Self {
        Self { handler }
    }

    pub async fn process(&self, webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        let result = pass_on(webhook, stack).await?;
        self.handler.handle(result).await
    }
}
