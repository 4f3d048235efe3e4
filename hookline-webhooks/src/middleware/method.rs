use super::pass_on;
use crate::{DEFAULT_METHOD, Result, Stack, Webhook, WebhookResult};

/// Applies the configured method to webhooks created without one and marks
/// them configured
#[derive(Debug, Clone)]
pub struct MethodMiddleware {
    method: String,
}

impl MethodMiddleware {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
        }
    }

    pub async fn process(&self, mut webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        if webhook.method().is_none() {
            webhook.set_method(&self.method);
        }
        webhook.set_configured(true);

        pass_on(webhook, stack).await
    }
}

impl Default for MethodMiddleware {
    fn default() -> Self {
        Self::new(DEFAULT_METHOD)
    }
}
