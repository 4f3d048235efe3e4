use super::pass_on;
use crate::{Result, Stack, Webhook, WebhookResult, WebhookResultStore};
use std::sync::Arc;

/// Gives a webhook its identity before it is sent, so deeper steps and
/// event listeners see the id.
#[derive(Clone)]
pub struct StoreMiddleware {
    store: Arc<dyn WebhookResultStore>,
}

impl StoreMiddleware {
    pub fn new(store: Arc<dyn WebhookResultStore>) -> Self {
        Self { store }
    }

    pub async fn process(&self, webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        let webhook = if webhook.id().is_none() {
            self.store
                .store(WebhookResult::new(webhook))
                .await?
                .into_webhook()
        } else {
            webhook
        };

        pass_on(webhook, stack).await
    }
}
