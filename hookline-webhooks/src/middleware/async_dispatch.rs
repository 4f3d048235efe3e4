use super::pass_on;
use crate::{
    AsyncDispatcher, Result, Stack, Webhook, WebhookError, WebhookResult, WebhookResultStore,
};
use std::sync::Arc;
use tracing::debug;

/// Hands webhooks that are not marked `send_now` to the async dispatcher.
///
/// The webhook is persisted first so the dispatcher can reference it by id;
/// the stored pending result is returned without calling the rest of the
/// chain.
#[derive(Clone)]
pub struct AsyncMiddleware {
    enabled: bool,
    store: Arc<dyn WebhookResultStore>,
    dispatcher: Arc<dyn AsyncDispatcher>,
}

impl AsyncMiddleware {
    pub fn new(
        enabled: bool,
        store: Arc<dyn WebhookResultStore>,
        dispatcher: Arc<dyn AsyncDispatcher>,
    ) -> Self {
        Self {
            enabled,
            store,
            dispatcher,
        }
    }

    pub async fn process(&self, webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        if !self.enabled || webhook.is_send_now() {
            return pass_on(webhook, stack).await;
        }

        let result = self.store.store(WebhookResult::new(webhook)).await?;

        let Some(id) = result.webhook().id() else {
            return Err(WebhookError::WebhookIdRequiredForAsync);
        };
        debug!(webhook_id = %id, "Dispatching webhook asynchronously");

        self.dispatcher.dispatch(result).await
    }
}
