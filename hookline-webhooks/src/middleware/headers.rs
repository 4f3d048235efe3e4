use super::pass_on;
use crate::{Result, Stack, Webhook, WebhookResult};

/// Default header carrying the webhook id
pub const DEFAULT_ID_HEADER: &str = "X-Webhook-Id";

/// Default header carrying the event label
pub const DEFAULT_EVENT_HEADER: &str = "X-Webhook-Event";

/// Adds the webhook id header when the webhook has an id
#[derive(Debug, Clone)]
pub struct IdHeaderMiddleware {
    header: String,
}

impl IdHeaderMiddleware {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    pub async fn process(&self, mut webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        if let Some(id) = webhook.id().map(str::to_owned) {
            webhook.add_header(&self.header, id);
        }

        pass_on(webhook, stack).await
    }
}

impl Default for IdHeaderMiddleware {
    fn default() -> Self {
        Self::new(DEFAULT_ID_HEADER)
    }
}

/// Adds the event header when the webhook has an event label
#[derive(Debug, Clone)]
pub struct EventHeaderMiddleware {
    header: String,
}

impl EventHeaderMiddleware {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    pub async fn process(&self, mut webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        if let Some(event) = webhook.event().map(str::to_owned) {
            webhook.add_header(&self.header, event);
        }

        pass_on(webhook, stack).await
    }
}

impl Default for EventHeaderMiddleware {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_HEADER)
    }
}
