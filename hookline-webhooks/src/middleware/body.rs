use super::pass_on;
use crate::{Result, Stack, Webhook, WebhookResult};

/// JSON-encodes the structured body when no string body was provided
#[derive(Debug, Clone, Default)]
pub struct BodyFormatterMiddleware;

impl BodyFormatterMiddleware {
    pub fn new() -> Self {
        Self
    }

    pub async fn process(&self, mut webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        if webhook.body_as_string().is_none() {
            if let Some(body) = webhook.body() {
                let encoded = serde_json::to_string(body)?;
                webhook.set_body_as_string(encoded);
                webhook.add_header("Content-Type", "application/json");
            }
        }

        pass_on(webhook, stack).await
    }
}
