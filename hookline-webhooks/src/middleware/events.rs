use super::pass_on;
use crate::{EventDispatcher, Result, Stack, Webhook, WebhookEvent, WebhookResult, WebhookStatus};
use std::sync::Arc;

/// Fires lifecycle events around the send.
///
/// Runs above the status step, so the status on the returned webhook is
/// already final for this attempt when the outcome event is picked.
#[derive(Clone)]
pub struct EventsMiddleware {
    events: Arc<dyn EventDispatcher>,
}

impl EventsMiddleware {
    pub fn new(events: Arc<dyn EventDispatcher>) -> Self {
        Self { events }
    }

    pub async fn process(&self, webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        self.events
            .dispatch(WebhookEvent::Sending {
                webhook: webhook.clone(),
            })
            .await;

        let result = pass_on(webhook, stack).await?;

        if let Some(event) = Self::outcome_event(&result) {
            self.events.dispatch(event).await;
        }

        Ok(result)
    }

    fn outcome_event(result: &WebhookResult) -> Option<WebhookEvent> {
        let webhook = result.webhook().clone();

        if let Some(response) = result.response() {
            return Some(WebhookEvent::Succeeded {
                webhook,
                response: response.clone(),
            });
        }

        let error = result.error()?.to_string();
        Some(match webhook.status() {
            WebhookStatus::Failed => WebhookEvent::FinalFailed { webhook, error },
            _ => WebhookEvent::Failed { webhook, error },
        })
    }
}
