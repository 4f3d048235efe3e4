//! Lifecycle events fired around webhook sends

use crate::{Webhook, WebhookResponse};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

/// Something that happened to a webhook during a pass
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    /// About to go through the send steps
    Sending { webhook: Webhook },

    /// Delivered with a 2xx answer
    Succeeded {
        webhook: Webhook,
        response: WebhookResponse,
    },

    /// Attempt failed, another one will follow
    Failed { webhook: Webhook, error: String },

    /// Attempt failed and no attempts remain
    FinalFailed { webhook: Webhook, error: String },
}

impl WebhookEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sending { .. } => "webhook.sending",
            Self::Succeeded { .. } => "webhook.succeeded",
            Self::Failed { .. } => "webhook.failed",
            Self::FinalFailed { .. } => "webhook.final_failed",
        }
    }

    pub fn webhook(&self) -> &Webhook {
        match self {
            Self::Sending { webhook }
            | Self::Succeeded { webhook, .. }
            | Self::Failed { webhook, .. }
            | Self::FinalFailed { webhook, .. } => webhook,
        }
    }
}

/// Fire-and-forget event sink
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch(&self, event: WebhookEvent);
}

/// Drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventDispatcher;

#[async_trait]
impl EventDispatcher for NullEventDispatcher {
    async fn dispatch(&self, _event: WebhookEvent) {}
}

/// Fans events out to every subscriber over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastEventDispatcher {
    sender: broadcast::Sender<WebhookEvent>,
}

impl BroadcastEventDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WebhookEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventDispatcher for BroadcastEventDispatcher {
    async fn dispatch(&self, event: WebhookEvent) {
        let name = event.name();
        // no subscribers is not an error
        if self.sender.send(event).is_err() {
            trace!(event = name, "No subscribers for webhook event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_to_subscribers() {
        let dispatcher = BroadcastEventDispatcher::new(8);
        let mut first = dispatcher.subscribe();
        let mut second = dispatcher.subscribe();
        assert_eq!(dispatcher.subscriber_count(), 2);

        dispatcher
            .dispatch(WebhookEvent::Sending {
                webhook: Webhook::new("https://example.com").with_id("wh_1"),
            })
            .await;

        for rx in [&mut first, &mut second] {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.name(), "webhook.sending");
            assert_eq!(event.webhook().id(), Some("wh_1"));
        }
    }

    #[tokio::test]
    async fn test_dispatch_without_subscribers() {
        BroadcastEventDispatcher::new(8)
            .dispatch(WebhookEvent::Failed {
                webhook: Webhook::new("https://example.com"),
                error: "boom".into(),
            })
            .await;
        NullEventDispatcher
            .dispatch(WebhookEvent::Sending {
                webhook: Webhook::new("https://example.com"),
            })
            .await;
    }
}
