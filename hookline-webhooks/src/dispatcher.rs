//! Hand-off of webhooks to background workers

use crate::{Result, WebhookError, WebhookResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Message asking a worker to send a stored webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendWebhookJob {
    pub webhook_id: String,
    pub max_attempt: u32,
}

/// Queues stored webhooks for sending outside the caller's pass.
///
/// The webhook must carry an id.
#[async_trait]
pub trait AsyncDispatcher: Send + Sync {
    async fn dispatch(&self, result: WebhookResult) -> Result<WebhookResult>;
}

/// Dispatcher backed by a bounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelAsyncDispatcher {
    sender: mpsc::Sender<SendWebhookJob>,
}

impl ChannelAsyncDispatcher {
    /// Create a dispatcher and the receiving end workers consume
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SendWebhookJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Put a job on the queue, waiting for capacity
    pub async fn enqueue(&self, job: SendWebhookJob) -> Result<()> {
        self.sender
            .send(job)
            .await
            .map_err(|e| WebhookError::DispatchError(format!("job queue closed: {}", e)))
    }

    /// Handle on the queue that does not keep it open
    pub fn downgrade(&self) -> mpsc::WeakSender<SendWebhookJob> {
        self.sender.downgrade()
    }
}

#[async_trait]
impl AsyncDispatcher for ChannelAsyncDispatcher {
    async fn dispatch(&self, result: WebhookResult) -> Result<WebhookResult> {
        let webhook = result.webhook();
        let webhook_id = webhook
            .id()
            .ok_or(WebhookError::WebhookIdRequiredForAsync)?
            .to_string();

        debug!(webhook_id = %webhook_id, "Enqueueing webhook job");
        self.enqueue(SendWebhookJob {
            webhook_id,
            max_attempt: webhook.max_attempt(),
        })
        .await?;

        Ok(result)
    }
}
