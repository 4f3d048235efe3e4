//! Background processing of async webhook jobs

use crate::{ChannelAsyncDispatcher, Result, SendWebhookJob, WebhookClient, WebhookStatus};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Sends the stored webhook a job refers to
#[derive(Debug, Clone)]
pub struct SendWebhookJobHandler {
    client: Arc<WebhookClient>,
}

impl SendWebhookJobHandler {
    pub fn new(client: Arc<WebhookClient>) -> Self {
        Self { client }
    }

    /// Send the webhook now; `Some(delay)` when it should be retried after `delay`
    pub async fn handle(&self, job: &SendWebhookJob) -> Result<Option<Duration>> {
        let Some(webhook) = self.client.store().find(&job.webhook_id).await? else {
            warn!(webhook_id = %job.webhook_id, "Webhook not found in store, dropping job");
            return Ok(None);
        };

        let result = self.client.send(webhook.with_send_now(true)).await?;
        if !result.is_attempted() {
            debug!(webhook_id = %job.webhook_id, "Webhook not sent, dropping job");
            return Ok(None);
        }

        let webhook = result.webhook();
        let retry = webhook.status() == WebhookStatus::FailedPendingRetry
            && webhook.current_attempt() < webhook.max_attempt();
        if !retry {
            return Ok(None);
        }

        let delay = self.client.retry_strategy().next_delay(webhook);
        debug!(
            webhook_id = %job.webhook_id,
            attempt = webhook.current_attempt(),
            delay_ms = delay.as_millis() as u64,
            "Scheduling webhook retry"
        );
        Ok(Some(delay))
    }
}

/// Consumes jobs from a [`ChannelAsyncDispatcher`] queue.
///
/// The worker only holds a weak handle on the queue, so it stops once every
/// [`ChannelAsyncDispatcher`] is dropped. That includes one registered on the
/// client passed here.
pub struct AsyncWorker {
    handler: SendWebhookJobHandler,
    requeue: mpsc::WeakSender<SendWebhookJob>,
    jobs: mpsc::Receiver<SendWebhookJob>,
}

impl AsyncWorker {
    /// `dispatcher` must feed `jobs`; retries are re-enqueued through it
    pub fn new(
        client: Arc<WebhookClient>,
        dispatcher: &ChannelAsyncDispatcher,
        jobs: mpsc::Receiver<SendWebhookJob>,
    ) -> Self {
        Self {
            handler: SendWebhookJobHandler::new(client),
            requeue: dispatcher.downgrade(),
            jobs,
        }
    }

    /// Process jobs until the queue closes
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Process jobs until the queue closes or `shutdown` completes.
    ///
    /// `shutdown` is only observed between jobs; a send in flight runs to
    /// completion first.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!("Webhook worker started");
        tokio::pin!(shutdown);

        loop {
            let job = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                job = self.jobs.recv() => job,
            };
            let Some(job) = job else {
                break;
            };
            self.process(job).await;
        }

        info!("Webhook worker stopped");
    }

    /// Handle a single job; `false` once the queue is closed
    pub async fn run_once(&mut self) -> bool {
        let Some(job) = self.jobs.recv().await else {
            return false;
        };
        self.process(job).await;
        true
    }

    async fn process(&self, job: SendWebhookJob) {
        match self.handler.handle(&job).await {
            Ok(Some(delay)) => self.requeue(job, delay),
            Ok(None) => {}
            Err(e) => {
                error!(webhook_id = %job.webhook_id, error = %e, "Webhook job failed");
            }
        }
    }

    // A retry lost to a closed queue stays in the store with its
    // `retry_after`, for `WebhookClient::send_due_webhooks` to pick up.
    fn requeue(&self, job: SendWebhookJob, delay: Duration) {
        let queue = self.requeue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(sender) = queue.upgrade() else {
                warn!(webhook_id = %job.webhook_id, "Job queue closed, retry left to the store");
                return;
            };
            if let Err(e) = sender.send(job).await {
                warn!(error = %e, "Could not re-enqueue webhook job");
            }
        });
    }
}
