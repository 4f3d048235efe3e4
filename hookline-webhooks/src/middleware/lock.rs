use super::pass_on;
use crate::{LockService, Result, Stack, Webhook, WebhookResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix of the per-webhook lock key
pub const LOCK_KEY_PREFIX: &str = "hookline_webhook_send_";

/// Serializes processing of the same persisted webhook across workers.
///
/// Webhooks without an id have not been stored yet, so no other worker can
/// hold them and the lock is skipped.
#[derive(Clone)]
pub struct LockMiddleware {
    locks: Arc<dyn LockService>,
    ttl: Duration,
}

impl LockMiddleware {
    pub fn new(locks: Arc<dyn LockService>, ttl: Duration) -> Self {
        Self { locks, ttl }
    }

    pub async fn process(&self, webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        let Some(id) = webhook.id().map(str::to_owned) else {
            return pass_on(webhook, stack).await;
        };

        let key = format!("{}{}", LOCK_KEY_PREFIX, id);
        let Some(handle) = self.locks.try_acquire(&key, self.ttl).await? else {
            debug!(webhook_id = %id, "Webhook is being processed elsewhere, skipping");
            return Ok(WebhookResult::new(webhook));
        };

        // released whether the rest of the chain succeeds or not
        let result = pass_on(webhook, stack).await;

        if let Err(e) = self.locks.release(handle).await {
            warn!(webhook_id = %id, error = %e, "Failed to release webhook lock");
        }

        result
    }
}
