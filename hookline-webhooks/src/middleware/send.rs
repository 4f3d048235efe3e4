use crate::{HttpClient, HttpRequest, Result, Webhook, WebhookError, WebhookResult};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Terminal step: performs the HTTP request and captures the outcome.
///
/// Transport errors and non-2xx answers become failed results, they are
/// never returned as `Err`.
#[derive(Clone)]
pub struct SendWebhookMiddleware {
    http: Arc<dyn HttpClient>,
}

impl SendWebhookMiddleware {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    pub async fn process(&self, webhook: Webhook) -> Result<WebhookResult> {
        let request = match HttpRequest::from_webhook(&webhook) {
            Ok(request) => request,
            Err(e) => return Ok(WebhookResult::failed(webhook, e)),
        };

        match self.http.send(request).await {
            Ok(response) if response.is_success() => {
                info!(
                    webhook_id = webhook.id().unwrap_or_default(),
                    url = webhook.url(),
                    status = response.status,
                    attempt = webhook.current_attempt() + 1,
                    "Webhook delivered"
                );
                Ok(WebhookResult::sent(webhook, response))
            }
            Ok(response) => {
                warn!(
                    webhook_id = webhook.id().unwrap_or_default(),
                    url = webhook.url(),
                    status = response.status,
                    attempt = webhook.current_attempt() + 1,
                    "Webhook rejected by endpoint"
                );
                let error = WebhookError::UnexpectedStatus {
                    status: response.status,
                    body: response.body,
                };
                Ok(WebhookResult::failed(webhook, error))
            }
            Err(e) => {
                error!(
                    webhook_id = webhook.id().unwrap_or_default(),
                    url = webhook.url(),
                    error = %e,
                    attempt = webhook.current_attempt() + 1,
                    "Webhook delivery error"
                );
                Ok(WebhookResult::failed(webhook, e))
            }
        }
    }
}
