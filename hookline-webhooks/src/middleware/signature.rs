use super::pass_on;
use crate::{Result, Stack, Webhook, WebhookResult, WebhookSignature};
use tracing::debug;

/// Default header carrying the payload signature
pub const DEFAULT_SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Signs the request body with the webhook secret, or the configured
/// fallback secret when the webhook has none.
#[derive(Debug, Clone)]
pub struct SignatureMiddleware {
    header: String,
    secret: Option<String>,
}

impl SignatureMiddleware {
    pub fn new(header: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            header: header.into(),
            secret,
        }
    }

    pub async fn process(&self, mut webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        let secret = webhook
            .secret()
            .map(str::to_owned)
            .or_else(|| self.secret.clone());

        match secret {
            Some(secret) => {
                let body = webhook.payload_string()?.unwrap_or_default();
                let signature = WebhookSignature::new(secret).sign(body.as_bytes());
                webhook.add_header(&self.header, signature);
            }
            None => debug!(
                webhook_id = webhook.id().unwrap_or_default(),
                "No signing secret available, sending unsigned"
            ),
        }

        pass_on(webhook, stack).await
    }
}

impl Default for SignatureMiddleware {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURE_HEADER, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::{Capture, stack_with};
    use std::sync::Arc;

    async fn signed(middleware: SignatureMiddleware, webhook: Webhook) -> Webhook {
        let capture = Arc::new(Capture::default());
        let mut stack = stack_with(capture.clone());
        middleware.process(webhook, &mut stack).await.unwrap();
        capture.seen().unwrap()
    }

    #[tokio::test]
    async fn test_webhook_secret_signs_body() {
        let webhook = Webhook::new("https://example.com")
            .with_body_as_string(r#"{"id":1}"#)
            .with_secret("per-webhook");

        let seen = signed(SignatureMiddleware::default(), webhook).await;
        let header = seen.headers().get(DEFAULT_SIGNATURE_HEADER).unwrap();

        let verified = WebhookSignature::new("per-webhook")
            .verify(br#"{"id":1}"#, header, 300)
            .unwrap();
        assert!(verified);
    }

    #[tokio::test]
    async fn test_configured_secret_is_fallback() {
        let middleware = SignatureMiddleware::new("X-Sig", Some("global".into()));
        let webhook = Webhook::new("https://example.com").with_body_as_string("payload");

        let seen = signed(middleware, webhook).await;
        let header = seen.headers().get("X-Sig").unwrap();

        assert!(WebhookSignature::new("global").verify(b"payload", header, 300).unwrap());
        assert!(!WebhookSignature::new("other").verify(b"payload", header, 300).unwrap());
    }

    #[tokio::test]
    async fn test_no_secret_no_header() {
        let seen = signed(
            SignatureMiddleware::default(),
            Webhook::new("https://example.com").with_body_as_string("payload"),
        )
        .await;

        assert!(seen.headers().is_empty());
    }
}
