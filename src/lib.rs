// Hookline - middleware-based outbound webhook delivery
//
// This library re-exports the webhook pipeline crate and a prelude with the
// types most applications need.

pub use hookline_webhooks::*;

/// Commonly used types
pub mod prelude {
    pub use crate::{
        AsyncWorker, ChannelAsyncDispatcher, InMemoryWebhookResultStore, Middleware,
        MultiplierRetryStrategy, Stack, Webhook, WebhookClient, WebhookConfig, WebhookError,
        WebhookEvent, WebhookResult, WebhookResultStore, WebhookStatus,
    };
}
