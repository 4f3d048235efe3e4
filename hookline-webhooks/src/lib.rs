//! Outbound Webhook Delivery for Hookline
//!
//! This crate sends webhooks through a middleware pipeline. Every send walks
//! a fresh [`Stack`]: custom middleware first, sorted by priority, then the
//! core steps in a fixed order, ending with the HTTP send.
//!
//! # Features
//!
//! - **Middleware Pipeline**: single-pass chain where each step may delegate once
//! - **Attempt Tracking**: attempt counting and retry/terminal status in one place
//! - **Async Dispatch**: queue webhooks for background workers
//! - **Deferred Sending**: hold webhooks until their `send_after` time
//! - **Locking**: at most one concurrent pass per stored webhook
//! - **Signatures**: HMAC-SHA256 signed payloads
//! - **Lifecycle Events**: sending, succeeded, failed and final-failed events
//!
//! # Example: Sending a Webhook
//!
//! ```rust,no_run
//! use hookline_webhooks::{Webhook, WebhookClient, WebhookConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WebhookClient::new(WebhookConfig::default())?;
//!
//!     let webhook = Webhook::create(
//!         "https://example.com/webhook",
//!         Some(serde_json::json!({"user_id": "123"})),
//!         None,
//!     )
//!     .with_event("user.created")
//!     .with_max_attempt(3);
//!
//!     let result = client.send(webhook).await?;
//!     println!("delivered: {}", result.is_successful());
//!     Ok(())
//! }
//! ```
//!
//! # Example: Background Delivery
//!
//! ```rust,no_run
//! use hookline_webhooks::{AsyncWorker, ChannelAsyncDispatcher, WebhookClient, WebhookConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> hookline_webhooks::Result<()> {
//! let config = WebhookConfig::builder().send_async(true).build();
//! let (dispatcher, jobs) = ChannelAsyncDispatcher::new(config.queue_capacity);
//!
//! let client = Arc::new(
//!     WebhookClient::builder(config)
//!         .async_dispatcher(Arc::new(dispatcher.clone()))
//!         .build()?,
//! );
//!
//! tokio::spawn(AsyncWorker::new(client.clone(), &dispatcher, jobs).run());
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod dispatcher;
mod error;
mod events;
mod handler;
mod http;
mod lock;
pub mod middleware;
mod result;
mod retry;
mod signature;
mod stack;
mod store;
mod webhook;
mod worker;

pub use client::{WebhookClient, WebhookClientBuilder};
pub use config::{SignatureConfig, WebhookConfig, WebhookConfigBuilder};
pub use dispatcher::{AsyncDispatcher, ChannelAsyncDispatcher, SendWebhookJob};
pub use error::WebhookError;
pub use events::{BroadcastEventDispatcher, EventDispatcher, NullEventDispatcher, WebhookEvent};
pub use handler::WebhookResultHandler;
pub use http::{HttpClient, HttpRequest, MAX_RESPONSE_BODY, ReqwestHttpClient};
pub use lock::{InMemoryLockService, LockHandle, LockService};
pub use result::{WebhookOutcome, WebhookResponse, WebhookResult};
pub use retry::{MultiplierRetryStrategy, NullRetryStrategy, RetryStrategy};
pub use signature::WebhookSignature;
pub use stack::{Middleware, Stack};
pub use store::{
    InMemoryWebhookResultStore, NullWebhookResultStore, WebhookAttempt, WebhookResultStore,
};
pub use webhook::{DATETIME_FORMAT, DEFAULT_METHOD, HttpClientOptions, Webhook, WebhookStatus};
pub use worker::{AsyncWorker, SendWebhookJobHandler};

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;
