//! Core middleware of the delivery pipeline
//!
//! The core set is closed: [`CoreMiddleware`] dispatches exhaustively over
//! its variants and [`CoreStep`] fixes their order. Custom steps implement
//! [`Middleware`] directly and always run before the core set.

mod async_dispatch;
mod body;
mod events;
mod headers;
mod lock;
mod method;
mod rerun;
mod send;
mod send_after;
mod signature;
mod status;
mod store;

pub use async_dispatch::AsyncMiddleware;
pub use body::BodyFormatterMiddleware;
pub use events::EventsMiddleware;
pub use headers::{
    DEFAULT_EVENT_HEADER, DEFAULT_ID_HEADER, EventHeaderMiddleware, IdHeaderMiddleware,
};
pub use lock::{LOCK_KEY_PREFIX, LockMiddleware};
pub use method::MethodMiddleware;
pub use rerun::RerunMiddleware;
pub use send::SendWebhookMiddleware;
pub use send_after::SendAfterMiddleware;
pub use signature::{DEFAULT_SIGNATURE_HEADER, SignatureMiddleware};
pub use status::StatusAndAttemptMiddleware;
pub use store::StoreMiddleware;

use crate::{Middleware, Result, Stack, Webhook, WebhookResult};
use async_trait::async_trait;

/// Priority of the step running before every other core step
pub const PRIORITY_CORE_BEFORE: i32 = -5000;

/// Base priority of the remaining core steps
pub const PRIORITY_CORE_AFTER: i32 = 5000;

/// Position of a core step, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CoreStep {
    Lock,
    Rerun,
    Method,
    SendAfter,
    Async,
    Store,
    Events,
    StatusAndAttempt,
    BodyFormatter,
    IdHeader,
    EventHeader,
    Signature,
    Send,
}

impl CoreStep {
    pub fn priority(&self) -> i32 {
        match self {
            Self::Lock => PRIORITY_CORE_BEFORE,
            step => PRIORITY_CORE_AFTER + (*step as i32) * 10,
        }
    }
}

/// The closed set of core middleware
#[derive(Clone)]
pub enum CoreMiddleware {
    Lock(LockMiddleware),
    Rerun(RerunMiddleware),
    Method(MethodMiddleware),
    SendAfter(SendAfterMiddleware),
    Async(AsyncMiddleware),
    Store(StoreMiddleware),
    Events(EventsMiddleware),
    StatusAndAttempt(StatusAndAttemptMiddleware),
    BodyFormatter(BodyFormatterMiddleware),
    IdHeader(IdHeaderMiddleware),
    EventHeader(EventHeaderMiddleware),
    Signature(SignatureMiddleware),
    Send(SendWebhookMiddleware),
}

impl CoreMiddleware {
    pub fn step(&self) -> CoreStep {
        match self {
            Self::Lock(_) => CoreStep::Lock,
            Self::Rerun(_) => CoreStep::Rerun,
            Self::Method(_) => CoreStep::Method,
            Self::SendAfter(_) => CoreStep::SendAfter,
            Self::Async(_) => CoreStep::Async,
            Self::Store(_) => CoreStep::Store,
            Self::Events(_) => CoreStep::Events,
            Self::StatusAndAttempt(_) => CoreStep::StatusAndAttempt,
            Self::BodyFormatter(_) => CoreStep::BodyFormatter,
            Self::IdHeader(_) => CoreStep::IdHeader,
            Self::EventHeader(_) => CoreStep::EventHeader,
            Self::Signature(_) => CoreStep::Signature,
            Self::Send(_) => CoreStep::Send,
        }
    }
}

impl std::fmt::Debug for CoreMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CoreMiddleware").field(&self.step()).finish()
    }
}

#[async_trait]
impl Middleware for CoreMiddleware {
    fn priority(&self) -> i32 {
        self.step().priority()
    }

    async fn process(&self, webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
        match self {
            Self::Lock(m) => m.process(webhook, stack).await,
            Self::Rerun(m) => m.process(webhook, stack).await,
            Self::Method(m) => m.process(webhook, stack).await,
            Self::SendAfter(m) => m.process(webhook, stack).await,
            Self::Async(m) => m.process(webhook, stack).await,
            Self::Store(m) => m.process(webhook, stack).await,
            Self::Events(m) => m.process(webhook, stack).await,
            Self::StatusAndAttempt(m) => m.process(webhook, stack).await,
            Self::BodyFormatter(m) => m.process(webhook, stack).await,
            Self::IdHeader(m) => m.process(webhook, stack).await,
            Self::EventHeader(m) => m.process(webhook, stack).await,
            Self::Signature(m) => m.process(webhook, stack).await,
            Self::Send(m) => m.process(webhook).await,
        }
    }
}

/// Hand the webhook to the next middleware in the stack
pub(crate) async fn pass_on(webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
    let next = stack.next()?;
    next.process(webhook, stack).await
}
