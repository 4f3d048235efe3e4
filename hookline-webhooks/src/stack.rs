//! Middleware trait and the per-delivery stack that walks it

use crate::middleware::CoreMiddleware;
use crate::{Result, Webhook, WebhookError, WebhookResult};
use async_trait::async_trait;
use std::sync::Arc;

/// A step of the delivery pipeline.
///
/// Implementations either return their own [`WebhookResult`] or delegate by
/// calling `stack.next()?.process(webhook, stack)` at most once, returning
/// that result or a transformation of it.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Lower priorities run first among user middleware
    fn priority(&self) -> i32 {
        0
    }

    /// Process the webhook and produce a result
    async fn process(&self, webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult>;
}

/// Ordered middleware for a single delivery, consumed through [`Stack::next`]
pub struct Stack {
    middleware: Vec<Arc<dyn Middleware>>,
    index: usize,
}

impl Stack {
    /// User middleware sorted by ascending priority, then the core middleware
    /// in core order.
    pub fn new(middleware: Vec<Arc<dyn Middleware>>, core: Vec<CoreMiddleware>) -> Self {
        let mut ordered = middleware;
        // stable: equal priorities keep registration order
        ordered.sort_by_key(|m| m.priority());

        let mut core = core;
        core.sort_by_key(CoreMiddleware::step);
        ordered.extend(
            core.into_iter()
                .map(|m| Arc::new(m) as Arc<dyn Middleware>),
        );

        Self {
            middleware: ordered,
            index: 0,
        }
    }

    /// Return the middleware at the cursor and advance it
    pub fn next(&mut self) -> Result<Arc<dyn Middleware>> {
        // Send is always last in a configured stack, so this means misconfiguration
        let next = self
            .middleware
            .get(self.index)
            .cloned()
            .ok_or(WebhookError::NoNextMiddleware(self.index))?;

        self.index += 1;
        Ok(next)
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("len", &self.middleware.len())
            .field("index", &self.index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{BodyFormatterMiddleware, MethodMiddleware, RerunMiddleware};
    use crate::WebhookResponse;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        priority: i32,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware for Recording {
        fn priority(&self) -> i32 {
            self.priority
        }

        async fn process(&self, webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
            self.calls.lock().unwrap().push(self.name);
            stack.next()?.process(webhook, stack).await
        }
    }

    struct Terminal;

    #[async_trait]
    impl Middleware for Terminal {
        fn priority(&self) -> i32 {
            100
        }

        async fn process(&self, webhook: Webhook, _stack: &mut Stack) -> Result<WebhookResult> {
            Ok(WebhookResult::sent(webhook, WebhookResponse::new(200)))
        }
    }

    fn recording(
        name: &'static str,
        priority: i32,
        calls: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn Middleware> {
        Arc::new(Recording {
            name,
            priority,
            calls: calls.clone(),
        })
    }

    #[tokio::test]
    async fn test_user_middleware_sorted_by_priority() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut stack = Stack::new(
            vec![
                recording("ten", 10, &calls),
                recording("five", 5, &calls),
                recording("twenty", 20, &calls),
                Arc::new(Terminal),
            ],
            Vec::new(),
        );

        let first = stack.next().unwrap();
        let result = first
            .process(Webhook::new("https://example.com"), &mut stack)
            .await
            .unwrap();

        assert!(result.is_successful());
        assert_eq!(*calls.lock().unwrap(), vec!["five", "ten", "twenty"]);
    }

    #[test]
    fn test_core_middleware_after_user_middleware() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let core = vec![
            CoreMiddleware::BodyFormatter(BodyFormatterMiddleware::new()),
            CoreMiddleware::Method(MethodMiddleware::new("POST")),
            CoreMiddleware::Rerun(RerunMiddleware::new()),
        ];

        let mut stack = Stack::new(
            vec![recording("late", 9000, &calls), recording("early", -9000, &calls)],
            core,
        );

        assert_eq!(stack.len(), 5);
        // user middleware first regardless of how large their priority is
        assert_eq!(stack.next().unwrap().priority(), -9000);
        assert_eq!(stack.next().unwrap().priority(), 9000);

        let core_priorities: Vec<i32> = (0..3).map(|_| stack.next().unwrap().priority()).collect();
        let mut sorted = core_priorities.clone();
        sorted.sort();
        assert_eq!(core_priorities, sorted);
    }

    #[test]
    fn test_next_past_end_is_fatal() {
        let mut stack = Stack::new(vec![Arc::new(Terminal)], Vec::new());
        assert!(stack.next().is_ok());
        assert_eq!(stack.current_index(), 1);

        let err = stack.next().err().unwrap();
        assert!(matches!(err, WebhookError::NoNextMiddleware(1)));
        assert!(err.is_fatal());
    }
}
