//! Webhook client assembling and running the middleware pipeline

use crate::middleware::{
    AsyncMiddleware, BodyFormatterMiddleware, CoreMiddleware, EventHeaderMiddleware,
    EventsMiddleware, IdHeaderMiddleware, LockMiddleware, MethodMiddleware, RerunMiddleware,
    SendAfterMiddleware, SendWebhookMiddleware, SignatureMiddleware, StatusAndAttemptMiddleware,
    StoreMiddleware,
};
use crate::{
    AsyncDispatcher, EventDispatcher, HttpClient, InMemoryLockService,
    InMemoryWebhookResultStore, LockService, Middleware, NullEventDispatcher, ReqwestHttpClient,
    Result, RetryStrategy, Stack, Webhook, WebhookConfig, WebhookError, WebhookResult,
    WebhookResultHandler, WebhookResultStore,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Client sending webhooks through the middleware pipeline.
///
/// Every call to [`send`](Self::send) walks a fresh [`Stack`] made of the
/// registered middleware followed by the core steps.
#[derive(Clone)]
pub struct WebhookClient {
    config: WebhookConfig,
    store: Arc<dyn WebhookResultStore>,
    retry: Arc<dyn RetryStrategy>,
    middleware: Vec<Arc<dyn Middleware>>,
    core: Vec<CoreMiddleware>,
}

impl WebhookClient {
    /// Create a client with default collaborators
    pub fn new(config: WebhookConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: WebhookConfig) -> WebhookClientBuilder {
        WebhookClientBuilder::new(config)
    }

    /// Run one pass of the pipeline for the webhook
    pub async fn send(&self, webhook: Webhook) -> Result<WebhookResult> {
        webhook.validate()?;

        let mut stack = Stack::new(self.middleware.clone(), self.core.clone());
        debug!(
            webhook_id = webhook.id().unwrap_or_default(),
            url = webhook.url(),
            middleware = stack.len(),
            "Sending webhook through pipeline"
        );

        let first = stack.next()?;
        first.process(webhook, &mut stack).await
    }

    /// Send stored webhooks that are due: pending past `send_after` or
    /// awaiting a retry past `retry_after`
    pub async fn send_due_webhooks(&self, limit: usize) -> Result<Vec<WebhookResult>> {
        let due = self.store.find_due(Utc::now(), limit).await?;
        if due.is_empty() {
            return Ok(Vec::new());
        }

        info!(count = due.len(), "Sending due webhooks");

        let mut results = Vec::with_capacity(due.len());
        for webhook in due {
            results.push(self.send(webhook.with_bypass_send_after(true)).await?);
        }
        Ok(results)
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn WebhookResultStore> {
        &self.store
    }

    pub fn retry_strategy(&self) -> &Arc<dyn RetryStrategy> {
        &self.retry
    }
}

impl std::fmt::Debug for WebhookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookClient")
            .field("config", &self.config)
            .field("middleware", &self.middleware.len())
            .field("core", &self.core)
            .finish()
    }
}

/// Builder for [`WebhookClient`]
pub struct WebhookClientBuilder {
    config: WebhookConfig,
    store: Option<Arc<dyn WebhookResultStore>>,
    dispatcher: Option<Arc<dyn AsyncDispatcher>>,
    locks: Option<Arc<dyn LockService>>,
    events: Option<Arc<dyn EventDispatcher>>,
    http: Option<Arc<dyn HttpClient>>,
    retry: Option<Arc<dyn RetryStrategy>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl WebhookClientBuilder {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            store: None,
            dispatcher: None,
            locks: None,
            events: None,
            http: None,
            retry: None,
            middleware: Vec::new(),
        }
    }

    pub fn store(mut self, store: Arc<dyn WebhookResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn async_dispatcher(mut self, dispatcher: Arc<dyn AsyncDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn lock_service(mut self, locks: Arc<dyn LockService>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn event_dispatcher(mut self, events: Arc<dyn EventDispatcher>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Override the retry strategy built from the configuration
    pub fn retry_strategy(mut self, retry: Arc<dyn RetryStrategy>) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Register a custom middleware, run before the core steps
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn build(self) -> Result<WebhookClient> {
        let config = self.config;

        if config.send_async && self.dispatcher.is_none() {
            return Err(WebhookError::ConfigError(
                "async sending is enabled but no async dispatcher was provided".to_string(),
            ));
        }

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryWebhookResultStore::new()));
        let locks = self
            .locks
            .unwrap_or_else(|| Arc::new(InMemoryLockService::new()));
        let events = self.events.unwrap_or_else(|| Arc::new(NullEventDispatcher));
        let http: Arc<dyn HttpClient> = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestHttpClient::new(&config)?),
        };
        let retry = self
            .retry
            .unwrap_or_else(|| Arc::new(config.retry.clone()));

        let mut core = vec![
            CoreMiddleware::Lock(LockMiddleware::new(locks, config.lock_ttl)),
            CoreMiddleware::Rerun(RerunMiddleware::new()),
            CoreMiddleware::Method(MethodMiddleware::new(config.default_method.clone())),
            CoreMiddleware::SendAfter(SendAfterMiddleware::new(store.clone())),
            CoreMiddleware::Store(StoreMiddleware::new(store.clone())),
            CoreMiddleware::Events(EventsMiddleware::new(events)),
            CoreMiddleware::StatusAndAttempt(StatusAndAttemptMiddleware::new(
                WebhookResultHandler::new(store.clone(), retry.clone()),
            )),
            CoreMiddleware::BodyFormatter(BodyFormatterMiddleware::new()),
            CoreMiddleware::IdHeader(IdHeaderMiddleware::new(config.id_header.clone())),
            CoreMiddleware::EventHeader(EventHeaderMiddleware::new(config.event_header.clone())),
            CoreMiddleware::Send(SendWebhookMiddleware::new(http)),
        ];
        if let Some(dispatcher) = self.dispatcher {
            core.push(CoreMiddleware::Async(AsyncMiddleware::new(
                config.send_async,
                store.clone(),
                dispatcher,
            )));
        }
        if config.signature.enabled {
            core.push(CoreMiddleware::Signature(SignatureMiddleware::new(
                config.signature.header.clone(),
                config.signature.secret.clone(),
            )));
        }

        Ok(WebhookClient {
            config,
            store,
            retry,
            middleware: self.middleware,
            core,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::FakeHttpClient;
    use crate::{BroadcastEventDispatcher, ChannelAsyncDispatcher, WebhookStatus};
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Mutex;

    fn client_with(
        config: WebhookConfig,
        http: Arc<FakeHttpClient>,
        store: Arc<InMemoryWebhookResultStore>,
    ) -> WebhookClient {
        WebhookClient::builder(config)
            .http_client(http)
            .store(store)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sync_send_success() {
        let http = Arc::new(FakeHttpClient::default());
        let store = Arc::new(InMemoryWebhookResultStore::new());
        let client = client_with(WebhookConfig::default(), http.clone(), store.clone());

        let webhook = Webhook::create("https://example.com/hook", Some(json!({"a": 1})), None)
            .with_event("order.created");
        let result = client.send(webhook).await.unwrap();

        assert!(result.is_successful());
        let webhook = result.webhook();
        assert_eq!(webhook.status(), WebhookStatus::Success);
        assert_eq!(webhook.current_attempt(), 1);
        assert_eq!(webhook.method(), Some("POST"));

        let id = webhook.id().unwrap();
        let requests = http.requests();
        assert_eq!(requests.len(), 1);
        let headers = &requests[0].options.headers;
        assert_eq!(headers.get("X-Webhook-Id").map(String::as_str), Some(id));
        assert_eq!(
            headers.get("X-Webhook-Event").map(String::as_str),
            Some("order.created")
        );
        assert_eq!(
            headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(requests[0].body.as_deref(), Some(r#"{"a":1}"#));

        let stored = store.find(id).await.unwrap().unwrap();
        assert_eq!(stored.status(), WebhookStatus::Success);
        assert!(stored.is_configured());
        assert_eq!(store.attempts(id).len(), 1);
    }

    #[tokio::test]
    async fn test_failures_until_terminal() {
        let http = Arc::new(FakeHttpClient::with_statuses(&[500, 502, 503]));
        let store = Arc::new(InMemoryWebhookResultStore::new());
        let client = client_with(WebhookConfig::default(), http.clone(), store.clone());

        let mut webhook = Webhook::new("https://example.com/hook").with_max_attempt(3);
        let mut statuses = Vec::new();
        for _ in 0..3 {
            let result = client.send(webhook).await.unwrap();
            assert!(!result.is_successful());
            statuses.push(result.webhook().status());
            webhook = result.into_webhook();
        }

        assert_eq!(
            statuses,
            vec![
                WebhookStatus::FailedPendingRetry,
                WebhookStatus::FailedPendingRetry,
                WebhookStatus::Failed,
            ]
        );
        assert_eq!(webhook.current_attempt(), 3);

        // terminal webhooks are not sent again
        let result = client.send(webhook).await.unwrap();
        assert!(!result.is_attempted());
        assert_eq!(http.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_async_dispatch_short_circuits() {
        let http = Arc::new(FakeHttpClient::default());
        let store = Arc::new(InMemoryWebhookResultStore::new());
        let (dispatcher, mut jobs) = ChannelAsyncDispatcher::new(8);
        let client = WebhookClient::builder(WebhookConfig::builder().send_async(true).build())
            .http_client(http.clone())
            .store(store.clone())
            .async_dispatcher(Arc::new(dispatcher))
            .build()
            .unwrap();

        let result = client
            .send(Webhook::new("https://example.com/hook"))
            .await
            .unwrap();

        assert!(!result.is_attempted());
        assert_eq!(result.webhook().current_attempt(), 0);
        assert!(http.requests().is_empty());
        let job = jobs.recv().await.unwrap();
        assert_eq!(Some(job.webhook_id.as_str()), result.webhook().id());

        let result = client
            .send(Webhook::new("https://example.com/hook").with_send_now(true))
            .await
            .unwrap();
        assert!(result.is_successful());
        assert_eq!(http.requests().len(), 1);
    }

    #[test]
    fn test_async_requires_dispatcher() {
        let err = WebhookClient::builder(WebhookConfig::builder().send_async(true).build())
            .http_client(Arc::new(FakeHttpClient::default()))
            .build()
            .unwrap_err();
        assert!(matches!(err, WebhookError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let client = client_with(
            WebhookConfig::default(),
            Arc::new(FakeHttpClient::default()),
            Arc::new(InMemoryWebhookResultStore::new()),
        );
        assert!(matches!(
            client.send(Webhook::new("")).await,
            Err(WebhookError::UrlRequired)
        ));
    }

    #[tokio::test]
    async fn test_send_due_webhooks() {
        let http = Arc::new(FakeHttpClient::default());
        let store = Arc::new(InMemoryWebhookResultStore::new());
        let client = client_with(WebhookConfig::default(), http.clone(), store.clone());

        let deferred = client
            .send(
                Webhook::new("https://example.com/hook")
                    .with_send_after(Utc::now() + Duration::milliseconds(50)),
            )
            .await
            .unwrap();
        assert!(!deferred.is_attempted());
        assert!(client.send_due_webhooks(10).await.unwrap().is_empty());

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;

        let results = client.send_due_webhooks(10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_successful());
        assert_eq!(results[0].webhook().id(), deferred.webhook().id());
        assert_eq!(http.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_signature_added_when_enabled() {
        let http = Arc::new(FakeHttpClient::default());
        let client = client_with(
            WebhookConfig::builder().signing_secret("shared").build(),
            http.clone(),
            Arc::new(InMemoryWebhookResultStore::new()),
        );

        client
            .send(Webhook::new("https://example.com/hook").with_body(json!({"ok": true})))
            .await
            .unwrap();

        let requests = http.requests();
        let request = &requests[0];
        let signature = request.options.headers.get("X-Webhook-Signature").unwrap();
        let body = request.body.as_deref().unwrap();
        assert!(
            client
                .config()
                .signature
                .verify(body.as_bytes(), signature)
                .unwrap()
        );
    }

    struct Tagging {
        order: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Tagging {
        async fn process(&self, webhook: Webhook, stack: &mut Stack) -> Result<WebhookResult> {
            self.order.lock().unwrap().push("user".into());
            let webhook = webhook.with_header("X-Tagged", "yes");
            stack.next()?.process(webhook, stack).await
        }
    }

    #[tokio::test]
    async fn test_user_middleware_runs_before_core() {
        let http = Arc::new(FakeHttpClient::default());
        let events = Arc::new(BroadcastEventDispatcher::new(8));
        let mut rx = events.subscribe();
        let order = Arc::new(Mutex::new(Vec::new()));

        let client = WebhookClient::builder(WebhookConfig::default())
            .http_client(http.clone())
            .event_dispatcher(events.clone())
            .middleware(Arc::new(Tagging {
                order: order.clone(),
            }))
            .build()
            .unwrap();

        client
            .send(Webhook::new("https://example.com/hook"))
            .await
            .unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["user".to_string()]);
        assert_eq!(
            http.requests()[0].options.headers.get("X-Tagged").map(String::as_str),
            Some("yes")
        );
        // the sending event sees the id assigned by the store step
        let sending = rx.recv().await.unwrap();
        assert!(sending.webhook().id().is_some());
        assert_eq!(rx.recv().await.unwrap().name(), "webhook.succeeded");
    }
}
