//! Integration tests for common webhook delivery workflows.
//!
//! Every test talks to a wiremock server over real HTTP.

use chrono::Utc;
use hookline::prelude::*;
use hookline::{BroadcastEventDispatcher, SendWebhookJobHandler};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store() -> Arc<InMemoryWebhookResultStore> {
    Arc::new(InMemoryWebhookResultStore::new())
}

// =============================================================================
// Synchronous Delivery
// =============================================================================

#[tokio::test]
async fn test_sync_delivery_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/orders"))
        .and(header("Content-Type", "application/json"))
        .and(header("X-Webhook-Event", "order.created"))
        .and(header_exists("X-Webhook-Id"))
        .and(body_json(json!({"order_id": 42})))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let store = store();
    let client = WebhookClient::builder(WebhookConfig::default())
        .store(store.clone())
        .build()
        .unwrap();

    let webhook = Webhook::create(
        format!("{}/hooks/orders", server.uri()),
        Some(json!({"order_id": 42})),
        None,
    )
    .with_event("order.created");

    let result = client.send(webhook).await.unwrap();

    assert!(result.is_successful());
    assert_eq!(result.response().unwrap().body.as_deref(), Some("ok"));
    assert_eq!(result.webhook().status(), WebhookStatus::Success);
    assert_eq!(result.webhook().current_attempt(), 1);

    let id = result.webhook().id().unwrap();
    assert_eq!(
        store.find(id).await.unwrap().unwrap().status(),
        WebhookStatus::Success
    );
}

#[tokio::test]
async fn test_retries_end_in_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let events = Arc::new(BroadcastEventDispatcher::new(16));
    let mut rx = events.subscribe();
    let client = WebhookClient::builder(WebhookConfig::default())
        .event_dispatcher(events.clone())
        .build()
        .unwrap();

    let first = client
        .send(Webhook::new(server.uri()).with_max_attempt(2))
        .await
        .unwrap();
    assert_eq!(first.webhook().status(), WebhookStatus::FailedPendingRetry);

    let second = client.send(first.into_webhook()).await.unwrap();
    assert_eq!(second.webhook().status(), WebhookStatus::Failed);
    assert_eq!(second.webhook().current_attempt(), 2);
    assert!(matches!(
        second.error(),
        Some(WebhookError::UnexpectedStatus { status: 500, .. })
    ));

    let names: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|event| event.name())
        .collect();
    assert_eq!(
        names,
        vec![
            "webhook.sending",
            "webhook.failed",
            "webhook.sending",
            "webhook.final_failed"
        ]
    );

    // terminal webhooks stay put unless reruns are allowed
    let rerun = client.send(second.into_webhook()).await.unwrap();
    assert!(!rerun.is_attempted());
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_failed_attempt() {
    let client = WebhookClient::new(WebhookConfig::builder().timeout_secs(2).build()).unwrap();

    let result = client
        .send(Webhook::new("http://127.0.0.1:1/unreachable"))
        .await
        .unwrap();

    assert!(result.is_attempted());
    assert!(matches!(result.error(), Some(WebhookError::HttpError(_))));
    assert_eq!(result.webhook().status(), WebhookStatus::Failed);
}

// =============================================================================
// Async Delivery
// =============================================================================

#[tokio::test]
async fn test_async_dispatch_and_worker() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = store();
    let (dispatcher, mut jobs) = ChannelAsyncDispatcher::new(8);
    let client = Arc::new(
        WebhookClient::builder(WebhookConfig::builder().send_async(true).build())
            .store(store.clone())
            .async_dispatcher(Arc::new(dispatcher))
            .build()
            .unwrap(),
    );

    let queued = client
        .send(Webhook::new(server.uri()).with_method("put"))
        .await
        .unwrap();
    assert!(!queued.is_attempted());
    assert_eq!(queued.webhook().status(), WebhookStatus::Pending);

    let job = jobs.recv().await.unwrap();
    let retry = SendWebhookJobHandler::new(client.clone())
        .handle(&job)
        .await
        .unwrap();
    assert!(retry.is_none());

    let stored = store.find(&job.webhook_id).await.unwrap().unwrap();
    assert_eq!(stored.status(), WebhookStatus::Success);
    assert_eq!(stored.current_attempt(), 1);
}

#[tokio::test]
async fn test_worker_loop_retries_until_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = store();
    let (dispatcher, jobs) = ChannelAsyncDispatcher::new(8);
    let config = WebhookConfig::builder()
        .send_async(true)
        .retry(MultiplierRetryStrategy::fixed(Duration::from_millis(10)))
        .build();
    let client = Arc::new(
        WebhookClient::builder(config)
            .store(store.clone())
            .async_dispatcher(Arc::new(dispatcher.clone()))
            .build()
            .unwrap(),
    );

    let queued = client
        .send(Webhook::new(server.uri()).with_max_attempt(3))
        .await
        .unwrap();
    let id = queued.webhook().id().unwrap().to_string();

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let worker = tokio::spawn(AsyncWorker::new(client.clone(), &dispatcher, jobs).run_until(
        async move {
            let _ = stopped.await;
        },
    ));

    let mut status = WebhookStatus::Pending;
    for _ in 0..100 {
        status = store.find(&id).await.unwrap().unwrap().status();
        if status == WebhookStatus::Success {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let _ = stop.send(());
    worker.await.unwrap();

    assert_eq!(status, WebhookStatus::Success);
    assert_eq!(store.attempts(&id).len(), 2);
}

// =============================================================================
// Deferred Delivery
// =============================================================================

#[tokio::test]
async fn test_send_after_defers_until_due() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = store();
    let client = WebhookClient::builder(WebhookConfig::default())
        .store(store.clone())
        .build()
        .unwrap();

    let deferred = client
        .send(
            Webhook::new(server.uri())
                .with_send_after(Utc::now() + chrono::Duration::milliseconds(100)),
        )
        .await
        .unwrap();
    assert!(!deferred.is_attempted());
    assert!(client.send_due_webhooks(10).await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(150)).await;

    let sent = client.send_due_webhooks(10).await.unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].is_successful());
    assert_eq!(sent[0].webhook().id(), deferred.webhook().id());
}

// =============================================================================
// Signatures
// =============================================================================

#[tokio::test]
async fn test_signed_delivery_verifies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header_exists("X-Webhook-Signature"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        WebhookClient::new(WebhookConfig::builder().signing_secret("whsec_test").build()).unwrap();

    client
        .send(Webhook::new(server.uri()).with_body(json!({"event": "ping"})))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let signature = request
        .headers
        .get("X-Webhook-Signature")
        .unwrap()
        .to_str()
        .unwrap();

    let verified = client
        .config()
        .signature
        .verify(&request.body, signature)
        .unwrap();
    assert!(verified);
}
