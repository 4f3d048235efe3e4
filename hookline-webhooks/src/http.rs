//! HTTP transport used by the send step

use crate::{DEFAULT_METHOD, HttpClientOptions, Result, Webhook, WebhookConfig, WebhookError, WebhookResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Maximum number of response body bytes kept on a result
pub const MAX_RESPONSE_BODY: usize = 1024;

/// A fully resolved outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub options: HttpClientOptions,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Resolve the request a webhook describes
    pub fn from_webhook(webhook: &Webhook) -> Result<Self> {
        webhook.validate()?;

        Ok(Self {
            method: webhook.method().unwrap_or(DEFAULT_METHOD).to_string(),
            url: webhook.url().to_string(),
            options: webhook.http_client_options(),
            body: webhook.payload_string()?,
        })
    }
}

/// Transport performing webhook requests.
///
/// Any response, whatever its status, is `Ok`; `Err` means no response.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<WebhookResponse>;
}

/// [`HttpClient`] backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an already configured reqwest client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<WebhookResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| WebhookError::invalid_field("method", e.to_string()))?;
        let url = url::Url::parse(&request.url)?;

        debug!(method = %method, url = %url, "Sending webhook request");

        let mut builder = self.client.request(method, url);
        if !request.options.query.is_empty() {
            builder = builder.query(&request.options.query);
        }
        for (name, value) in &request.options.headers {
            builder = builder.header(name, value);
        }
        if let Some(timeout_ms) = request.options.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .ok()
            .map(|text| truncate_string(&text, MAX_RESPONSE_BODY));

        Ok(WebhookResponse {
            status,
            headers,
            body,
        })
    }
}

/// Truncate to at most `max_len` bytes on a char boundary, marking the cut
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let mut end = max_len.saturating_sub(3);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
