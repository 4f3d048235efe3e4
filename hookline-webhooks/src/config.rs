//! Configuration for the webhook client

use crate::middleware::{DEFAULT_EVENT_HEADER, DEFAULT_ID_HEADER, DEFAULT_SIGNATURE_HEADER};
use crate::{DEFAULT_METHOD, MultiplierRetryStrategy, Result, WebhookError, WebhookSignature};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the webhook client
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Method applied to webhooks created without one
    pub default_method: String,

    /// Whether webhooks not marked `send_now` go through the async dispatcher
    pub send_async: bool,

    /// Default timeout for webhook requests
    pub timeout: Duration,

    /// User-Agent header for outgoing requests
    pub user_agent: String,

    /// Whether to verify SSL certificates
    pub verify_ssl: bool,

    /// Header carrying the webhook id
    pub id_header: String,

    /// Header carrying the webhook event label
    pub event_header: String,

    /// Payload signing
    pub signature: SignatureConfig,

    /// How long a send lock is held before it expires
    pub lock_ttl: Duration,

    /// Delay between attempts of a failing webhook
    pub retry: MultiplierRetryStrategy,

    /// Capacity of the async job queue
    pub queue_capacity: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            default_method: DEFAULT_METHOD.to_string(),
            send_async: false,
            timeout: Duration::from_secs(30),
            user_agent: format!("Hookline/{}", env!("CARGO_PKG_VERSION")),
            verify_ssl: true,
            id_header: DEFAULT_ID_HEADER.to_string(),
            event_header: DEFAULT_EVENT_HEADER.to_string(),
            signature: SignatureConfig::default(),
            lock_ttl: Duration::from_secs(60),
            retry: MultiplierRetryStrategy::default(),
            queue_capacity: 100,
        }
    }
}

impl WebhookConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> WebhookConfigBuilder {
        WebhookConfigBuilder::new()
    }

    /// Defaults overridden by `HOOKLINE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `HOOKLINE_*` key
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(method) = lookup("HOOKLINE_METHOD") {
            config.default_method = method.to_uppercase();
        }
        if let Some(send_async) = parse(&lookup, "HOOKLINE_ASYNC")? {
            config.send_async = send_async;
        }
        if let Some(secs) = parse(&lookup, "HOOKLINE_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(user_agent) = lookup("HOOKLINE_USER_AGENT") {
            config.user_agent = user_agent;
        }
        if let Some(verify) = parse(&lookup, "HOOKLINE_VERIFY_SSL")? {
            config.verify_ssl = verify;
        }
        if let Some(header) = lookup("HOOKLINE_ID_HEADER") {
            config.id_header = header;
        }
        if let Some(header) = lookup("HOOKLINE_EVENT_HEADER") {
            config.event_header = header;
        }
        if let Some(enabled) = parse(&lookup, "HOOKLINE_SIGNATURE_ENABLED")? {
            config.signature.enabled = enabled;
        }
        if let Some(header) = lookup("HOOKLINE_SIGNATURE_HEADER") {
            config.signature.header = header;
        }
        if let Some(secret) = lookup("HOOKLINE_SIGNATURE_SECRET") {
            config.signature.secret = Some(secret);
        }
        if let Some(secs) = parse(&lookup, "HOOKLINE_SIGNATURE_TOLERANCE_SECS")? {
            config.signature.timestamp_tolerance = secs;
        }
        if let Some(secs) = parse(&lookup, "HOOKLINE_LOCK_TTL_SECS")? {
            config.lock_ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = parse(&lookup, "HOOKLINE_RETRY_INITIAL_DELAY_MS")? {
            config.retry.initial_delay = Duration::from_millis(ms);
        }
        if let Some(multiplier) = parse(&lookup, "HOOKLINE_RETRY_MULTIPLIER")? {
            config.retry.multiplier = multiplier;
        }
        if let Some(ms) = parse(&lookup, "HOOKLINE_RETRY_MAX_DELAY_MS")? {
            config.retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(jitter) = parse(&lookup, "HOOKLINE_RETRY_JITTER")? {
            config.retry.jitter = jitter;
        }
        if let Some(capacity) = parse(&lookup, "HOOKLINE_QUEUE_CAPACITY")? {
            config.queue_capacity = capacity;
        }

        Ok(config)
    }
}

fn parse<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| WebhookError::ConfigError(format!("{}={:?}: {}", key, raw, e)))
        })
        .transpose()
}

/// Payload signing settings
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    /// Add the signature step to the pipeline
    pub enabled: bool,

    /// Header carrying the signature
    pub header: String,

    /// Secret for webhooks that do not carry their own
    pub secret: Option<String>,

    /// Timestamp tolerance for verification (in seconds)
    pub timestamp_tolerance: u64,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header: DEFAULT_SIGNATURE_HEADER.to_string(),
            secret: None,
            timestamp_tolerance: 300, // 5 minutes
        }
    }
}

impl SignatureConfig {
    /// Check a signature produced with the configured secret, rejecting
    /// timestamps outside `timestamp_tolerance`
    pub fn verify(&self, payload: &[u8], signature: &str) -> Result<bool> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| WebhookError::ConfigError("no signing secret configured".to_string()))?;
        WebhookSignature::new(secret).verify(payload, signature, self.timestamp_tolerance)
    }
}

/// Builder for WebhookConfig
#[derive(Debug, Clone, Default)]
pub struct WebhookConfigBuilder {
    config: WebhookConfig,
}

impl WebhookConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: WebhookConfig::default(),
        }
    }

    /// Set the method for webhooks created without one
    pub fn default_method(mut self, method: impl AsRef<str>) -> Self {
        self.config.default_method = method.as_ref().to_uppercase();
        self
    }

    /// Route webhooks not marked `send_now` through the async dispatcher
    pub fn send_async(mut self, send_async: bool) -> Self {
        self.config.send_async = send_async;
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout = Duration::from_secs(secs);
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set SSL verification
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.config.verify_ssl = verify;
        self
    }

    pub fn id_header(mut self, header: impl Into<String>) -> Self {
        self.config.id_header = header.into();
        self
    }

    pub fn event_header(mut self, header: impl Into<String>) -> Self {
        self.config.event_header = header.into();
        self
    }

    /// Sign payloads, using `secret` for webhooks without their own
    pub fn signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.signature.enabled = true;
        self.config.signature.secret = Some(secret.into());
        self
    }

    pub fn signature(mut self, signature: SignatureConfig) -> Self {
        self.config.signature = signature;
        self
    }

    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.config.lock_ttl = ttl;
        self
    }

    /// Set the retry delay strategy
    pub fn retry(mut self, retry: MultiplierRetryStrategy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Build the configuration
    pub fn build(self) -> WebhookConfig {
        self.config
    }
}
