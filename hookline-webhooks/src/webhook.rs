//! Webhook entity and its flat-map persistence format

use crate::{Result, WebhookError};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Method applied when a webhook is created without one
pub const DEFAULT_METHOD: &str = "POST";

/// Default format for datetimes in [`Webhook::to_array`], always UTC
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Delivery status of a webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    /// Not attempted yet
    #[default]
    Pending,

    /// Failed and out of attempts
    Failed,

    /// Failed, another attempt is allowed
    FailedPendingRetry,

    /// Delivered
    Success,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::FailedPendingRetry => "failed_pending_retry",
            Self::Success => "success",
        }
    }

    /// No further attempt will be scheduled
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Success)
    }
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookStatus {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "failed" => Ok(Self::Failed),
            "failed_pending_retry" => Ok(Self::FailedPendingRetry),
            "success" => Ok(Self::Success),
            other => Err(WebhookError::invalid_field(
                "status",
                format!("unknown status `{}`", other),
            )),
        }
    }
}

/// Options handed to the HTTP client for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpClientOptions {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,

    /// Per-request timeout overriding the client default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl HttpClientOptions {
    /// Merge `other` into these options, `other` wins on conflicting keys
    pub fn merge(&mut self, other: HttpClientOptions) {
        self.headers.extend(other.headers);
        self.query.extend(other.query);
        if other.timeout_ms.is_some() {
            self.timeout_ms = other.timeout_ms;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.query.is_empty() && self.timeout_ms.is_none()
    }
}

/// One outbound HTTP notification and its delivery state
#[derive(Debug, Clone, PartialEq)]
pub struct Webhook {
    id: Option<String>,
    url: String,
    method: Option<String>,
    body: Option<Value>,
    body_as_string: Option<String>,
    http_client_options: HttpClientOptions,
    headers: BTreeMap<String, String>,
    queries: BTreeMap<String, String>,
    status: WebhookStatus,
    current_attempt: u32,
    max_attempt: u32,
    send_after: Option<DateTime<Utc>>,
    retry_after: Option<DateTime<Utc>>,
    send_now: bool,
    bypass_send_after: bool,
    secret: Option<String>,
    extra: Map<String, Value>,
    event: Option<String>,
    configured: bool,
    allow_rerun: bool,
}

impl Webhook {
    /// Create a webhook for the given URL, without a method
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: None,
            url: url.into(),
            method: None,
            body: None,
            body_as_string: None,
            http_client_options: HttpClientOptions::default(),
            headers: BTreeMap::new(),
            queries: BTreeMap::new(),
            status: WebhookStatus::Pending,
            current_attempt: 0,
            max_attempt: 1,
            send_after: None,
            retry_after: None,
            send_now: false,
            bypass_send_after: false,
            secret: None,
            extra: Map::new(),
            event: None,
            configured: false,
            allow_rerun: false,
        }
    }

    /// Create a webhook with a body and a method, `POST` when none is given
    pub fn create(url: impl Into<String>, body: Option<Value>, method: Option<&str>) -> Self {
        let mut webhook = Self::new(url).with_method(method.unwrap_or(DEFAULT_METHOD));
        webhook.body = body;
        webhook
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn body_as_string(&self) -> Option<&str> {
        self.body_as_string.as_deref()
    }

    /// The request body as sent: the string form wins over the structured body
    pub fn payload_string(&self) -> Result<Option<String>> {
        if let Some(body) = &self.body_as_string {
            return Ok(Some(body.clone()));
        }

        self.body
            .as_ref()
            .map(|body| serde_json::to_string(body).map_err(WebhookError::from))
            .transpose()
    }

    /// Client options with the separate header and query maps merged in
    pub fn http_client_options(&self) -> HttpClientOptions {
        let mut options = self.http_client_options.clone();
        options.headers.extend(self.headers.clone());
        options.query.extend(self.queries.clone());
        options
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn queries(&self) -> &BTreeMap<String, String> {
        &self.queries
    }

    pub fn status(&self) -> WebhookStatus {
        self.status
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    pub fn max_attempt(&self) -> u32 {
        self.max_attempt
    }

    pub fn send_after(&self) -> Option<DateTime<Utc>> {
        self.send_after
    }

    /// Earliest time the next attempt of a failed webhook is due
    pub fn retry_after(&self) -> Option<DateTime<Utc>> {
        self.retry_after
    }

    pub fn is_send_now(&self) -> bool {
        self.send_now
    }

    pub fn is_bypass_send_after(&self) -> bool {
        self.bypass_send_after
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// Whether the client defaults have been applied
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn is_rerun_allowed(&self) -> bool {
        self.allow_rerun
    }

    /// Check the target before the webhook enters the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(WebhookError::UrlRequired);
        }

        url::Url::parse(&self.url)?;
        Ok(())
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_method(mut self, method: impl AsRef<str>) -> Self {
        self.set_method(method);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_body_as_string(mut self, body: impl Into<String>) -> Self {
        self.body_as_string = Some(body.into());
        self
    }

    pub fn with_http_client_options(mut self, options: HttpClientOptions) -> Self {
        self.http_client_options = options;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.queries.insert(name.into(), value.into());
        self
    }

    pub fn with_status(mut self, status: WebhookStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_current_attempt(mut self, attempt: u32) -> Self {
        self.current_attempt = attempt;
        self
    }

    /// Set the attempt budget, at least one
    pub fn with_max_attempt(mut self, max_attempt: u32) -> Self {
        self.max_attempt = max_attempt.max(1);
        self
    }

    pub fn with_send_after(mut self, send_after: DateTime<Utc>) -> Self {
        self.send_after = Some(send_after);
        self
    }

    pub fn with_retry_after(mut self, retry_after: DateTime<Utc>) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_send_now(mut self, send_now: bool) -> Self {
        self.send_now = send_now;
        self
    }

    pub fn with_bypass_send_after(mut self, bypass: bool) -> Self {
        self.bypass_send_after = bypass;
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_allow_rerun(mut self, allow: bool) -> Self {
        self.allow_rerun = allow;
        self
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Methods are stored upper-cased
    pub fn set_method(&mut self, method: impl AsRef<str>) {
        self.method = Some(method.as_ref().to_ascii_uppercase());
    }

    pub fn set_body_as_string(&mut self, body: impl Into<String>) {
        self.body_as_string = Some(body.into());
    }

    pub fn set_status(&mut self, status: WebhookStatus) {
        self.status = status;
    }

    pub fn set_retry_after(&mut self, retry_after: Option<DateTime<Utc>>) {
        self.retry_after = retry_after;
    }

    pub fn set_send_now(&mut self, send_now: bool) {
        self.send_now = send_now;
    }

    pub fn set_configured(&mut self, configured: bool) {
        self.configured = configured;
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn merge_http_client_options(&mut self, options: HttpClientOptions) {
        self.http_client_options.merge(options);
    }

    /// Shallow merge, keys in `extra` win
    pub fn merge_extra(&mut self, extra: Map<String, Value>) {
        self.extra.extend(extra);
    }

    pub(crate) fn increment_attempt(&mut self) {
        self.current_attempt = self.current_attempt.saturating_add(1);
    }

    /// Flat map of the persisted fields, datetimes in [`DATETIME_FORMAT`]
    pub fn to_array(&self) -> Map<String, Value> {
        self.to_array_with_format(DATETIME_FORMAT)
    }

    pub fn to_array_with_format(&self, datetime_format: &str) -> Map<String, Value> {
        let options = self.http_client_options();
        let mut data = Map::new();

        data.insert("id".into(), opt_string(&self.id));
        data.insert("url".into(), Value::String(self.url.clone()));
        data.insert("method".into(), opt_string(&self.method));
        data.insert("body".into(), self.body.clone().unwrap_or(Value::Null));
        data.insert("body_as_string".into(), opt_string(&self.body_as_string));
        data.insert(
            "http_options".into(),
            if options.is_empty() {
                Value::Null
            } else {
                serde_json::to_value(options).unwrap_or(Value::Null)
            },
        );
        data.insert("status".into(), Value::String(self.status.to_string()));
        data.insert("current_attempt".into(), Value::from(self.current_attempt));
        data.insert("max_attempt".into(), Value::from(self.max_attempt));
        data.insert(
            "send_after".into(),
            opt_datetime(self.send_after, datetime_format),
        );
        data.insert(
            "retry_after".into(),
            opt_datetime(self.retry_after, datetime_format),
        );
        data.insert("send_now".into(), Value::Bool(self.send_now));
        data.insert(
            "bypass_send_after".into(),
            Value::Bool(self.bypass_send_after),
        );
        data.insert("configured".into(), Value::Bool(self.configured));
        data.insert("secret".into(), opt_string(&self.secret));
        data.insert("event".into(), opt_string(&self.event));
        data.insert(
            "extra".into(),
            if self.extra.is_empty() {
                Value::Null
            } else {
                Value::Object(self.extra.clone())
            },
        );
        data.insert("allow_rerun".into(), Value::Bool(self.allow_rerun));

        data
    }

    /// Rebuild a webhook from [`Webhook::to_array`] output
    pub fn from_array(data: &Map<String, Value>) -> Result<Self> {
        Self::from_array_with_format(data, DATETIME_FORMAT)
    }

    /// Null and unknown keys are skipped, wrongly typed values are errors
    pub fn from_array_with_format(data: &Map<String, Value>, datetime_format: &str) -> Result<Self> {
        let url = string_field(data, "url")?.unwrap_or_default();
        let mut webhook = Self::new(url);

        webhook.id = string_field(data, "id")?;
        if let Some(method) = string_field(data, "method")? {
            webhook.set_method(method);
        }
        if let Some(body) = data.get("body").filter(|value| !value.is_null()) {
            webhook.body = Some(body.clone());
        }
        webhook.body_as_string = string_field(data, "body_as_string")?;
        if let Some(options) = data.get("http_options").filter(|value| !value.is_null()) {
            webhook.http_client_options = serde_json::from_value(options.clone())
                .map_err(|e| WebhookError::invalid_field("http_options", e.to_string()))?;
        }
        if let Some(status) = string_field(data, "status")? {
            webhook.status = status.parse()?;
        }
        if let Some(attempt) = u32_field(data, "current_attempt")? {
            webhook.current_attempt = attempt;
        }
        if let Some(max_attempt) = u32_field(data, "max_attempt")? {
            webhook = webhook.with_max_attempt(max_attempt);
        }
        webhook.send_after = datetime_field(data, "send_after", datetime_format)?;
        webhook.retry_after = datetime_field(data, "retry_after", datetime_format)?;
        if let Some(send_now) = bool_field(data, "send_now")? {
            webhook.send_now = send_now;
        }
        if let Some(bypass) = bool_field(data, "bypass_send_after")? {
            webhook.bypass_send_after = bypass;
        }
        if let Some(configured) = bool_field(data, "configured")? {
            webhook.configured = configured;
        }
        webhook.secret = string_field(data, "secret")?;
        webhook.event = string_field(data, "event")?;
        match data.get("extra") {
            None | Some(Value::Null) => {}
            Some(Value::Object(extra)) => webhook.extra = extra.clone(),
            Some(_) => return Err(WebhookError::invalid_field("extra", "expected an object")),
        }
        if let Some(allow) = bool_field(data, "allow_rerun")? {
            webhook.allow_rerun = allow;
        }

        Ok(webhook)
    }
}

fn opt_string(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn opt_datetime(value: Option<DateTime<Utc>>, format: &str) -> Value {
    value
        .map(|at| Value::String(at.format(format).to_string()))
        .unwrap_or(Value::Null)
}

fn datetime_field(
    data: &Map<String, Value>,
    field: &str,
    format: &str,
) -> Result<Option<DateTime<Utc>>> {
    string_field(data, field)?
        .map(|raw| {
            NaiveDateTime::parse_from_str(&raw, format)
                .map(|parsed| parsed.and_utc())
                .map_err(|e| WebhookError::invalid_field(field, e.to_string()))
        })
        .transpose()
}

fn string_field(data: &Map<String, Value>, field: &str) -> Result<Option<String>> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(WebhookError::invalid_field(field, "expected a string")),
    }
}

fn u32_field(data: &Map<String, Value>, field: &str) -> Result<Option<u32>> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| WebhookError::invalid_field(field, "expected an unsigned integer")),
    }
}

fn bool_field(data: &Map<String, Value>, field: &str) -> Result<Option<bool>> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(_) => Err(WebhookError::invalid_field(field, "expected a boolean")),
    }
}
