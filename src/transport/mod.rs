//! HTTP transport for the Feishu OpenAPI.
//!
//! Every call is attempted up to `RetryConfig::max_attempts` times with a
//! fixed pause between connection-level failures. Responses are returned as
//! parsed JSON whatever their envelope `code` says; interpreting that code
//! is the caller's job.

pub mod retry;

use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::errors::{FeishuError, TransportError, TransportErrorKind};
pub use retry::{with_retries, RetryConfig};

/// Keys whose values must never reach the audit log.
const SENSITIVE_KEYS: &[&str] = &["app_secret", "app_access_token", "tenant_access_token"];

/// Outbound request data.
#[derive(Debug, Clone)]
pub enum Payload {
    Empty,
    /// Query-string parameters, used by the GET endpoints.
    Query(Vec<(String, String)>),
    Json(Value),
}

impl Payload {
    pub fn query<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Payload::Query(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Loggable rendering with secrets masked.
    pub fn audit(&self) -> String {
        match self {
            Payload::Empty => String::new(),
            Payload::Query(pairs) => pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&"),
            Payload::Json(body) => redacted(body),
        }
    }
}

/// Compact rendering of `value` with secrets masked.
fn redacted(value: &Value) -> String {
    let mut value = value.clone();
    redact_secrets(&mut value);
    value.to_string()
}

fn redact_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if SENSITIVE_KEYS.contains(&key.as_str()) {
                    *v = Value::String("[REDACTED]".to_string());
                } else {
                    redact_secrets(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_secrets),
        _ => {}
    }
}

/// HTTP status plus the parsed JSON body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    retry: RetryConfig,
}

impl HttpTransport {
    pub fn new(retry: RetryConfig) -> Result<Self, FeishuError> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(retry.timeout())
            .user_agent(concat!("feishu-approval/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeishuError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, retry })
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Execute one logical call, retrying connection-level failures.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
        payload: &Payload,
    ) -> Result<ApiResponse, TransportError> {
        let call_id = Uuid::new_v4();

        let outcome = with_retries(&self.retry, url, |attempt| {
            debug!(%call_id, %method, url, attempt, "sending feishu request");
            let builder = self.request(method.clone(), url, headers, payload);
            async move {
                let resp = builder
                    .send()
                    .await
                    .map_err(|e| TransportError::from_reqwest(url, e))?;
                let status = resp.status().as_u16();
                let text = resp
                    .text()
                    .await
                    .map_err(|e| TransportError::from_reqwest(url, e))?;
                Ok((status, text))
            }
        })
        .await;

        let (status, text) = match outcome {
            Ok(v) => v,
            Err(e) => {
                error!(
                    %call_id,
                    %method,
                    url,
                    payload = %payload.audit(),
                    kind = %e.kind,
                    error = %e.cause,
                    "feishu request failed"
                );
                return Err(e);
            }
        };

        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) => {
                error!(
                    %call_id,
                    %method,
                    url,
                    payload = %payload.audit(),
                    status,
                    response = %text,
                    "feishu response is not JSON"
                );
                return Err(TransportError::new(TransportErrorKind::Parse, url, e));
            }
        };

        info!(
            %call_id,
            %method,
            url,
            payload = %payload.audit(),
            status,
            response = %redacted(&body),
            "feishu response"
        );

        Ok(ApiResponse { status, body })
    }

    fn request(&self, method: Method, url: &str, headers: &HeaderMap, payload: &Payload) -> RequestBuilder {
        let builder = self.client.request(method, url).headers(headers.clone());
        match payload {
            Payload::Empty => builder,
            Payload::Query(pairs) => builder.query(pairs),
            Payload::Json(body) => builder.json(body),
        }
    }
}
