//! JSON-over-HTTP business APIs.
//!
//! Both upstreams take a JSON POST body and answer with a JSON envelope
//! carrying a `success` flag. Reads are retried on transport errors; writes
//! are sent exactly once.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::resilience::{RetryConfig, with_retry};
use crate::{Result, VendoraError};

/// Longest upstream error body kept in an [`VendoraError::Api`] message.
const MAX_ERROR_BODY: usize = 512;

/// A business API reachable with a JSON payload.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Name used in logs and metric labels.
    fn name(&self) -> &str;

    /// Idempotent read. Transport failures are retried before returning.
    async fn fetch(&self, payload: &Value) -> Result<Value>;

    /// Write. Sent once; a transport failure is returned as-is.
    async fn submit(&self, payload: &Value) -> Result<Value>;
}

/// Build the process-wide HTTP client shared by every upstream.
pub fn http_client(request_timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(request_timeout)
        .pool_idle_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(20)
        .build()
        .map_err(|e| VendoraError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// [`Upstream`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    name: &'static str,
    url: String,
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpUpstream {
    pub fn new(name: &'static str, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name,
            url: url.into(),
            client,
            retry: RetryConfig::default(),
        }
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_once(&self, payload: &Value) -> Result<Value> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            return Err(VendoraError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<Value>().await?)
    }
}

/// Value of `codOpe` in the payload, for log fields.
fn operation(payload: &Value) -> &str {
    payload
        .get("codOpe")
        .and_then(Value::as_str)
        .unwrap_or("default")
}

#[async_trait]
impl Upstream for HttpUpstream {
    fn name(&self) -> &str {
        self.name
    }

    #[instrument(name = "upstream.fetch", skip(self, payload), fields(upstream = self.name, op = operation(payload)))]
    async fn fetch(&self, payload: &Value) -> Result<Value> {
        debug!(url = %self.url, %payload, "POST");
        let result = with_retry(&self.retry, self.name, operation(payload), || {
            self.post_once(payload)
        })
        .await;
        if let Err(e) = &result {
            warn!(error = %e, kind = e.kind(), "upstream read failed");
        }
        result
    }

    #[instrument(name = "upstream.submit", skip(self, payload), fields(upstream = self.name, op = operation(payload)))]
    async fn submit(&self, payload: &Value) -> Result<Value> {
        debug!(url = %self.url, "POST (no retry)");
        self.post_once(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_reads_cod_ope() {
        assert_eq!(operation(&json!({"codOpe": "OBTENER_CATEGORIAS"})), "OBTENER_CATEGORIAS");
        assert_eq!(operation(&json!({"id_chatbot": 1})), "default");
    }

    #[test]
    fn client_builds_with_timeout() {
        assert!(http_client(Duration::from_secs(10)).is_ok());
    }
}
