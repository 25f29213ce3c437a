//! Rate-limited HTTP client whose failures map onto `CallError`.
//!
//! Non-success responses become `HttpError` with the status code in the
//! message, so the retry classifier's `"429"`/`"503"` signatures apply.

mod rate_limit;

pub use rate_limit::RateLimiter;

use crate::config::HttpConfig;
use crate::error::{CallError, CallResult, ConfigError};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// HTTP collaborator for resilient calls.
///
/// Clones share the connection pool and the rate limiter.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &HttpConfig, limiter: Arc<RateLimiter>) -> Result<Self, ConfigError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::ValidationError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            limiter,
            timeout,
        })
    }

    /// Client with its own limiter spaced by `min_request_interval_ms`.
    pub fn from_config(config: &HttpConfig) -> Result<Self, ConfigError> {
        let limiter = RateLimiter::new(Duration::from_millis(config.min_request_interval_ms));
        Self::new(config, Arc::new(limiter))
    }

    /// Clone sharing the pool and limiter, with a different per-request
    /// timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` and return the body as text.
    pub async fn get_text(&self, url: &str) -> CallResult<String> {
        let response = self.send(self.client.get(url)).await?;
        Ok(response.text().await?)
    }

    /// GET `url` and decode the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> CallResult<T> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body)
            .map_err(|e| CallError::parse(format!("Invalid JSON from {url}: {e}")))
    }

    /// HEAD `url`; returns the status code of a successful response.
    pub async fn head(&self, url: &str) -> CallResult<u16> {
        let response = self.send(self.client.head(url)).await?;
        Ok(response.status().as_u16())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> CallResult<reqwest::Response> {
        self.limiter.acquire().await;
        let response = request.timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %response.url(), status = status.as_u16(), "Request failed");
            return Err(CallError::http(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
            ));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{is_retryable, RetryPolicy};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/status")
    }

    fn client() -> ApiClient {
        let config = HttpConfig {
            timeout_ms: 5000,
            min_request_interval_ms: 0,
            ..Default::default()
        };
        ApiClient::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_get_json_decodes_body() {
        let url = serve_once("200 OK", r#"{"models": 3}"#).await;
        let value: serde_json::Value = client().get_json(&url).await.unwrap();
        assert_eq!(value["models"], 3);
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let url = serve_once("503 Service Unavailable", "").await;
        let err = client().get_text(&url).await.unwrap_err();
        assert_eq!(err.status, Some(503));
        assert_eq!(err.message, "HTTP 503: Service Unavailable");
        assert!(is_retryable(&err, &RetryPolicy::default()));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retryable() {
        let url = serve_once("404 Not Found", "").await;
        let err = client().get_text(&url).await.unwrap_err();
        assert_eq!(err.status, Some(404));
        assert!(!is_retryable(&err, &RetryPolicy::default()));
    }

    #[tokio::test]
    async fn test_head_returns_status() {
        let url = serve_once("204 No Content", "").await;
        assert_eq!(client().head(&url).await, Ok(204));
    }

    #[tokio::test]
    async fn test_with_timeout_bounds_slow_responses() {
        // Accepts the connection and never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let quick = client().with_timeout(Duration::from_millis(50));
        assert_eq!(quick.timeout(), Duration::from_millis(50));
        let err = quick.head(&format!("http://{addr}/")).await.unwrap_err();
        assert_eq!(err.name, "TimeoutError");
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let url = serve_once("200 OK", "not json").await;
        let err = client()
            .get_json::<serde_json::Value>(&url)
            .await
            .unwrap_err();
        assert_eq!(err.name, "ParseError");
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        // Bind then drop to get a port nobody is listening on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client()
            .get_text(&format!("http://{addr}/"))
            .await
            .unwrap_err();
        assert_eq!(err.name, "NetworkError");
        assert!(is_retryable(&err, &RetryPolicy::default()));
    }
}
