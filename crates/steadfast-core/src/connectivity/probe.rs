//! Health probes: cheap existence checks against API endpoints.

use crate::http::ApiClient;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A single-endpoint reachability check.
///
/// Uses `async_trait` because the monitor holds probes as
/// `Arc<dyn HealthProbe>`.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Return `true` if `endpoint` answered successfully. Implementations
    /// must stop promptly and return `false` once `cancel` fires.
    async fn check(&self, endpoint: &str, cancel: CancellationToken) -> bool;
}

/// HEAD-request probe through an [`ApiClient`].
///
/// Checks queue on the client's rate limiter like any other request, and use
/// the client's per-request timeout.
pub struct HttpProbe {
    client: ApiClient,
}

impl HttpProbe {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self, endpoint: &str, cancel: CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(endpoint, "Health probe aborted");
                false
            }
            result = self.client.head(endpoint) => match result {
                Ok(status) => {
                    tracing::debug!(endpoint, status, "Health probe answered");
                    true
                }
                Err(e) => {
                    tracing::debug!(endpoint, "Health probe failed: {e}");
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::http::RateLimiter;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_status(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response =
                format!("HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/health")
    }

    fn client(limiter: Arc<RateLimiter>) -> ApiClient {
        let config = HttpConfig {
            timeout_ms: 5000,
            ..Default::default()
        };
        ApiClient::new(&config, limiter).unwrap()
    }

    #[tokio::test]
    async fn test_success_status_is_healthy() {
        let url = serve_status("200 OK").await;
        let probe = HttpProbe::new(client(Arc::new(RateLimiter::unlimited())));
        assert!(probe.check(&url, CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_error_status_is_unhealthy() {
        let url = serve_status("503 Service Unavailable").await;
        let probe = HttpProbe::new(client(Arc::new(RateLimiter::unlimited())));
        assert!(!probe.check(&url, CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_check_waits_on_shared_rate_limiter() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60)));
        // A user request just took the slot
        limiter.acquire().await;

        let url = serve_status("200 OK").await;
        let probe = HttpProbe::new(client(limiter));
        let cancel = CancellationToken::new();
        let check = tokio::spawn({
            let cancel = cancel.clone();
            async move { probe.check(&url, cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!check.is_finished());
        cancel.cancel();
        assert!(!check.await.unwrap());
    }
}
