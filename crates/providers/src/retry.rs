//! Gateway retry: re-sends a request when the failure is transient.
//!
//! Only errors where [`GatewayError::is_retryable`] holds are retried
//! (rate limiting, network trouble, timeouts). Everything else is returned
//! to the caller on the first attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use toolchat_core::error::GatewayError;
use toolchat_core::gateway::{GatewayRequest, ModelGateway, ModelResponse};
use tracing::{info, warn};

/// Wraps a gateway and retries transient failures with linear backoff.
pub struct RetryingGateway {
    inner: Arc<dyn ModelGateway>,
    max_retries: u32,
    backoff: Duration,
}

impl RetryingGateway {
    pub fn new(inner: Arc<dyn ModelGateway>, max_retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_retries,
            backoff,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[async_trait]
impl ModelGateway for RetryingGateway {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, request: GatewayRequest<'_>) -> Result<ModelResponse, GatewayError> {
        let mut attempt: u32 = 0;
        loop {
            match self.inner.send(request).await {
                Ok(response) => {
                    if attempt > 0 {
                        info!(gateway = %self.inner.name(), attempt, "Gateway recovered after retry");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff * attempt;
                    warn!(
                        gateway = %self.inner.name(),
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Transient gateway failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
