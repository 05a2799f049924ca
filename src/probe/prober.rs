//! Single HTTP check against an endpoint URL

use std::time::{Duration, Instant};

use tokio::time;

use crate::data::{CheckResult, CheckStatus};

/// Default per-probe deadline
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP prober shared by scheduled sweeps and on-demand checks
#[derive(Debug, Clone)]
pub struct Prober {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl Prober {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nethealth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one GET against `url` and classify the outcome.
    ///
    /// Never fails: transport errors and timeouts become a `down` result
    /// without latency. Returns within the configured timeout.
    pub async fn probe(&self, url: &str) -> CheckResult {
        let start = Instant::now();

        match time::timeout(self.timeout, self.fetch(url)).await {
            Ok(Ok(code)) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                let status = classify_status(code);
                tracing::debug!(
                    url = %url,
                    status_code = code,
                    latency_ms,
                    status = %status,
                    "Probe completed"
                );
                CheckResult {
                    status,
                    latency_ms: Some(latency_ms),
                    status_code: Some(code),
                }
            }
            Ok(Err(e)) => {
                tracing::debug!(url = %url, error = %e, "Probe failed");
                CheckResult::unreachable()
            }
            Err(_) => {
                tracing::debug!(
                    url = %url,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Probe timed out"
                );
                CheckResult::unreachable()
            }
        }
    }

    /// Send the request and drain the body, returning the status code
    async fn fetch(&self, url: &str) -> Result<u16, ProbeError> {
        let response = self.http_client.get(url).send().await?;
        let code = response.status().as_u16();

        response
            .bytes()
            .await
            .map_err(|e| ProbeError::Body(e.to_string()))?;

        Ok(code)
    }
}

/// 2xx and 3xx are up, every other code is down
pub fn classify_status(code: u16) -> CheckStatus {
    if (200..400).contains(&code) {
        CheckStatus::Up
    } else {
        CheckStatus::Down
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Body read error: {0}")]
    Body(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProbeError::Timeout
        } else if e.is_builder() {
            ProbeError::InvalidRequest(e.to_string())
        } else if e.is_connect() {
            ProbeError::Connect(e.to_string())
        } else {
            ProbeError::Request(e.to_string())
        }
    }
}
