use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{AnalyzeRequest, RiskResult};

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid response from scoring service: {0}")]
    Decode(String),
    #[error("Scoring service did not answer within {0:?}")]
    TimedOut(Duration),
}

/// Response from the scoring service root endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Anything able to score a transaction. The controller only talks to
/// this trait so tests can substitute an in-process service.
#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn analyze(
        &self,
        request_id: Uuid,
        request: &AnalyzeRequest,
    ) -> Result<RiskResult, ScoringError>;
}

/// HTTP client for the remote risk-scoring service
#[derive(Clone)]
pub struct HttpScoringClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpScoringClient {
    /// Creates a new client for the service at `base_url`. Every request is
    /// bounded by `timeout`.
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        HttpScoringClient {
            client,
            base_url,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn transport_error(&self, err: reqwest::Error) -> ScoringError {
        if err.is_timeout() {
            ScoringError::TimedOut(self.timeout)
        } else {
            ScoringError::Transport(err)
        }
    }

    /// Fetches the service status from `GET /`
    pub async fn health(&self) -> Result<ServiceStatus, ScoringError> {
        let url = self.endpoint("");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?
            .error_for_status()?;

        response
            .json::<ServiceStatus>()
            .await
            .map_err(|e| ScoringError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ScoringService for HttpScoringClient {
    /// Posts the transaction to `/analyze`. The status code is only logged:
    /// any body that decodes as a [`RiskResult`] is accepted.
    async fn analyze(
        &self,
        request_id: Uuid,
        request: &AnalyzeRequest,
    ) -> Result<RiskResult, ScoringError> {
        let url = self.endpoint("analyze");
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("x-request-id", request_id.to_string())
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let latency_ms = start.elapsed().as_millis() as u64;

        match serde_json::from_str::<RiskResult>(&body) {
            Ok(result) => {
                if !status.is_success() {
                    tracing::warn!(
                        request_id = %request_id,
                        status = status.as_u16(),
                        "Scoring service returned a non-success status with a usable body"
                    );
                }
                tracing::debug!(
                    request_id = %request_id,
                    status = status.as_u16(),
                    latency_ms,
                    risk_level = %result.risk_level,
                    "Scoring response decoded"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    status = status.as_u16(),
                    latency_ms,
                    body_size = body.len(),
                    "Scoring response could not be decoded: {}",
                    e
                );
                Err(ScoringError::Decode(format!("status {}: {}", status.as_u16(), e)))
            }
        }
    }
}
