use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::scoring::HttpScoringClient;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn unhealthy(error: impl Into<String>) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.into(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct ScoringServiceChecker {
    client: HttpScoringClient,
}

impl ScoringServiceChecker {
    pub fn new(client: HttpScoringClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DependencyChecker for ScoringServiceChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.client.health().await {
            Ok(service) if service.status == "ok" => DependencyStatus::Healthy {
                status: "healthy".to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Ok(service) => DependencyStatus::unhealthy(format!(
                "service reported status '{}'",
                service.status
            )),
            Err(e) => DependencyStatus::unhealthy(e.to_string()),
        }
    }
}

pub async fn check_health(scoring: &dyn DependencyChecker) -> HealthResponse {
    let scoring_result = timeout(CHECK_TIMEOUT, scoring.check())
        .await
        .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));

    let mut dependencies = HashMap::new();
    dependencies.insert("scoring_service".to_string(), scoring_result);

    HealthResponse {
        status: determine_overall_status(&dependencies),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dependencies,
    }
}

fn determine_overall_status(dependencies: &HashMap<String, DependencyStatus>) -> String {
    if dependencies
        .values()
        .any(|status| matches!(status, DependencyStatus::Unhealthy { .. }))
    {
        "unhealthy".to_string()
    } else {
        "healthy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(bool);

    #[async_trait]
    impl DependencyChecker for Fixed {
        async fn check(&self) -> DependencyStatus {
            if self.0 {
                DependencyStatus::Healthy {
                    status: "healthy".to_string(),
                    latency_ms: 1,
                }
            } else {
                DependencyStatus::unhealthy("connection refused")
            }
        }
    }

    #[tokio::test]
    async fn test_overall_status_follows_scoring_service() {
        assert_eq!(check_health(&Fixed(true)).await.status, "healthy");

        let report = check_health(&Fixed(false)).await;
        assert_eq!(report.status, "unhealthy");
        assert!(matches!(
            report.dependencies.get("scoring_service"),
            Some(DependencyStatus::Unhealthy { .. })
        ));
    }
}
