#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use uuid::Uuid;

use txrisk_client::domain::AnalyzeRequest;
use txrisk_client::{RiskLevel, RiskResult, ScoringError, ScoringService, SessionSnapshot};

pub enum Behavior {
    /// Answers call `n` (starting at 1) with the result built by the function.
    Score(fn(usize) -> RiskResult),
    Fail,
    Hang,
}

/// In-process scoring service that records every call it receives.
pub struct MockService {
    calls: AtomicUsize,
    requests: Mutex<Vec<AnalyzeRequest>>,
    gate: Option<Arc<Semaphore>>,
    behavior: Behavior,
}

impl MockService {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            gate: None,
            behavior,
        }
    }

    /// Every call waits for a permit on `gate` before answering.
    pub fn gated(behavior: Behavior, gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(behavior)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<AnalyzeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScoringService for MockService {
    async fn analyze(
        &self,
        _request_id: Uuid,
        request: &AnalyzeRequest,
    ) -> Result<RiskResult, ScoringError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        match self.behavior {
            Behavior::Score(build) => Ok(build(call)),
            Behavior::Fail => Err(ScoringError::Decode("expected value at line 1".to_string())),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

pub fn high_risk_result(_call: usize) -> RiskResult {
    RiskResult {
        risk_score: 0.92,
        risk_level: RiskLevel::High,
        risk_factors: vec!["large_amount".to_string(), "odd_hour".to_string()],
        context_signals: None,
        explanation: "...".to_string(),
    }
}

/// Score grows with the call number so entries can be told apart.
pub fn numbered_result(call: usize) -> RiskResult {
    RiskResult {
        risk_score: call as f64 / 10.0,
        risk_level: RiskLevel::Medium,
        risk_factors: vec![format!("call_{}", call)],
        context_signals: None,
        explanation: format!("result {}", call),
    }
}

pub async fn wait_until<F>(rx: &mut watch::Receiver<SessionSnapshot>, predicate: F) -> SessionSnapshot
where
    F: FnMut(&SessionSnapshot) -> bool,
{
    let snapshot = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("session closed");
    (*snapshot).clone()
}
