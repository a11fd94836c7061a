//! Request lifecycle for the transaction analysis form.
//!
//! The controller owns the form, the single outstanding request slot, the
//! current result and the session history. A request is started with
//! [`AnalysisController::begin_analysis`], which hands back the serialized
//! body to send, and finished with [`AnalysisController::settle`]. While a
//! request is in flight further triggers are ignored, not queued.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{AnalyzeRequest, FormVariant, Preset, QueryField, QueryForm, RiskResult};
use crate::error::AppError;
use crate::history::ResultHistory;
use crate::scoring::{ScoringError, ScoringService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    InFlight,
}

/// A request that has been admitted into the in-flight slot.
#[derive(Debug, Clone)]
pub struct PendingAnalysis {
    pub ticket: u64,
    pub request_id: Uuid,
    pub request: AnalyzeRequest,
}

#[derive(Debug)]
pub enum Trigger {
    Started(PendingAnalysis),
    /// A request was already in flight; nothing was sent.
    Ignored,
}

#[derive(Debug)]
pub enum SettleOutcome {
    Completed,
    Failed(ScoringError),
    /// The ticket did not match the in-flight request.
    Stale,
}

/// Operator-facing failure message shown until the next successful start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    InvalidInput { field: String, message: String },
    RequestFailed { message: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::InvalidInput { message, .. } => write!(f, "Invalid input: {}", message),
            Notice::RequestFailed { message } => write!(f, "Analysis failed: {}", message),
        }
    }
}

#[derive(Debug)]
pub struct AnalysisController {
    form: QueryForm,
    state: LifecycleState,
    in_flight: Option<u64>,
    next_ticket: u64,
    current: Option<RiskResult>,
    history: ResultHistory,
    notice: Option<Notice>,
    requests_issued: u64,
}

impl AnalysisController {
    pub fn new(variant: FormVariant) -> Self {
        Self::with_form(QueryForm::new(variant))
    }

    pub fn with_form(form: QueryForm) -> Self {
        Self {
            form,
            state: LifecycleState::Idle,
            in_flight: None,
            next_ticket: 1,
            current: None,
            history: ResultHistory::new(),
            notice: None,
            requests_issued: 0,
        }
    }

    pub fn form(&self) -> &QueryForm {
        &self.form
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == LifecycleState::InFlight
    }

    pub fn current(&self) -> Option<&RiskResult> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &ResultHistory {
        &self.history
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Number of requests admitted into the in-flight slot so far.
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    pub fn edit(&mut self, field: QueryField, raw: impl Into<String>) {
        self.form.set(field, raw);
        tracing::debug!(field = %field, "Form field updated");
    }

    pub fn edit_named(&mut self, name: &str, raw: impl Into<String>) -> Result<(), AppError> {
        let field = name
            .parse::<QueryField>()
            .map_err(AppError::UnknownField)?;
        self.edit(field, raw);
        Ok(())
    }

    pub fn load_preset(&mut self, preset: Preset) {
        self.form = QueryForm::preset(self.form.variant(), preset);
        tracing::debug!(?preset, "Preset loaded");
    }

    /// Moves `idle -> in_flight` and returns the request to send.
    ///
    /// The form is coerced here. A coercion failure leaves the controller
    /// idle with its previous result and raises an `InvalidInput` notice.
    pub fn begin_analysis(&mut self) -> Result<Trigger, AppError> {
        if self.is_in_flight() {
            tracing::debug!(ticket = ?self.in_flight, "Analysis already in flight, trigger ignored");
            return Ok(Trigger::Ignored);
        }

        let request = match self.form.to_request() {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(field = e.field, "Form rejected before submission: {}", e);
                self.notice = Some(Notice::InvalidInput {
                    field: e.field.to_string(),
                    message: e.to_string(),
                });
                return Err(AppError::InvalidInput(e));
            }
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.requests_issued += 1;
        self.in_flight = Some(ticket);
        self.state = LifecycleState::InFlight;
        self.current = None;
        self.notice = None;

        let pending = PendingAnalysis {
            ticket,
            request_id: Uuid::new_v4(),
            request,
        };
        tracing::info!(
            ticket,
            request_id = %pending.request_id,
            user_id = pending.request.user_id,
            "Analysis started"
        );

        Ok(Trigger::Started(pending))
    }

    /// Applies the settled call and returns to idle. A result becomes the
    /// current result and the newest history entry in the same step; a
    /// failure touches neither.
    pub fn settle(
        &mut self,
        ticket: u64,
        outcome: Result<RiskResult, ScoringError>,
    ) -> SettleOutcome {
        if self.in_flight != Some(ticket) {
            tracing::warn!(ticket, in_flight = ?self.in_flight, "Ignoring settlement for stale ticket");
            return SettleOutcome::Stale;
        }

        self.in_flight = None;
        self.state = LifecycleState::Idle;

        match outcome {
            Ok(result) => {
                if !result.risk_level.is_recognized() {
                    tracing::warn!(
                        ticket,
                        risk_level = %result.risk_level,
                        "Scoring service returned an unrecognized risk level"
                    );
                }
                tracing::info!(
                    ticket,
                    risk_level = %result.risk_level,
                    risk_score = result.risk_score,
                    "Analysis completed"
                );
                self.history.push(result.clone());
                self.current = Some(result);
                SettleOutcome::Completed
            }
            Err(e) => {
                tracing::error!(ticket, "Analysis failed: {}", e);
                self.current = None;
                self.notice = Some(Notice::RequestFailed {
                    message: e.to_string(),
                });
                SettleOutcome::Failed(e)
            }
        }
    }

    /// Runs one full analysis against `service`. Returns `Ok(None)` when the
    /// trigger was ignored because a request is already in flight.
    pub async fn analyze<S>(
        &mut self,
        service: &S,
        timeout: Duration,
    ) -> Result<Option<&RiskResult>, AppError>
    where
        S: ScoringService + ?Sized,
    {
        let pending = match self.begin_analysis()? {
            Trigger::Started(pending) => pending,
            Trigger::Ignored => return Ok(None),
        };

        let outcome = dispatch(service, &pending, timeout).await;
        match self.settle(pending.ticket, outcome) {
            SettleOutcome::Completed => Ok(self.current.as_ref()),
            SettleOutcome::Failed(e) => Err(AppError::RequestFailed(e)),
            SettleOutcome::Stale => Ok(None),
        }
    }
}

impl Default for AnalysisController {
    fn default() -> Self {
        Self::new(FormVariant::default())
    }
}

/// Sends one pending request, bounded by `timeout`.
pub async fn dispatch<S>(
    service: &S,
    pending: &PendingAnalysis,
    timeout: Duration,
) -> Result<RiskResult, ScoringError>
where
    S: ScoringService + ?Sized,
{
    match tokio::time::timeout(timeout, service.analyze(pending.request_id, &pending.request))
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => Err(ScoringError::TimedOut(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskLevel;

    fn high(score: f64) -> RiskResult {
        RiskResult {
            risk_score: score,
            risk_level: RiskLevel::High,
            risk_factors: vec!["large_amount".into()],
            context_signals: None,
            explanation: "...".into(),
        }
    }

    fn started(controller: &mut AnalysisController) -> PendingAnalysis {
        match controller.begin_analysis() {
            Ok(Trigger::Started(pending)) => pending,
            other => panic!("expected a started analysis, got {:?}", other),
        }
    }

    #[test]
    fn test_begin_enters_in_flight_and_clears_result() {
        let mut controller = AnalysisController::default();
        let first = started(&mut controller);
        controller.settle(first.ticket, Ok(high(0.9)));
        assert!(controller.current().is_some());

        let second = started(&mut controller);
        assert_eq!(controller.state(), LifecycleState::InFlight);
        assert!(controller.current().is_none());
        assert_eq!(controller.history().len(), 1);
        assert_eq!(second.ticket, first.ticket + 1);
    }

    #[test]
    fn test_trigger_while_in_flight_is_ignored() {
        let mut controller = AnalysisController::default();
        let pending = started(&mut controller);

        for _ in 0..3 {
            assert!(matches!(controller.begin_analysis(), Ok(Trigger::Ignored)));
        }
        assert_eq!(controller.requests_issued(), 1);

        controller.settle(pending.ticket, Ok(high(0.5)));
        assert_eq!(controller.state(), LifecycleState::Idle);
        assert_eq!(controller.history().len(), 1);
    }

    #[test]
    fn test_failure_returns_to_idle_without_history() {
        let mut controller = AnalysisController::default();
        let pending = started(&mut controller);
        let outcome = controller.settle(
            pending.ticket,
            Err(ScoringError::Decode("missing field `risk_score`".into())),
        );

        assert!(matches!(outcome, SettleOutcome::Failed(_)));
        assert_eq!(controller.state(), LifecycleState::Idle);
        assert!(controller.current().is_none());
        assert!(controller.history().is_empty());
        assert!(matches!(controller.notice(), Some(Notice::RequestFailed { .. })));

        // retry is possible and clears the notice
        started(&mut controller);
        assert!(controller.notice().is_none());
    }

    #[test]
    fn test_invalid_input_is_not_sent() {
        let mut controller = AnalysisController::default();
        let pending = started(&mut controller);
        controller.settle(pending.ticket, Ok(high(0.3)));

        controller.edit(QueryField::Amount, "20k");
        let err = controller.begin_analysis().unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(controller.state(), LifecycleState::Idle);
        assert_eq!(controller.requests_issued(), 1);
        assert_eq!(controller.current().map(|r| r.risk_score), Some(0.3));
        assert_eq!(
            controller.notice(),
            Some(&Notice::InvalidInput {
                field: "amount".into(),
                message: "amount: '20k' is not a finite number".into(),
            })
        );
    }

    #[test]
    fn test_stale_ticket_is_ignored() {
        let mut controller = AnalysisController::default();
        let pending = started(&mut controller);

        assert!(matches!(
            controller.settle(pending.ticket + 7, Ok(high(0.1))),
            SettleOutcome::Stale
        ));
        assert!(controller.is_in_flight());
        assert!(controller.history().is_empty());
    }

    #[test]
    fn test_edits_and_presets() {
        let mut controller = AnalysisController::new(FormVariant::Categorical);
        controller.edit_named("device_id", "tablet-3").unwrap();
        assert_eq!(controller.form().get(QueryField::DeviceId), "tablet-3");
        assert!(matches!(
            controller.edit_named("colour", "red"),
            Err(AppError::UnknownField(_))
        ));

        controller.load_preset(Preset::Normal);
        assert_eq!(controller.form().get(QueryField::DeviceId), "5");
        assert_eq!(controller.form().variant(), FormVariant::Categorical);
    }

    #[test]
    fn test_serialization_happens_at_begin() {
        let mut controller = AnalysisController::default();
        controller.edit(QueryField::Amount, "450.5");
        let pending = started(&mut controller);
        controller.edit(QueryField::Amount, "garbage");

        // editing during flight does not touch the admitted request
        assert_eq!(pending.request.amount, 450.5);
    }
}
