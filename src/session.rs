//! Event loop that owns one [`AnalysisController`] for an operator session.
//!
//! Operator events arrive on an mpsc channel and are applied one at a time
//! by a single task. The network call runs in its own task and reports back
//! on a second channel, so the loop never blocks on it. After every applied
//! event the loop publishes a [`SessionSnapshot`] on a watch channel.

use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::controller::{
    dispatch, AnalysisController, LifecycleState, Notice, SettleOutcome, Trigger,
};
use crate::domain::{Preset, QueryField, QueryForm, RiskResult};
use crate::error::AppError;
use crate::presentation::{HistoryView, ResultView};
use crate::scoring::{ScoringError, ScoringService};

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Edit { field: QueryField, value: String },
    LoadPreset(Preset),
    Analyze,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotCause {
    Opened,
    Edited,
    PresetLoaded,
    AnalysisStarted,
    TriggerIgnored,
    InputRejected,
    Completed,
    Failed,
}

/// Everything a renderer needs, taken after one event was fully applied.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub revision: u64,
    pub cause: SnapshotCause,
    pub state: LifecycleState,
    pub form: QueryForm,
    pub current: Option<ResultView>,
    pub history: Vec<HistoryView>,
    pub notice: Option<Notice>,
    pub requests_issued: u64,
}

impl SessionSnapshot {
    pub(crate) fn capture(revision: u64, cause: SnapshotCause, controller: &AnalysisController) -> Self {
        Self {
            revision,
            cause,
            state: controller.state(),
            form: controller.form().clone(),
            current: controller.current().map(ResultView::from_result),
            history: controller.history().iter().map(HistoryView::from_entry).collect(),
            notice: controller.notice().cloned(),
            requests_issued: controller.requests_issued(),
        }
    }
}

struct Settlement {
    ticket: u64,
    outcome: Result<RiskResult, ScoringError>,
}

pub struct Session {
    controller: AnalysisController,
    service: Arc<dyn ScoringService>,
    timeout: Duration,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    settled_tx: mpsc::UnboundedSender<Settlement>,
    settled_rx: mpsc::UnboundedReceiver<Settlement>,
    snapshots: watch::Sender<SessionSnapshot>,
    revision: u64,
}

/// Cloneable sender side of a running [`Session`].
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl Session {
    pub fn new(
        controller: AnalysisController,
        service: Arc<dyn ScoringService>,
        timeout: Duration,
    ) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        let initial = SessionSnapshot::capture(0, SnapshotCause::Opened, &controller);
        let (snapshots_tx, snapshots_rx) = watch::channel(initial);

        let session = Session {
            controller,
            service,
            timeout,
            events: events_rx,
            settled_tx,
            settled_rx,
            snapshots: snapshots_tx,
            revision: 0,
        };
        let handle = SessionHandle {
            events: events_tx,
            snapshots: snapshots_rx,
        };

        (session, handle)
    }

    /// Runs until `Shutdown` is received or every handle is dropped. A
    /// request still in flight at that point is abandoned unobserved.
    pub async fn run(mut self) -> AnalysisController {
        tracing::info!(timeout_secs = self.timeout.as_secs(), "Analysis session started");

        loop {
            tokio::select! {
                Some(settlement) = self.settled_rx.recv() => {
                    self.on_settled(settlement);
                }
                event = self.events.recv() => match event {
                    Some(event) => {
                        if self.on_event(event).is_break() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        tracing::info!(
            requests = self.controller.requests_issued(),
            "Analysis session closed"
        );
        self.controller
    }

    fn on_event(&mut self, event: SessionEvent) -> ControlFlow<()> {
        let cause = match event {
            SessionEvent::Edit { field, value } => {
                self.controller.edit(field, value);
                SnapshotCause::Edited
            }
            SessionEvent::LoadPreset(preset) => {
                self.controller.load_preset(preset);
                SnapshotCause::PresetLoaded
            }
            SessionEvent::Analyze => match self.controller.begin_analysis() {
                Ok(Trigger::Started(pending)) => {
                    let service = Arc::clone(&self.service);
                    let settled = self.settled_tx.clone();
                    let timeout = self.timeout;
                    tokio::spawn(async move {
                        let outcome = dispatch(&*service, &pending, timeout).await;
                        let _ = settled.send(Settlement {
                            ticket: pending.ticket,
                            outcome,
                        });
                    });
                    SnapshotCause::AnalysisStarted
                }
                Ok(Trigger::Ignored) => SnapshotCause::TriggerIgnored,
                Err(_) => SnapshotCause::InputRejected,
            },
            SessionEvent::Shutdown => return ControlFlow::Break(()),
        };
        self.publish(cause);
        ControlFlow::Continue(())
    }

    fn on_settled(&mut self, settlement: Settlement) {
        let cause = match self.controller.settle(settlement.ticket, settlement.outcome) {
            SettleOutcome::Completed => SnapshotCause::Completed,
            SettleOutcome::Failed(_) => SnapshotCause::Failed,
            SettleOutcome::Stale => return,
        };
        self.publish(cause);
    }

    fn publish(&mut self, cause: SnapshotCause) {
        self.revision += 1;
        let snapshot = SessionSnapshot::capture(self.revision, cause, &self.controller);
        self.snapshots.send_replace(snapshot);
    }
}

impl SessionHandle {
    pub fn send(&self, event: SessionEvent) -> Result<(), AppError> {
        self.events.send(event).map_err(|_| AppError::SessionClosed)
    }

    pub fn edit(&self, field: QueryField, value: impl Into<String>) -> Result<(), AppError> {
        self.send(SessionEvent::Edit {
            field,
            value: value.into(),
        })
    }

    pub fn load_preset(&self, preset: Preset) -> Result<(), AppError> {
        self.send(SessionEvent::LoadPreset(preset))
    }

    pub fn analyze(&self) -> Result<(), AppError> {
        self.send(SessionEvent::Analyze)
    }

    pub fn shutdown(&self) -> Result<(), AppError> {
        self.send(SessionEvent::Shutdown)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }
}
