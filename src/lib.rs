pub mod cli;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod health;
pub mod history;
pub mod presentation;
pub mod scoring;
pub mod session;
pub mod validation;

pub use controller::{AnalysisController, LifecycleState, Notice, Trigger};
pub use domain::{FormVariant, Preset, QueryField, QueryForm, RiskLevel, RiskResult};
pub use scoring::{HttpScoringClient, ScoringError, ScoringService};
pub use session::{Session, SessionHandle, SessionSnapshot};
