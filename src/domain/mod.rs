//! Framework-agnostic types shared by the controller, the scoring client
//! and the presentation layer.

pub mod query;
pub mod result;

pub use query::{
    AnalyzeRequest, FormVariant, NumberOrText, Preset, QueryField, QueryForm, TransactionType,
};
pub use result::{RiskLevel, RiskResult};
