mod client;

pub use client::{HttpScoringClient, ScoringError, ScoringService, ServiceStatus};
