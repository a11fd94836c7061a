//! Display attributes derived from a [`RiskResult`].
//!
//! Everything here is a pure function of its input. The terminal front end
//! and the session snapshots both render from these views.

use serde::Serialize;
use std::fmt;

use crate::domain::{RiskLevel, RiskResult};
use crate::history::HistoryEntry;

const BAR_CELLS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskColor {
    Red,
    Amber,
    Green,
}

impl RiskColor {
    /// CSS color name used for the level label and the bar fill.
    pub fn css(&self) -> &'static str {
        match self {
            RiskColor::Red => "red",
            RiskColor::Amber => "orange",
            RiskColor::Green => "green",
        }
    }

    /// Dark panel background behind the result card.
    pub fn background(&self) -> &'static str {
        match self {
            RiskColor::Red => "#3b0d0d",
            RiskColor::Amber => "#3b2d0d",
            RiskColor::Green => "#0d3b1b",
        }
    }

    fn ansi(&self) -> &'static str {
        match self {
            RiskColor::Red => "\x1b[31m",
            RiskColor::Amber => "\x1b[33m",
            RiskColor::Green => "\x1b[32m",
        }
    }
}

/// Unrecognized levels fall back to the LOW color.
pub fn risk_color(level: &RiskLevel) -> RiskColor {
    match level {
        RiskLevel::High => RiskColor::Red,
        RiskLevel::Medium => RiskColor::Amber,
        RiskLevel::Low | RiskLevel::Unrecognized(_) => RiskColor::Green,
    }
}

/// The score as a fraction of the bar's full width. Out-of-range scores are
/// passed through unchanged.
pub fn progress_fraction(result: &RiskResult) -> f64 {
    result.risk_score
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeKind {
    RiskFactor,
    ContextSignal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub label: String,
    pub kind: BadgeKind,
}

/// Risk factors followed by context signals, in response order, duplicates kept.
pub fn badges(result: &RiskResult) -> Vec<Badge> {
    let factors = result.risk_factors.iter().map(|label| Badge {
        label: label.clone(),
        kind: BadgeKind::RiskFactor,
    });
    let signals = result.context_signals.iter().flatten().map(|label| Badge {
        label: label.clone(),
        kind: BadgeKind::ContextSignal,
    });

    factors.chain(signals).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub risk_score: f64,
    pub risk_level: String,
    pub color: RiskColor,
    pub progress_fraction: f64,
    pub badges: Vec<Badge>,
    pub explanation: String,
}

impl ResultView {
    pub fn from_result(result: &RiskResult) -> Self {
        Self {
            risk_score: result.risk_score,
            risk_level: result.risk_level.to_string(),
            color: risk_color(&result.risk_level),
            progress_fraction: progress_fraction(result),
            badges: badges(result),
            explanation: result.explanation.clone(),
        }
    }

    /// Filled cells for a bar `cells` wide. Only the drawing is bounded;
    /// `progress_fraction` keeps the raw score.
    pub fn filled_cells(&self, cells: usize) -> usize {
        let fraction = if self.progress_fraction.is_finite() {
            self.progress_fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        (fraction * cells as f64).round() as usize
    }
}

impl fmt::Display for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const RESET: &str = "\x1b[0m";

        writeln!(f, "Result")?;
        writeln!(f, "  Risk Score: {}", self.risk_score)?;
        writeln!(
            f,
            "  Risk Level: {}{}{}",
            self.color.ansi(),
            self.risk_level,
            RESET
        )?;
        if !self.badges.is_empty() {
            let labels: Vec<String> = self
                .badges
                .iter()
                .map(|badge| format!("[{}]", badge.label))
                .collect();
            writeln!(f, "  {}", labels.join(" "))?;
        }
        writeln!(f, "  Explanation: {}", self.explanation)?;

        let filled = self.filled_cells(BAR_CELLS);
        write!(
            f,
            "  {}{}{}{} {:.0}%",
            self.color.ansi(),
            "#".repeat(filled),
            RESET,
            "-".repeat(BAR_CELLS - filled),
            self.progress_fraction * 100.0
        )
    }
}

/// Compact card for one entry of the history list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryView {
    pub sequence: u64,
    pub risk_score: f64,
    pub risk_level: String,
    pub color: RiskColor,
    pub explanation: String,
}

impl HistoryView {
    pub fn from_entry(entry: &HistoryEntry) -> Self {
        Self {
            sequence: entry.sequence,
            risk_score: entry.result.risk_score,
            risk_level: entry.result.risk_level.to_string(),
            color: risk_color(&entry.result.risk_level),
            explanation: entry.result.explanation.clone(),
        }
    }
}

impl fmt::Display for HistoryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:<3} Score: {:<6} Level: {}{}\x1b[0m  {}",
            self.sequence,
            self.risk_score,
            self.color.ansi(),
            self.risk_level,
            self.explanation
        )
    }
}
