//! Risk scoring - frequency × severity
//!
//! Global invariants enforced:
//! - Inputs outside 1..=4 are rejected, never clamped
//! - score(f, s) == score(s, f)
//! - Every valid input pair yields a score in 1..=16
//! - A classification is always derived from its inputs, never stored apart from them

use crate::classification::{classify_in_range, Classification};
use crate::error::RiskError;
use crate::level::{Axis, Level, MAX_LEVEL, MIN_LEVEL};
use serde::Serialize;

/// Smallest possible score (1 × 1)
pub const MIN_SCORE: u8 = MIN_LEVEL * MIN_LEVEL;
/// Largest possible score (4 × 4)
pub const MAX_SCORE: u8 = MAX_LEVEL * MAX_LEVEL;

/// Compute the score for a frequency/severity pair
///
/// Frequency is validated first, so when both inputs are out of range the
/// error names the frequency axis.
pub fn score_of(frequency_level: i64, severity_level: i64) -> Result<u8, RiskError> {
    let frequency = Level::new(Axis::Frequency, frequency_level)?;
    let severity = Level::new(Axis::Severity, severity_level)?;
    Ok(score_levels(frequency, severity))
}

/// Score for two already-validated levels
pub fn score_levels(frequency: Level, severity: Level) -> u8 {
    frequency.get() * severity.get()
}

/// A composed score: both inputs, their product, and its tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScore {
    pub frequency_level: Level,
    pub severity_level: Level,
    pub score: u8,
    pub classification: Classification,
}

impl RiskScore {
    /// Validate both levels, then score and classify
    pub fn assess(frequency_level: i64, severity_level: i64) -> Result<Self, RiskError> {
        let frequency = Level::new(Axis::Frequency, frequency_level)?;
        let severity = Level::new(Axis::Severity, severity_level)?;
        Ok(Self::from_levels(frequency, severity))
    }

    pub fn from_levels(frequency: Level, severity: Level) -> Self {
        let score = score_levels(frequency, severity);
        RiskScore {
            frequency_level: frequency,
            severity_level: severity,
            score,
            classification: classify_in_range(score),
        }
    }
}

/// Tier of one matrix cell
pub fn cell_classification(frequency: Level, severity: Level) -> Classification {
    classify_in_range(score_levels(frequency, severity))
}

/// Every cell of the 4×4 matrix, frequency-major, ascending on both axes
pub fn matrix_cells() -> Vec<RiskScore> {
    Level::ALL
        .iter()
        .flat_map(|&f| Level::ALL.iter().map(move |&s| RiskScore::from_levels(f, s)))
        .collect()
}
