//! Domain error taxonomy
//!
//! Every error is a value returned to the immediate caller. Nothing in this
//! crate retries: all operations are pure, so repeating a call with the same
//! bad input cannot succeed.

use crate::level::Axis;
use thiserror::Error;

/// Errors produced by the scoring, classification and lifecycle model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskError {
    /// A frequency or severity level outside 1..=4
    #[error("invalid {axis} level {value} (expected 1..=4)")]
    InvalidLevel { axis: Axis, value: i64 },

    /// A score outside 1..=16
    #[error("invalid score {0} (expected 1..=16)")]
    InvalidScore(i64),

    /// A status value outside the known state set
    #[error("invalid status: {0:?}")]
    InvalidStatus(String),

    /// A classification tag with no canonical or legacy mapping
    #[error("invalid classification: {0:?}")]
    InvalidClassification(String),

    /// A status change the transition table does not allow
    #[error("status transition {from} -> {to} is not allowed")]
    InvalidTransition { from: String, to: String },

    /// MITIGATED requested before the after-mitigation levels were entered
    #[error("cannot mark risk as MITIGATED without after-mitigation levels")]
    MissingResidual,

    /// A level catalog that breaks the four-levels-per-axis invariant
    #[error("invalid level catalog: {0}")]
    InvalidCatalog(String),

    /// A request field failed validation
    #[error("{field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The caller's role does not permit the action
    #[error("not permitted: {action}")]
    Forbidden { action: &'static str },

    /// A record was presented under a different organization than the caller's
    #[error("risk belongs to organization {actual}, not {expected}")]
    OrgMismatch { expected: String, actual: String },
}

impl RiskError {
    /// Stable upper-snake error code for callers that branch on error kind
    pub fn code(&self) -> &'static str {
        match self {
            RiskError::InvalidLevel { .. } => "INVALID_LEVEL",
            RiskError::InvalidScore(_) => "INVALID_SCORE",
            RiskError::InvalidStatus(_) => "INVALID_STATUS",
            RiskError::InvalidClassification(_) => "INVALID_CLASSIFICATION",
            RiskError::InvalidTransition { .. } => "INVALID_TRANSITION",
            RiskError::MissingResidual => "MISSING_RESIDUAL",
            RiskError::InvalidCatalog(_) => "INVALID_CATALOG",
            RiskError::Validation { .. } => "VALIDATION",
            RiskError::Forbidden { .. } => "FORBIDDEN",
            RiskError::OrgMismatch { .. } => "ORG_MISMATCH",
        }
    }
}
