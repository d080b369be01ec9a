//! Risk status lifecycle
//!
//! Status changes are explicit, single-step and caller-directed. Nothing here
//! reacts to score changes or task completion.
//!
//! Global invariants enforced:
//! - Only members of the known state set are accepted
//! - Strict mode consults a fixed from -> to table; CLOSED leaves only via `reopen`
//! - A self-transition is always an accepted no-op

use crate::error::RiskError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RiskStatus {
    /// Not yet submitted
    Draft,
    /// Active; newly created or reopened
    Open,
    /// Mitigation work underway
    InTreatment,
    /// Mitigation complete; after-mitigation levels should be entered
    Mitigated,
    /// Acknowledged and tolerated without further mitigation
    Accepted,
    /// Terminal
    Closed,
}

/// Legacy status tags from older payloads
const ALIASES: &[(&str, RiskStatus)] = &[
    ("NEW", RiskStatus::Open),
    ("REQUIRES_TREATMENT", RiskStatus::Open),
    ("MITIGATION_PLANNED", RiskStatus::InTreatment),
    ("IN_PROGRESS", RiskStatus::InTreatment),
];

impl RiskStatus {
    pub const ALL: [RiskStatus; 6] = [
        RiskStatus::Draft,
        RiskStatus::Open,
        RiskStatus::InTreatment,
        RiskStatus::Mitigated,
        RiskStatus::Accepted,
        RiskStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskStatus::Draft => "DRAFT",
            RiskStatus::Open => "OPEN",
            RiskStatus::InTreatment => "IN_TREATMENT",
            RiskStatus::Mitigated => "MITIGATED",
            RiskStatus::Accepted => "ACCEPTED",
            RiskStatus::Closed => "CLOSED",
        }
    }

    /// Canonical spelling of a legacy tag; any other tag is returned as given
    ///
    /// Matching is exact, with no trimming or case folding.
    pub fn canonical_tag(tag: &str) -> &str {
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == tag)
            .map_or(tag, |(_, status)| status.as_str())
    }

    /// Parse a canonical tag or a legacy alias
    ///
    /// After alias mapping the tag must be a member of [`known_states`](Self::known_states),
    /// the same rule [`validate_status`] applies.
    pub fn parse(tag: &str) -> Result<Self, RiskError> {
        let canonical = Self::canonical_tag(tag);
        RiskStatus::ALL
            .iter()
            .find(|status| status.as_str() == canonical)
            .copied()
            .ok_or_else(|| RiskError::InvalidStatus(tag.to_string()))
    }

    /// Canonical tags of every state, for use with [`validate_status`]
    pub fn known_states() -> BTreeSet<String> {
        RiskStatus::ALL
            .iter()
            .map(|status| status.as_str().to_string())
            .collect()
    }

    /// Targets the strict table allows from this state
    pub fn allowed_targets(&self) -> &'static [RiskStatus] {
        use RiskStatus::*;
        match self {
            Draft => &[Open, Closed],
            Open => &[InTreatment, Accepted, Closed],
            InTreatment => &[Open, Mitigated, Accepted, Closed],
            Mitigated => &[InTreatment, Accepted, Closed],
            Accepted => &[InTreatment, Closed],
            Closed => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RiskStatus::Closed)
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskStatus {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskStatus::parse(s)
    }
}

impl Serialize for RiskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        RiskStatus::parse(&tag).map_err(serde::de::Error::custom)
    }
}

/// How strictly status changes are checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionMode {
    /// Any known state may follow any other
    Permissive,
    /// Only moves listed in [`RiskStatus::allowed_targets`]
    #[default]
    Strict,
}

impl TransitionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionMode::Permissive => "permissive",
            TransitionMode::Strict => "strict",
        }
    }
}

/// Check that a requested status is a member of the known state set
///
/// Membership is exact; aliases are the concern of [`RiskStatus::parse`].
pub fn validate_status<'a>(
    candidate: &'a str,
    known_states: &BTreeSet<String>,
) -> Result<&'a str, RiskError> {
    if known_states.contains(candidate) {
        Ok(candidate)
    } else {
        Err(RiskError::InvalidStatus(candidate.to_string()))
    }
}

/// Validate a single explicit status change
pub fn transition(
    from: RiskStatus,
    to: RiskStatus,
    mode: TransitionMode,
) -> Result<RiskStatus, RiskError> {
    if from == to || mode == TransitionMode::Permissive {
        return Ok(to);
    }

    if from.allowed_targets().contains(&to) {
        Ok(to)
    } else {
        Err(RiskError::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

/// Explicit reopen action: the only way out of CLOSED in strict mode
pub fn reopen(from: RiskStatus) -> Result<RiskStatus, RiskError> {
    if from == RiskStatus::Closed {
        Ok(RiskStatus::Open)
    } else {
        Err(RiskError::InvalidTransition {
            from: from.as_str().to_string(),
            to: RiskStatus::Open.as_str().to_string(),
        })
    }
}
