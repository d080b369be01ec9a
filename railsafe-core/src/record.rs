//! Risk records and the requests that change them
//!
//! The owning risk service persists records; this module only computes and
//! validates the values a create/update/status/residual action would store.
//!
//! Global invariants enforced:
//! - Score and classification are recomputed whenever their levels change
//! - The after-mitigation pair is composed with the same rule, independently
//! - Every field of a request is validated before any field is applied
//! - Records are only touched from within their own organization

use crate::classification::Classification;
use crate::context::{OrgId, RequestContext};
use crate::error::RiskError;
use crate::lifecycle::{self, RiskStatus, TransitionMode};
use crate::scoring::RiskScore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum title length at creation, in characters
pub const TITLE_MIN_CHARS: usize = 5;
/// Minimum description length at creation, in characters
pub const DESCRIPTION_MIN_CHARS: usize = 10;

/// Opaque risk identifier assigned by the risk service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskId(pub String);

impl fmt::Display for RiskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A risk as held by the risk service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRecord {
    pub id: RiskId,
    pub org_id: OrgId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category_code: String,

    pub frequency_level: u8,
    pub severity_level: u8,
    pub risk_score: u8,
    pub classification: Classification,
    pub status: RiskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_manager_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_after: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_after: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_after: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_after: Option<Classification>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create-risk request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRisk {
    pub title: String,
    pub description: String,
    pub category_code: String,
    pub frequency_level: i64,
    pub severity_level: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_manager_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Save without submitting (initial status DRAFT instead of OPEN)
    #[serde(default)]
    pub draft: bool,
}

/// A create request that passed validation, with its computed score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskDraft {
    pub title: String,
    pub description: String,
    pub category_code: String,
    pub score: RiskScore,
    pub status: RiskStatus,
    pub risk_manager_user_id: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Partial update of a risk's fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_code: Option<String>,
    pub frequency_level: Option<i64>,
    pub severity_level: Option<i64>,
    pub risk_manager_user_id: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// After-mitigation levels, entered manually
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidualUpdate {
    pub frequency_after: i64,
    pub severity_after: i64,
}

/// Requested status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// A stored field that disagrees with what its inputs imply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Drift {
    pub field: &'static str,
    pub stored: String,
    pub expected: String,
}

fn validate_title(title: &str) -> Result<String, RiskError> {
    let title = title.trim();
    if title.chars().count() < TITLE_MIN_CHARS {
        return Err(RiskError::Validation {
            field: "title",
            reason: format!("must be at least {} characters", TITLE_MIN_CHARS),
        });
    }
    Ok(title.to_string())
}

fn validate_description(description: &str) -> Result<String, RiskError> {
    let description = description.trim();
    if description.chars().count() < DESCRIPTION_MIN_CHARS {
        return Err(RiskError::Validation {
            field: "description",
            reason: format!("must be at least {} characters", DESCRIPTION_MIN_CHARS),
        });
    }
    Ok(description.to_string())
}

fn validate_category(code: &str) -> Result<String, RiskError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(RiskError::Validation {
            field: "categoryCode",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(code.to_string())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl NewRisk {
    /// Validate every field and compute the initial score
    pub fn validate(&self) -> Result<RiskDraft, RiskError> {
        let title = validate_title(&self.title)?;
        let description = validate_description(&self.description)?;
        let category_code = validate_category(&self.category_code)?;
        let score = RiskScore::assess(self.frequency_level, self.severity_level)?;

        Ok(RiskDraft {
            title,
            description,
            category_code,
            score,
            status: if self.draft {
                RiskStatus::Draft
            } else {
                RiskStatus::Open
            },
            risk_manager_user_id: non_blank(&self.risk_manager_user_id),
            location: non_blank(&self.location),
            notes: non_blank(&self.notes),
        })
    }
}

impl RiskDraft {
    /// Materialize the record the risk service would store
    ///
    /// `id` and `now` come from the owning service.
    pub fn into_record(self, ctx: &RequestContext, id: RiskId, now: DateTime<Utc>) -> RiskRecord {
        RiskRecord {
            id,
            org_id: ctx.org_id.clone(),
            title: self.title,
            description: self.description,
            category_code: self.category_code,
            frequency_level: self.score.frequency_level.get(),
            severity_level: self.score.severity_level.get(),
            risk_score: self.score.score,
            classification: self.score.classification,
            status: self.status,
            risk_manager_user_id: self.risk_manager_user_id,
            location: self.location,
            notes: self.notes,
            frequency_after: None,
            severity_after: None,
            score_after: None,
            classification_after: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl RiskRecord {
    /// Current score recomputed from the stored levels
    pub fn assessment(&self) -> Result<RiskScore, RiskError> {
        RiskScore::assess(self.frequency_level as i64, self.severity_level as i64)
    }

    /// After-mitigation score, if both after levels are present
    pub fn residual_assessment(&self) -> Option<Result<RiskScore, RiskError>> {
        match (self.frequency_after, self.severity_after) {
            (Some(f), Some(s)) => Some(RiskScore::assess(f as i64, s as i64)),
            _ => None,
        }
    }

    pub fn has_residual(&self) -> bool {
        self.frequency_after.is_some() && self.severity_after.is_some()
    }

    fn set_score(&mut self, score: RiskScore) {
        self.frequency_level = score.frequency_level.get();
        self.severity_level = score.severity_level.get();
        self.risk_score = score.score;
        self.classification = score.classification;
    }

    fn set_residual(&mut self, score: RiskScore) {
        self.frequency_after = Some(score.frequency_level.get());
        self.severity_after = Some(score.severity_level.get());
        self.score_after = Some(score.score);
        self.classification_after = Some(score.classification);
    }

    /// Apply a partial field update
    ///
    /// When either level is supplied the other is taken from the record, and
    /// score and classification are recomputed from the resulting pair.
    pub fn apply_update(
        &mut self,
        ctx: &RequestContext,
        update: &RiskUpdate,
        now: DateTime<Utc>,
    ) -> Result<(), RiskError> {
        ctx.ensure_org(&self.org_id)?;

        let title = update.title.as_deref().map(validate_title).transpose()?;
        let description = update
            .description
            .as_deref()
            .map(validate_description)
            .transpose()?;
        let category_code = update
            .category_code
            .as_deref()
            .map(validate_category)
            .transpose()?;

        let score = if update.frequency_level.is_some() || update.severity_level.is_some() {
            Some(RiskScore::assess(
                update.frequency_level.unwrap_or(self.frequency_level as i64),
                update.severity_level.unwrap_or(self.severity_level as i64),
            )?)
        } else {
            None
        };

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(category_code) = category_code {
            self.category_code = category_code;
        }
        if let Some(score) = score {
            self.set_score(score);
        }
        if update.risk_manager_user_id.is_some() {
            self.risk_manager_user_id = non_blank(&update.risk_manager_user_id);
        }
        if update.location.is_some() {
            self.location = non_blank(&update.location);
        }
        if update.notes.is_some() {
            self.notes = non_blank(&update.notes);
        }

        self.updated_at = now;
        Ok(())
    }

    /// Enter the after-mitigation levels
    pub fn apply_residual(
        &mut self,
        ctx: &RequestContext,
        update: &ResidualUpdate,
        now: DateTime<Utc>,
    ) -> Result<RiskScore, RiskError> {
        ctx.ensure_org(&self.org_id)?;

        let score = RiskScore::assess(update.frequency_after, update.severity_after)?;
        self.set_residual(score);
        self.updated_at = now;
        Ok(score)
    }

    /// Change status through the lifecycle rules
    ///
    /// In strict mode MITIGATED additionally requires the after-mitigation
    /// levels to have been entered.
    pub fn apply_status(
        &mut self,
        ctx: &RequestContext,
        update: &StatusUpdate,
        mode: TransitionMode,
        now: DateTime<Utc>,
    ) -> Result<RiskStatus, RiskError> {
        ctx.ensure_org(&self.org_id)?;

        let tag = RiskStatus::canonical_tag(&update.status);
        lifecycle::validate_status(tag, &RiskStatus::known_states())?;
        let target = RiskStatus::parse(tag)?;
        let next = lifecycle::transition(self.status, target, mode).map_err(|e| {
            tracing::warn!(
                risk = %self.id,
                from = %self.status,
                to = %target,
                "status change rejected"
            );
            e
        })?;

        if mode == TransitionMode::Strict
            && next == RiskStatus::Mitigated
            && self.status != RiskStatus::Mitigated
            && !self.has_residual()
        {
            return Err(RiskError::MissingResidual);
        }

        self.status = next;
        self.updated_at = now;
        Ok(next)
    }

    /// Explicit reopen of a CLOSED risk
    pub fn apply_reopen(
        &mut self,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<RiskStatus, RiskError> {
        ctx.ensure_org(&self.org_id)?;

        let next = lifecycle::reopen(self.status)?;
        self.status = next;
        self.updated_at = now;
        Ok(next)
    }

    /// Compare stored derived fields with a recomputation from their inputs
    ///
    /// Returns an empty list for a consistent record.
    pub fn check_consistency(&self) -> Vec<Drift> {
        let mut drifts = Vec::new();

        match self.assessment() {
            Ok(expected) => {
                if self.risk_score != expected.score {
                    drifts.push(Drift {
                        field: "riskScore",
                        stored: self.risk_score.to_string(),
                        expected: expected.score.to_string(),
                    });
                }
                if self.classification != expected.classification {
                    drifts.push(Drift {
                        field: "classification",
                        stored: self.classification.as_str().to_string(),
                        expected: expected.classification.as_str().to_string(),
                    });
                }
            }
            Err(err) => drifts.push(Drift {
                field: "levels",
                stored: format!("{}x{}", self.frequency_level, self.severity_level),
                expected: err.to_string(),
            }),
        }

        match self.residual_assessment() {
            Some(Ok(expected)) => {
                if self.score_after != Some(expected.score) {
                    drifts.push(Drift {
                        field: "scoreAfter",
                        stored: display_option(self.score_after),
                        expected: expected.score.to_string(),
                    });
                }
                if self.classification_after != Some(expected.classification) {
                    drifts.push(Drift {
                        field: "classificationAfter",
                        stored: display_option(self.classification_after.map(|c| c.as_str())),
                        expected: expected.classification.as_str().to_string(),
                    });
                }
            }
            Some(Err(err)) => drifts.push(Drift {
                field: "afterLevels",
                stored: format!(
                    "{}x{}",
                    display_option(self.frequency_after),
                    display_option(self.severity_after)
                ),
                expected: err.to_string(),
            }),
            None => {
                if self.frequency_after.is_some() != self.severity_after.is_some() {
                    drifts.push(Drift {
                        field: "afterLevels",
                        stored: format!(
                            "{}x{}",
                            display_option(self.frequency_after),
                            display_option(self.severity_after)
                        ),
                        expected: "both or neither after-mitigation level".to_string(),
                    });
                }
            }
        }

        if !drifts.is_empty() {
            tracing::debug!(risk = %self.id, count = drifts.len(), "derived fields drifted");
        }

        drifts
    }

    /// Overwrite derived fields with a recomputation from their inputs
    pub fn recompute(&mut self) -> Result<(), RiskError> {
        let score = self.assessment()?;
        let residual = self.residual_assessment().transpose()?;

        self.set_score(score);
        if let Some(residual) = residual {
            self.set_residual(residual);
        }
        Ok(())
    }
}

fn display_option<T: fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx() -> RequestContext {
        RequestContext::for_org(OrgId::new("org-1").unwrap())
    }

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    fn new_risk() -> NewRisk {
        NewRisk {
            title: "Track washout".to_string(),
            description: "Embankment erosion near km 42 after heavy rain".to_string(),
            category_code: "INFRA_TRACK".to_string(),
            frequency_level: 2,
            severity_level: 4,
            risk_manager_user_id: None,
            location: Some("  ".to_string()),
            notes: None,
            draft: false,
        }
    }

    fn record() -> RiskRecord {
        new_risk()
            .validate()
            .unwrap()
            .into_record(&ctx(), RiskId("r-1".to_string()), t(8))
    }

    #[test]
    fn test_create_computes_score() {
        let record = record();
        assert_eq!(record.risk_score, 8);
        assert_eq!(record.classification, Classification::High);
        assert_eq!(record.status, RiskStatus::Open);
        assert_eq!(record.location, None);
        assert_eq!(record.created_at, record.updated_at);
        assert!(record.check_consistency().is_empty());
    }

    #[test]
    fn test_create_as_draft() {
        let mut request = new_risk();
        request.draft = true;
        assert_eq!(request.validate().unwrap().status, RiskStatus::Draft);
    }

    #[test]
    fn test_create_validation() {
        let mut request = new_risk();
        request.title = "Leak".to_string();
        assert!(matches!(
            request.validate(),
            Err(RiskError::Validation { field: "title", .. })
        ));

        let mut request = new_risk();
        request.description = "  too short  ".to_string();
        assert!(matches!(
            request.validate(),
            Err(RiskError::Validation { field: "description", .. })
        ));

        let mut request = new_risk();
        request.category_code = String::new();
        assert!(matches!(
            request.validate(),
            Err(RiskError::Validation { field: "categoryCode", .. })
        ));

        let mut request = new_risk();
        request.severity_level = 5;
        assert_eq!(request.validate().unwrap_err().code(), "INVALID_LEVEL");
    }

    #[test]
    fn test_title_length_counts_characters() {
        let mut request = new_risk();
        // five Hebrew letters, ten bytes
        request.title = "סיכון".to_string();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_update_recomputes_score() {
        let mut record = record();
        let update = RiskUpdate {
            frequency_level: Some(4),
            ..Default::default()
        };
        record.apply_update(&ctx(), &update, t(9)).unwrap();
        assert_eq!(record.frequency_level, 4);
        assert_eq!(record.severity_level, 4);
        assert_eq!(record.risk_score, 16);
        assert_eq!(record.classification, Classification::Extreme);
        assert_eq!(record.updated_at, t(9));
        assert!(record.check_consistency().is_empty());
    }

    #[test]
    fn test_invalid_update_changes_nothing() {
        let mut record = record();
        let before = record.clone();
        let update = RiskUpdate {
            title: Some("A better title".to_string()),
            severity_level: Some(0),
            ..Default::default()
        };
        let err = record.apply_update(&ctx(), &update, t(9)).unwrap_err();
        assert_eq!(err.code(), "INVALID_LEVEL");
        assert_eq!(record, before);
    }

    #[test]
    fn test_update_rejects_other_org() {
        let mut record = record();
        let other = RequestContext::for_org(OrgId::new("org-2").unwrap());
        let err = record
            .apply_update(&other, &RiskUpdate::default(), t(9))
            .unwrap_err();
        assert_eq!(err.code(), "ORG_MISMATCH");
    }

    #[test]
    fn test_residual_is_independent() {
        let mut record = record();
        let residual = record
            .apply_residual(
                &ctx(),
                &ResidualUpdate {
                    frequency_after: 1,
                    severity_after: 3,
                },
                t(10),
            )
            .unwrap();
        assert_eq!(residual.score, 3);
        assert_eq!(record.classification_after, Some(Classification::Low));
        assert_eq!(record.risk_score, 8);
        assert_eq!(record.classification, Classification::High);
    }

    #[test]
    fn test_mitigated_requires_residual_in_strict_mode() {
        let mut record = record();
        let to = |s: &str| StatusUpdate {
            status: s.to_string(),
        };

        record
            .apply_status(&ctx(), &to("IN_TREATMENT"), TransitionMode::Strict, t(9))
            .unwrap();
        let err = record
            .apply_status(&ctx(), &to("MITIGATED"), TransitionMode::Strict, t(10))
            .unwrap_err();
        assert_eq!(err, RiskError::MissingResidual);
        assert_eq!(record.status, RiskStatus::InTreatment);

        record
            .apply_residual(
                &ctx(),
                &ResidualUpdate {
                    frequency_after: 1,
                    severity_after: 4,
                },
                t(10),
            )
            .unwrap();
        let status = record
            .apply_status(&ctx(), &to("MITIGATED"), TransitionMode::Strict, t(11))
            .unwrap();
        assert_eq!(status, RiskStatus::Mitigated);
    }

    #[test]
    fn test_permissive_status_jumps() {
        let mut record = record();
        let update = StatusUpdate {
            status: "MITIGATED".to_string(),
        };
        record
            .apply_status(&ctx(), &update, TransitionMode::Permissive, t(9))
            .unwrap();
        assert_eq!(record.status, RiskStatus::Mitigated);
    }

    #[test]
    fn test_unknown_status_rejected() {
        let mut record = record();
        let update = StatusUpdate {
            status: "BOGUS".to_string(),
        };
        let err = record
            .apply_status(&ctx(), &update, TransitionMode::Permissive, t(9))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATUS");
    }

    #[test]
    fn test_status_update_matches_validate_status() {
        let known = RiskStatus::known_states();
        for candidate in [" closed ", "closed", "Closed", "CLOSED ", "in_treatment"] {
            let mut record = record();
            let update = StatusUpdate {
                status: candidate.to_string(),
            };
            let expected = lifecycle::validate_status(candidate, &known).unwrap_err();
            assert_eq!(
                record.apply_status(&ctx(), &update, TransitionMode::Permissive, t(9)),
                Err(expected),
                "{candidate:?}"
            );
            assert_eq!(record.status, RiskStatus::Open);
            assert_eq!(record.updated_at, t(8));
        }

        // Legacy tags still map onto the canonical state
        let mut record = record();
        let update = StatusUpdate {
            status: "IN_PROGRESS".to_string(),
        };
        assert_eq!(
            record.apply_status(&ctx(), &update, TransitionMode::Strict, t(9)),
            Ok(RiskStatus::InTreatment)
        );
    }

    #[test]
    fn test_closed_requires_reopen() {
        let mut record = record();
        let close = StatusUpdate {
            status: "CLOSED".to_string(),
        };
        let open = StatusUpdate {
            status: "OPEN".to_string(),
        };
        record
            .apply_status(&ctx(), &close, TransitionMode::Strict, t(9))
            .unwrap();
        assert!(record
            .apply_status(&ctx(), &open, TransitionMode::Strict, t(10))
            .is_err());
        assert_eq!(record.apply_reopen(&ctx(), t(10)).unwrap(), RiskStatus::Open);
        assert_eq!(record.updated_at, t(10));
    }

    #[test]
    fn test_drift_detection_and_recompute() {
        let mut record = record();
        record.risk_score = 9;
        record.classification = Classification::Low;
        record.frequency_after = Some(2);

        let drifts = record.check_consistency();
        let fields: Vec<_> = drifts.iter().map(|d| d.field).collect();
        assert_eq!(fields, vec!["riskScore", "classification", "afterLevels"]);
        assert_eq!(drifts[0].expected, "8");

        record.severity_after = Some(2);
        record.recompute().unwrap();
        assert!(record.check_consistency().is_empty());
        assert_eq!(record.score_after, Some(4));
        assert_eq!(record.classification_after, Some(Classification::Medium));
    }

    #[test]
    fn test_parses_service_payload_with_legacy_tags() {
        let json = r#"{
            "id": "42",
            "orgId": "org-1",
            "title": "Signal failure",
            "description": "Intermittent red aspect at junction",
            "categoryCode": "SIGNALLING",
            "frequencyLevel": 3,
            "severityLevel": 3,
            "riskScore": 9,
            "classification": "HIGH_ACTION_ORANGE",
            "status": "NEW",
            "createdAt": "2025-02-01T10:00:00Z",
            "updatedAt": "2025-02-02T10:00:00Z"
        }"#;
        let record: RiskRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.classification, Classification::High);
        assert_eq!(record.status, RiskStatus::Open);
        assert!(record.check_consistency().is_empty());

        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["classification"], "HIGH_ORANGE");
        assert_eq!(out["status"], "OPEN");
        assert!(out.get("scoreAfter").is_none());
    }
}
