//! Level catalog - the labeled rungs of the frequency and severity axes
//!
//! Global invariants enforced:
//! - Level values are exactly 1..=4 on each axis
//! - A loaded axis carries exactly four levels with no gaps or duplicates
//! - Lookups never fail for a valid level; a missing slot synthesizes a fallback
//!
//! The catalog only affects display labels. Scoring depends on level numbers
//! alone, so an absent or partial catalog never blocks scoring.

use crate::context::RequestContext;
use crate::error::RiskError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest level on either axis
pub const MIN_LEVEL: u8 = 1;
/// Highest level on either axis
pub const MAX_LEVEL: u8 = 4;

/// One of the two independent scales composed into a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Axis {
    /// Likelihood of occurrence
    Frequency,
    /// Impact if it occurs
    Severity,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Frequency => "FREQUENCY",
            Axis::Severity => "SEVERITY",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated rung (1..=4) on one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Level(u8);

impl Level {
    /// All levels in ascending order
    pub const ALL: [Level; 4] = [Level(1), Level(2), Level(3), Level(4)];

    /// Validate a raw level for the given axis
    ///
    /// Out-of-range values are rejected, never clamped.
    pub fn new(axis: Axis, value: i64) -> Result<Self, RiskError> {
        if (MIN_LEVEL as i64..=MAX_LEVEL as i64).contains(&value) {
            Ok(Level(value as u8))
        } else {
            Err(RiskError::InvalidLevel { axis, value })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Label and description an organization attaches to one level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDefinition {
    pub level: u8,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

impl LevelDefinition {
    /// Synthesized definition used when the catalog has no entry
    pub fn fallback(axis: Axis, level: Level) -> Self {
        LevelDefinition {
            level: level.get(),
            label: format!("{} {}", axis, level),
            description: String::new(),
        }
    }
}

/// Default labels an organization is provisioned with
const SEEDED_FREQUENCY_LABELS: [&str; 4] = ["Rare", "Possible", "Likely", "Almost certain"];
const SEEDED_SEVERITY_LABELS: [&str; 4] = ["Negligible", "Minor", "Significant", "Catastrophic"];

/// Per-organization level customizations for both axes
///
/// Serialized in the shape of the organization service's risk-matrix resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LevelCatalog {
    #[serde(default)]
    pub frequency_levels: Vec<LevelDefinition>,
    #[serde(default)]
    pub severity_levels: Vec<LevelDefinition>,
}

impl LevelCatalog {
    /// Catalog with nothing customized; every lookup falls back
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog seeded with the provisioning defaults
    pub fn seeded() -> Self {
        let seed = |labels: [&str; 4]| {
            Level::ALL
                .iter()
                .zip(labels)
                .map(|(level, label)| LevelDefinition {
                    level: level.get(),
                    label: label.to_string(),
                    description: String::new(),
                })
                .collect()
        };

        LevelCatalog {
            frequency_levels: seed(SEEDED_FREQUENCY_LABELS),
            severity_levels: seed(SEEDED_SEVERITY_LABELS),
        }
    }

    fn axis_levels(&self, axis: Axis) -> &[LevelDefinition] {
        match axis {
            Axis::Frequency => &self.frequency_levels,
            Axis::Severity => &self.severity_levels,
        }
    }

    fn axis_levels_mut(&mut self, axis: Axis) -> &mut Vec<LevelDefinition> {
        match axis {
            Axis::Frequency => &mut self.frequency_levels,
            Axis::Severity => &mut self.severity_levels,
        }
    }

    /// Check the four-levels-per-axis invariant
    ///
    /// An empty axis is accepted (not loaded yet). Any other axis must hold
    /// exactly the levels 1, 2, 3 and 4.
    pub fn validate(&self) -> Result<(), RiskError> {
        for axis in [Axis::Frequency, Axis::Severity] {
            let levels = self.axis_levels(axis);
            if levels.is_empty() {
                continue;
            }

            let mut seen = [false; MAX_LEVEL as usize];
            for def in levels {
                if !(MIN_LEVEL..=MAX_LEVEL).contains(&def.level) {
                    return Err(RiskError::InvalidCatalog(format!(
                        "{} level {} is outside 1..=4",
                        axis, def.level
                    )));
                }
                let slot = &mut seen[(def.level - 1) as usize];
                if *slot {
                    return Err(RiskError::InvalidCatalog(format!(
                        "{} level {} is defined more than once",
                        axis, def.level
                    )));
                }
                *slot = true;
            }

            if let Some(missing) = seen.iter().position(|present| !present) {
                return Err(RiskError::InvalidCatalog(format!(
                    "{} level {} is missing",
                    axis,
                    missing + 1
                )));
            }
        }

        Ok(())
    }

    /// Look up one slot, if the organization defined it
    pub fn get(&self, axis: Axis, level: Level) -> Option<&LevelDefinition> {
        self.axis_levels(axis)
            .iter()
            .find(|def| def.level == level.get())
    }

    /// All four definitions for an axis, ascending, with fallbacks filled in
    pub fn levels(&self, axis: Axis) -> Vec<LevelDefinition> {
        Level::ALL
            .iter()
            .map(|&level| level_lookup(axis, level, Some(self)))
            .collect()
    }

    /// Replace the description of one slot
    ///
    /// This is the only mutation an organization performs on its catalog.
    /// Slots that were never loaded are seeded with fallback labels first, so
    /// the edited axis always ends up holding all four levels.
    pub fn update_description(
        &mut self,
        axis: Axis,
        level: i64,
        description: impl Into<String>,
    ) -> Result<&LevelDefinition, RiskError> {
        let level = Level::new(axis, level)?;
        let levels = self.axis_levels_mut(axis);

        for slot in Level::ALL {
            if !levels.iter().any(|def| def.level == slot.get()) {
                levels.push(LevelDefinition::fallback(axis, slot));
            }
        }
        levels.sort_by_key(|def| def.level);

        let index = levels
            .iter()
            .position(|def| def.level == level.get())
            .ok_or_else(|| {
                RiskError::InvalidCatalog(format!("{} level {} is missing", axis, level))
            })?;

        levels[index].description = description.into();
        Ok(&levels[index])
    }

    /// [`update_description`](Self::update_description) on behalf of a caller
    ///
    /// Only ADMIN and CHIEF_RISK_MANAGER may edit level descriptions.
    pub fn update_description_as(
        &mut self,
        ctx: &RequestContext,
        axis: Axis,
        level: i64,
        description: impl Into<String>,
    ) -> Result<&LevelDefinition, RiskError> {
        if !ctx.can_edit_catalog() {
            return Err(RiskError::Forbidden {
                action: "edit level descriptions",
            });
        }
        self.update_description(axis, level, description)
    }
}

/// Resolve the display definition for a level
///
/// Returns the organization's definition when present, otherwise a
/// synthesized `"<AXIS> <n>"` label with an empty description. An absent
/// catalog behaves like an empty one.
pub fn level_lookup(axis: Axis, level: Level, catalog: Option<&LevelCatalog>) -> LevelDefinition {
    match catalog.and_then(|c| c.get(axis, level)) {
        Some(def) => def.clone(),
        None => {
            tracing::debug!(
                axis = axis.as_str(),
                level = level.get(),
                "catalog miss, using fallback label"
            );
            LevelDefinition::fallback(axis, level)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(value: i64) -> Level {
        Level::new(Axis::Frequency, value).unwrap()
    }

    #[test]
    fn test_level_range() {
        for value in 1..=4 {
            assert_eq!(Level::new(Axis::Frequency, value).unwrap().get(), value as u8);
        }
        assert_eq!(
            Level::new(Axis::Severity, 0),
            Err(RiskError::InvalidLevel {
                axis: Axis::Severity,
                value: 0
            })
        );
        assert!(Level::new(Axis::Frequency, 5).is_err());
        assert!(Level::new(Axis::Frequency, -1).is_err());
        assert!(Level::new(Axis::Frequency, i64::MAX).is_err());
    }

    #[test]
    fn test_lookup_falls_back_on_empty_catalog() {
        let def = level_lookup(Axis::Frequency, level(3), Some(&LevelCatalog::empty()));
        assert_eq!(def.label, "FREQUENCY 3");
        assert_eq!(def.description, "");
        assert_eq!(def.level, 3);
    }

    #[test]
    fn test_lookup_falls_back_on_absent_catalog() {
        let def = level_lookup(Axis::Severity, level(1), None);
        assert_eq!(def.label, "SEVERITY 1");
    }

    #[test]
    fn test_lookup_uses_organization_label() {
        let catalog = LevelCatalog::seeded();
        let def = level_lookup(Axis::Severity, level(4), Some(&catalog));
        assert_eq!(def.label, "Catastrophic");
        let def = level_lookup(Axis::Frequency, level(1), Some(&catalog));
        assert_eq!(def.label, "Rare");
    }

    #[test]
    fn test_partial_catalog_falls_back_per_slot() {
        let catalog = LevelCatalog {
            frequency_levels: vec![LevelDefinition {
                level: 2,
                label: "Sometimes".to_string(),
                description: "A few times a year".to_string(),
            }],
            severity_levels: vec![],
        };
        let levels = catalog.levels(Axis::Frequency);
        let labels: Vec<_> = levels.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["FREQUENCY 1", "Sometimes", "FREQUENCY 3", "FREQUENCY 4"]);
    }

    #[test]
    fn test_seeded_catalog_is_valid() {
        LevelCatalog::seeded().validate().unwrap();
        LevelCatalog::empty().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_duplicates_and_gaps() {
        let mut catalog = LevelCatalog::seeded();
        catalog.severity_levels[3].level = 3;
        let err = catalog.validate().unwrap_err();
        assert_eq!(err.code(), "INVALID_CATALOG");
        assert!(err.to_string().contains("more than once"));

        let mut catalog = LevelCatalog::seeded();
        catalog.frequency_levels.pop();
        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("FREQUENCY level 4 is missing"));

        let mut catalog = LevelCatalog::seeded();
        catalog.frequency_levels[0].level = 7;
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_update_description() {
        let mut catalog = LevelCatalog::seeded();
        let updated = catalog
            .update_description(Axis::Severity, 2, "Minor injury, no service impact")
            .unwrap();
        assert_eq!(updated.label, "Minor");
        assert_eq!(updated.description, "Minor injury, no service impact");
        catalog.validate().unwrap();
    }

    #[test]
    fn test_update_description_seeds_missing_slot() {
        let mut catalog = LevelCatalog::empty();
        catalog
            .update_description(Axis::Frequency, 3, "Monthly")
            .unwrap();
        let def = catalog.get(Axis::Frequency, level(3)).unwrap();
        assert_eq!(def.label, "FREQUENCY 3");
        assert_eq!(def.description, "Monthly");

        // The edited axis is complete; the untouched one stays empty
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.frequency_levels.len(), 4);
        assert!(catalog.severity_levels.is_empty());
    }

    #[test]
    fn test_update_description_completes_partial_axis() {
        let mut catalog = LevelCatalog {
            frequency_levels: vec![LevelDefinition {
                level: 2,
                label: "Sometimes".to_string(),
                description: String::new(),
            }],
            severity_levels: vec![],
        };
        catalog
            .update_description(Axis::Frequency, 2, "A few times a year")
            .unwrap();
        assert!(catalog.validate().is_ok());
        let labels: Vec<_> = catalog
            .levels(Axis::Frequency)
            .into_iter()
            .map(|d| d.label)
            .collect();
        assert_eq!(labels, vec!["FREQUENCY 1", "Sometimes", "FREQUENCY 3", "FREQUENCY 4"]);
    }

    #[test]
    fn test_update_description_rejects_invalid_level() {
        let mut catalog = LevelCatalog::seeded();
        let err = catalog
            .update_description(Axis::Frequency, 5, "nope")
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_LEVEL");
    }

    #[test]
    fn test_update_description_requires_catalog_role() {
        use crate::context::{OrgId, UserIdentity, UserRole};

        let ctx = RequestContext::for_org(OrgId::new("org-1").unwrap());
        let mut catalog = LevelCatalog::seeded();

        let err = catalog
            .update_description_as(&ctx, Axis::Severity, 1, "Scratch")
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        let admin = ctx.with_user(UserIdentity {
            user_id: "u-1".to_string(),
            role: UserRole::Admin,
        });
        catalog
            .update_description_as(&admin, Axis::Severity, 1, "Scratch")
            .unwrap();
        assert_eq!(catalog.severity_levels[0].description, "Scratch");
    }

    #[test]
    fn test_catalog_parses_matrix_resource() {
        let json = r#"{
            "frequencyLevels": [
                {"level": 1, "label": "Rare", "description": "Once in ten years"},
                {"level": 2, "label": "Possible", "description": ""},
                {"level": 3, "label": "Likely"},
                {"level": 4, "label": "Almost certain", "description": "Weekly"}
            ],
            "severityLevels": []
        }"#;
        let catalog: LevelCatalog = serde_json::from_str(json).unwrap();
        catalog.validate().unwrap();
        assert_eq!(catalog.frequency_levels[2].description, "");
        assert_eq!(catalog.levels(Axis::Severity)[0].label, "SEVERITY 1");
    }
}
