//! Classification policy - score to severity tier, tier to display
//!
//! Global invariants enforced:
//! - Bands partition 1..=16 with no gaps and no overlaps
//! - Classification is non-decreasing in score
//! - Every tier has exactly one color bucket and one label per locale

use crate::error::RiskError;
use crate::scoring::{MAX_SCORE, MIN_SCORE};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Inclusive lower bound of the MEDIUM band
pub const MEDIUM_THRESHOLD: u8 = 4;
/// Inclusive lower bound of the HIGH band
pub const HIGH_THRESHOLD: u8 = 8;
/// Inclusive lower bound of the EXTREME band
pub const EXTREME_THRESHOLD: u8 = 12;

/// Four severity tiers, ordered from least to most alarming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    Low,      // 1-3
    Medium,   // 4-7
    High,     // 8-11
    Extreme,  // 12-16
}

/// Legacy and short tags accepted on input, mapped onto the canonical tiers
const ALIASES: &[(&str, Classification)] = &[
    ("LOW", Classification::Low),
    ("LOW_GREEN", Classification::Low),
    ("NEGLIGIBLE_GREEN", Classification::Low),
    ("MEDIUM", Classification::Medium),
    ("MEDIUM_YELLOW", Classification::Medium),
    ("TOLERABLE_YELLOW", Classification::Medium),
    ("HIGH", Classification::High),
    ("HIGH_ORANGE", Classification::High),
    ("HIGH_ACTION_ORANGE", Classification::High),
    ("EXTREME", Classification::Extreme),
    ("EXTREME_RED", Classification::Extreme),
    ("CRITICAL", Classification::Extreme),
];

impl Classification {
    /// All tiers in ascending order
    pub const ALL: [Classification; 4] = [
        Classification::Low,
        Classification::Medium,
        Classification::High,
        Classification::Extreme,
    ];

    /// Canonical wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Low => "LOW_GREEN",
            Classification::Medium => "MEDIUM_YELLOW",
            Classification::High => "HIGH_ORANGE",
            Classification::Extreme => "EXTREME_RED",
        }
    }

    /// Short tier name
    pub fn name(&self) -> &'static str {
        match self {
            Classification::Low => "LOW",
            Classification::Medium => "MEDIUM",
            Classification::High => "HIGH",
            Classification::Extreme => "EXTREME",
        }
    }

    /// Ordinal rank (LOW = 0 .. EXTREME = 3)
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// Parse a canonical tag or any legacy alias
    ///
    /// Matching is exact, with no trimming or case folding.
    pub fn parse(tag: &str) -> Result<Self, RiskError> {
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == tag)
            .map(|(_, classification)| *classification)
            .ok_or_else(|| RiskError::InvalidClassification(tag.to_string()))
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Classification {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Classification::parse(s)
    }
}

impl Serialize for Classification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Classification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Classification::parse(&tag).map_err(serde::de::Error::custom)
    }
}

/// Map a score onto its tier
///
/// Bands (inclusive lower bounds):
/// - 1..=3   LOW
/// - 4..=7   MEDIUM
/// - 8..=11  HIGH
/// - 12..=16 EXTREME
pub fn classify(score: i64) -> Result<Classification, RiskError> {
    if !(MIN_SCORE as i64..=MAX_SCORE as i64).contains(&score) {
        return Err(RiskError::InvalidScore(score));
    }
    Ok(classify_in_range(score as u8))
}

/// Band assignment for a score already known to be in 1..=16
pub(crate) fn classify_in_range(score: u8) -> Classification {
    if score >= EXTREME_THRESHOLD {
        Classification::Extreme
    } else if score >= HIGH_THRESHOLD {
        Classification::High
    } else if score >= MEDIUM_THRESHOLD {
        Classification::Medium
    } else {
        Classification::Low
    }
}

/// Display locale for classification labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    He,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::He => "he",
        }
    }
}

/// Color bucket a tier is rendered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBucket {
    Green,
    Yellow,
    Orange,
    Red,
}

impl ColorBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorBucket::Green => "green",
            ColorBucket::Yellow => "yellow",
            ColorBucket::Orange => "orange",
            ColorBucket::Red => "red",
        }
    }
}

/// Label and color for one tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationDisplay {
    pub label: &'static str,
    pub color_bucket: ColorBucket,
}

/// Static display table: one color and one label per locale for each tier
pub fn label_and_color_of(classification: Classification, locale: Locale) -> ClassificationDisplay {
    let (color_bucket, en, he) = match classification {
        Classification::Low => (ColorBucket::Green, "Low", "נמוך"),
        Classification::Medium => (ColorBucket::Yellow, "Medium", "בינוני"),
        Classification::High => (ColorBucket::Orange, "High", "גבוה"),
        Classification::Extreme => (ColorBucket::Red, "Extreme", "קריטי"),
    };

    ClassificationDisplay {
        label: match locale {
            Locale::En => en,
            Locale::He => he,
        },
        color_bucket,
    }
}
