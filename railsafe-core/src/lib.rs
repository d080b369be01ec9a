//! Rail-Safe core library - risk scoring, classification and lifecycle model

#![deny(warnings)]

// Global invariants enforced in this crate:
// - score = frequency × severity on the closed 1..=4 grid, nothing else
// - Classification is always derived from a score, never chosen
// - No global mutable state: organization and caller travel in a RequestContext
// - No randomness, threads, or async; clocks are passed in by the caller
// - Deterministic ordering of every list and every map in output
// - Identical input yields byte-for-byte identical output

pub mod classification;
pub mod config;
pub mod context;
pub mod error;
pub mod level;
pub mod lifecycle;
pub mod record;
pub mod report;
pub mod scoring;
pub mod stats;

pub use classification::{
    classify, label_and_color_of, Classification, ClassificationDisplay, ColorBucket, Locale,
};
pub use config::ResolvedConfig;
pub use context::{OrgId, RequestContext, UserIdentity, UserRole};
pub use error::RiskError;
pub use level::{level_lookup, Axis, Level, LevelCatalog, LevelDefinition};
pub use lifecycle::{reopen, transition, validate_status, RiskStatus, TransitionMode};
pub use record::{RiskId, RiskRecord};
pub use report::{render_json, RiskReport};
pub use scoring::{score_of, RiskScore};
