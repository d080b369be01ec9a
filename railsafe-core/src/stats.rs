//! Aggregate views over a risk list
//!
//! Global invariants enforced:
//! - Aggregates are strictly derived (never stored, always computed)
//! - Every status and every classification appears in the counts, zero or not
//! - Classification is taken from the levels when they are valid, not from the stored tag
//! - Deterministic ordering

use crate::classification::Classification;
use crate::context::RequestContext;
use crate::level::{Axis, Level, MAX_LEVEL};
use crate::lifecycle::RiskStatus;
use crate::record::RiskRecord;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Inclusive calendar-date window on `createdAt`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Window of `days` calendar days ending on `today`
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        let span = chrono::Duration::days(days.saturating_sub(1) as i64);
        DateRange {
            from: today.checked_sub_signed(span),
            to: Some(today),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        self.from.map_or(true, |from| day >= from) && self.to.map_or(true, |to| day <= to)
    }
}

/// Counts by status and classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskStats {
    pub total: usize,
    pub by_status: BTreeMap<RiskStatus, usize>,
    pub by_classification: BTreeMap<Classification, usize>,
}

impl RiskStats {
    fn empty() -> Self {
        RiskStats {
            total: 0,
            by_status: RiskStatus::ALL.iter().map(|s| (*s, 0)).collect(),
            by_classification: Classification::ALL.iter().map(|c| (*c, 0)).collect(),
        }
    }

    pub fn status_count(&self, status: RiskStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn classification_count(&self, classification: Classification) -> usize {
        self.by_classification
            .get(&classification)
            .copied()
            .unwrap_or(0)
    }
}

/// Headline numbers for the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_risks: usize,
    pub extreme_risks: usize,
    pub high_risks: usize,
    pub open_risks: usize,
    pub in_treatment_risks: usize,
    pub mitigated_this_month: usize,
}

/// Per-cell risk counts of the 4×4 matrix, indexed `[frequency - 1][severity - 1]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatrixHeatmap {
    pub cells: [[usize; MAX_LEVEL as usize]; MAX_LEVEL as usize],
    /// Records whose levels are outside the grid
    pub off_grid: usize,
}

impl MatrixHeatmap {
    pub fn count(&self, frequency: Level, severity: Level) -> usize {
        self.cells[(frequency.get() - 1) as usize][(severity.get() - 1) as usize]
    }
}

/// Effective tier of a record: recomputed when possible
pub fn effective_classification(record: &RiskRecord) -> Classification {
    record
        .assessment()
        .map(|score| score.classification)
        .unwrap_or(record.classification)
}

/// Records belonging to the context's organization
pub fn scoped<'a>(ctx: &RequestContext, risks: &'a [RiskRecord]) -> Vec<&'a RiskRecord> {
    risks.iter().filter(|r| r.org_id == ctx.org_id).collect()
}

/// Count risks created inside `range` by status and classification
pub fn compute_stats<'a, I>(risks: I, range: &DateRange) -> RiskStats
where
    I: IntoIterator<Item = &'a RiskRecord>,
{
    let mut stats = RiskStats::empty();

    for risk in risks.into_iter().filter(|r| range.contains(r.created_at)) {
        stats.total += 1;
        *stats.by_status.entry(risk.status).or_insert(0) += 1;
        *stats
            .by_classification
            .entry(effective_classification(risk))
            .or_insert(0) += 1;
    }

    stats
}

/// Dashboard headline numbers as of `now`
pub fn dashboard_summary<'a, I>(risks: I, now: DateTime<Utc>) -> DashboardSummary
where
    I: IntoIterator<Item = &'a RiskRecord>,
{
    let mut summary = DashboardSummary {
        total_risks: 0,
        extreme_risks: 0,
        high_risks: 0,
        open_risks: 0,
        in_treatment_risks: 0,
        mitigated_this_month: 0,
    };

    for risk in risks {
        summary.total_risks += 1;
        match effective_classification(risk) {
            Classification::Extreme => summary.extreme_risks += 1,
            Classification::High => summary.high_risks += 1,
            _ => {}
        }
        match risk.status {
            RiskStatus::Open => summary.open_risks += 1,
            RiskStatus::InTreatment => summary.in_treatment_risks += 1,
            RiskStatus::Mitigated
                if risk.updated_at.year() == now.year()
                    && risk.updated_at.month() == now.month() =>
            {
                summary.mitigated_this_month += 1
            }
            _ => {}
        }
    }

    summary
}

/// Count risks per matrix cell
pub fn matrix_heatmap<'a, I>(risks: I) -> MatrixHeatmap
where
    I: IntoIterator<Item = &'a RiskRecord>,
{
    let mut heatmap = MatrixHeatmap::default();

    for risk in risks {
        let frequency = Level::new(Axis::Frequency, risk.frequency_level as i64);
        let severity = Level::new(Axis::Severity, risk.severity_level as i64);
        match (frequency, severity) {
            (Ok(f), Ok(s)) => {
                heatmap.cells[(f.get() - 1) as usize][(s.get() - 1) as usize] += 1;
            }
            _ => heatmap.off_grid += 1,
        }
    }

    heatmap
}

/// Effective score of a record: recomputed when possible
pub fn effective_score(record: &RiskRecord) -> u8 {
    record
        .assessment()
        .map(|score| score.score)
        .unwrap_or(record.risk_score)
}

/// Sort risks deterministically, most alarming first
///
/// 1. Effective score descending
/// 2. Last update descending
/// 3. Id ascending
pub fn sort_risks(mut risks: Vec<&RiskRecord>) -> Vec<&RiskRecord> {
    risks.sort_by(|a, b| {
        effective_score(b)
            .cmp(&effective_score(a))
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    risks
}

/// Risk-list narrowing; every `None` field matches all records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskFilter {
    /// Case-insensitive substring of the title or description
    pub search: Option<String>,
    pub status: Option<RiskStatus>,
    /// Compared with the effective classification
    pub classification: Option<Classification>,
    pub category_code: Option<String>,
    pub risk_manager_user_id: Option<String>,
    /// Inclusive bounds on the effective score
    pub min_score: Option<u8>,
    pub max_score: Option<u8>,
}

impl RiskFilter {
    pub fn matches(&self, record: &RiskRecord) -> bool {
        let score = effective_score(record);
        self.search_matches(record)
            && self.status.map_or(true, |status| status == record.status)
            && self
                .classification
                .map_or(true, |c| c == effective_classification(record))
            && self
                .category_code
                .as_deref()
                .map_or(true, |code| code == record.category_code)
            && self
                .risk_manager_user_id
                .as_deref()
                .map_or(true, |user| record.risk_manager_user_id.as_deref() == Some(user))
            && self.min_score.map_or(true, |min| score >= min)
            && self.max_score.map_or(true, |max| score <= max)
    }

    // A blank search box filters nothing
    fn search_matches(&self, record: &RiskRecord) -> bool {
        let needle = match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => needle.to_lowercase(),
            _ => return true,
        };
        record.title.to_lowercase().contains(&needle)
            || record.description.to_lowercase().contains(&needle)
    }
}

/// Records passing `filter`, in input order
pub fn filter_risks<'a, I>(risks: I, filter: &RiskFilter) -> Vec<&'a RiskRecord>
where
    I: IntoIterator<Item = &'a RiskRecord>,
{
    risks.into_iter().filter(|r| filter.matches(r)).collect()
}
