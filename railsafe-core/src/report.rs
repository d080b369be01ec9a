//! Reporting and output generation
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Byte-for-byte identical output across runs
//! - Every classification shown is recomputed from its levels

use crate::classification::{label_and_color_of, Classification, ColorBucket, Locale};
use crate::level::{Axis, Level, LevelCatalog};
use crate::lifecycle::RiskStatus;
use crate::record::{Drift, RiskId, RiskRecord};
use crate::scoring::RiskScore;
use crate::stats::{
    compute_stats, dashboard_summary, effective_classification, effective_score, matrix_heatmap,
    sort_risks, DashboardSummary, DateRange, MatrixHeatmap, RiskStats,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A scored pair with its display attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub frequency_level: u8,
    pub severity_level: u8,
    pub score: u8,
    pub classification: Classification,
    pub label: &'static str,
    pub color_bucket: ColorBucket,
}

impl ScoreReport {
    pub fn new(score: &RiskScore, locale: Locale) -> Self {
        let display = label_and_color_of(score.classification, locale);
        ScoreReport {
            frequency_level: score.frequency_level.get(),
            severity_level: score.severity_level.get(),
            score: score.score,
            classification: score.classification,
            label: display.label,
            color_bucket: display.color_bucket,
        }
    }
}

/// One line of a risk listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRow {
    pub id: RiskId,
    pub title: String,
    pub status: RiskStatus,
    pub frequency_level: u8,
    pub severity_level: u8,
    pub score: u8,
    pub classification: Classification,
    pub label: &'static str,
    pub color_bucket: ColorBucket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_after: Option<u8>,
    pub updated_at: DateTime<Utc>,
}

impl RiskRow {
    pub fn from_record(record: &RiskRecord, locale: Locale) -> Self {
        let classification = effective_classification(record);
        let score = effective_score(record);
        let score_after = match record.residual_assessment() {
            Some(Ok(residual)) => Some(residual.score),
            _ => record.score_after,
        };
        let display = label_and_color_of(classification, locale);

        RiskRow {
            id: record.id.clone(),
            title: record.title.clone(),
            status: record.status,
            frequency_level: record.frequency_level,
            severity_level: record.severity_level,
            score,
            classification,
            label: display.label,
            color_bucket: display.color_bucket,
            score_after,
            updated_at: record.updated_at,
        }
    }
}

/// Inclusive date bounds a report was computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
}

/// Complete report over a risk list
///
/// `summary` covers every record given; `stats`, `heatmap` and `risks`
/// cover only the records created inside the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    pub window: ReportWindow,
    pub summary: DashboardSummary,
    pub stats: RiskStats,
    pub heatmap: MatrixHeatmap,
    pub risks: Vec<RiskRow>,
}

impl RiskReport {
    /// Build a report for already-scoped records
    pub fn build(
        risks: &[&RiskRecord],
        range: &DateRange,
        now: DateTime<Utc>,
        locale: Locale,
        top_n: Option<usize>,
    ) -> Self {
        let in_window: Vec<&RiskRecord> = risks
            .iter()
            .copied()
            .filter(|r| range.contains(r.created_at))
            .collect();

        let summary = dashboard_summary(risks.iter().copied(), now);
        let stats = compute_stats(in_window.iter().copied(), &DateRange::default());
        let heatmap = matrix_heatmap(in_window.iter().copied());

        let mut sorted = sort_risks(in_window);
        if let Some(n) = top_n {
            sorted.truncate(n);
        }

        RiskReport {
            window: ReportWindow {
                from: range.from,
                to: range.to,
            },
            summary,
            stats,
            heatmap,
            risks: sorted
                .into_iter()
                .map(|r| RiskRow::from_record(r, locale))
                .collect(),
        }
    }
}

/// Derived-field drift found on one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub id: RiskId,
    pub drifts: Vec<Drift>,
}

/// Collect drift for every inconsistent record, in id order
pub fn collect_drift<'a, I>(risks: I) -> Vec<DriftReport>
where
    I: IntoIterator<Item = &'a RiskRecord>,
{
    let mut reports: Vec<DriftReport> = risks
        .into_iter()
        .filter_map(|r| {
            let drifts = r.check_consistency();
            if drifts.is_empty() {
                None
            } else {
                Some(DriftReport {
                    id: r.id.clone(),
                    drifts,
                })
            }
        })
        .collect();
    reports.sort_by(|a, b| a.id.cmp(&b.id));
    reports
}

/// Render a single score as text
pub fn render_score_text(report: &ScoreReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<6} {:<6} {:<6} {:<16} {:<10} {}\n",
        "FREQ", "SEV", "SCORE", "CLASS", "LABEL", "COLOR"
    ));
    output.push_str(&format!(
        "{:<6} {:<6} {:<6} {:<16} {:<10} {}\n",
        report.frequency_level,
        report.severity_level,
        report.score,
        report.classification.as_str(),
        truncate_or_pad(report.label, 10).trim_end(),
        report.color_bucket.as_str(),
    ));
    output
}

/// Render the 4×4 matrix as text
///
/// Rows run from the highest frequency down, columns from the lowest
/// severity up. When a heatmap is given each cell carries its risk count.
pub fn render_matrix_text(catalog: &LevelCatalog, heatmap: Option<&MatrixHeatmap>) -> String {
    const LABEL_WIDTH: usize = 22;
    const CELL_WIDTH: usize = 18;

    let frequency_defs = catalog.levels(Axis::Frequency);
    let severity_defs = catalog.levels(Axis::Severity);

    let mut output = String::new();

    output.push_str(&truncate_or_pad("FREQUENCY \\ SEVERITY", LABEL_WIDTH));
    for def in &severity_defs {
        output.push(' ');
        output.push_str(&truncate_or_pad(
            &format!("{} {}", def.level, def.label),
            CELL_WIDTH,
        ));
    }
    end_row(&mut output);

    for f in Level::ALL.iter().rev() {
        let def = &frequency_defs[(f.get() - 1) as usize];
        output.push_str(&truncate_or_pad(
            &format!("{} {}", def.level, def.label),
            LABEL_WIDTH,
        ));
        for s in Level::ALL.iter() {
            let cell = RiskScore::from_levels(*f, *s);
            let text = match heatmap {
                Some(h) => format!(
                    "{:>2} {} ({})",
                    cell.score,
                    cell.classification.name(),
                    h.count(*f, *s)
                ),
                None => format!("{:>2} {}", cell.score, cell.classification.name()),
            };
            output.push(' ');
            output.push_str(&truncate_or_pad(&text, CELL_WIDTH));
        }
        end_row(&mut output);
    }

    if let Some(h) = heatmap {
        if h.off_grid > 0 {
            output.push_str(&format!("off-grid records: {}\n", h.off_grid));
        }
    }

    output
}

/// Render a full report as text
pub fn render_report_text(report: &RiskReport) -> String {
    let mut output = String::new();

    let bound = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
    output.push_str(&format!(
        "Window: {} .. {}\n\n",
        bound(report.window.from),
        bound(report.window.to)
    ));

    let s = &report.summary;
    output.push_str("Summary\n");
    output.push_str(&format!("  {:<22} {}\n", "total", s.total_risks));
    output.push_str(&format!("  {:<22} {}\n", "extreme", s.extreme_risks));
    output.push_str(&format!("  {:<22} {}\n", "high", s.high_risks));
    output.push_str(&format!("  {:<22} {}\n", "open", s.open_risks));
    output.push_str(&format!("  {:<22} {}\n", "in treatment", s.in_treatment_risks));
    output.push_str(&format!(
        "  {:<22} {}\n\n",
        "mitigated this month", s.mitigated_this_month
    ));

    output.push_str(&format!("By status ({} in window)\n", report.stats.total));
    for (status, count) in &report.stats.by_status {
        output.push_str(&format!("  {:<22} {}\n", status.as_str(), count));
    }
    output.push_str("\nBy classification\n");
    for (classification, count) in report.stats.by_classification.iter().rev() {
        output.push_str(&format!("  {:<22} {}\n", classification.as_str(), count));
    }

    if !report.risks.is_empty() {
        output.push('\n');
        output.push_str(&render_risks_text(&report.risks));
    }

    output
}

/// Render a risk listing as text
pub fn render_risks_text(rows: &[RiskRow]) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<12} {:<6} {:<14} {:<14} {:<6} {}\n",
        "ID", "SCORE", "CLASS", "STATUS", "AFTER", "TITLE"
    ));
    for row in rows {
        let after = row
            .score_after
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        output.push_str(&format!(
            "{:<12} {:<6} {:<14} {:<14} {:<6} {}\n",
            truncate_or_pad(&row.id.0, 12),
            row.score,
            row.classification.as_str(),
            row.status.as_str(),
            after,
            row.title,
        ));
    }
    output
}

/// Render drift findings as text
pub fn render_drift_text(reports: &[DriftReport]) -> String {
    if reports.is_empty() {
        return "No drift found\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<12} {:<20} {:<16} {}\n",
        "ID", "FIELD", "STORED", "EXPECTED"
    ));
    for report in reports {
        for drift in &report.drifts {
            output.push_str(&format!(
                "{:<12} {:<20} {:<16} {}\n",
                truncate_or_pad(&report.id.0, 12),
                drift.field,
                truncate_or_pad(&drift.stored, 16),
                drift.expected,
            ));
        }
    }
    output
}

/// Render any report value as pretty JSON
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// Drop the padding a row leaves behind, then end the line
fn end_row(output: &mut String) {
    let trimmed = output.trim_end_matches(' ').len();
    output.truncate(trimmed);
    output.push('\n');
}

/// Truncate or pad string to fixed width, counted in characters
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}
