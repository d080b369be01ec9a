//! Rail-Safe CLI - risk scoring, classification and lifecycle checks

#![deny(warnings)]

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output
// - Logs and notices go to stderr, results to stdout

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use railsafe_core::config::{self, ResolvedConfig};
use railsafe_core::lifecycle::{reopen, transition};
use railsafe_core::record::RiskRecord;
use railsafe_core::report::{
    collect_drift, render_drift_text, render_json, render_matrix_text, render_report_text,
    render_risks_text, render_score_text, RiskReport, RiskRow, ScoreReport,
};
use railsafe_core::scoring::matrix_cells;
use railsafe_core::stats::{filter_risks, matrix_heatmap, scoped, sort_risks, DateRange, RiskFilter};
use railsafe_core::{
    classify, label_and_color_of, level_lookup, validate_status, Axis, Classification, Level,
    LevelCatalog, OrgId, RequestContext, RiskScore, RiskStatus, TransitionMode,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "railsafe")]
#[command(about = "Risk scoring, classification and lifecycle checks for Rail-Safe")]
#[command(version = env!("RAILSAFE_VERSION"))]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file (default: auto-discover)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a frequency/severity pair and classify it
    Score {
        /// Frequency level (1-4)
        #[arg(long, allow_negative_numbers = true)]
        frequency: i64,

        /// Severity level (1-4)
        #[arg(long, allow_negative_numbers = true)]
        severity: i64,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Classify a score (1-16)
    Classify {
        #[arg(allow_negative_numbers = true)]
        score: i64,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Print the 4×4 risk matrix
    Matrix {
        /// Level catalog file (overrides config file)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Risk list to count per cell
        #[arg(long)]
        risks: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Look up the label and description of one level
    Level {
        #[arg(long)]
        axis: AxisArg,

        #[arg(long, allow_negative_numbers = true)]
        level: i64,

        /// Level catalog file (overrides config file)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate statuses and status changes
    Status {
        #[command(subcommand)]
        action: StatusAction,
    },
    /// Statistics over a risk list
    Report {
        /// Path to a JSON array of risk records
        path: PathBuf,

        /// First creation date included (default: last window_days from config)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last creation date included
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Only include risks of this organization
        #[arg(long)]
        org: Option<String>,

        /// Show only top N risks (overrides config file)
        #[arg(long)]
        top: Option<usize>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// List risks, most alarming first, narrowed by filters
    List {
        /// Path to a JSON array of risk records
        path: PathBuf,

        /// Case-insensitive text to find in title or description
        #[arg(long)]
        search: Option<String>,

        /// Only this status (canonical tag or legacy alias)
        #[arg(long)]
        status: Option<RiskStatus>,

        /// Only this classification tier (canonical tag or legacy alias)
        #[arg(long)]
        classification: Option<Classification>,

        /// Only this category code
        #[arg(long)]
        category: Option<String>,

        /// Only risks managed by this user
        #[arg(long)]
        manager: Option<String>,

        /// Lowest effective score included
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=16))]
        min_score: Option<u8>,

        /// Highest effective score included
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=16))]
        max_score: Option<u8>,

        /// Only include risks of this organization
        #[arg(long)]
        org: Option<String>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Verify stored scores and classifications against recomputation
    Check {
        /// Path to a JSON array of risk records
        path: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate or show the configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum StatusAction {
    /// Check that a status is one of the known states
    Validate { candidate: String },
    /// Check that a status change is allowed
    Transition {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Allow any known status to move to any other (overrides config file)
        #[arg(long)]
        permissive: bool,
    },
    /// Reopen a closed risk
    Reopen {
        #[arg(long)]
        from: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum AxisArg {
    Frequency,
    Severity,
}

impl From<AxisArg> for Axis {
    fn from(arg: AxisArg) -> Self {
        match arg {
            AxisArg::Frequency => Axis::Frequency,
            AxisArg::Severity => Axis::Severity,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Score {
            frequency,
            severity,
            format,
        } => {
            let resolved = load_config(cli.config.as_deref())?;
            let score = RiskScore::assess(frequency, severity)?;
            let report = ScoreReport::new(&score, resolved.locale);
            match format {
                OutputFormat::Text => print!("{}", render_score_text(&report)),
                OutputFormat::Json => println!("{}", render_json(&report)),
            }
        }
        Commands::Classify { score, format } => {
            let resolved = load_config(cli.config.as_deref())?;
            let classification = classify(score)?;
            let display = label_and_color_of(classification, resolved.locale);
            match format {
                OutputFormat::Text => println!(
                    "{} {} ({})",
                    classification.as_str(),
                    display.label,
                    display.color_bucket.as_str()
                ),
                OutputFormat::Json => println!(
                    "{}",
                    render_json(&serde_json::json!({
                        "score": score,
                        "classification": classification,
                        "label": display.label,
                        "colorBucket": display.color_bucket,
                    }))
                ),
            }
        }
        Commands::Matrix {
            catalog,
            risks,
            format,
        } => {
            let resolved = load_config(cli.config.as_deref())?;
            let catalog = match catalog {
                Some(path) => load_catalog(&path)?,
                None => resolved.catalog,
            };
            let heatmap = match risks {
                Some(path) => Some(matrix_heatmap(load_risks(&path)?.iter())),
                None => None,
            };

            match format {
                OutputFormat::Text => {
                    print!("{}", render_matrix_text(&catalog, heatmap.as_ref()))
                }
                OutputFormat::Json => {
                    let cells: Vec<ScoreReport> = matrix_cells()
                        .iter()
                        .map(|cell| ScoreReport::new(cell, resolved.locale))
                        .collect();
                    println!(
                        "{}",
                        render_json(&serde_json::json!({
                            "frequencyLevels": catalog.levels(Axis::Frequency),
                            "severityLevels": catalog.levels(Axis::Severity),
                            "cells": cells,
                            "heatmap": heatmap,
                        }))
                    );
                }
            }
        }
        Commands::Level {
            axis,
            level,
            catalog,
            format,
        } => {
            let resolved = load_config(cli.config.as_deref())?;
            let catalog = match catalog {
                Some(path) => load_catalog(&path)?,
                None => resolved.catalog,
            };
            let axis = Axis::from(axis);
            let def = level_lookup(axis, Level::new(axis, level)?, Some(&catalog));
            match format {
                OutputFormat::Text => {
                    println!("{} {}: {}", axis, def.level, def.label);
                    if !def.description.is_empty() {
                        println!("  {}", def.description);
                    }
                }
                OutputFormat::Json => println!("{}", render_json(&def)),
            }
        }
        Commands::Status { action } => match action {
            StatusAction::Validate { candidate } => {
                let known = RiskStatus::known_states();
                match validate_status(&candidate, &known) {
                    Ok(status) => println!("{}: valid", status),
                    Err(e) => {
                        // Aliases parse but are not members of the state set
                        if let Ok(canonical) = RiskStatus::parse(&candidate) {
                            anyhow::bail!("{} (legacy alias of {})", e, canonical);
                        }
                        let names: Vec<&str> = known.iter().map(String::as_str).collect();
                        anyhow::bail!("{} (known states: {})", e, names.join(", "));
                    }
                }
            }
            StatusAction::Transition {
                from,
                to,
                permissive,
            } => {
                let resolved = load_config(cli.config.as_deref())?;
                let mode = if permissive {
                    TransitionMode::Permissive
                } else {
                    resolved.transition_mode
                };
                let from = RiskStatus::parse(&from)?;
                let to = RiskStatus::parse(&to)?;
                let next = transition(from, to, mode)?;
                println!("{} -> {}: allowed ({})", from, next, mode.as_str());
            }
            StatusAction::Reopen { from } => {
                let from = RiskStatus::parse(&from)?;
                let next = reopen(from)?;
                println!("{} -> {}: reopened", from, next);
            }
        },
        Commands::Report {
            path,
            from,
            to,
            org,
            top,
            format,
        } => {
            let resolved = load_config(cli.config.as_deref())?;
            let risks = load_risks(&path)?;

            let records: Vec<&RiskRecord> = match org {
                Some(org) => {
                    let ctx = RequestContext::for_org(OrgId::new(org)?);
                    scoped(&ctx, &risks)
                }
                None => risks.iter().collect(),
            };

            let now = Utc::now();
            let range = if from.is_none() && to.is_none() {
                DateRange::last_days(now.date_naive(), resolved.window_days)
            } else {
                DateRange { from, to }
            };

            // CLI flags override config file values
            let effective_top = top.or(resolved.top_n);

            let report = RiskReport::build(&records, &range, now, resolved.locale, effective_top);
            tracing::info!(
                total = report.summary.total_risks,
                in_window = report.stats.total,
                "report built"
            );

            match format {
                OutputFormat::Text => print!("{}", render_report_text(&report)),
                OutputFormat::Json => println!("{}", render_json(&report)),
            }
        }
        Commands::List {
            path,
            search,
            status,
            classification,
            category,
            manager,
            min_score,
            max_score,
            org,
            format,
        } => {
            if let (Some(min), Some(max)) = (min_score, max_score) {
                if min > max {
                    anyhow::bail!("--min-score {} is above --max-score {}", min, max);
                }
            }

            let resolved = load_config(cli.config.as_deref())?;
            let risks = load_risks(&path)?;
            let records: Vec<&RiskRecord> = match org {
                Some(org) => {
                    let ctx = RequestContext::for_org(OrgId::new(org)?);
                    scoped(&ctx, &risks)
                }
                None => risks.iter().collect(),
            };

            let filter = RiskFilter {
                search,
                status,
                classification,
                category_code: category,
                risk_manager_user_id: manager,
                min_score,
                max_score,
            };
            let matched = sort_risks(filter_risks(records.iter().copied(), &filter));
            tracing::debug!(matched = matched.len(), of = records.len(), "risks filtered");

            let rows: Vec<RiskRow> = matched
                .iter()
                .map(|record| RiskRow::from_record(record, resolved.locale))
                .collect();
            match format {
                OutputFormat::Text => print!("{}", render_risks_text(&rows)),
                OutputFormat::Json => println!("{}", render_json(&rows)),
            }
        }
        Commands::Check { path, format } => {
            let risks = load_risks(&path)?;
            let drift = collect_drift(risks.iter());

            match format {
                OutputFormat::Text => print!("{}", render_drift_text(&drift)),
                OutputFormat::Json => println!("{}", render_json(&drift)),
            }

            if !drift.is_empty() {
                eprintln!("{} of {} risks have drifted", drift.len(), risks.len());
                std::process::exit(1);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let project_root = std::env::current_dir()?;
                let path = path.or(cli.config);
                let resolved = config::load_and_resolve(&project_root, path.as_deref());

                match resolved {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let project_root = std::env::current_dir()?;
                let path = path.or(cli.config);
                let resolved = config::load_and_resolve(&project_root, path.as_deref())
                    .context("failed to load configuration")?;

                println!("Configuration:");
                if let Some(ref p) = resolved.config_path {
                    println!("  Source: {}", p.display());
                } else {
                    println!("  Source: defaults (no config file found)");
                }
                println!();
                println!("Locale: {}", resolved.locale.as_str());
                println!("Lifecycle mode: {}", resolved.transition_mode.as_str());
                println!();
                println!("Matrix:");
                for axis in [Axis::Frequency, Axis::Severity] {
                    let labels: Vec<String> = resolved
                        .catalog
                        .levels(axis)
                        .into_iter()
                        .map(|def| format!("{}={}", def.level, def.label))
                        .collect();
                    println!("  {}: {}", axis, labels.join(", "));
                }
                println!();
                println!("Report:");
                println!("  window_days: {}", resolved.window_days);
                println!(
                    "  top: {}",
                    resolved
                        .top_n
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "none".to_string())
                );
            }
        },
    }

    Ok(())
}

/// Load config from an explicit path or discover it from the current directory
fn load_config(config_path: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let project_root = std::env::current_dir()?;
    let resolved = config::load_and_resolve(&project_root, config_path)
        .context("failed to load configuration")?;

    if let Some(config_path) = &resolved.config_path {
        eprintln!("Using config: {}", config_path.display());
    }

    Ok(resolved)
}

fn load_catalog(path: &Path) -> anyhow::Result<LevelCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog: {}", path.display()))?;
    let catalog: LevelCatalog = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse catalog: {}", path.display()))?;
    catalog
        .validate()
        .with_context(|| format!("invalid catalog in: {}", path.display()))?;
    Ok(catalog)
}

fn load_risks(path: &Path) -> anyhow::Result<Vec<RiskRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read risks: {}", path.display()))?;
    let risks: Vec<RiskRecord> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse risks: {}", path.display()))?;
    tracing::debug!(count = risks.len(), path = %path.display(), "loaded risks");
    Ok(risks)
}
