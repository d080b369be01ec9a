//! Organization settings for Rail-Safe
//!
//! An explicit `--config` file wins. Without one, the project root is
//! searched for `.railsaferc.json`, then `railsafe.config.json`, then a
//! `railsafe` section in `package.json`.
//!
//! Every field is optional and CLI flags override what the file says.

use crate::classification::Locale;
use crate::level::LevelCatalog;
use crate::lifecycle::TransitionMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default reporting window in days
const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Rail-Safe configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RailsafeConfig {
    /// Label locale for classification display (default: en)
    #[serde(default)]
    pub locale: Option<Locale>,

    /// Status transition rules
    #[serde(default)]
    pub lifecycle: Option<LifecycleConfig>,

    /// Organization level catalog (default: provisioning labels)
    #[serde(default)]
    pub matrix: Option<LevelCatalog>,

    /// Report defaults
    #[serde(default)]
    pub report: Option<ReportConfig>,
}

/// Status transition rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleConfig {
    /// `strict` enforces the transition table, `permissive` allows any jump (default: strict)
    pub mode: Option<TransitionMode>,
}

/// Report defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Days of history included when no explicit range is given (default: 30)
    pub window_days: Option<u32>,
    /// Maximum number of risks listed
    pub top: Option<usize>,
}

/// Resolved configuration with defaults filled in
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub locale: Locale,
    pub transition_mode: TransitionMode,
    pub catalog: LevelCatalog,
    pub window_days: u32,
    pub top_n: Option<usize>,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl RailsafeConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(ref catalog) = self.matrix {
            catalog.validate().context("invalid matrix")?;
        }

        if let Some(ref report) = self.report {
            if let Some(days) = report.window_days {
                if days == 0 {
                    anyhow::bail!("report.window_days must be at least 1 (got {})", days);
                }
            }
            if let Some(top) = report.top {
                if top == 0 {
                    anyhow::bail!("report.top must be at least 1 (got {})", top);
                }
            }
        }

        Ok(())
    }

    /// Resolve config into the form operations consume
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let transition_mode = self
            .lifecycle
            .as_ref()
            .and_then(|l| l.mode)
            .unwrap_or_default();

        let (window_days, top_n) = match &self.report {
            Some(r) => (r.window_days.unwrap_or(DEFAULT_WINDOW_DAYS), r.top),
            None => (DEFAULT_WINDOW_DAYS, None),
        };

        Ok(ResolvedConfig {
            locale: self.locale.unwrap_or_default(),
            transition_mode,
            catalog: self.matrix.clone().unwrap_or_else(LevelCatalog::seeded),
            window_days,
            top_n,
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        RailsafeConfig::default().resolve()
    }
}

/// A place an organization can keep its Rail-Safe settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigSource {
    /// The whole file is the configuration
    Standalone(&'static str),
    /// The configuration is one section of a larger manifest
    Embedded { file: &'static str, key: &'static str },
}

/// Discovery candidates, highest priority first
const SOURCES: [ConfigSource; 3] = [
    ConfigSource::Standalone(".railsaferc.json"),
    ConfigSource::Standalone("railsafe.config.json"),
    ConfigSource::Embedded {
        file: "package.json",
        key: "railsafe",
    },
];

impl ConfigSource {
    fn file_name(&self) -> &'static str {
        match self {
            ConfigSource::Standalone(file) => *file,
            ConfigSource::Embedded { file, .. } => *file,
        }
    }

    /// `Ok(None)` when the file is absent or has no Rail-Safe section
    fn read(&self, root: &Path) -> Result<Option<(RailsafeConfig, PathBuf)>> {
        let path = root.join(self.file_name());
        if !path.is_file() {
            return Ok(None);
        }

        let mut document = read_json(&path)?;
        let section = match self {
            ConfigSource::Standalone(_) => Some(document),
            ConfigSource::Embedded { key, .. } => {
                document.get_mut(*key).map(serde_json::Value::take)
            }
        };

        match section {
            Some(section) => Ok(Some((parse_settings(section, &path)?, path))),
            None => Ok(None),
        }
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn parse_settings(section: serde_json::Value, path: &Path) -> Result<RailsafeConfig> {
    let config: RailsafeConfig = serde_json::from_value(section)
        .with_context(|| format!("unrecognized Rail-Safe settings in {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("rejected Rail-Safe settings in {}", path.display()))?;
    Ok(config)
}

/// First configuration found under `project_root`, with the file it came from
///
/// Candidates are tried in [`SOURCES`] order. A `package.json` without a
/// `railsafe` section is skipped. Nothing found means defaults apply.
pub fn discover_config(project_root: &Path) -> Result<Option<(RailsafeConfig, PathBuf)>> {
    for source in SOURCES {
        if let Some(found) = source.read(project_root)? {
            tracing::debug!(path = %found.1.display(), "config discovered");
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Read the file given with `--config`
pub fn load_config_file(path: &Path) -> Result<RailsafeConfig> {
    parse_settings(read_json(path)?, path)
}

/// Settings for one run: the explicit file when given, else discovery, else defaults
pub fn load_and_resolve(project_root: &Path, explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let found = match explicit {
        Some(path) => Some((load_config_file(path)?, path.to_path_buf())),
        None => discover_config(project_root)?,
    };

    match found {
        Some((config, path)) => {
            let mut resolved = config.resolve()?;
            resolved.config_path = Some(path);
            Ok(resolved)
        }
        None => ResolvedConfig::defaults(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Axis;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = RailsafeConfig::default();
        config.validate().expect("default config should be valid");
        let resolved = config.resolve().expect("default config should resolve");
        assert_eq!(resolved.locale, Locale::En);
        assert_eq!(resolved.transition_mode, TransitionMode::Strict);
        assert_eq!(resolved.catalog, LevelCatalog::seeded());
        assert_eq!(resolved.window_days, 30);
        assert_eq!(resolved.top_n, None);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: RailsafeConfig = serde_json::from_str("{}").unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "locale": "he",
            "lifecycle": { "mode": "permissive" },
            "matrix": {
                "frequencyLevels": [
                    {"level": 1, "label": "Rare"},
                    {"level": 2, "label": "Occasional"},
                    {"level": 3, "label": "Frequent"},
                    {"level": 4, "label": "Constant"}
                ]
            },
            "report": { "window_days": 90, "top": 5 }
        }"#;
        let config: RailsafeConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.locale, Locale::He);
        assert_eq!(resolved.transition_mode, TransitionMode::Permissive);
        assert_eq!(resolved.window_days, 90);
        assert_eq!(resolved.top_n, Some(5));
        let labels: Vec<_> = resolved
            .catalog
            .levels(Axis::Frequency)
            .into_iter()
            .map(|d| d.label)
            .collect();
        assert_eq!(labels, vec!["Rare", "Occasional", "Frequent", "Constant"]);
        assert_eq!(resolved.catalog.levels(Axis::Severity)[0].label, "SEVERITY 1");
    }

    #[test]
    fn test_reject_unknown_fields() {
        let result: Result<RailsafeConfig, _> = serde_json::from_str(r#"{"thresholds": {}}"#);
        assert!(result.is_err(), "unknown fields should be rejected");
    }

    #[test]
    fn test_reject_unknown_mode() {
        let result: Result<RailsafeConfig, _> =
            serde_json::from_str(r#"{"lifecycle": {"mode": "lenient"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_reject_broken_matrix() {
        let json = r#"{"matrix": {"severityLevels": [
            {"level": 1, "label": "a"},
            {"level": 1, "label": "b"},
            {"level": 3, "label": "c"},
            {"level": 4, "label": "d"}
        ]}}"#;
        let config: RailsafeConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_zero_window() {
        let config: RailsafeConfig =
            serde_json::from_str(r#"{"report": {"window_days": 0}}"#).unwrap();
        assert!(config.validate().is_err());

        let config: RailsafeConfig = serde_json::from_str(r#"{"report": {"top": 0}}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_report_uses_defaults() {
        let config: RailsafeConfig = serde_json::from_str(r#"{"report": {"top": 3}}"#).unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.window_days, 30);
        assert_eq!(resolved.top_n, Some(3));
    }

    #[test]
    fn test_discover_railsaferc() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(".railsaferc.json");
        fs::write(&config_path, r#"{"locale": "he"}"#).unwrap();

        let (config, path) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.locale, Some(Locale::He));
        assert_eq!(path, config_path);
    }

    #[test]
    fn test_discover_railsafe_config_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("railsafe.config.json"),
            r#"{"report": {"top": 10}}"#,
        )
        .unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.report.unwrap().top, Some(10));
    }

    #[test]
    fn test_discover_package_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{
            "name": "rail-safe-dashboard",
            "version": "1.0.0",
            "railsafe": { "lifecycle": { "mode": "permissive" } }
        }"#,
        )
        .unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(
            config.lifecycle.unwrap().mode,
            Some(TransitionMode::Permissive)
        );
    }

    #[test]
    fn test_discover_package_json_without_railsafe_key() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"name": "rail-safe-dashboard", "version": "1.0.0"}"#,
        )
        .unwrap();

        assert!(discover_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_discover_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".railsaferc.json"), r#"{"locale": "he"}"#).unwrap();
        fs::write(dir.path().join("railsafe.config.json"), r#"{"locale": "en"}"#).unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(
            config.locale,
            Some(Locale::He),
            ".railsaferc.json should take priority"
        );
    }

    #[test]
    fn test_discovery_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".railsaferc.json")).unwrap();
        fs::write(dir.path().join("railsafe.config.json"), r#"{"locale": "he"}"#).unwrap();

        let (config, path) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.locale, Some(Locale::He));
        assert!(path.ends_with("railsafe.config.json"));
    }

    #[test]
    fn test_malformed_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(&path, "{ locale: he").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("custom.json"));
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".railsaferc.json");
        fs::write(&path, r#"{"report": {"window_days": 0}}"#).unwrap();

        let err = discover_config(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains(".railsaferc.json"));
    }

    #[test]
    fn test_load_and_resolve_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_and_resolve(dir.path(), None).unwrap();
        assert!(resolved.config_path.is_none());
        assert_eq!(resolved.transition_mode, TransitionMode::Strict);
    }

    #[test]
    fn test_load_and_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("custom.json");
        fs::write(&config_path, r#"{"lifecycle": {"mode": "permissive"}}"#).unwrap();

        let resolved = load_and_resolve(dir.path(), Some(&config_path)).unwrap();
        assert_eq!(resolved.transition_mode, TransitionMode::Permissive);
        assert_eq!(resolved.config_path, Some(config_path));
    }
}
