//! Configuration loading.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults,
//! 2. the user config (`<config dir>/pymigrate/config.yaml`),
//! 3. `.pymigrate.yaml` in the project root,
//! 4. an explicit `--config` file,
//! 5. `PYMIGRATE_*` environment variables.
//!
//! Files are merged as YAML values, so a later file only needs to name the
//! keys it changes.

pub mod preset;
pub mod schema;

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::{MigrateError, Result};

pub use schema::{
    LimitsConfig, PresetName, PyMigrateConfig, ReportConfig, RewriteConfig, ScanConfig,
    ToolMetadata,
};

pub const PROJECT_CONFIG_FILE: &str = ".pymigrate.yaml";

/// Path of the per-user config file, when a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "pymigrate").map(|d| d.config_dir().join("config.yaml"))
}

/// Load configuration for `project_root` from every source.
pub fn load_config(project_root: &Path, explicit: Option<&Path>) -> Result<PyMigrateConfig> {
    let mut files: Vec<PathBuf> = Vec::new();
    if let Some(user) = user_config_path() {
        files.push(user);
    }
    files.push(project_root.join(PROJECT_CONFIG_FILE));

    let mut merged = serde_yaml::to_value(PyMigrateConfig::default())?;
    for path in files.iter().filter(|p| p.is_file()) {
        merge(&mut merged, read_yaml(path)?);
        tracing::debug!(path = %path.display(), "loaded config file");
    }
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(MigrateError::NotFound {
                path: path.to_path_buf(),
            });
        }
        merge(&mut merged, read_yaml(path)?);
        tracing::debug!(path = %path.display(), "loaded explicit config");
    }

    let mut config: PyMigrateConfig = serde_yaml::from_value(merged)
        .map_err(|e| MigrateError::Config(format!("invalid configuration: {e}")))?;
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Parse one YAML document from `text` over the defaults, without touching
/// any other source.
pub fn from_yaml_str(text: &str) -> Result<PyMigrateConfig> {
    let mut merged = serde_yaml::to_value(PyMigrateConfig::default())?;
    merge(&mut merged, serde_yaml::from_str(text)?);
    let config: PyMigrateConfig = serde_yaml::from_value(merged)
        .map_err(|e| MigrateError::Config(format!("invalid configuration: {e}")))?;
    validate(&config)?;
    Ok(config)
}

/// Tools visible under `config`.
///
/// A per-tool override decides outright. Otherwise the tool's category must
/// be part of the preset and not switched off in `tools.categories`.
pub fn filter_tools(config: &PyMigrateConfig, tools: &[ToolMetadata]) -> Vec<ToolMetadata> {
    let preset_categories = preset::enabled_categories(&config.preset);
    tools
        .iter()
        .filter(|t| match config.tool_override(&t.name) {
            Some(enabled) => enabled,
            None => {
                preset_categories.contains(t.category.as_str())
                    && config.is_category_enabled(&t.category)
            }
        })
        .cloned()
        .collect()
}

fn read_yaml(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| MigrateError::from_io(e, path))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(&text)
        .map_err(|e| MigrateError::Config(format!("{}: {e}", path.display())))
}

/// Deep-merge `overlay` into `base`. Mappings merge key by key; anything
/// else replaces.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Apply `PYMIGRATE_*` overrides read through `lookup`.
fn apply_env(config: &mut PyMigrateConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
        value
            .trim()
            .parse()
            .map_err(|_| MigrateError::Config(format!("{key}: cannot parse {value:?}")))
    }

    if let Some(v) = lookup("PYMIGRATE_PRESET") {
        config.preset = PresetName::from_str_loose(&v)
            .ok_or_else(|| MigrateError::Config(format!("PYMIGRATE_PRESET: unknown preset {v:?}")))?;
    }
    if let Some(v) = lookup("PYMIGRATE_MAX_FILES") {
        config.limits.max_files_per_operation = parse("PYMIGRATE_MAX_FILES", &v)?;
    }
    if let Some(v) = lookup("PYMIGRATE_MAX_FILE_SIZE") {
        config.limits.max_file_size_bytes = parse("PYMIGRATE_MAX_FILE_SIZE", &v)?;
    }
    if let Some(v) = lookup("PYMIGRATE_TIMEOUT") {
        config.limits.timeout_seconds = parse("PYMIGRATE_TIMEOUT", &v)?;
    }
    if let Some(v) = lookup("PYMIGRATE_REWRITE_COMMAND") {
        let mut words = v.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| MigrateError::Config("PYMIGRATE_REWRITE_COMMAND is empty".into()))?;
        config.rewrite.program = program;
        config.rewrite.args = words.collect();
    }
    Ok(())
}

fn validate(config: &PyMigrateConfig) -> Result<()> {
    let limits = &config.limits;
    if limits.max_files_per_operation == 0
        || limits.max_file_size_bytes == 0
        || limits.max_code_length == 0
        || limits.timeout_seconds == 0
    {
        return Err(MigrateError::Config("limits must be greater than zero".into()));
    }
    let report = &config.report;
    let weights = [report.error_weight, report.warning_weight, report.info_weight];
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(MigrateError::Config("report weights must be non-negative".into()));
    }
    if config.scan.include.is_empty() {
        return Err(MigrateError::Config("scan.include must name at least one glob".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
