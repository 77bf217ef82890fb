//! Configuration data structures for pymigrate.
//!
//! Defines the YAML config format: presets, tool overrides, category toggles,
//! resource limits, scan globs, report policy and the rewrite command.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 1000;
pub const DEFAULT_MAX_CODE_LENGTH: usize = 1_000_000;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for pymigrate.
///
/// Loaded from YAML files and environment variables; see
/// [`crate::config::load_config`] for source priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyMigrateConfig {
    /// Config format version (currently "1.0").
    #[serde(default = "default_version")]
    pub version: String,

    /// Active preset name.
    #[serde(default = "default_preset")]
    pub preset: PresetName,

    /// Per-tool and per-category overrides.
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub rewrite: RewriteConfig,
}

impl Default for PyMigrateConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            preset: PresetName::Full,
            tools: ToolsConfig::default(),
            limits: LimitsConfig::default(),
            scan: ScanConfig::default(),
            report: ReportConfig::default(),
            rewrite: RewriteConfig::default(),
        }
    }
}

impl PyMigrateConfig {
    /// Check whether a specific category is enabled (defaults to true).
    pub fn is_category_enabled(&self, category: &str) -> bool {
        self.tools
            .categories
            .get(category)
            .map(|c| c.enabled)
            .unwrap_or(true)
    }

    /// The explicit enabled state of a tool, if `tools.overrides` sets one.
    pub fn tool_override(&self, tool_name: &str) -> Option<bool> {
        self.tools.overrides.get(tool_name).map(|o| o.enabled)
    }
}

// ---------------------------------------------------------------------------
// PresetName
// ---------------------------------------------------------------------------

/// Named presets that control which tool categories are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresetName {
    /// Every tool, including those that write files.
    Full,
    /// Nothing that modifies files on disk.
    ReadOnly,
    /// Scanning and reporting only.
    Analysis,
}

impl PresetName {
    /// Parse from a loose string (case-insensitive, underscores accepted).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "full" => Some(Self::Full),
            "read-only" | "read_only" | "readonly" => Some(Self::ReadOnly),
            "analysis" => Some(Self::Analysis),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::ReadOnly => "read-only",
            Self::Analysis => "analysis",
        }
    }
}

impl std::fmt::Display for PresetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ToolsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Individual tool overrides (enable/disable specific tools).
    #[serde(default)]
    pub overrides: HashMap<String, ToolOverride>,

    /// Category-level toggles (enable/disable entire groups).
    #[serde(default)]
    pub categories: HashMap<String, CategoryConfig>,
}

/// Override the enabled state of a single tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOverride {
    pub enabled: bool,

    /// Human-readable reason for the override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub enabled: bool,
}

// ---------------------------------------------------------------------------
// LimitsConfig
// ---------------------------------------------------------------------------

/// Resource ceilings applied to every operation.
///
/// Reported in each response envelope's `metadata.limits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_file_size_bytes: u64,
    pub max_files_per_operation: usize,
    /// Characters of inline source accepted by the code analysis tools.
    pub max_code_length: usize,
    pub timeout_seconds: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            max_files_per_operation: DEFAULT_MAX_FILES,
            max_code_length: DEFAULT_MAX_CODE_LENGTH,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

// ---------------------------------------------------------------------------
// ScanConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Scan files on the rayon pool.
    pub parallel: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include: vec!["**/*.py".to_string()],
            exclude: default_excludes(),
            parallel: true,
        }
    }
}

pub fn default_excludes() -> Vec<String> {
    [
        "venv",
        ".venv",
        "__pycache__",
        ".git",
        "node_modules",
        ".tox",
        "build",
        "dist",
        "*.egg-info",
        "*.py2.bak",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// ---------------------------------------------------------------------------
// ReportConfig
// ---------------------------------------------------------------------------

/// Effort weights per severity and bucket thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub error_weight: f64,
    pub warning_weight: f64,
    pub info_weight: f64,
    /// Minutes of work per effort point.
    pub minutes_per_point: f64,
    /// Files above this effort are major refactors.
    pub major_refactor_effort: f64,
    /// Findings per line above which a file is high density.
    pub high_density_ratio: f64,
    /// Files at or below this effort (with findings) are quick wins.
    pub quick_win_effort: f64,
    /// Length of the priority list.
    pub priority_limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            error_weight: 3.0,
            warning_weight: 1.0,
            info_weight: 0.25,
            minutes_per_point: 2.0,
            major_refactor_effort: 30.0,
            high_density_ratio: 0.05,
            quick_win_effort: 10.0,
            priority_limit: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// RewriteConfig
// ---------------------------------------------------------------------------

/// External rewrite engine invocation. The target file path is appended to
/// `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            program: "2to3".to_string(),
            args: vec!["-w".to_string(), "-n".to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// ToolMetadata (for filtering)
// ---------------------------------------------------------------------------

/// Lightweight metadata about a single MCP tool, used for filtering.
#[derive(Debug, Clone)]
pub struct ToolMetadata {
    pub name: String,
    pub category: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_version() -> String {
    "1.0".to_string()
}

fn default_preset() -> PresetName {
    PresetName::Full
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
