//! Tool-to-category registry for preset-based filtering.
//!
//! Maps each MCP tool to its category so that `filter_tools()` can decide
//! which tools are visible for a given config preset.

use std::collections::HashSet;

use crate::config::preset::*;
use crate::config::schema::{PyMigrateConfig, ToolMetadata};

/// Metadata for every MCP tool, in the order they are listed to clients.
pub fn all_tool_metadata() -> Vec<ToolMetadata> {
    vec![
        // ── Analysis ─────────────────────────────────────────────
        meta(
            "analyze_py2_code",
            CATEGORY_ANALYSIS,
            "Find Python 2 patterns in a code snippet",
        ),
        meta(
            "scan_compat",
            CATEGORY_ANALYSIS,
            "Scan a list of files for Python 2 patterns",
        ),
        meta(
            "analyze_directory",
            CATEGORY_ANALYSIS,
            "Scan every Python file under a directory",
        ),
        meta(
            "migration_report",
            CATEGORY_ANALYSIS,
            "Effort estimate and prioritized migration plan",
        ),
        meta(
            "validate_conversion",
            CATEGORY_ANALYSIS,
            "Syntax, residual patterns and review hazards of a converted file",
        ),
        meta(
            "conversion_report",
            CATEGORY_ANALYSIS,
            "Compare an original file with its converted version",
        ),
        meta(
            "check_syntax",
            CATEGORY_ANALYSIS,
            "Check that code parses as Python 3",
        ),
        // ── Conversion ───────────────────────────────────────────
        meta(
            "convert_file",
            CATEGORY_CONVERSION,
            "Convert a file in place with a verified backup",
        ),
        meta(
            "convert_print_statements",
            CATEGORY_CONVERSION,
            "Rewrite print statements in a code snippet",
        ),
        meta(
            "run_2to3",
            CATEGORY_CONVERSION,
            "Run the configured rewrite engine on a code snippet",
        ),
        // ── Reference ────────────────────────────────────────────
        meta(
            "get_migration_guide",
            CATEGORY_REFERENCE,
            "Migration guide for one topic",
        ),
        meta(
            "list_rules",
            CATEGORY_REFERENCE,
            "Compatibility and review-hazard rule catalogs",
        ),
    ]
}

fn meta(name: &str, category: &str, description: &str) -> ToolMetadata {
    ToolMetadata {
        name: name.to_string(),
        category: category.to_string(),
        description: description.to_string(),
    }
}

/// Names of the tools enabled for `config`.
pub fn enabled_tool_names(config: &PyMigrateConfig) -> HashSet<String> {
    crate::config::filter_tools(config, &all_tool_metadata())
        .into_iter()
        .map(|t| t.name)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{PresetName, ToolOverride};

    #[test]
    fn registry_has_12_tools() {
        assert_eq!(all_tool_metadata().len(), 12);
    }

    #[test]
    fn all_tool_names_unique() {
        let tools = all_tool_metadata();
        let names: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), tools.len(), "duplicate tool names in registry");
    }

    #[test]
    fn all_categories_valid() {
        let valid: HashSet<&str> = ALL_CATEGORIES.iter().copied().collect();
        for t in &all_tool_metadata() {
            assert!(
                valid.contains(t.category.as_str()),
                "tool {} has invalid category: {}",
                t.name,
                t.category
            );
        }
    }

    #[test]
    fn full_preset_enables_everything() {
        assert_eq!(enabled_tool_names(&PyMigrateConfig::default()).len(), 12);
    }

    #[test]
    fn read_only_preset_hides_writers() {
        let config = PyMigrateConfig {
            preset: PresetName::ReadOnly,
            ..Default::default()
        };
        let enabled = enabled_tool_names(&config);
        assert!(!enabled.contains("convert_file"));
        assert!(!enabled.contains("convert_print_statements"));
        assert!(!enabled.contains("run_2to3"));
        assert!(enabled.contains("validate_conversion"));
        assert!(enabled.contains("get_migration_guide"));
    }

    #[test]
    fn analysis_preset_is_analysis_only() {
        let config = PyMigrateConfig {
            preset: PresetName::Analysis,
            ..Default::default()
        };
        let enabled = enabled_tool_names(&config);
        let tools = all_tool_metadata();
        for name in &enabled {
            let tool = tools.iter().find(|t| &t.name == name).unwrap();
            assert_eq!(tool.category, CATEGORY_ANALYSIS, "{name}");
        }
        assert_eq!(enabled.len(), 7);
    }

    #[test]
    fn override_reenables_a_tool_outside_the_preset() {
        let mut config = PyMigrateConfig {
            preset: PresetName::ReadOnly,
            ..Default::default()
        };
        config.tools.overrides.insert(
            "convert_print_statements".into(),
            ToolOverride {
                enabled: true,
                reason: None,
            },
        );
        assert!(enabled_tool_names(&config).contains("convert_print_statements"));
    }
}
