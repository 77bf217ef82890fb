//! Preset definitions: full, read-only, analysis.
//!
//! Each preset names the tool categories it activates. Tools declare their
//! category in [`crate::mcp::registry`].

use super::schema::PresetName;
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Tool categories
// ---------------------------------------------------------------------------

/// Scanning, reporting and validation. Never writes files.
pub const CATEGORY_ANALYSIS: &str = "Analysis";
/// Tools that produce or write converted source.
pub const CATEGORY_CONVERSION: &str = "Conversion";
/// Guides and rule listings.
pub const CATEGORY_REFERENCE: &str = "Reference";

pub const ALL_CATEGORIES: &[&str] = &[CATEGORY_ANALYSIS, CATEGORY_CONVERSION, CATEGORY_REFERENCE];

// ---------------------------------------------------------------------------
// Preset categories
// ---------------------------------------------------------------------------

/// Return the set of enabled category names for a preset.
pub fn enabled_categories(name: &PresetName) -> HashSet<&'static str> {
    let categories: &[&'static str] = match name {
        // Everything, including in-place file conversion.
        PresetName::Full => ALL_CATEGORIES,
        // Scanning, reports, validation and guides; nothing touches disk.
        PresetName::ReadOnly => &[CATEGORY_ANALYSIS, CATEGORY_REFERENCE],
        PresetName::Analysis => &[CATEGORY_ANALYSIS],
    };
    categories.iter().copied().collect()
}
