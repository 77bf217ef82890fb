//! Core domain types for pymigrate.
//!
//! Findings, per-file reports and the corpus report are request-scoped
//! values: built once per tool invocation and never mutated afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// How serious a legacy pattern is for Python 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Invalid in Python 3.
    Error,
    /// Valid but changed or deprecated.
    Warning,
    /// Harmless leftover.
    Info,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Self::Error, Self::Warning, Self::Info];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Rule category. The first six are compatibility categories; the last four
/// only appear on review-hazard rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Iterators,
    TextTypes,
    Operators,
    Syntax,
    StdlibMove,
    Builtins,
    Division,
    Encoding,
    Serialization,
    Runtime,
}

impl Category {
    pub const COMPAT: [Category; 6] = [
        Self::Iterators,
        Self::TextTypes,
        Self::Operators,
        Self::Syntax,
        Self::StdlibMove,
        Self::Builtins,
    ];

    pub const ALL: [Category; 10] = [
        Self::Iterators,
        Self::TextTypes,
        Self::Operators,
        Self::Syntax,
        Self::StdlibMove,
        Self::Builtins,
        Self::Division,
        Self::Encoding,
        Self::Serialization,
        Self::Runtime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iterators => "iterators",
            Self::TextTypes => "text-types",
            Self::Operators => "operators",
            Self::Syntax => "syntax",
            Self::StdlibMove => "stdlib-move",
            Self::Builtins => "builtins",
            Self::Division => "division",
            Self::Encoding => "encoding",
            Self::Serialization => "serialization",
            Self::Runtime => "runtime",
        }
    }

    /// Whether a residual finding in this category needs a human to confirm
    /// behavioral equivalence. Fixed mapping, never inferred.
    pub fn needs_review(&self) -> bool {
        match self {
            Self::TextTypes
            | Self::Division
            | Self::Encoding
            | Self::Serialization
            | Self::Runtime => true,
            Self::Iterators
            | Self::Operators
            | Self::Syntax
            | Self::StdlibMove
            | Self::Builtins => false,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

/// One located match of a legacy pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
    pub rule_id: &'static str,
    pub rule_name: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<&'static str>,
    /// The trimmed source line.
    pub snippet: String,
    /// The exact matched text.
    pub matched: String,
}

/// Split findings into (cosmetic, needs-review) by category.
pub fn split_by_review(findings: &[Finding]) -> (Vec<Finding>, Vec<Finding>) {
    findings
        .iter()
        .cloned()
        .partition(|f| !f.category.needs_review())
}

/// Count findings per rule id.
pub fn count_by_rule(findings: &[Finding]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for f in findings {
        *counts.entry(f.rule_id).or_default() += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// FileReport
// ---------------------------------------------------------------------------

/// Findings for one successfully scanned file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: String,
    pub lines: usize,
    pub findings: Vec<Finding>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_category: BTreeMap<Category, usize>,
}

impl FileReport {
    pub fn new(path: impl Into<String>, lines: usize, findings: Vec<Finding>) -> Self {
        let mut by_severity = BTreeMap::new();
        let mut by_category = BTreeMap::new();
        for f in &findings {
            *by_severity.entry(f.severity).or_default() += 1;
            *by_category.entry(f.category).or_default() += 1;
        }
        Self {
            path: path.into(),
            lines,
            findings,
            by_severity,
            by_category,
        }
    }

    pub fn issue_count(&self) -> usize {
        self.findings.len()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Read errors and corpus entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadErrorKind {
    NotFound,
    PermissionDenied,
    TooLarge,
    Encoding,
    Io,
}

impl ReadErrorKind {
    pub fn from_io(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            std::io::ErrorKind::InvalidData => Self::Encoding,
            _ => Self::Io,
        }
    }
}

/// A file that was supposed to be scanned but could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("cannot read {path}: {message}")]
pub struct ReadError {
    pub path: String,
    pub kind: ReadErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The operation deadline passed before this file was reached.
    Deadline,
}

/// Outcome for one enumerated file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum FileEntry {
    Scanned(FileReport),
    ReadError(ReadError),
    Skipped { path: String, reason: SkipReason },
}

impl FileEntry {
    pub fn path(&self) -> &str {
        match self {
            Self::Scanned(r) => &r.path,
            Self::ReadError(e) => &e.path,
            Self::Skipped { path, .. } => path,
        }
    }
}

// ---------------------------------------------------------------------------
// CorpusReport
// ---------------------------------------------------------------------------

/// Scan results across many files, in enumeration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusReport {
    pub root: String,
    pub entries: Vec<FileEntry>,
}

impl CorpusReport {
    pub fn file_reports(&self) -> impl Iterator<Item = &FileReport> {
        self.entries.iter().filter_map(|e| match e {
            FileEntry::Scanned(r) => Some(r),
            _ => None,
        })
    }

    pub fn read_errors(&self) -> impl Iterator<Item = &ReadError> {
        self.entries.iter().filter_map(|e| match e {
            FileEntry::ReadError(r) => Some(r),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| match e {
            FileEntry::Skipped { path, .. } => Some(path.as_str()),
            _ => None,
        })
    }

    pub fn files_found(&self) -> usize {
        self.entries.len()
    }

    pub fn files_scanned(&self) -> usize {
        self.file_reports().count()
    }

    pub fn total_findings(&self) -> usize {
        self.file_reports().map(|r| r.findings.len()).sum()
    }

    /// True when no file was skipped by the deadline.
    pub fn is_complete(&self) -> bool {
        self.skipped().next().is_none()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(line: usize, category: Category, severity: Severity) -> Finding {
        Finding {
            file: "a.py".into(),
            line,
            column: 1,
            rule_id: "PY2-TEST-001",
            rule_name: "test",
            category,
            severity,
            message: "test",
            suggested_fix: None,
            snippet: String::new(),
            matched: String::new(),
        }
    }

    #[test]
    fn category_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Category::StdlibMove).unwrap(),
            "\"stdlib-move\""
        );
        assert_eq!(
            serde_json::to_string(&Category::TextTypes).unwrap(),
            "\"text-types\""
        );
    }

    #[test]
    fn review_mapping_is_fixed() {
        assert!(Category::Division.needs_review());
        assert!(Category::Encoding.needs_review());
        assert!(Category::Serialization.needs_review());
        assert!(Category::TextTypes.needs_review());
        assert!(!Category::Syntax.needs_review());
        assert!(!Category::Iterators.needs_review());
    }

    #[test]
    fn file_report_counts_by_severity_and_category() {
        let report = FileReport::new(
            "a.py",
            10,
            vec![
                finding(1, Category::Syntax, Severity::Error),
                finding(2, Category::Syntax, Severity::Error),
                finding(3, Category::TextTypes, Severity::Info),
            ],
        );
        assert_eq!(report.count(Severity::Error), 2);
        assert_eq!(report.count(Severity::Info), 1);
        assert_eq!(report.count(Severity::Warning), 0);
        assert_eq!(report.by_category[&Category::Syntax], 2);
    }

    #[test]
    fn split_by_review_partitions() {
        let findings = vec![
            finding(1, Category::Syntax, Severity::Error),
            finding(2, Category::TextTypes, Severity::Error),
        ];
        let (cosmetic, review) = split_by_review(&findings);
        assert_eq!(cosmetic.len(), 1);
        assert_eq!(review.len(), 1);
        assert_eq!(review[0].category, Category::TextTypes);
    }

    #[test]
    fn corpus_entry_serializes_with_status_tag() {
        let entry = FileEntry::ReadError(ReadError {
            path: "b.py".into(),
            kind: ReadErrorKind::PermissionDenied,
            message: "denied".into(),
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "read-error");
        assert_eq!(json["kind"], "permission-denied");
    }

    #[test]
    fn severity_map_keys_serialize_as_strings() {
        let report = FileReport::new("a.py", 1, vec![finding(1, Category::Syntax, Severity::Error)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["bySeverity"]["error"], 1);
        assert_eq!(json["byCategory"]["syntax"], 1);
    }
}
