//! Convert, validate and compare files.
//!
//! Conversion is backup-then-write: the original bytes are copied to
//! `<file>.py2.bak` and read back before the converted text replaces the
//! original. Any failure before the final rename leaves the original intact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::compat::catalog::rules;
use crate::compat::matcher::Matcher;
use crate::config::schema::LimitsConfig;
use crate::convert::rewrite::{RewriteError, Rewriter};
use crate::convert::syntax::{check_syntax, IssueKind, SyntaxCheck};
use crate::error::{MigrateError, Result};
use crate::fs::{FileAccess, FileStat};
use crate::types::{count_by_rule, split_by_review, Category, Finding, Severity};

pub const BACKUP_SUFFIX: &str = ".py2.bak";

/// `<path>.py2.bak`, next to the original.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

/// Fraction of `pre` findings no longer present, clamped to `[0, 1]`.
pub fn fix_rate(pre: usize, post: usize) -> f64 {
    if pre == 0 {
        return 1.0;
    }
    (1.0 - post as f64 / pre as f64).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub backup: bool,
    pub dry_run: bool,
    /// Nothing is written once this instant has passed.
    pub deadline: Option<Instant>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            backup: true,
            dry_run: false,
            deadline: None,
        }
    }
}

impl ConvertOptions {
    /// Set the deadline `budget` from now.
    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.deadline = Instant::now().checked_add(budget);
        self
    }

    fn past_deadline(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionAction {
    Converted,
    NoChangesNeeded,
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineChange {
    pub line: usize,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub file: String,
    pub backup: Option<String>,
    pub action: ConversionAction,
    /// False when the engine returned the text unchanged.
    pub changed: bool,
    pub pre: Vec<Finding>,
    pub post: Vec<Finding>,
    pub fix_rate: f64,
    pub cosmetic: Vec<Finding>,
    pub needs_review: Vec<Finding>,
    pub lines_changed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<LineChange>,
    /// Metadata of the written file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat: Option<FileStat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationStatus {
    /// The text does not parse.
    Failed,
    /// Mechanically fixable patterns remain.
    Incomplete,
    /// Only constructs needing human judgment remain.
    NeedsReview,
    Success,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub file: String,
    pub status: ValidationStatus,
    pub syntax: SyntaxCheck,
    pub remaining: Vec<Finding>,
    pub cosmetic: Vec<Finding>,
    pub needs_review: Vec<Finding>,
    pub hazards: Vec<Finding>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub test_recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Vec<Finding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonStatus {
    Converted,
    NoChangesNeeded,
    NeedsReview,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDelta {
    pub rule_id: &'static str,
    pub rule_name: &'static str,
    pub original: usize,
    pub remaining: usize,
    pub fixed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub original: String,
    pub converted: String,
    pub status: ComparisonStatus,
    pub syntax: SyntaxCheck,
    pub original_issues: usize,
    pub issues_fixed: usize,
    pub issues_remaining: usize,
    pub fix_rate: f64,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub rules: Vec<RuleDelta>,
    pub next_steps: Vec<String>,
}

/// Conversion and validation over injected file access and rewrite engine.
pub struct Pipeline<'a> {
    fs: &'a dyn FileAccess,
    rewriter: &'a dyn Rewriter,
    limits: LimitsConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(fs: &'a dyn FileAccess, rewriter: &'a dyn Rewriter, limits: LimitsConfig) -> Self {
        Self {
            fs,
            rewriter,
            limits,
        }
    }

    fn matcher(&self) -> Matcher<'static> {
        let cap = usize::try_from(self.limits.max_file_size_bytes).unwrap_or(usize::MAX);
        Matcher::compat().with_max_length(cap)
    }

    fn hazard_matcher(&self) -> Matcher<'static> {
        let cap = usize::try_from(self.limits.max_file_size_bytes).unwrap_or(usize::MAX);
        Matcher::hazards().with_max_length(cap)
    }

    fn read(&self, path: &Path) -> Result<String> {
        Ok(self.fs.read_file(path, self.limits.max_file_size_bytes)?)
    }

    /// Convert one `.py` file in place.
    pub fn convert(&self, path: &Path, opts: ConvertOptions) -> Result<ConversionResult> {
        if path.extension().and_then(|e| e.to_str()) != Some("py") {
            return Err(MigrateError::InvalidInput(format!(
                "{} is not a .py file",
                path.display()
            )));
        }
        let label = path.display().to_string();
        let original = self.read(path)?;
        let pre = self.matcher().scan(&original, &label)?;

        let converted = self.rewriter.rewrite(&original).map_err(|e| match e {
            RewriteError::Syntax { line, message } => MigrateError::SyntaxError { line, message },
            RewriteError::Unsupported(message) => MigrateError::ConversionFailed {
                path: path.to_path_buf(),
                message,
            },
        })?;

        if converted == original {
            tracing::info!(file = %label, engine = self.rewriter.name(), "no changes needed");
            let (cosmetic, needs_review) = split_by_review(&pre);
            return Ok(ConversionResult {
                file: label,
                backup: None,
                action: ConversionAction::NoChangesNeeded,
                changed: false,
                fix_rate: fix_rate(pre.len(), pre.len()),
                post: pre.clone(),
                pre,
                cosmetic,
                needs_review,
                lines_changed: 0,
                changes: Vec::new(),
                stat: None,
            });
        }

        // Leftover Python 2 syntax is reported through `post`; only text
        // that fails to parse at all blocks the write.
        let syntax = check_syntax(&converted)?;
        if let Some(issue) = syntax.error.filter(|i| i.kind == IssueKind::Invalid) {
            return Err(MigrateError::SyntaxError {
                line: issue.line,
                message: format!("converted text does not parse: {}", issue.message),
            });
        }

        let post = self.matcher().scan(&converted, &label)?;
        let changes = line_changes(&original, &converted);
        let (cosmetic, needs_review) = split_by_review(&post);
        let rate = fix_rate(pre.len(), post.len());

        if opts.dry_run {
            return Ok(ConversionResult {
                file: label,
                backup: None,
                action: ConversionAction::DryRun,
                changed: true,
                pre,
                post,
                fix_rate: rate,
                cosmetic,
                needs_review,
                lines_changed: changes.len(),
                changes,
                stat: None,
            });
        }

        self.check_deadline(&opts, &label, "before backup")?;
        let backup = if opts.backup {
            let bak = backup_path(path);
            self.write_backup(&bak, &original)?;
            if let Err(err) = self.check_deadline(&opts, &label, "before write") {
                if let Err(cleanup) = self.fs.remove_file(&bak) {
                    tracing::warn!(backup = %bak.display(), error = %cleanup, "could not remove backup");
                }
                return Err(err);
            }
            Some(bak.display().to_string())
        } else {
            None
        };

        self.fs.write_file_atomic(path, &converted)?;
        let stat = self.fs.stat_file(path)?;
        tracing::info!(
            file = %label,
            engine = self.rewriter.name(),
            pre = pre.len(),
            post = post.len(),
            lines_changed = changes.len(),
            "file converted"
        );

        Ok(ConversionResult {
            file: label,
            backup,
            action: ConversionAction::Converted,
            changed: true,
            pre,
            post,
            fix_rate: rate,
            cosmetic,
            needs_review,
            lines_changed: changes.len(),
            changes: Vec::new(),
            stat: Some(stat),
        })
    }

    fn check_deadline(&self, opts: &ConvertOptions, label: &str, stage: &str) -> Result<()> {
        if opts.past_deadline() {
            tracing::warn!(file = %label, stage, "deadline passed, nothing written");
            return Err(MigrateError::Timeout {
                seconds: self.limits.timeout_seconds,
            });
        }
        Ok(())
    }

    fn write_backup(&self, bak: &Path, original: &str) -> Result<()> {
        // `create_file_atomic` refuses to replace a backup that appears
        // between this check and the rename.
        if self.fs.exists(bak) {
            return Err(backup_exists(bak));
        }
        self.fs.create_file_atomic(bak, original).map_err(|err| match err {
            MigrateError::AlreadyExists { .. } => backup_exists(bak),
            other => other,
        })?;
        let copy = self.fs.read_file(bak, u64::MAX)?;
        if copy != original {
            return Err(MigrateError::ConversionFailed {
                path: bak.to_path_buf(),
                message: "backup does not match the original".into(),
            });
        }
        tracing::debug!(backup = %bak.display(), "backup written and verified");
        Ok(())
    }

    /// Check a (converted) file for syntax, residual patterns and hazards.
    pub fn validate(&self, path: &Path) -> Result<ValidationReport> {
        let label = path.display().to_string();
        let text = self.read(path)?;
        let syntax = check_syntax(&text)?;
        let remaining = self.matcher().scan(&text, &label)?;
        let hazards = self.hazard_matcher().scan(&text, &label)?;
        let (cosmetic, needs_review) = split_by_review(&remaining);

        let bak = backup_path(path);
        let (backup, baseline, rate) = if self.fs.exists(&bak) {
            let before = self.read(&bak)?;
            let baseline = self.matcher().scan(&before, &label)?;
            let rate = fix_rate(baseline.len(), remaining.len());
            (Some(bak.display().to_string()), Some(baseline), Some(rate))
        } else {
            (None, None, None)
        };

        let status = if !syntax.valid {
            ValidationStatus::Failed
        } else if !cosmetic.is_empty() {
            ValidationStatus::Incomplete
        } else if !needs_review.is_empty() || !hazards.is_empty() {
            ValidationStatus::NeedsReview
        } else {
            ValidationStatus::Success
        };

        let mut by_severity: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        for f in remaining.iter().chain(&hazards) {
            *by_severity.entry(f.severity).or_default() += 1;
        }

        tracing::debug!(file = %label, ?status, remaining = remaining.len(), hazards = hazards.len(), "validated");
        Ok(ValidationReport {
            file: label,
            status,
            syntax,
            test_recommendations: test_recommendations(&hazards),
            remaining,
            cosmetic,
            needs_review,
            hazards,
            by_severity,
            backup,
            baseline,
            fix_rate: rate,
        })
    }

    /// Compare an original file with its converted counterpart.
    pub fn compare(&self, original: &Path, converted: &Path) -> Result<ComparisonReport> {
        let before = self.read(original)?;
        let after = self.read(converted)?;
        compare_texts(
            &original.display().to_string(),
            &converted.display().to_string(),
            &before,
            &after,
            &self.matcher(),
        )
    }
}

fn compare_texts(
    original_label: &str,
    converted_label: &str,
    before: &str,
    after: &str,
    matcher: &Matcher<'_>,
) -> Result<ComparisonReport> {
    let pre = matcher.scan(before, original_label)?;
    let post = matcher.scan(after, converted_label)?;
    let syntax = check_syntax(after)?;
    let hazards = Matcher::hazards()
        .with_max_length(usize::MAX)
        .scan(after, converted_label)?;

    let pre_counts = count_by_rule(&pre);
    let post_counts = count_by_rule(&post);
    let deltas: Vec<RuleDelta> = rules()
        .iter()
        .filter_map(|rule| {
            let original = pre_counts.get(rule.id).copied().unwrap_or(0);
            let remaining = post_counts.get(rule.id).copied().unwrap_or(0);
            (original > 0 || remaining > 0).then(|| RuleDelta {
                rule_id: rule.id,
                rule_name: rule.name,
                original,
                remaining,
                fixed: original.saturating_sub(remaining),
            })
        })
        .collect();
    let fixed: usize = deltas.iter().map(|d| d.fixed).sum();
    let (lines_added, lines_removed) = line_delta(before, after);

    let status = if !syntax.valid {
        ComparisonStatus::Failed
    } else if !post.is_empty() {
        ComparisonStatus::NeedsReview
    } else if fixed == 0 {
        ComparisonStatus::NoChangesNeeded
    } else {
        ComparisonStatus::Converted
    };

    let mut next_steps = Vec::new();
    if post.is_empty() {
        next_steps.push("Run the test suite to verify behavior".to_string());
    } else {
        next_steps.push("Run validate_conversion for detailed review items".to_string());
    }
    if fixed > 0 {
        next_steps.push("Check division operations for int vs float".to_string());
    }
    if hazards.iter().any(|h| h.category == Category::Encoding) {
        next_steps.push("Review file and stream I/O for encoding issues".to_string());
    }

    Ok(ComparisonReport {
        original: original_label.to_string(),
        converted: converted_label.to_string(),
        status,
        syntax,
        original_issues: pre.len(),
        issues_fixed: fixed,
        issues_remaining: post.len(),
        fix_rate: fix_rate(pre.len(), post.len()),
        lines_added,
        lines_removed,
        rules: deltas,
        next_steps,
    })
}

fn backup_exists(bak: &Path) -> MigrateError {
    MigrateError::InvalidInput(format!(
        "backup {} already exists; remove it or convert with backup disabled",
        bak.display()
    ))
}

/// Positional line differences, covering lines past the end of either side.
fn line_changes(before: &str, after: &str) -> Vec<LineChange> {
    let old: Vec<&str> = before.lines().collect();
    let new: Vec<&str> = after.lines().collect();
    (0..old.len().max(new.len()))
        .filter_map(|i| {
            let (a, b) = (old.get(i).copied(), new.get(i).copied());
            (a != b).then(|| LineChange {
                line: i + 1,
                before: a.map(str::to_string),
                after: b.map(str::to_string),
            })
        })
        .collect()
}

/// Lines present only in `after` (added) and only in `before` (removed),
/// counted as multisets.
fn line_delta(before: &str, after: &str) -> (usize, usize) {
    let mut balance: BTreeMap<&str, i64> = BTreeMap::new();
    for line in before.lines() {
        *balance.entry(line).or_default() -= 1;
    }
    for line in after.lines() {
        *balance.entry(line).or_default() += 1;
    }
    let added = balance.values().filter(|v| **v > 0).map(|v| *v as usize).sum();
    let removed = balance.values().filter(|v| **v < 0).map(|v| v.unsigned_abs() as usize).sum();
    (added, removed)
}

fn test_recommendations(hazards: &[Finding]) -> Vec<String> {
    let has = |names: &[&str]| hazards.iter().any(|h| names.contains(&h.rule_name));
    let mut recs = Vec::new();
    if has(&["division"]) {
        recs.push("Test all arithmetic operations for integer vs float division");
    }
    if has(&["open-call", "encode-decode", "std-streams"]) {
        recs.push("Test file I/O with various encodings (UTF-8, Latin-1, etc.)");
    }
    if has(&["pickle"]) {
        recs.push("Test pickle load/dump with data from Python 2");
    }
    if has(&["socket", "subprocess"]) {
        recs.push("Test network/subprocess operations for bytes vs str handling");
    }
    if has(&["exec-call", "eval-call", "metaclass-attribute", "sort-cmp"]) {
        recs.push("Exercise dynamically executed code, metaclasses and custom sorts");
    }
    if recs.is_empty() {
        recs.push("Run existing test suite to verify behavior");
    }
    recs.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::rewrite::PrintRewriter;
    use crate::fs::LocalFs;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(0, 0, 1.0 ; "nothing to fix")]
    #[test_case(4, 0, 1.0 ; "all fixed")]
    #[test_case(4, 1, 0.75 ; "partial")]
    #[test_case(2, 5, 0.0 ; "clamped when worse")]
    fn fix_rate_table(pre: usize, post: usize, expected: f64) {
        assert!((fix_rate(pre, post) - expected).abs() < 1e-9);
    }

    #[test]
    fn backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/src/app/mod.py")),
            PathBuf::from("/src/app/mod.py.py2.bak")
        );
    }

    #[test]
    fn line_changes_cover_length_differences() {
        let changes = line_changes("a\nb\n", "a\nc\nd\n");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].line, 2);
        assert_eq!(changes[1].before, None);
        assert_eq!(changes[1].after.as_deref(), Some("d"));
    }

    #[test]
    fn line_delta_counts_replacements() {
        assert_eq!(line_delta("a\nprint x\nb\n", "a\nprint(x)\nb\n"), (1, 1));
        assert_eq!(line_delta("a\n", "a\n"), (0, 0));
    }

    #[test]
    fn non_python_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "print 'x'\n").unwrap();
        let pipeline = Pipeline::new(&LocalFs, &PrintRewriter, LimitsConfig::default());
        let err = pipeline.convert(&path, ConvertOptions::default()).unwrap_err();
        assert_eq!(err.code(), "InvalidInput");
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.py");
        std::fs::write(&path, "x = 1\nprint x\n").unwrap();
        let pipeline = Pipeline::new(&LocalFs, &PrintRewriter, LimitsConfig::default());
        let result = pipeline
            .convert(
                &path,
                ConvertOptions {
                    dry_run: true,
                    ..ConvertOptions::default()
                },
            )
            .unwrap();
        assert_eq!(result.action, ConversionAction::DryRun);
        assert_eq!(result.lines_changed, 1);
        assert_eq!(result.changes[0].after.as_deref(), Some("print(x)"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = 1\nprint x\n");
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn validate_flags_hazards_for_review() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.py");
        std::fs::write(&path, "data = pickle.load(fh)\n").unwrap();
        let pipeline = Pipeline::new(&LocalFs, &PrintRewriter, LimitsConfig::default());
        let report = pipeline.validate(&path).unwrap();
        assert_eq!(report.status, ValidationStatus::NeedsReview);
        assert_eq!(
            report.test_recommendations,
            vec!["Test pickle load/dump with data from Python 2".to_string()]
        );
        assert!(report.baseline.is_none());
    }

    #[test]
    fn validate_reports_residual_patterns_as_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.py");
        std::fs::write(&path, "for i in xrange(3):\n    pass\n").unwrap();
        let pipeline = Pipeline::new(&LocalFs, &PrintRewriter, LimitsConfig::default());
        let report = pipeline.validate(&path).unwrap();
        assert_eq!(report.status, ValidationStatus::Incomplete);
        assert_eq!(report.cosmetic.len(), 1);
        assert_eq!(report.by_severity[&Severity::Error], 1);
    }

    #[test]
    fn validate_fails_on_broken_syntax() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.py");
        std::fs::write(&path, "def f(:\n    pass\n").unwrap();
        let pipeline = Pipeline::new(&LocalFs, &PrintRewriter, LimitsConfig::default());
        assert_eq!(pipeline.validate(&path).unwrap().status, ValidationStatus::Failed);
    }

    #[test]
    fn compare_counts_fixed_rules() {
        let report = compare_texts(
            "a.py",
            "b.py",
            "print 'x'\nfor i in xrange(3): pass\n",
            "print('x')\nfor i in xrange(3): pass\n",
            &Matcher::compat(),
        )
        .unwrap();
        assert_eq!(report.original_issues, 2);
        assert_eq!(report.issues_fixed, 1);
        assert_eq!(report.issues_remaining, 1);
        assert_eq!(report.status, ComparisonStatus::NeedsReview);
        assert_eq!(report.rules.len(), 2);
        assert_eq!((report.lines_added, report.lines_removed), (1, 1));
    }

    #[test]
    fn compare_identical_clean_files() {
        let text = "x = 1\n";
        let report = compare_texts("a.py", "b.py", text, text, &Matcher::compat()).unwrap();
        assert_eq!(report.status, ComparisonStatus::NoChangesNeeded);
        assert_eq!(report.fix_rate, 1.0);
        assert!(report.rules.is_empty());
    }
}
