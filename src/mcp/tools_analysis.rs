//! Analysis and reference tool handlers.
//!
//! Contains the business logic for: analyze_py2_code, scan_compat,
//! analyze_directory, migration_report, validate_conversion,
//! conversion_report, check_syntax, get_migration_guide and list_rules.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{json, Value};

use crate::compat::aggregator::{scan_directory, scan_files, ScanOptions};
use crate::compat::catalog::{hazards, rules, PatternRule};
use crate::compat::guide;
use crate::compat::matcher::{check_length, Matcher};
use crate::compat::report::build_report;
use crate::convert::syntax;
use crate::error::{MigrateError, Result};
use crate::observability::resolve_path;
use crate::types::{split_by_review, Category, CorpusReport, Finding};

use super::ToolContext;

/// Scan options for one request. The deadline leaves a tenth of the
/// operation timeout for building the response.
fn scan_options(ctx: &ToolContext) -> ScanOptions {
    let budget = Duration::from_secs(ctx.config.limits.timeout_seconds).mul_f64(0.9);
    ScanOptions::from_config(&ctx.config).with_budget(budget)
}

/// `data` as is, or a `Timeout` carrying it when the deadline cut the scan.
fn finish(ctx: &ToolContext, corpus: &CorpusReport, data: Value) -> Result<Value> {
    if corpus.is_complete() {
        return Ok(data);
    }
    tracing::warn!(
        root = %corpus.root,
        skipped = corpus.skipped().count(),
        "scan deadline reached"
    );
    Err(MigrateError::PartialTimeout {
        seconds: ctx.config.limits.timeout_seconds,
        completed: corpus.files_found() - corpus.skipped().count(),
        partial: Box::new(data),
    })
}

fn findings_summary(findings: &[Finding]) -> Value {
    let mut by_severity: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_category: BTreeMap<&str, usize> = BTreeMap::new();
    for f in findings {
        *by_severity.entry(f.severity.as_str()).or_default() += 1;
        *by_category.entry(f.category.as_str()).or_default() += 1;
    }
    let (cosmetic, review) = split_by_review(findings);
    json!({
        "total": findings.len(),
        "bySeverity": by_severity,
        "byCategory": by_category,
        "cosmetic": cosmetic.len(),
        "needsReview": review.len(),
    })
}

fn corpus_summary(report: &CorpusReport) -> Value {
    json!({
        "root": report.root,
        "filesFound": report.files_found(),
        "filesScanned": report.files_scanned(),
        "filesWithIssues": report.file_reports().filter(|r| r.issue_count() > 0).count(),
        "readErrors": report.read_errors().count(),
        "skipped": report.skipped().count(),
        "totalFindings": report.total_findings(),
        "complete": report.is_complete(),
    })
}

// analyze_py2_code
pub fn handle_analyze_code(ctx: &ToolContext, code: &str, file_name: Option<&str>) -> Result<Value> {
    let limit = ctx.config.limits.max_code_length;
    check_length(code, limit)?;
    let label = file_name.unwrap_or("<input>");
    let findings = Matcher::compat().with_max_length(limit).scan(code, label)?;
    let review = Matcher::hazards().with_max_length(limit).scan(code, label)?;
    Ok(json!({
        "compatible": findings.is_empty(),
        "summary": findings_summary(&findings),
        "findings": findings,
        "hazards": review,
    }))
}

// scan_compat
pub fn handle_scan_compat(ctx: &ToolContext, files: &[String]) -> Result<Value> {
    let paths = files
        .iter()
        .map(|f| ctx.locate(f))
        .collect::<Result<Vec<_>>>()?;
    let report = scan_files(ctx.fs.as_ref(), &paths, &scan_options(ctx))?;
    let data = json!({
        "summary": corpus_summary(&report),
        "entries": report.entries,
    });
    finish(ctx, &report, data)
}

// analyze_directory
pub fn handle_analyze_directory(
    ctx: &ToolContext,
    directory: &str,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
) -> Result<Value> {
    let root = resolve_path(directory, &ctx.base)?;
    let mut opts = scan_options(ctx);
    if let Some(include) = include.filter(|i| !i.is_empty()) {
        opts.include = include;
    }
    if let Some(exclude) = exclude {
        opts.exclude.extend(exclude);
    }
    let report = scan_directory(ctx.fs.as_ref(), &root, &opts)?;
    let data = json!({
        "summary": corpus_summary(&report),
        "entries": report.entries,
    });
    finish(ctx, &report, data)
}

// migration_report
pub fn handle_migration_report(ctx: &ToolContext, directory: &str) -> Result<Value> {
    let root = resolve_path(directory, &ctx.base)?;
    let corpus = scan_directory(ctx.fs.as_ref(), &root, &scan_options(ctx))?;
    let report = build_report(&corpus, &ctx.config.report);
    finish(ctx, &corpus, serde_json::to_value(report)?)
}

// validate_conversion
pub fn handle_validate(ctx: &ToolContext, file_path: &str) -> Result<Value> {
    let path = resolve_path(file_path, &ctx.base)?;
    Ok(serde_json::to_value(ctx.pipeline().validate(&path)?)?)
}

// conversion_report
pub fn handle_conversion_report(
    ctx: &ToolContext,
    original_path: &str,
    converted_path: &str,
) -> Result<Value> {
    let original = resolve_path(original_path, &ctx.base)?;
    let converted = resolve_path(converted_path, &ctx.base)?;
    Ok(serde_json::to_value(ctx.pipeline().compare(&original, &converted)?)?)
}

// check_syntax
pub fn handle_check_syntax(ctx: &ToolContext, code: &str) -> Result<Value> {
    check_length(code, ctx.config.limits.max_code_length)?;
    Ok(serde_json::to_value(syntax::check_syntax(code)?)?)
}

// get_migration_guide
pub fn handle_guide(topic: &str) -> Result<Value> {
    let text = guide::guide(topic)?;
    Ok(json!({ "topic": topic.trim().to_lowercase(), "guide": text }))
}

fn rule_json(rule: &PatternRule) -> Value {
    json!({
        "id": rule.id,
        "name": rule.name,
        "category": rule.category,
        "severity": rule.severity,
        "description": rule.description,
        "suggestedFix": rule.suggested_fix,
        "needsReview": rule.category.needs_review(),
    })
}

/// Parse a kebab-case category name.
pub fn parse_category(name: &str) -> Result<Category> {
    serde_json::from_value(Value::String(name.trim().to_lowercase())).map_err(|_| {
        let known: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        MigrateError::InvalidInput(format!(
            "unknown category `{name}` (known: {})",
            known.join(", ")
        ))
    })
}

// list_rules
pub fn handle_list_rules(category: Option<&str>) -> Result<Value> {
    let filter = category.map(parse_category).transpose()?;
    let pick = |set: &'static [PatternRule]| -> Vec<Value> {
        set.iter()
            .filter(|r| filter.map_or(true, |c| r.category == c))
            .map(rule_json)
            .collect()
    };
    let compat = pick(rules());
    let review = pick(hazards());
    Ok(json!({
        "total": compat.len() + review.len(),
        "rules": compat,
        "hazards": review,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PyMigrateConfig;
    use pretty_assertions::assert_eq;

    fn ctx(base: &std::path::Path) -> ToolContext {
        ToolContext::new(PyMigrateConfig::default(), base.to_path_buf())
    }

    #[test]
    fn analyze_code_counts_findings() {
        let dir = tempfile::tempdir().unwrap();
        let data = handle_analyze_code(&ctx(dir.path()), "print 'hello'\n", None).unwrap();
        assert_eq!(data["compatible"], false);
        assert_eq!(data["summary"]["total"], 1);
        assert_eq!(data["findings"][0]["ruleName"], "print-statement");
        assert_eq!(data["findings"][0]["file"], "<input>");
    }

    #[test]
    fn analyze_code_rejects_oversized_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = ctx(dir.path());
        context.config.limits.max_code_length = 4;
        let err = handle_analyze_code(&context, "x = 12345", None).unwrap_err();
        assert_eq!(err.code(), "InputTooLarge");
    }

    #[test]
    fn directory_summary_counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "d.has_key('x')\n").unwrap();
        std::fs::write(dir.path().join("b.py"), "x = 1\n").unwrap();
        let data = handle_analyze_directory(&ctx(dir.path()), ".", None, None).unwrap();
        assert_eq!(data["summary"]["filesFound"], 2);
        assert_eq!(data["summary"]["filesWithIssues"], 1);
        assert_eq!(data["entries"][0]["status"], "scanned");
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = handle_migration_report(&ctx(dir.path()), "nowhere").unwrap_err();
        assert_eq!(err.code(), "NotFound");
    }

    #[test]
    fn scan_compat_keeps_missing_files_as_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "print 'a'\n").unwrap();
        let files = vec!["a.py".to_string(), "gone.py".to_string()];
        let data = handle_scan_compat(&ctx(dir.path()), &files).unwrap();
        assert_eq!(data["entries"][1]["status"], "read-error");
        assert_eq!(data["entries"][1]["kind"], "not-found");
        assert_eq!(data["summary"]["readErrors"], 1);
    }

    #[test]
    fn deadline_cut_scan_reports_timeout_with_partial_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        let mut context = ctx(dir.path());
        context.config.limits.timeout_seconds = 0;
        let err = handle_analyze_directory(&context, ".", None, None).unwrap_err();
        assert_eq!(err.code(), "Timeout");
        let details = err.details().unwrap();
        assert_eq!(details["completed"], 0);
        assert_eq!(details["partial"]["entries"][0]["status"], "skipped");
    }

    #[test]
    fn list_rules_filters_by_category() {
        let data = handle_list_rules(Some("division")).unwrap();
        assert_eq!(data["rules"].as_array().unwrap().len(), 0);
        assert_eq!(data["hazards"].as_array().unwrap().len(), 1);
        assert_eq!(data["hazards"][0]["needsReview"], true);
    }

    #[test]
    fn list_rules_rejects_unknown_category() {
        assert_eq!(handle_list_rules(Some("lambda")).unwrap_err().code(), "InvalidInput");
    }

    #[test]
    fn check_syntax_reports_validity() {
        let dir = tempfile::tempdir().unwrap();
        let ok = handle_check_syntax(&ctx(dir.path()), "x = 1\n").unwrap();
        assert_eq!(ok["valid"], true);
        let bad = handle_check_syntax(&ctx(dir.path()), "def f(:\n").unwrap();
        assert_eq!(bad["valid"], false);
        assert_eq!(bad["error"]["line"], 1);
        assert_eq!(bad["error"]["kind"], "invalid");
    }

    #[test]
    fn check_syntax_rejects_python2_print() {
        let dir = tempfile::tempdir().unwrap();
        let data = handle_check_syntax(&ctx(dir.path()), "x = 1\nprint 'hi'\n").unwrap();
        assert_eq!(data["valid"], false);
        assert_eq!(data["error"]["kind"], "python2");
        assert_eq!(data["error"]["line"], 2);
    }
}
