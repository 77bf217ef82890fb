//! Migration report builder.
//!
//! Turns a [`CorpusReport`] into corpus statistics, a weighted effort
//! estimate and priority buckets. Weights and thresholds come from the
//! `report` config section; defaults are pinned in tests.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::schema::ReportConfig;
use crate::types::{Category, CorpusReport, FileReport, ReadError, Severity};

/// Effort weights and bucket thresholds.
pub type ReportPolicy = ReportConfig;

impl ReportConfig {
    pub fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Error => self.error_weight,
            Severity::Warning => self.warning_weight,
            Severity::Info => self.info_weight,
        }
    }

    /// Weighted effort points for one file.
    pub fn effort(&self, report: &FileReport) -> f64 {
        report
            .by_severity
            .iter()
            .map(|(sev, n)| self.weight(*sev) * *n as f64)
            .sum()
    }

    /// The bucket a file lands in, checked in order major-refactor,
    /// high-density, quick-win.
    pub fn bucket(&self, report: &FileReport) -> Option<Bucket> {
        let issues = report.issue_count();
        if issues == 0 {
            return None;
        }
        let effort = self.effort(report);
        if effort > self.major_refactor_effort {
            Some(Bucket::MajorRefactor)
        } else if density(report) > self.high_density_ratio {
            Some(Bucket::HighDensity)
        } else if effort <= self.quick_win_effort {
            Some(Bucket::QuickWin)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    QuickWin,
    HighDensity,
    MajorRefactor,
}

/// Findings per line. An empty file with findings counts as one line.
fn density(report: &FileReport) -> f64 {
    report.issue_count() as f64 / report.lines.max(1) as f64
}

/// Human-readable time for `points` of effort.
pub fn format_effort(points: f64, minutes_per_point: f64) -> String {
    let minutes = points * minutes_per_point;
    if minutes < 60.0 {
        format!("{} minutes", minutes.round() as u64)
    } else if minutes < 8.0 * 60.0 {
        format!("{:.1} hours", minutes / 60.0)
    } else {
        format!("{:.1} days", minutes / (8.0 * 60.0))
    }
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub files_found: usize,
    pub files_scanned: usize,
    pub files_with_issues: usize,
    pub read_errors: usize,
    pub skipped: usize,
    pub total_issues: usize,
    pub total_effort: f64,
    pub estimated_time: String,
    /// False when the deadline cut the scan short.
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityFile {
    pub path: String,
    pub issues: usize,
    pub lines: usize,
    pub effort: f64,
    /// Findings per 100 lines, two decimals.
    pub density: f64,
    pub by_severity: BTreeMap<Severity, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<Bucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub root: String,
    pub summary: Summary,
    pub by_category: BTreeMap<Category, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_rule: BTreeMap<&'static str, usize>,
    pub priority_files: Vec<PriorityFile>,
    pub quick_wins: Vec<String>,
    pub high_density: Vec<String>,
    pub major_refactors: Vec<String>,
    pub read_errors: Vec<ReadError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    /// Files needing changes beyond the priority list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_files: Option<usize>,
}

/// Aggregate `corpus` under `policy`.
pub fn build_report(corpus: &CorpusReport, policy: &ReportPolicy) -> MigrationReport {
    let mut by_category = BTreeMap::new();
    let mut by_severity = BTreeMap::new();
    let mut by_rule = BTreeMap::new();
    let mut quick_wins = Vec::new();
    let mut high_density = Vec::new();
    let mut major_refactors = Vec::new();
    let mut with_issues: Vec<PriorityFile> = Vec::new();
    let mut total_effort = 0.0;

    for file in corpus.file_reports() {
        for f in &file.findings {
            *by_category.entry(f.category).or_insert(0) += 1;
            *by_severity.entry(f.severity).or_insert(0) += 1;
            *by_rule.entry(f.rule_id).or_insert(0) += 1;
        }
        let effort = policy.effort(file);
        total_effort += effort;
        if file.issue_count() == 0 {
            continue;
        }

        let bucket = policy.bucket(file);
        match bucket {
            Some(Bucket::QuickWin) => quick_wins.push(file.path.clone()),
            Some(Bucket::HighDensity) => high_density.push(file.path.clone()),
            Some(Bucket::MajorRefactor) => major_refactors.push(file.path.clone()),
            None => {}
        }
        with_issues.push(PriorityFile {
            path: file.path.clone(),
            issues: file.issue_count(),
            lines: file.lines,
            effort,
            density: (density(file) * 100.0 * 100.0).round() / 100.0,
            by_severity: file.by_severity.clone(),
            bucket,
        });
    }

    let files_with_issues = with_issues.len();
    // Stable sort: ties keep enumeration order.
    with_issues.sort_by(|a, b| b.effort.total_cmp(&a.effort));
    let additional = files_with_issues.saturating_sub(policy.priority_limit);
    with_issues.truncate(policy.priority_limit);

    let read_errors: Vec<ReadError> = corpus.read_errors().cloned().collect();
    let skipped: Vec<String> = corpus.skipped().map(str::to_string).collect();

    MigrationReport {
        root: corpus.root.clone(),
        summary: Summary {
            files_found: corpus.files_found(),
            files_scanned: corpus.files_scanned(),
            files_with_issues,
            read_errors: read_errors.len(),
            skipped: skipped.len(),
            total_issues: corpus.total_findings(),
            total_effort,
            estimated_time: format_effort(total_effort, policy.minutes_per_point),
            complete: skipped.is_empty(),
        },
        by_category,
        by_severity,
        by_rule,
        priority_files: with_issues,
        quick_wins,
        high_density,
        major_refactors,
        read_errors,
        skipped,
        additional_files: (additional > 0).then_some(additional),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileEntry, Finding, ReadErrorKind, SkipReason};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn finding(line: usize, severity: Severity) -> Finding {
        Finding {
            file: "f.py".into(),
            line,
            column: 1,
            rule_id: "PY2-ITER-001",
            rule_name: "xrange",
            category: Category::Iterators,
            severity,
            message: "",
            suggested_fix: None,
            snippet: String::new(),
            matched: String::new(),
        }
    }

    fn file(path: &str, lines: usize, errors: usize, warnings: usize, infos: usize) -> FileReport {
        let mut findings = Vec::new();
        findings.extend((0..errors).map(|i| finding(i + 1, Severity::Error)));
        findings.extend((0..warnings).map(|i| finding(i + 1, Severity::Warning)));
        findings.extend((0..infos).map(|i| finding(i + 1, Severity::Info)));
        FileReport::new(path, lines, findings)
    }

    fn corpus(files: Vec<FileReport>) -> CorpusReport {
        CorpusReport {
            root: "proj".into(),
            entries: files.into_iter().map(FileEntry::Scanned).collect(),
        }
    }

    #[test]
    fn effort_uses_pinned_weights() {
        let policy = ReportPolicy::default();
        assert_eq!(policy.effort(&file("a.py", 100, 2, 3, 4)), 2.0 * 3.0 + 3.0 + 1.0);
    }

    #[test_case(1000, 11, 0, Some(Bucket::MajorRefactor) ; "effort over thirty")]
    #[test_case(10, 1, 0, Some(Bucket::HighDensity) ; "one error in ten lines")]
    #[test_case(1000, 3, 1, Some(Bucket::QuickWin) ; "effort exactly ten")]
    #[test_case(1000, 4, 0, None ; "between quick win and major")]
    #[test_case(10, 0, 0, None ; "no findings")]
    #[test_case(20, 1, 0, Some(Bucket::QuickWin) ; "density exactly threshold")]
    fn bucket_thresholds(lines: usize, errors: usize, warnings: usize, expected: Option<Bucket>) {
        let policy = ReportPolicy::default();
        assert_eq!(policy.bucket(&file("a.py", lines, errors, warnings, 0)), expected);
    }

    #[test]
    fn major_refactor_wins_over_density() {
        let policy = ReportPolicy::default();
        assert_eq!(
            policy.bucket(&file("a.py", 11, 11, 0, 0)),
            Some(Bucket::MajorRefactor)
        );
    }

    #[test_case(0.0, "0 minutes" ; "zero")]
    #[test_case(10.0, "20 minutes" ; "minutes")]
    #[test_case(30.0, "1.0 hours" ; "one hour")]
    #[test_case(90.0, "3.0 hours" ; "hours")]
    #[test_case(240.0, "1.0 days" ; "one day")]
    #[test_case(600.0, "2.5 days" ; "days")]
    fn effort_strings(points: f64, expected: &str) {
        assert_eq!(format_effort(points, 2.0), expected);
    }

    #[test]
    fn priority_files_sorted_by_effort_with_stable_ties() {
        let report = build_report(
            &corpus(vec![
                file("low.py", 100, 1, 0, 0),
                file("tie_a.py", 100, 2, 0, 0),
                file("high.py", 100, 5, 0, 0),
                file("tie_b.py", 100, 2, 0, 0),
                file("clean.py", 100, 0, 0, 0),
            ]),
            &ReportPolicy::default(),
        );
        let order: Vec<_> = report.priority_files.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(order, vec!["high.py", "tie_a.py", "tie_b.py", "low.py"]);
        assert_eq!(report.summary.files_with_issues, 4);
        assert_eq!(report.summary.total_issues, 10);
        assert_eq!(report.summary.total_effort, 30.0);
        assert_eq!(report.summary.estimated_time, "1.0 hours");
        assert_eq!(report.additional_files, None);
    }

    #[test]
    fn priority_list_is_capped() {
        let files = (0..25).map(|i| file(&format!("f{i}.py"), 100, 1, 0, 0)).collect();
        let report = build_report(&corpus(files), &ReportPolicy::default());
        assert_eq!(report.priority_files.len(), 20);
        assert_eq!(report.additional_files, Some(5));
    }

    #[test]
    fn histograms_and_read_errors() {
        let mut c = corpus(vec![file("a.py", 100, 1, 1, 0)]);
        c.entries.push(FileEntry::ReadError(ReadError {
            path: "b.py".into(),
            kind: ReadErrorKind::Encoding,
            message: "bad".into(),
        }));
        c.entries.push(FileEntry::Skipped {
            path: "c.py".into(),
            reason: SkipReason::Deadline,
        });
        let report = build_report(&c, &ReportPolicy::default());
        assert_eq!(report.by_severity[&Severity::Error], 1);
        assert_eq!(report.by_severity[&Severity::Warning], 1);
        assert_eq!(report.by_rule["PY2-ITER-001"], 2);
        assert_eq!(report.summary.read_errors, 1);
        assert_eq!(report.read_errors[0].path, "b.py");
        assert_eq!(report.skipped, vec!["c.py"]);
        assert!(!report.summary.complete);
        assert_eq!(report.summary.files_found, 3);
    }

    #[test]
    fn density_is_per_hundred_lines() {
        let report = build_report(&corpus(vec![file("a.py", 40, 1, 0, 0)]), &ReportPolicy::default());
        assert_eq!(report.priority_files[0].density, 2.5);
    }

    #[test]
    fn report_is_deterministic() {
        let c = corpus(vec![file("a.py", 10, 3, 2, 1), file("b.py", 500, 1, 0, 0)]);
        let a = serde_json::to_string(&build_report(&c, &ReportPolicy::default())).unwrap();
        let b = serde_json::to_string(&build_report(&c, &ReportPolicy::default())).unwrap();
        assert_eq!(a, b);
    }
}
