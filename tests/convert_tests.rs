//! Convert, validate and compare against real files.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use pymigrate::compat::matcher::Matcher;
use pymigrate::config::schema::LimitsConfig;
use pymigrate::convert::{
    backup_path, ComparisonStatus, ConversionAction, ConvertOptions, Pipeline, PrintRewriter,
    IssueKind, RewriteError, Rewriter, ValidationStatus,
};
use pymigrate::error::Result;
use pymigrate::fs::{FileAccess, FileStat, Listing, LocalFs};
use pymigrate::types::ReadError;

struct Broken;

impl Rewriter for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn rewrite(&self, _source: &str) -> std::result::Result<String, RewriteError> {
        Err(RewriteError::Unsupported("engine crashed".into()))
    }
}

/// Emits text that does not parse as Python 3.
struct Garbling;

impl Rewriter for Garbling {
    fn name(&self) -> &str {
        "garbling"
    }

    fn rewrite(&self, _source: &str) -> std::result::Result<String, RewriteError> {
        Ok("def f(:\n".into())
    }
}

/// Local disk whose create-only writes take `delay`.
struct SlowCreate {
    delay: Duration,
}

impl FileAccess for SlowCreate {
    fn list_files(&self, root: &Path, include: &[String], exclude: &[String]) -> Result<Listing> {
        LocalFs.list_files(root, include, exclude)
    }

    fn read_file(&self, path: &Path, max_size: u64) -> std::result::Result<String, ReadError> {
        LocalFs.read_file(path, max_size)
    }

    fn write_file_atomic(&self, path: &Path, content: &str) -> Result<()> {
        LocalFs.write_file_atomic(path, content)
    }

    fn create_file_atomic(&self, path: &Path, content: &str) -> Result<()> {
        std::thread::sleep(self.delay);
        LocalFs.create_file_atomic(path, content)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        LocalFs.remove_file(path)
    }

    fn stat_file(&self, path: &Path) -> Result<FileStat> {
        LocalFs.stat_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        LocalFs.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        LocalFs.is_dir(path)
    }
}

fn pipeline(rewriter: &dyn Rewriter) -> Pipeline<'_> {
    Pipeline::new(&LocalFs, rewriter, LimitsConfig::default())
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn print_conversion_writes_verified_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "hello.py", "print 'hi'\n");

    let result = pipeline(&PrintRewriter)
        .convert(&path, ConvertOptions::default())
        .unwrap();
    assert_eq!(result.action, ConversionAction::Converted);
    assert!(result.changed);
    assert_eq!(result.pre.len(), 1);
    assert!(result.post.is_empty());
    assert_eq!(result.fix_rate, 1.0);

    let bak = backup_path(&path);
    assert_eq!(std::fs::read_to_string(&bak).unwrap(), "print 'hi'\n");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "print('hi')\n");
}

#[test]
fn validation_baseline_matches_pre_conversion_scan() {
    let dir = tempfile::tempdir().unwrap();
    let original = "import urllib2\nprint 'a'\nif d.has_key('k'):\n    print d\n";
    let path = write(dir.path(), "m.py", original);
    let p = pipeline(&PrintRewriter);

    let converted = p.convert(&path, ConvertOptions::default()).unwrap();
    let report = p.validate(&path).unwrap();

    let backup_text = std::fs::read_to_string(backup_path(&path)).unwrap();
    let expected = Matcher::compat()
        .scan(&backup_text, &path.display().to_string())
        .unwrap();
    assert_eq!(report.baseline.as_ref(), Some(&expected));
    assert_eq!(report.baseline, Some(converted.pre));
    // urllib2 and has_key survive the print-only rewrite.
    assert_eq!(report.status, ValidationStatus::Incomplete);
    assert_eq!(report.remaining.len(), 2);
    assert_eq!(report.fix_rate, Some(0.5));
}

#[test]
fn failed_rewrite_leaves_the_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "m.py", "print 'a'\n");

    let err = pipeline(&Broken)
        .convert(&path, ConvertOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), "ConversionFailed");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "print 'a'\n");
    assert!(!backup_path(&path).exists());
}

#[test]
fn unparsable_output_is_never_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "m.py", "print 'a'\n");

    let err = pipeline(&Garbling)
        .convert(&path, ConvertOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), "SyntaxError");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "print 'a'\n");
    assert!(!backup_path(&path).exists());
}

#[test]
fn clean_file_needs_no_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "ok.py", "print('fine')\n");
    let p = pipeline(&PrintRewriter);

    let result = p.convert(&path, ConvertOptions::default()).unwrap();
    assert_eq!(result.action, ConversionAction::NoChangesNeeded);
    assert!(!result.changed);
    assert_eq!(result.fix_rate, 1.0);
    assert!(result.post.is_empty());
    assert!(!backup_path(&path).exists());

    let report = p.validate(&path).unwrap();
    assert_eq!(report.status, ValidationStatus::Success);
    assert!(report.baseline.is_none());
}

#[test]
fn existing_backup_is_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "m.py", "print 'a'\n");
    std::fs::write(backup_path(&path), "older backup\n").unwrap();

    let err = pipeline(&PrintRewriter)
        .convert(&path, ConvertOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), "InvalidInput");
    assert_eq!(
        std::fs::read_to_string(backup_path(&path)).unwrap(),
        "older backup\n"
    );
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "print 'a'\n");
}

#[test]
fn dry_run_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "m.py", "x = 1\nprint x\n");
    let result = pipeline(&PrintRewriter)
        .convert(
            &path,
            ConvertOptions {
                dry_run: true,
                ..ConvertOptions::default()
            },
        )
        .unwrap();
    assert_eq!(result.action, ConversionAction::DryRun);
    assert_eq!(result.changes.len(), 1);
    assert_eq!(result.changes[0].line, 2);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = 1\nprint x\n");
    assert!(!backup_path(&path).exists());
}

#[test]
fn comparison_reports_fixed_rules() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "m.py", "print 'a'\nprint 'b'\n");
    let p = pipeline(&PrintRewriter);
    p.convert(&path, ConvertOptions::default()).unwrap();

    let report = p.compare(&backup_path(&path), &path).unwrap();
    assert_eq!(report.status, ComparisonStatus::Converted);
    assert_eq!(report.original_issues, 2);
    assert_eq!(report.issues_fixed, 2);
    assert_eq!(report.issues_remaining, 0);
    assert_eq!(report.lines_added, 2);
    assert_eq!(report.lines_removed, 2);
}

#[test]
fn findings_left_by_the_engine_are_labelled_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "m.py", "for i in xrange(3):\n    pass\n");

    let result = pipeline(&PrintRewriter)
        .convert(&path, ConvertOptions::default())
        .unwrap();
    assert_eq!(result.action, ConversionAction::NoChangesNeeded);
    assert!(!result.changed);
    assert_eq!(result.fix_rate, 0.0);
    assert_eq!(result.post.len(), 1);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["changed"], false);
}

#[test]
fn passed_deadline_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "m.py", "print 'a'\n");
    let opts = ConvertOptions {
        deadline: Some(Instant::now()),
        ..ConvertOptions::default()
    };

    let err = pipeline(&PrintRewriter).convert(&path, opts).unwrap_err();
    assert_eq!(err.code(), "Timeout");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "print 'a'\n");
    assert!(!backup_path(&path).exists());
}

#[test]
fn deadline_passing_during_backup_removes_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "m.py", "print 'a'\n");
    let fs = SlowCreate {
        delay: Duration::from_millis(600),
    };
    let opts = ConvertOptions::default().with_budget(Duration::from_millis(300));

    let err = Pipeline::new(&fs, &PrintRewriter, LimitsConfig::default())
        .convert(&path, opts)
        .unwrap_err();
    assert_eq!(err.code(), "Timeout");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "print 'a'\n");
    assert!(!backup_path(&path).exists());
}

#[test]
fn leftover_python2_syntax_does_not_block_partial_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let text = "try:\n    print 'a'\nexcept ValueError, e:\n    pass\n";
    let path = write(dir.path(), "m.py", text);
    let p = pipeline(&PrintRewriter);

    let result = p.convert(&path, ConvertOptions::default()).unwrap();
    assert_eq!(result.action, ConversionAction::Converted);
    let names: Vec<_> = result.post.iter().map(|f| f.rule_name).collect();
    assert_eq!(names, vec!["except-comma"]);

    let report = p.validate(&path).unwrap();
    assert_eq!(report.status, ValidationStatus::Failed);
    let issue = report.syntax.error.unwrap();
    assert_eq!(issue.kind, IssueKind::Python2);
    assert_eq!(issue.line, 3);
}

#[test]
fn unconverted_print_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "m.py", "print 'hi'\n");

    let report = pipeline(&PrintRewriter).validate(&path).unwrap();
    assert_eq!(report.status, ValidationStatus::Failed);
    assert!(!report.syntax.valid);
    assert_eq!(report.syntax.error.unwrap().kind, IssueKind::Python2);
}

#[cfg(unix)]
#[test]
fn unreadable_file_is_permission_denied() {
    use std::os::unix::fs::PermissionsExt;
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "m.py", "print 'a'\n");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();
    if std::fs::read(&path).is_ok() {
        return;
    }

    let err = pipeline(&PrintRewriter)
        .convert(&path, ConvertOptions::default())
        .unwrap_err();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
    assert_eq!(err.code(), "PermissionDenied");
    assert!(!backup_path(&path).exists());
}
