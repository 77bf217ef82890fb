//! File aggregator: enumerate, read and scan many files.
//!
//! A directory scan either fails as a whole (bad root, too many files) or
//! returns a [`CorpusReport`] in which every enumerated file appears exactly
//! once, as a report, a read error or a deadline skip.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::compat::matcher::Matcher;
use crate::config::schema::{
    default_excludes, PyMigrateConfig, DEFAULT_MAX_CODE_LENGTH, DEFAULT_MAX_FILES,
    DEFAULT_MAX_FILE_SIZE,
};
use crate::error::{MigrateError, Result};
use crate::fs::{relative_path, FileAccess};
use crate::types::{CorpusReport, FileEntry, FileReport, ReadError, ReadErrorKind, SkipReason};

/// Knobs for one scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_files: usize,
    pub max_file_size: u64,
    pub max_code_length: usize,
    /// Files not started by this instant are recorded as skipped.
    pub deadline: Option<Instant>,
    pub parallel: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include: vec!["**/*.py".to_string()],
            exclude: default_excludes(),
            max_files: DEFAULT_MAX_FILES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_code_length: DEFAULT_MAX_CODE_LENGTH,
            deadline: None,
            parallel: true,
        }
    }
}

impl ScanOptions {
    pub fn from_config(config: &PyMigrateConfig) -> Self {
        Self {
            include: config.scan.include.clone(),
            exclude: config.scan.exclude.clone(),
            max_files: config.limits.max_files_per_operation,
            max_file_size: config.limits.max_file_size_bytes,
            max_code_length: config.limits.max_code_length,
            deadline: None,
            parallel: config.scan.parallel,
        }
    }

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

/// Scan every matching file under `root`.
pub fn scan_directory(fs: &dyn FileAccess, root: &Path, opts: &ScanOptions) -> Result<CorpusReport> {
    if !fs.exists(root) {
        return Err(MigrateError::NotFound {
            path: root.to_path_buf(),
        });
    }
    if !fs.is_dir(root) {
        return Err(MigrateError::InvalidInput(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let started = Instant::now();
    let listing = fs.list_files(root, &opts.include, &opts.exclude)?;
    check_count(listing.files.len() + listing.unreadable.len(), opts.max_files)?;

    let jobs: Vec<(String, PathBuf)> = listing
        .files
        .into_iter()
        .map(|p| (relative_path(root, &p), p))
        .collect();
    let scanned = run(fs, &jobs, opts);

    // Walk failures take their place among the files in path order.
    let mut placed: Vec<(PathBuf, FileEntry)> = jobs
        .into_iter()
        .map(|(_, path)| path)
        .zip(scanned)
        .chain(listing.unreadable.into_iter().map(|u| {
            let entry = FileEntry::ReadError(ReadError {
                path: relative_path(root, &u.path),
                kind: u.kind,
                message: u.message,
            });
            (u.path, entry)
        }))
        .collect();
    placed.sort_by(|a, b| a.0.cmp(&b.0));
    let entries = placed.into_iter().map(|(_, entry)| entry).collect();

    let report = CorpusReport {
        root: root.display().to_string(),
        entries,
    };
    tracing::info!(
        root = %root.display(),
        files = report.files_found(),
        scanned = report.files_scanned(),
        findings = report.total_findings(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "directory scan complete"
    );
    Ok(report)
}

/// Scan an explicit list of files. Entries keep the order of `paths`.
pub fn scan_files(fs: &dyn FileAccess, paths: &[PathBuf], opts: &ScanOptions) -> Result<CorpusReport> {
    if paths.is_empty() {
        return Err(MigrateError::InvalidInput("no files given".into()));
    }
    check_count(paths.len(), opts.max_files)?;

    let jobs: Vec<(String, PathBuf)> = paths
        .iter()
        .map(|p| (p.display().to_string(), p.clone()))
        .collect();
    let entries = run(fs, &jobs, opts);
    let report = CorpusReport {
        root: String::new(),
        entries,
    };
    tracing::debug!(
        files = report.files_found(),
        scanned = report.files_scanned(),
        "file list scan complete"
    );
    Ok(report)
}

fn check_count(found: usize, limit: usize) -> Result<()> {
    if found > limit {
        tracing::warn!(found, limit, "file limit exceeded, nothing scanned");
        return Err(MigrateError::LimitExceeded {
            what: "files",
            found,
            limit,
        });
    }
    Ok(())
}

fn run(fs: &dyn FileAccess, jobs: &[(String, PathBuf)], opts: &ScanOptions) -> Vec<FileEntry> {
    let matcher = Matcher::compat().with_max_length(opts.max_code_length);
    let scan = |(label, path): &(String, PathBuf)| scan_one(fs, &matcher, label, path, opts);
    if opts.parallel {
        // Indexed collect keeps enumeration order.
        jobs.par_iter().map(scan).collect()
    } else {
        jobs.iter().map(scan).collect()
    }
}

fn scan_one(
    fs: &dyn FileAccess,
    matcher: &Matcher<'_>,
    label: &str,
    path: &Path,
    opts: &ScanOptions,
) -> FileEntry {
    if opts.past_deadline() {
        return FileEntry::Skipped {
            path: label.to_string(),
            reason: SkipReason::Deadline,
        };
    }

    let text = match fs.read_file(path, opts.max_file_size) {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!(path = label, kind = ?err.kind, "read failed");
            return FileEntry::ReadError(ReadError {
                path: label.to_string(),
                ..err
            });
        }
    };

    match matcher.scan(&text, label) {
        Ok(findings) => FileEntry::Scanned(FileReport::new(label, text.lines().count(), findings)),
        Err(err) => FileEntry::ReadError(ReadError {
            path: label.to_string(),
            kind: ReadErrorKind::TooLarge,
            message: match err {
                MigrateError::InputTooLarge { length, limit } => format!(
                    "{length} chars exceeds the scan limit of {limit} chars (limits.max_code_length)"
                ),
                other => other.to_string(),
            },
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;
    use pretty_assertions::assert_eq;

    fn tree(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn entries_follow_enumeration_order() {
        let dir = tree(&[
            ("b.py", "print 'b'\n"),
            ("a.py", "x = 1\n"),
            ("pkg/c.py", "d.has_key(1)\n"),
        ]);
        let report = scan_directory(&LocalFs, dir.path(), &ScanOptions::default()).unwrap();
        let paths: Vec<_> = report.entries.iter().map(|e| e.path()).collect();
        assert_eq!(paths, vec!["a.py", "b.py", "pkg/c.py"]);
        assert_eq!(report.total_findings(), 2);
        assert_eq!(report.files_scanned(), 3);
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let files: Vec<(String, String)> = (0..40)
            .map(|i| (format!("m{i:02}.py"), format!("x = xrange({i})\nprint x\n")))
            .collect();
        let refs: Vec<(&str, &str)> = files.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let dir = tree(&refs);
        let par = scan_directory(&LocalFs, dir.path(), &ScanOptions::default()).unwrap();
        let seq = scan_directory(
            &LocalFs,
            dir.path(),
            &ScanOptions {
                parallel: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(par, seq);
    }

    #[test]
    fn limit_exceeded_reports_true_count_and_reads_nothing() {
        let dir = tree(&[("a.py", ""), ("b.py", ""), ("c.py", "")]);
        let opts = ScanOptions {
            max_files: 2,
            ..Default::default()
        };
        let err = scan_directory(&LocalFs, dir.path(), &opts).unwrap_err();
        match err {
            MigrateError::LimitExceeded { found, limit, .. } => {
                assert_eq!((found, limit), (3, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            scan_directory(&LocalFs, &dir.path().join("nope"), &ScanOptions::default()).unwrap_err();
        assert_eq!(err.code(), "NotFound");
    }

    #[test]
    fn file_root_is_invalid_input() {
        let dir = tree(&[("a.py", "")]);
        let err = scan_directory(&LocalFs, &dir.path().join("a.py"), &ScanOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), "InvalidInput");
    }

    #[test]
    fn oversized_file_is_a_read_error_entry() {
        let dir = tree(&[("big.py", "print 'xxxxxxxxxxxxxxxxxxxx'\n"), ("ok.py", "x = 1\n")]);
        let opts = ScanOptions {
            max_file_size: 10,
            ..Default::default()
        };
        let report = scan_directory(&LocalFs, dir.path(), &opts).unwrap();
        let errors: Vec<_> = report.read_errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "big.py");
        assert_eq!(errors[0].kind, ReadErrorKind::TooLarge);
        assert_eq!(report.files_scanned(), 1);
    }

    #[test]
    fn text_over_scan_cap_names_the_char_limit() {
        let dir = tree(&[("long.py", "x = 1  # padding padding\n")]);
        let opts = ScanOptions {
            max_code_length: 8,
            ..Default::default()
        };
        let report = scan_directory(&LocalFs, dir.path(), &opts).unwrap();
        let errors: Vec<_> = report.read_errors().collect();
        assert_eq!(errors[0].kind, ReadErrorKind::TooLarge);
        assert!(errors[0].message.contains("scan limit of 8 chars"), "{}", errors[0].message);
        assert!(!errors[0].message.contains("bytes"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_becomes_a_read_error_entry() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tree(&[("a.py", "print 1\n"), ("locked/b.py", ""), ("z.py", "")]);
        let locked = dir.path().join("locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        if std::fs::read_dir(&locked).is_ok() {
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        let report = scan_directory(&LocalFs, dir.path(), &ScanOptions::default());
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        let report = report.unwrap();
        let paths: Vec<_> = report.entries.iter().map(|e| e.path()).collect();
        assert_eq!(paths, vec!["a.py", "locked", "z.py"]);
        match &report.entries[1] {
            FileEntry::ReadError(err) => assert_eq!(err.kind, ReadErrorKind::PermissionDenied),
            other => panic!("unexpected entry: {other:?}"),
        }
        assert_eq!(report.files_scanned(), 2);
    }

    #[test]
    fn past_deadline_skips_every_file() {
        let dir = tree(&[("a.py", "print 1\n"), ("b.py", "print 2\n")]);
        let opts = ScanOptions {
            deadline: Some(Instant::now()),
            ..Default::default()
        };
        let report = scan_directory(&LocalFs, dir.path(), &opts).unwrap();
        assert_eq!(report.skipped().count(), 2);
        assert!(!report.is_complete());
        assert_eq!(report.files_found(), 2);
    }

    #[test]
    fn default_excludes_skip_virtualenvs_and_backups() {
        let dir = tree(&[
            ("app.py", ""),
            ("venv/lib/site.py", "print 'x'\n"),
            ("app.py.py2.bak", "print 'x'\n"),
            ("pkg.egg-info/x.py", ""),
        ]);
        let report = scan_directory(&LocalFs, dir.path(), &ScanOptions::default()).unwrap();
        let paths: Vec<_> = report.entries.iter().map(|e| e.path()).collect();
        assert_eq!(paths, vec!["app.py"]);
    }

    #[test]
    fn scan_files_records_missing_files() {
        let dir = tree(&[("a.py", "print 'a'\n")]);
        let paths = vec![dir.path().join("a.py"), dir.path().join("gone.py")];
        let report = scan_files(&LocalFs, &paths, &ScanOptions::default()).unwrap();
        assert_eq!(report.files_scanned(), 1);
        let errors: Vec<_> = report.read_errors().collect();
        assert_eq!(errors[0].kind, ReadErrorKind::NotFound);
        assert_eq!(report.entries[1].path(), paths[1].display().to_string());
    }

    #[test]
    fn scan_files_rejects_empty_list() {
        let err = scan_files(&LocalFs, &[], &ScanOptions::default()).unwrap_err();
        assert_eq!(err.code(), "InvalidInput");
    }
}
