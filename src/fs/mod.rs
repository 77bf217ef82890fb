//! File-access collaborator.
//!
//! Everything the core needs from the filesystem goes through the
//! [`FileAccess`] trait: enumeration under include/exclude globs, bounded
//! UTF-8 reads, atomic writes and file stats. [`LocalFs`] is the real
//! implementation used by the server and CLI.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use glob::Pattern;
use ignore::WalkBuilder;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{MigrateError, Result};
use crate::types::{ReadError, ReadErrorKind};

/// Basic metadata for a file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStat {
    pub size: u64,
    /// Lowercase hex SHA-256 of the contents.
    pub sha256: String,
    /// Last modification time, RFC 3339 UTC.
    pub modified: Option<String>,
}

/// A directory entry the walk could not descend into or stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unreadable {
    pub path: PathBuf,
    pub kind: ReadErrorKind,
    pub message: String,
}

/// Result of enumerating a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Matching files, sorted.
    pub files: Vec<PathBuf>,
    /// Entries below the root that could not be walked, sorted.
    pub unreadable: Vec<Unreadable>,
}

pub trait FileAccess: Send + Sync {
    /// Files under `root` matching any `include` glob and no `exclude` glob,
    /// plus the entries the walk could not read.
    fn list_files(&self, root: &Path, include: &[String], exclude: &[String]) -> Result<Listing>;

    /// Read `path` as UTF-8, refusing files larger than `max_size` bytes.
    fn read_file(&self, path: &Path, max_size: u64) -> std::result::Result<String, ReadError>;

    /// Replace `path` with `content` so that readers see either the old or
    /// the new file, never a partial one.
    fn write_file_atomic(&self, path: &Path, content: &str) -> Result<()>;

    /// Like [`write_file_atomic`](Self::write_file_atomic) but fails with
    /// `AlreadyExists` instead of replacing an existing `path`.
    fn create_file_atomic(&self, path: &Path, content: &str) -> Result<()>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    fn stat_file(&self, path: &Path) -> Result<FileStat>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;
}

// ---------------------------------------------------------------------------
// Glob filtering
// ---------------------------------------------------------------------------

/// Compiled include/exclude globs.
///
/// Include globs match the path relative to the root or the file name.
/// Exclude globs match the relative path or any single component, so a bare
/// `venv` excludes everything below a `venv` directory.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl GlobFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let compile = |globs: &[String]| -> Result<Vec<Pattern>> {
            globs
                .iter()
                .map(|g| Pattern::new(g).map_err(MigrateError::from))
                .collect()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn is_included(&self, rel: &str) -> bool {
        let name = rel.rsplit('/').next().unwrap_or(rel);
        self.include
            .iter()
            .any(|p| p.matches(rel) || p.matches(name))
    }

    pub fn is_excluded(&self, rel: &str) -> bool {
        self.exclude
            .iter()
            .any(|p| p.matches(rel) || rel.split('/').any(|c| p.matches(c)))
    }

    /// Whether a single directory name is excluded, used to prune the walk.
    fn prunes(&self, name: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(name))
    }

    pub fn accepts(&self, rel: &str) -> bool {
        self.is_included(rel) && !self.is_excluded(rel)
    }
}

/// `path` relative to `root` with `/` separators.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// LocalFs
// ---------------------------------------------------------------------------

/// The local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileAccess for LocalFs {
    fn list_files(
        &self,
        root: &Path,
        include: &[String],
        exclude: &[String],
    ) -> Result<Listing> {
        let filter = GlobFilter::new(include, exclude)?;
        let prune = filter.clone();

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                entry.depth() == 0
                    || !is_dir
                    || !prune.prunes(&entry.file_name().to_string_lossy())
            })
            .build();

        let mut files = Vec::new();
        let mut unreadable = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    let path = walk_error_path(&e).unwrap_or_else(|| root.to_path_buf());
                    let kind = e
                        .io_error()
                        .map_or(ReadErrorKind::Io, |io| ReadErrorKind::from_io(io.kind()));
                    tracing::warn!(path = %path.display(), ?kind, "unreadable directory entry");
                    unreadable.push(Unreadable {
                        path,
                        kind,
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let rel = relative_path(root, entry.path());
            if filter.accepts(&rel) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        unreadable.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Listing { files, unreadable })
    }

    fn read_file(&self, path: &Path, max_size: u64) -> std::result::Result<String, ReadError> {
        let fail = |kind: ReadErrorKind, message: String| ReadError {
            path: path.display().to_string(),
            kind,
            message,
        };

        let meta = std::fs::metadata(path)
            .map_err(|e| fail(ReadErrorKind::from_io(e.kind()), e.to_string()))?;
        if meta.len() > max_size {
            return Err(fail(
                ReadErrorKind::TooLarge,
                format!("{} bytes exceeds limit of {max_size} bytes", meta.len()),
            ));
        }
        let bytes =
            std::fs::read(path).map_err(|e| fail(ReadErrorKind::from_io(e.kind()), e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| {
            fail(
                ReadErrorKind::Encoding,
                format!("not valid UTF-8: {}", e.utf8_error()),
            )
        })
    }

    fn write_file_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let tmp = staged(path, content)?;
        if let Ok(meta) = std::fs::metadata(path) {
            std::fs::set_permissions(tmp.path(), meta.permissions())?;
        }
        tmp.persist(path)
            .map_err(|e| MigrateError::from_io(e.error, path))?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "wrote file");
        Ok(())
    }

    fn create_file_atomic(&self, path: &Path, content: &str) -> Result<()> {
        staged(path, content)?
            .persist_noclobber(path)
            .map_err(|e| MigrateError::from_io(e.error, path))?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "created file");
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(|e| MigrateError::from_io(e, path))
    }

    fn stat_file(&self, path: &Path) -> Result<FileStat> {
        let meta = std::fs::metadata(path).map_err(|e| MigrateError::from_io(e, path))?;
        let bytes = std::fs::read(path).map_err(|e| MigrateError::from_io(e, path))?;
        let modified = meta.modified().ok().map(|t| {
            chrono::DateTime::<chrono::Utc>::from(t)
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        });
        Ok(FileStat {
            size: meta.len(),
            sha256: hex::encode(Sha256::digest(&bytes)),
            modified,
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// `content` synced to a temp file in the directory of `path`.
fn staged(path: &Path, content: &str) -> Result<NamedTempFile> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| MigrateError::from_io(e, parent))?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn walk_error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        ignore::Error::Partial(errs) => errs.iter().find_map(walk_error_path),
        ignore::Error::Loop { child, .. } => Some(child.clone()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
