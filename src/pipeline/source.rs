//! Source tree snapshots
//!
//! Walks the application tree once, honoring `.gitignore`, `.dockerignore`
//! and configured excludes, and hashes every file in sorted path order so
//! the snapshot digest does not depend on directory iteration order.
//! Symlinks are followed; the image receives the file they point to.

use crate::config::LOCAL_CONFIG_FILE;
use crate::error::{SlipwayError, SlipwayResult};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// One regular file of the source tree
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the snapshot root, `/`-separated
    pub relative: String,

    /// Absolute path on the host
    pub path: PathBuf,

    /// SHA256 of the file contents (hex)
    pub hash: String,

    /// Whether any execute bit is set
    pub executable: bool,
}

/// Hashed listing of a source tree
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    /// Tree root on the host
    pub root: PathBuf,

    /// Files sorted by relative path
    pub files: Vec<SourceFile>,

    /// Digest over every path, mode and content hash (hex)
    pub digest: String,
}

impl SourceSnapshot {
    /// Walk `root`, skipping ignored files and `excludes` (gitignore globs)
    pub fn capture(root: &Path, excludes: &[String]) -> SlipwayResult<Self> {
        if !root.is_dir() {
            return Err(SlipwayError::SourceNotFound(root.to_path_buf()));
        }

        let walk_error = |reason: String| SlipwayError::SourceWalk {
            path: root.to_path_buf(),
            reason,
        };

        let mut overrides = OverrideBuilder::new(root);
        for pattern in excludes
            .iter()
            .map(String::as_str)
            .chain([".git/", LOCAL_CONFIG_FILE])
        {
            overrides
                .add(&format!("!{}", pattern))
                .map_err(|e| walk_error(format!("invalid exclude '{}': {}", pattern, e)))?;
        }
        let overrides = overrides.build().map_err(|e| walk_error(e.to_string()))?;

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(false)
            .require_git(false)
            .add_custom_ignore_filename(".dockerignore")
            .overrides(overrides)
            .follow_links(true)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| walk_error(e.to_string()))?;
            let path = entry.path();
            if entry.path_is_symlink() && fs::metadata(path).is_err() {
                return Err(walk_error(format!("broken symlink {}", path.display())));
            }
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let relative = path
                .strip_prefix(root)
                .map_err(|e| walk_error(e.to_string()))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");

            let contents = fs::read(path)
                .map_err(|e| SlipwayError::io(format!("reading {}", path.display()), e))?;

            trace!("Snapshot: {} ({} bytes)", relative, contents.len());
            files.push(SourceFile {
                relative,
                path: path.to_path_buf(),
                hash: content_hash(&contents),
                executable: is_executable(path),
            });
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        let digest = digest_files(&files);

        debug!(
            "Captured {} source files from {} ({})",
            files.len(),
            root.display(),
            &digest[..12]
        );

        Ok(Self {
            root: root.to_path_buf(),
            files,
            digest,
        })
    }

    /// Total number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the tree has no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// SHA256 of file contents (hex)
pub(crate) fn content_hash(contents: &[u8]) -> String {
    hex::encode(Sha256::digest(contents))
}

fn digest_files(files: &[SourceFile]) -> String {
    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.relative.as_bytes());
        hasher.update([0u8, u8::from(file.executable)]);
        hasher.update(file.hash.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}
