//! Dependency manifest loading and validation
//!
//! The manifest is a requirements file: one requirement per line, `#`
//! comments, `\` continuations. It is read once, hashed for the layer
//! cache key, and checked for constraints no release could satisfy before
//! any engine work starts.

pub mod requirement;
pub mod version;

pub use requirement::{normalize_name, Requirement};
pub use version::{Constraint, Op, Version};

use crate::error::{SlipwayError, SlipwayResult};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A parsed dependency manifest
#[derive(Debug, Clone)]
pub struct DependencyManifest {
    /// Path the manifest was read from
    pub path: PathBuf,

    /// Requirements in file order
    pub entries: Vec<Requirement>,

    /// SHA256 of the raw manifest bytes (hex)
    pub digest: String,

    raw: Vec<u8>,
}

impl DependencyManifest {
    /// Read and parse a manifest file
    pub fn load(path: &Path) -> SlipwayResult<Self> {
        if !path.is_file() {
            return Err(SlipwayError::ManifestNotFound(path.to_path_buf()));
        }

        let raw = fs::read(path).map_err(|e| SlipwayError::Io {
            context: format!("reading manifest {}", path.display()),
            source: e,
        })?;
        let text = String::from_utf8_lossy(&raw).into_owned();

        let mut manifest = Self::parse(&text, path)?;
        manifest.raw = raw;
        manifest.digest = hash_bytes(&manifest.raw);
        debug!(
            "Loaded {} requirements from {} ({})",
            manifest.entries.len(),
            path.display(),
            &manifest.digest[..12]
        );
        Ok(manifest)
    }

    /// Parse manifest text; `path` is used for error messages and hashing
    pub fn parse(text: &str, path: &Path) -> SlipwayResult<Self> {
        let syntax = |line: usize, reason: String| SlipwayError::ManifestSyntax {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut entries = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (line, logical) in logical_lines(text) {
            if logical.starts_with('-') {
                let option = logical.split_whitespace().next().unwrap_or(&logical);
                return Err(syntax(
                    line,
                    format!("option '{}' is not supported in a pinned manifest", option),
                ));
            }

            let requirement = Requirement::parse(&logical, line).map_err(|r| syntax(line, r))?;

            if requirement.marker.is_none() {
                if let Some(first) = seen.insert(requirement.normalized_name(), line) {
                    return Err(syntax(
                        line,
                        format!(
                            "duplicate requirement for {} (first on line {})",
                            requirement.name, first
                        ),
                    ));
                }
            }

            entries.push(requirement);
        }

        Ok(Self {
            path: path.to_path_buf(),
            digest: hash_bytes(text.as_bytes()),
            raw: text.as_bytes().to_vec(),
            entries,
        })
    }

    /// Static checks run before installation.
    ///
    /// Fails on the first requirement whose specifiers contradict each
    /// other, and on unpinned requirements when `require_pins` is set.
    pub fn validate(&self, require_pins: bool) -> SlipwayResult<()> {
        for entry in &self.entries {
            if !entry.is_satisfiable() {
                return Err(SlipwayError::UnsatisfiableConstraint {
                    package: entry.name.clone(),
                    constraints: entry.constraint_list(),
                });
            }
            if require_pins && !entry.is_pinned() {
                return Err(SlipwayError::UnpinnedDependency {
                    package: entry.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Raw manifest bytes, as copied into the build context
    pub fn bytes(&self) -> &[u8] {
        &self.raw
    }

    /// File name used inside the image
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "requirements.txt".to_string())
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Join `\` continuations and strip comments, yielding non-empty lines
/// with the 1-based number of the line they started on.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let stripped = strip_comment(raw);
        let (content, continues) = match stripped.strip_suffix('\\') {
            Some(head) => (head, true),
            None => (stripped, false),
        };

        let (start, mut buf) = pending.take().unwrap_or((idx + 1, String::new()));
        buf.push_str(content);

        if continues {
            pending = Some((start, buf));
            continue;
        }

        let trimmed = buf.trim();
        if !trimmed.is_empty() {
            lines.push((start, trimmed.to_string()));
        }
    }

    if let Some((start, buf)) = pending {
        let trimmed = buf.trim();
        if !trimmed.is_empty() {
            lines.push((start, trimmed.to_string()));
        }
    }

    lines
}

/// A `#` starts a comment at line start or after whitespace
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'#' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return line[..i].trim_end();
        }
    }
    line.trim_end()
}
