//! Build context preparation
//!
//! The engine only ever sees a private context directory:
//!
//! ```text
//! <builds>/<uuid>/
//!   Containerfile
//!   manifest/<manifest file>
//!   src/<snapshot files>
//! ```
//!
//! Keeping the manifest and the source under separate roots lets the
//! dependency layer COPY the manifest without touching the source tree.

use crate::error::{SlipwayError, SlipwayResult};
use crate::pipeline::containerfile::Containerfile;
use crate::pipeline::plan::BuildPlan;
use crate::pipeline::source::{content_hash, SourceFile};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Context subdirectory holding the dependency manifest
pub const MANIFEST_DIR: &str = "manifest";

/// Context subdirectory holding the source snapshot
pub const SOURCE_DIR: &str = "src";

/// A prepared build context. The directory is removed on drop.
#[derive(Debug)]
pub struct BuildContext {
    dir: PathBuf,
    containerfile: PathBuf,
}

impl BuildContext {
    /// Materialize `plan` into a fresh directory under `builds_dir`
    pub async fn prepare(
        builds_dir: &Path,
        plan: &BuildPlan,
        containerfile: &Containerfile,
    ) -> SlipwayResult<Self> {
        let build_id = uuid::Uuid::new_v4().to_string();
        let dir = builds_dir.join(&build_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SlipwayError::io("creating build directory", e))?;

        // From here on the guard cleans up if anything below fails
        let context = Self {
            containerfile: dir.join("Containerfile"),
            dir,
        };

        fs::write(&context.containerfile, containerfile.text())
            .await
            .map_err(|e| SlipwayError::io("writing Containerfile", e))?;

        let manifest_dir = context.dir.join(MANIFEST_DIR);
        fs::create_dir_all(&manifest_dir)
            .await
            .map_err(|e| SlipwayError::io("creating manifest directory", e))?;
        // Write the bytes that were hashed, not whatever is on disk now
        fs::write(
            manifest_dir.join(plan.manifest.file_name()),
            plan.manifest.bytes(),
        )
        .await
        .map_err(|e| SlipwayError::io("writing manifest", e))?;

        let source_dir = context.dir.join(SOURCE_DIR);
        fs::create_dir_all(&source_dir)
            .await
            .map_err(|e| SlipwayError::io("creating source directory", e))?;

        for file in &plan.source.files {
            copy_source_file(file, &source_dir.join(&file.relative)).await?;
        }

        debug!(
            "Prepared build context {} ({} source files)",
            context.dir.display(),
            plan.source.len()
        );
        Ok(context)
    }

    /// Context root passed to the engine
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the generated Containerfile
    pub fn containerfile(&self) -> &Path {
        &self.containerfile
    }
}

/// Copy one snapshot file, refusing contents that no longer match its hash
async fn copy_source_file(file: &SourceFile, target: &Path) -> SlipwayResult<()> {
    let contents = fs::read(&file.path)
        .await
        .map_err(|e| SlipwayError::io(format!("reading {}", file.relative), e))?;
    if content_hash(&contents) != file.hash {
        return Err(SlipwayError::SourceChanged(file.path.clone()));
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| SlipwayError::io(format!("creating {}", parent.display()), e))?;
    }
    fs::write(target, &contents)
        .await
        .map_err(|e| SlipwayError::io(format!("writing {}", file.relative), e))?;

    if file.executable {
        set_executable(target).await?;
    }
    Ok(())
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> SlipwayResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| SlipwayError::io(format!("setting mode of {}", path.display()), e))
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> SlipwayResult<()> {
    Ok(())
}

impl Drop for BuildContext {
    fn drop(&mut self) {
        // Best-effort; a leftover directory only costs disk space
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            debug!("Could not remove {}: {}", self.dir.display(), e);
        }
    }
}
