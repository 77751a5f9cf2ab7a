use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::WorkspaceError;

/// Scratch directory owned by a running job.
///
/// Extraction and intermediate files are staged here and the whole tree is
/// removed at every terminal state. Deletion is safety-gated: nothing is
/// unlinked unless it sits under the parent directory the workspace was
/// created in, and symlinks are removed as links, never followed.
#[derive(Debug)]
pub struct TempWorkspace {
    root: PathBuf,
    guard: PathBuf,
    created_at: DateTime<Utc>,
}

impl TempWorkspace {
    /// Allocates a uniquely named scratch directory under `parent`, or under
    /// the OS temp root when `parent` is `None`.
    pub fn create(parent: Option<&Path>) -> Result<Self, WorkspaceError> {
        let guard = match parent {
            Some(p) => p.to_path_buf(),
            None => std::env::temp_dir(),
        };
        if !guard.exists() {
            std::fs::create_dir_all(&guard).map_err(|e| WorkspaceError::CreateDirectory {
                path: guard.clone(),
                source: e,
            })?;
        }

        let root = guard.join(format!("comicmill-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir(&root).map_err(|e| WorkspaceError::CreateDirectory {
            path: root.clone(),
            source: e,
        })?;
        debug!("workspace created: {}", root.display());

        Ok(Self {
            root,
            guard,
            created_at: Utc::now(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Allocates a uniquely named subdirectory for one extraction run.
    pub fn subdir(&self, prefix: &str) -> Result<PathBuf, WorkspaceError> {
        let dir = self
            .root
            .join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).map_err(|e| WorkspaceError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }

    /// Removes the workspace tree. No-op if it is already gone.
    pub fn cleanup(&self) -> Result<(), WorkspaceError> {
        if !self.root.exists() {
            return Ok(());
        }
        remove_tree_guarded(&self.root, &self.guard)?;
        debug!("workspace removed: {}", self.root.display());
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn tamper_root_for_test(&mut self, root: PathBuf) {
        self.root = root;
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        // Best effort; the orchestrator also cleans up explicitly.
        let _ = self.cleanup();
    }
}

/// Recursively deletes `path`, refusing to touch anything that is not a
/// descendant of `guard`. Entry types come from `symlink_metadata`, so a
/// symlinked directory is unlinked rather than traversed.
pub(crate) fn remove_tree_guarded(path: &Path, guard: &Path) -> Result<(), WorkspaceError> {
    if !path.starts_with(guard) || path == guard {
        return Err(WorkspaceError::OutsideTempRoot {
            path: path.to_path_buf(),
            guard: guard.to_path_buf(),
        });
    }

    let meta = std::fs::symlink_metadata(path).map_err(|e| WorkspaceError::Remove {
        path: path.to_path_buf(),
        source: e,
    })?;

    if meta.file_type().is_dir() {
        let entries = std::fs::read_dir(path).map_err(|e| WorkspaceError::Remove {
            path: path.to_path_buf(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| WorkspaceError::Remove {
                path: path.to_path_buf(),
                source: e,
            })?;
            remove_tree_guarded(&entry.path(), guard)?;
        }
        std::fs::remove_dir(path).map_err(|e| WorkspaceError::Remove {
            path: path.to_path_buf(),
            source: e,
        })
    } else {
        // Files and symlinks alike: unlink the entry itself.
        std::fs::remove_file(path).map_err(|e| WorkspaceError::Remove {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
