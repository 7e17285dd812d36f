/*
 * SPDX-FileCopyrightText: 2026 The gcm-prep contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Scratch directories for pipeline runs.
//!
//! A [`Workspace`] is a uniquely named directory holding a copy of the input
//! and all intermediate files of one run. It is created by
//! [`Workspace::enter`] and consumed by [`Workspace::exit`], which copies the
//! result out and removes the directory. If a workspace is dropped without
//! calling [`Workspace::exit`] the directory is removed anyway, as it is a
//! [`TempDir`].
//!
//! The process working directory is never changed: stages receive the paths
//! inside the workspace explicitly.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

/// The prefix of the names of workspace directories.
pub const WORKSPACE_PREFIX: &str = "gcm_cache_";

/// The number of random characters after [`WORKSPACE_PREFIX`].
const SUFFIX_LEN: usize = 4;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Input path {} does not name a file", .path.display())]
    InvalidInput { path: PathBuf },
    #[error("Could not create workspace directory in {}", .base.display())]
    Create {
        base: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not copy {} into workspace {}", .input.display(), .dir.display())]
    CopyIn {
        input: PathBuf,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not copy result {} to {}", .result.display(), .dest.display())]
    CopyOut {
        result: PathBuf,
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not remove workspace {}", .dir.display())]
    Cleanup {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A scratch directory owned by a single pipeline run.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    input: PathBuf,
}

impl Workspace {
    /// Creates a workspace inside `base` and copies `input` into it.
    pub fn enter(base: impl AsRef<Path>, input: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let base = base.as_ref();
        let input = input.as_ref();
        let file_name = input
            .file_name()
            .ok_or_else(|| WorkspaceError::InvalidInput {
                path: input.to_owned(),
            })?;

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .rand_bytes(SUFFIX_LEN)
            .tempdir_in(base)
            .map_err(|source| WorkspaceError::Create {
                base: base.to_owned(),
                source,
            })?;
        let workspace = Workspace {
            input: dir.path().join(file_name),
            dir,
        };

        // on error, dropping the workspace removes the directory
        std::fs::copy(input, &workspace.input).map_err(|source| WorkspaceError::CopyIn {
            input: input.to_owned(),
            dir: workspace.path().to_owned(),
            source,
        })?;
        log::info!(
            "Entered workspace {} with a copy of {}",
            workspace.path().display(),
            input.display()
        );
        Ok(workspace)
    }

    /// The workspace directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The copy of the input inside the workspace.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Copies the file `result_name` of the workspace to `dest`, and removes
    /// the workspace.
    ///
    /// A missing result is logged and reported by returning `None`; it is not
    /// an error. The workspace is removed in any case, and copy errors are
    /// returned only after removal.
    pub fn exit(
        self,
        result_name: impl AsRef<Path>,
        dest: impl AsRef<Path>,
    ) -> Result<Option<PathBuf>, WorkspaceError> {
        let result = self.path().join(result_name);
        let dest = dest.as_ref();

        let mut outcome = Ok(None);
        if result.is_file() {
            outcome = copy_out(&result, dest).map(|()| Some(dest.to_owned()));
            if outcome.is_ok() {
                log::info!("Copied result to {}", dest.display());
            }
        } else {
            log::error!("Error encountered, no result {} exists", result.display());
        }

        let dir = self.path().to_owned();
        match self.dir.close() {
            Ok(()) => log::debug!("Removed workspace {}", dir.display()),
            Err(source) => {
                let err = WorkspaceError::Cleanup { dir, source };
                if outcome.is_ok() {
                    outcome = Err(err);
                } else {
                    log::error!("{}", err);
                }
            }
        }
        outcome
    }
}

fn copy_out(result: &Path, dest: &Path) -> Result<(), WorkspaceError> {
    let copy_err = |source| WorkspaceError::CopyOut {
        result: result.to_owned(),
        dest: dest.to_owned(),
        source,
    };
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(copy_err)?;
    }
    std::fs::copy(result, dest).map_err(copy_err)?;
    Ok(())
}
