/*
 * SPDX-FileCopyrightText: 2026 The gcm-prep contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The clustering pipeline.
//!
//! [`run`] performs, inside a fresh [`Workspace`]:
//!
//! 1. renumbering of a copy of the input with a comma-separated
//!    [`Normalizer`];
//! 2. `<shell> <work script> <formatted>`;
//! 3. `<clustering executable> 2 5 2 <seed> <chi> <formatted>`;
//! 4. remapping of `partition_<formatted>` to the original labels.
//!
//! Then the remapped partition is copied to the output location and the
//! workspace is removed, whichever stage failed. A failed stage stops the
//! pipeline; nothing is retried.

use crate::normalize::{NormalizeError, Normalizer, Separator};
use crate::process::{ExternalCommand, ProcessError};
use crate::remap::{partition_file_name, remap_partition, RemapError};
use crate::workspace::{Workspace, WorkspaceError};
use dsi_progress_logger::prelude::*;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// The name of the output file if none is given.
pub const DEFAULT_OUTPUT_FILE: &str = "clustering_output.txt";
pub const DEFAULT_SEED: i64 = 12345;
pub const DEFAULT_CHI: f64 = 0.0;
/// The name of the clustering executable, looked up next to the running binary.
pub const DEFAULT_GCM_EXE: &str = "a.out";
/// The name of the work script, looked up next to the running binary.
pub const DEFAULT_WORK_SCRIPT: &str = "work.sh";
pub const DEFAULT_SHELL: &str = "bash";

/// The three leading integer arguments of the clustering executable.
const CLUSTERING_MODES: [&str; 3] = ["2", "5", "2"];

/// The separator of the edge lists fed to the pipeline.
///
/// The work script expects comma-separated input, so this does not depend on
/// [`PipelineConfig::separator`].
pub const PIPELINE_SEPARATOR: Separator = Separator::Comma;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Could not determine the current directory")]
    CurrentDir(#[source] std::io::Error),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("Formatting the edge list failed")]
    Normalize(#[from] NormalizeError),
    #[error("The work script failed")]
    WorkScript(#[source] ProcessError),
    #[error("The clustering executable failed")]
    Clustering(#[source] ProcessError),
    #[error("Remapping the partition failed")]
    Remap(#[from] RemapError),
    #[error("Error encountered, no result {} exists", .path.display())]
    ResultMissing { path: PathBuf },
}

/// The external programs and parameters of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The clustering executable.
    pub gcm_exe: PathBuf,
    /// The script preparing the files needed by the clustering executable.
    pub work_script: PathBuf,
    /// The program running the work script.
    pub shell: OsString,
    /// Maximum running time of each external program.
    pub timeout: Option<Duration>,
    pub seed: i64,
    pub chi: f64,
    /// The separator requested by the caller. Currently ignored, see
    /// [`PIPELINE_SEPARATOR`].
    pub separator: Option<Separator>,
    /// Where workspaces are created; the current directory if `None`.
    pub scratch_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn new(gcm_exe: impl AsRef<Path>, work_script: impl AsRef<Path>) -> Self {
        Self {
            gcm_exe: gcm_exe.as_ref().to_owned(),
            work_script: work_script.as_ref().to_owned(),
            shell: DEFAULT_SHELL.into(),
            timeout: None,
            seed: DEFAULT_SEED,
            chi: DEFAULT_CHI,
            separator: None,
            scratch_dir: None,
        }
    }

    /// A configuration using the default executable and work script in
    /// `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(DEFAULT_GCM_EXE), dir.join(DEFAULT_WORK_SCRIPT))
    }

    /// A configuration using the default executable and work script in the
    /// directory of the running binary.
    pub fn beside_current_exe() -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self::in_dir(crate::parent_dir(&exe)))
    }
}

/// Makes program paths with more than one component absolute, as children
/// run in the workspace; bare names are left to `PATH` lookup.
fn resolve_program(program: &Path) -> PathBuf {
    if program.components().count() > 1 {
        std::path::absolute(program).unwrap_or_else(|_| program.to_owned())
    } else {
        program.to_owned()
    }
}

/// Runs the stages inside the workspace.
fn run_stages(
    config: &PipelineConfig,
    workspace: &Workspace,
    pl: &mut impl ProgressLog,
) -> Result<(), PipelineError> {
    let summary = Normalizer::new()
        .separator(PIPELINE_SEPARATOR)
        .normalize(workspace.input(), pl)?;
    let formatted_name = summary
        .formatted
        .file_name()
        .unwrap_or_default()
        .to_owned();

    ExternalCommand::new(&config.shell)
        .arg(resolve_program(&config.work_script))
        .arg(&formatted_name)
        .current_dir(workspace.path())
        .timeout(config.timeout)
        .run()
        .inspect_err(|err| log::error!("{}", err))
        .map_err(PipelineError::WorkScript)?;

    ExternalCommand::new(resolve_program(&config.gcm_exe))
        .arg(CLUSTERING_MODES[0])
        .arg(CLUSTERING_MODES[1])
        .arg(CLUSTERING_MODES[2])
        .arg(config.seed.to_string())
        .arg(format!("{:?}", config.chi))
        .arg(&formatted_name)
        .current_dir(workspace.path())
        .timeout(config.timeout)
        .run()
        .inspect_err(|err| log::error!("{}", err))
        .map_err(PipelineError::Clustering)?;

    let partition = summary
        .formatted
        .with_file_name(partition_file_name(&summary.formatted));
    if !partition.is_file() {
        return Err(PipelineError::ResultMissing { path: partition });
    }
    remap_partition(&summary.key_file, &summary.formatted, pl)?;
    Ok(())
}

/// Clusters `input` and writes the partition, keyed by the original labels,
/// to `output_dir/output_file`.
///
/// `output_dir` defaults to the current directory and `output_file` to
/// [`DEFAULT_OUTPUT_FILE`]. Returns the path of the output file.
pub fn run(
    config: &PipelineConfig,
    input: impl AsRef<Path>,
    output_dir: Option<&Path>,
    output_file: Option<&str>,
    pl: &mut impl ProgressLog,
) -> Result<PathBuf, PipelineError> {
    let input = input.as_ref();
    let cwd = std::env::current_dir().map_err(PipelineError::CurrentDir)?;
    let dest = output_dir
        .unwrap_or(cwd.as_path())
        .join(output_file.unwrap_or(DEFAULT_OUTPUT_FILE));
    let dest = std::path::absolute(&dest).unwrap_or(dest);

    if let Some(separator) = config.separator.filter(|&sep| sep != PIPELINE_SEPARATOR) {
        log::warn!(
            "Ignoring separator {}: the pipeline always splits at {}",
            separator,
            PIPELINE_SEPARATOR
        );
    }

    let scratch_dir = config.scratch_dir.as_deref().unwrap_or(cwd.as_path());
    let workspace = Workspace::enter(scratch_dir, input)?;
    let result_name = partition_file_name(
        Normalizer::new()
            .separator(PIPELINE_SEPARATOR)
            .formatted_path(workspace.input()),
    );

    let stages = run_stages(config, &workspace, pl);
    let copied = workspace.exit(&result_name, &dest);

    match (stages, copied) {
        (Err(err), copied) => {
            if let Err(copy_err) = copied {
                log::error!("{}", copy_err);
            }
            Err(err)
        }
        (Ok(()), Ok(Some(path))) => {
            log::info!("Clustering written to {}", path.display());
            Ok(path)
        }
        // removed between remapping and copying
        (Ok(()), Ok(None)) => Err(PipelineError::ResultMissing { path: result_name }),
        (Ok(()), Err(err)) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_program() {
        assert_eq!(resolve_program(Path::new("bash")), PathBuf::from("bash"));
        let resolved = resolve_program(Path::new("./a.out"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("a.out"));
    }

    #[test]
    fn test_in_dir() {
        let config = PipelineConfig::in_dir("/opt/gcm");
        assert_eq!(config.gcm_exe, PathBuf::from("/opt/gcm/a.out"));
        assert_eq!(config.work_script, PathBuf::from("/opt/gcm/work.sh"));
        assert_eq!(config.shell, OsString::from("bash"));
        assert_eq!(config.seed, 12345);
        assert_eq!(config.chi, 0.0);
    }
}
