/*
 * SPDX-FileCopyrightText: 2026 The gcm-prep contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::cli::{parse_duration, GlobalArgs};
use crate::normalize::Separator;
use crate::pipeline::{self, PipelineConfig, DEFAULT_CHI, DEFAULT_SEED, DEFAULT_SHELL};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "run",
    about = "Cluster a comma-separated edge list with the generalized modularity density code, writing the partition keyed by the original node labels.",
    long_about = None
)]
pub struct CliArgs {
    /// The input edge list, e.g., file_name.txt.
    pub input_file: PathBuf,

    #[arg(long, alias = "output_dir")]
    /// The directory where the output file is saved; default is the current
    /// directory.
    pub output_dir: Option<PathBuf>,

    #[arg(long, alias = "output_file")]
    /// The name of the output file; default is clustering_output.txt.
    pub output_file: Option<String>,

    #[arg(long, default_value_t = DEFAULT_SEED, allow_negative_numbers = true)]
    /// The random seed of the clustering code.
    pub seed: i64,

    #[arg(long, default_value_t = DEFAULT_CHI, allow_negative_numbers = true)]
    /// The value of chi.
    pub chi: f64,

    #[arg(long, value_enum)]
    /// The separator of the input, one of space, comma or semicolon (other
    /// values are rejected). Currently ignored: the input is always split at
    /// commas, and a warning is logged if another separator is given.
    pub sep: Option<Separator>,

    #[arg(long)]
    /// The clustering executable; default is a.out in the directory of this
    /// binary.
    pub gcm_exe: Option<PathBuf>,

    #[arg(long)]
    /// The work script; default is work.sh in the directory of this binary.
    pub work_script: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_SHELL)]
    /// The shell running the work script.
    pub shell: String,

    #[arg(long, value_parser = parse_duration)]
    /// Kill external programs running longer than this (same syntax as
    /// --log-interval); by default there is no limit.
    pub timeout: Option<Duration>,

    #[arg(long)]
    /// Where the scratch directory is created; default is the current
    /// directory.
    pub scratch_dir: Option<PathBuf>,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let mut config = PipelineConfig::beside_current_exe()
        .context("Could not locate the directory of the running binary")?;
    if let Some(gcm_exe) = args.gcm_exe {
        config.gcm_exe = gcm_exe;
    }
    if let Some(work_script) = args.work_script {
        config.work_script = work_script;
    }
    config.shell = args.shell.into();
    config.timeout = args.timeout;
    config.seed = args.seed;
    config.chi = args.chi;
    config.separator = args.sep;
    config.scratch_dir = args.scratch_dir;

    let mut pl = global_args.progress_logger();
    let output = pipeline::run(
        &config,
        &args.input_file,
        args.output_dir.as_deref(),
        args.output_file.as_deref(),
        &mut pl,
    )
    .with_context(|| format!("Could not cluster {}", args.input_file.display()))?;
    log::info!("Partition written to {}", output.display());
    Ok(())
}
