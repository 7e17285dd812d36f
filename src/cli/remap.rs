/*
 * SPDX-FileCopyrightText: 2026 The gcm-prep contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::cli::GlobalArgs;
use crate::remap::remap_file;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "remap",
    about = "Rewrite a partition file produced by the clustering code in place, replacing dense ids with the labels of a mapping file.",
    long_about = None
)]
pub struct CliArgs {
    /// The mapping file written by the format command.
    pub key_file: PathBuf,
    /// The partition file, with one cluster label per line.
    pub partition_file: PathBuf,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let mut pl = global_args.progress_logger();
    let num_nodes = remap_file(&args.key_file, &args.partition_file, &mut pl)
        .with_context(|| format!("Could not remap {}", args.partition_file.display()))?;
    log::info!(
        "Remapped {} nodes in {}",
        num_nodes,
        args.partition_file.display()
    );
    Ok(())
}
