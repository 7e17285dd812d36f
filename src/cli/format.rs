/*
 * SPDX-FileCopyrightText: 2026 The gcm-prep contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::cli::GlobalArgs;
use crate::normalize::{Normalizer, Separator, DEFAULT_SUFFIX};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "format",
    about = "Renumber the nodes of an edge list to 1, 2, …, n for use with the generalized modularity density code.",
    long_about = "Renumber the nodes of an edge list to 1, 2, …, n, where n is the number of distinct node labels, for use with the generalized modularity density code. Each line of the edge list must contain a source label, a target label, and a weight. Labels are numbered in lexicographical order. Output is two files next to the input: [file][suffix].[ext] contains the renumbered edge list, and [file]_key.[ext] the mapping from original labels to new ids."
)]
pub struct CliArgs {
    /// The edge list.
    pub file: PathBuf,

    #[arg(long, default_value = DEFAULT_SUFFIX)]
    /// The output file will be named [file]_[name].[ext]. The underscore is
    /// optional; "key" is reserved for the mapping.
    pub name: String,

    #[arg(long, default_value_t = 0)]
    /// The number of lines to skip (useful if the file has a header row).
    pub skip: usize,

    #[arg(long, value_enum, default_value_t = Separator::Space)]
    /// How to split the lines of the edge list.
    pub sep: Separator,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let normalizer = Normalizer::new()
        .skip(args.skip)
        .separator(args.sep)
        .suffix(&args.name)?;

    let mut pl = global_args.progress_logger();
    let summary = normalizer
        .normalize(&args.file, &mut pl)
        .with_context(|| format!("Could not format {}", args.file.display()))?;

    log::info!(
        "Wrote {} edges on {} nodes to {}, mapping to {}",
        summary.num_edges,
        summary.mapping.len(),
        summary.formatted.display(),
        summary.key_file.display()
    );
    Ok(())
}
