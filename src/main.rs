/*
 * SPDX-FileCopyrightText: 2026 The gcm-prep contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */
use anyhow::Result;
use clap::Parser;
use gcm_prep::cli::{execute, init_env_logger, Cli};

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    // Initialize the logger
    init_env_logger(cli.args.verbose)?;
    if let Err(err) = execute(cli) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
