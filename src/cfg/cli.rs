// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "keybrokerd", about = "Local credential-and-keystore broker")]
pub struct Cli {
    /// Path to the daemon's YAML configuration file.
    #[arg(long, default_value = "keybrokerd.yaml")]
    pub config: PathBuf,

    /// Path to the logging configuration file.
    #[arg(long, default_value = "keybrokerd_logger.yaml")]
    pub log_config: PathBuf,

    /// Listen on a Unix-domain socket instead of inheriting a pipe pair.
    #[arg(long)]
    pub server: bool,
}

pub fn resolve_config_path(rel: impl AsRef<Path>) -> Result<PathBuf> {
    let p = rel.as_ref();

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}
