// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RoleConfig {
    Agent,
    KeyboxFrontend,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Pipe,
    Socket,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TransportConfig {
    pub mode: TransportMode,
    #[serde(default)]
    pub socket_path: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Which personality this daemon instance runs as.
    #[serde(rename = "Role")]
    pub role: RoleConfig,

    /// Directory the trust list and any on-disk resources live under.
    #[serde(rename = "HomeDir")]
    pub home_dir: String,

    /// How clients reach this daemon.
    #[serde(rename = "Transport")]
    pub transport: TransportConfig,

    /// On-disk keybox resources to add at startup, in order. The in-memory
    /// cache is always seeded first regardless of this list.
    #[serde(default, rename = "Resources")]
    pub resources: Vec<String>,

    /// Path (relative to `HomeDir` unless absolute) of the persisted trust
    /// list file.
    #[serde(rename = "TrustListFile")]
    pub trust_list_file: String,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.home_dir.is_empty(), "HomeDir must not be empty");
        ensure!(
            !self.trust_list_file.is_empty(),
            "TrustListFile must not be empty"
        );
        if self.transport.mode == TransportMode::Socket {
            ensure!(
                self.transport.socket_path.as_deref().is_some_and(|p| !p.is_empty()),
                "Transport.socket_path is required when mode is socket"
            );
        }
        for resource in &self.resources {
            ensure!(
                resource.ends_with(".kbx"),
                "unsupported resource suffix: {resource}"
            );
        }
        Ok(())
    }

    pub fn trust_list_path(&self) -> std::path::PathBuf {
        let p = Path::new(&self.trust_list_file);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            Path::new(&self.home_dir).join(p)
        }
    }
}
