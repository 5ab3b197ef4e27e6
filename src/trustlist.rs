// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Trust list (`C5`): append-only set of approved fingerprints, persisted as
//! a flat text file under the daemon's home directory.

use dashmap::DashMap;
use tokio::io::AsyncWriteExt;

use crate::error::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustFlag {
    Signed,
    Provisional,
}

impl TrustFlag {
    pub fn parse(c: char) -> Result<Self, AgentError> {
        match c {
            'S' => Ok(TrustFlag::Signed),
            'P' => Ok(TrustFlag::Provisional),
            other => Err(AgentError::ParameterError(format!(
                "trust flag must be 'S' or 'P', got '{other}'"
            ))),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            TrustFlag::Signed => 'S',
            TrustFlag::Provisional => 'P',
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrustEntry {
    pub fingerprint: String,
    pub flag: TrustFlag,
    pub display_name: String,
}

/// Canonicalizes a 32-hex or 40-hex fingerprint to its 40-hex stored form,
/// left-zero-padding 32-hex (MD5) input. Shared with keygrip/UBID parsing
/// in the dispatcher.
pub fn canonicalize_fingerprint(raw: &str) -> Result<String, AgentError> {
    if raw.len() % 2 != 0 {
        return Err(AgentError::ParameterError(
            "fingerprint has an odd number of digits".into(),
        ));
    }
    if !raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AgentError::ParameterError(
            "fingerprint must be hex digits".into(),
        ));
    }
    match raw.len() {
        40 => Ok(raw.to_ascii_uppercase()),
        32 => Ok(format!("{}{}", "0".repeat(8), raw.to_ascii_uppercase())),
        other => Err(AgentError::ParameterError(format!(
            "fingerprint must be 32 or 40 hex digits, got {other}"
        ))),
    }
}

#[derive(Default)]
pub struct TrustList {
    entries: DashMap<String, TrustEntry>,
}

pub enum Trusted {
    Trusted,
    NotTrusted,
}

impl TrustList {
    pub fn new() -> Self {
        TrustList {
            entries: DashMap::new(),
        }
    }

    pub fn is_trusted(&self, fpr: &str) -> Result<Trusted, AgentError> {
        let key = canonicalize_fingerprint(fpr)?;
        Ok(if self.entries.contains_key(&key) {
            Trusted::Trusted
        } else {
            Trusted::NotTrusted
        })
    }

    /// Appends an entry after external confirmation; idempotent on
    /// duplicate additions.
    pub fn mark_trusted(
        &self,
        fpr: &str,
        flag: TrustFlag,
        display_name: &str,
    ) -> Result<(), AgentError> {
        let key = canonicalize_fingerprint(fpr)?;
        self.entries.insert(
            key.clone(),
            TrustEntry {
                fingerprint: key,
                flag,
                display_name: display_name.to_string(),
            },
        );
        Ok(())
    }

    /// Streams every entry through `sink` as `S TRUSTLISTENTRY <fpr> <flag>
    /// <display-name>` status lines (the wire shape SPEC_FULL pins for
    /// `LISTTRUSTED`).
    pub fn list<F: FnMut(&TrustEntry)>(&self, mut sink: F) {
        for entry in self.entries.iter() {
            sink(entry.value());
        }
    }

    /// Appends one newly-marked entry's line to the trust list file. Never
    /// rewrites or truncates prior content, per the append-only invariant
    /// (§3): a crash partway through still leaves every earlier entry intact.
    pub async fn append_entry(
        &self,
        path: &std::path::Path,
        fpr: &str,
        flag: TrustFlag,
        display_name: &str,
    ) -> Result<(), AgentError> {
        let key = canonicalize_fingerprint(fpr)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AgentError::Transport(e.to_string()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;
        let line = format!("{} {} {}\n", key, flag.as_char(), display_name);
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;
        Ok(())
    }

    pub fn load_from_str(raw: &str) -> Result<Self, AgentError> {
        let list = TrustList::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(3, char::is_whitespace);
            let fpr = parts
                .next()
                .ok_or_else(|| AgentError::ParameterError("missing fingerprint".into()))?;
            let flag = parts
                .next()
                .and_then(|s| s.chars().next())
                .ok_or_else(|| AgentError::ParameterError("missing trust flag".into()))?;
            let display_name = parts.next().unwrap_or("").trim_start();
            list.mark_trusted(fpr, TrustFlag::parse(flag)?, display_name)?;
        }
        Ok(list)
    }
}
