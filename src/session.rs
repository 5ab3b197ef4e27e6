// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-connection mutable state (`C2`): selected keygrip, pending digest,
//! environment overrides, and the lazily-created backend request handle.

use zeroize::Zeroize;

use crate::{backend::SearchDesc, error::AgentError};

pub const MAX_DIGEST_LEN: usize = 64;
const VALID_DIGEST_LENGTHS: [usize; 4] = [16, 20, 24, 32];

/// Pending message digest awaiting `PKSIGN`.
#[derive(Debug, Clone, Default)]
pub struct PendingDigest {
    pub algo_id: u32,
    bytes: [u8; MAX_DIGEST_LEN],
    pub length: usize,
}

impl Drop for PendingDigest {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl PendingDigest {
    pub fn set(&mut self, algo_id: u32, bytes: &[u8]) -> Result<(), AgentError> {
        if !VALID_DIGEST_LENGTHS.contains(&bytes.len()) {
            return Err(AgentError::ParameterError(format!(
                "digest length {} not in {{16,20,24,32}}",
                bytes.len()
            )));
        }
        self.bytes[..bytes.len()].copy_from_slice(bytes);
        self.length = bytes.len();
        self.algo_id = algo_id;
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.length]
    }

    pub fn is_set(&self) -> bool {
        self.length != 0
    }

    fn clear(&mut self) {
        self.bytes.zeroize();
        self.length = 0;
        self.algo_id = 0;
    }
}

/// Fixed set of environment keys the agent may override per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvKey {
    Display,
    TtyName,
    TtyType,
    LcCtype,
    LcMessages,
}

impl EnvKey {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "display" => Some(EnvKey::Display),
            "ttyname" => Some(EnvKey::TtyName),
            "ttytype" => Some(EnvKey::TtyType),
            "lc-ctype" => Some(EnvKey::LcCtype),
            "lc-messages" => Some(EnvKey::LcMessages),
            _ => None,
        }
    }
}

/// Environment overrides, each independently settable. Kept as a fixed set
/// of fields rather than a map so a failed allocation cannot corrupt the
/// other overrides.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub display: Option<String>,
    pub ttyname: Option<String>,
    pub ttytype: Option<String>,
    pub lc_ctype: Option<String>,
    pub lc_messages: Option<String>,
}

impl EnvOverrides {
    pub fn set(&mut self, key: EnvKey, value: String) {
        let slot = match key {
            EnvKey::Display => &mut self.display,
            EnvKey::TtyName => &mut self.ttyname,
            EnvKey::TtyType => &mut self.ttytype,
            EnvKey::LcCtype => &mut self.lc_ctype,
            EnvKey::LcMessages => &mut self.lc_messages,
        };
        *slot = Some(value);
    }
}

/// Cursor and resume-by-identifier state for one session's backend scan.
/// Owned by the session, consumed by the backend chain (`C6`).
#[derive(Debug, Clone, Default)]
pub struct RequestHandle {
    pub any_search: bool,
    pub any_found: bool,
    pub next_dbidx: usize,
    pub last_cached_ubid: Option<[u8; 20]>,
    pub last_cached_valid: bool,
    pub last_cached_final: bool,
}

impl RequestHandle {
    /// Full clear, used both on session reset and on `SEARCH` with `reset =
    /// true`. Clears everything, per the Open Question decision recorded in
    /// DESIGN.md.
    pub fn reset(&mut self) {
        *self = RequestHandle::default();
    }
}

/// Per-connection state, one instance per accepted transport connection.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    keygrip: [u8; 20],
    pub have_keygrip: bool,
    pub digest: PendingDigest,
    pub env_overrides: EnvOverrides,
    pub request: Option<RequestHandle>,
    /// Last descriptor list passed to `SEARCH`, reused by a follow-up `NEXT`.
    pub last_search_desc: Option<Vec<SearchDesc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keygrip(&self) -> Option<&[u8; 20]> {
        self.have_keygrip.then_some(&self.keygrip)
    }

    pub fn set_keygrip(&mut self, grip: [u8; 20]) {
        self.keygrip = grip;
        self.have_keygrip = true;
    }

    /// Lazily creates the backend request handle on first search/store/delete.
    pub fn request_mut(&mut self) -> &mut RequestHandle {
        self.request.get_or_insert_with(RequestHandle::default)
    }

    /// `reset_notify`: clears `keygrip`/`have_keygrip`/`digest.length`. Does
    /// not touch environment overrides or the request handle.
    pub fn reset_notify(&mut self) {
        self.keygrip = [0u8; 20];
        self.have_keygrip = false;
        self.digest.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_notify_clears_keygrip_and_digest_only() {
        let mut s = SessionState::new();
        s.set_keygrip([0x11; 20]);
        s.digest.set(8, &[0xaa; 32]).expect("valid digest");
        s.env_overrides.set(EnvKey::TtyName, "tty0".into());
        s.request_mut().any_search = true;

        s.reset_notify();

        assert!(!s.have_keygrip);
        assert_eq!(s.digest.length, 0);
        assert_eq!(s.env_overrides.ttyname.as_deref(), Some("tty0"));
        assert!(s.request.is_some());
    }

    #[test]
    fn digest_rejects_invalid_length() {
        let mut d = PendingDigest::default();
        let err = d.set(8, &[0u8; 17]).expect_err("17 is not a valid length");
        assert!(matches!(err, AgentError::ParameterError(_)));
        assert_eq!(d.length, 0);
    }
}
