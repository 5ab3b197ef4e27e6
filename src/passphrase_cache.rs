// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Passphrase cache (`C4`): short-TTL confidential store keyed by a
//! caller-supplied cache id.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use zeroize::Zeroize;

use crate::error::AgentError;

const MAX_KEY_LEN: usize = 50;

/// Confidential byte buffer wiped on drop.
#[derive(Clone)]
pub struct Confidential(Vec<u8>);

impl Confidential {
    pub fn new(bytes: Vec<u8>) -> Self {
        Confidential(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for Confidential {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for Confidential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Confidential(..)")
    }
}

struct Entry {
    value: Confidential,
    expires_at: Option<Instant>,
}

/// Keyed confidential store with TTL, insertion and explicit invalidation.
/// A `ttl` of 0 means "until daemon exit" (no expiry).
#[derive(Default)]
pub struct PassphraseCache {
    entries: DashMap<String, Entry>,
}

impl PassphraseCache {
    pub fn new() -> Self {
        PassphraseCache {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Confidential> {
        let live = self
            .entries
            .get(key)
            .filter(|e| e.expires_at.is_none_or(|at| Instant::now() < at))
            .map(|e| e.value.clone());
        if live.is_none() {
            self.entries.remove(key);
        }
        live
    }

    pub fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), AgentError> {
        if key.len() > MAX_KEY_LEN {
            return Err(AgentError::ParameterError(format!(
                "passphrase cache key longer than {MAX_KEY_LEN} characters"
            )));
        }
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Confidential::new(value),
                expires_at,
            },
        );
        Ok(())
    }

    /// No-op on an absent key; always reports success, per the contract.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let cache = PassphraseCache::new();
        cache
            .put("mykey", b"hunter2".to_vec(), Duration::ZERO)
            .expect("valid key");
        let v = cache.get("mykey").expect("present");
        assert_eq!(v.as_bytes(), b"hunter2");
    }

    #[test]
    fn get_after_ttl_expiry_is_none() {
        let cache = PassphraseCache::new();
        cache
            .put("mykey", b"hunter2".to_vec(), Duration::from_millis(1))
            .expect("valid key");
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("mykey").is_none());
    }

    #[test]
    fn invalidate_absent_key_is_ok() {
        let cache = PassphraseCache::new();
        cache.invalidate("absent");
    }

    #[test]
    fn invalidate_then_get_is_none() {
        let cache = PassphraseCache::new();
        cache
            .put("mykey", b"hunter2".to_vec(), Duration::ZERO)
            .expect("valid key");
        cache.invalidate("mykey");
        assert!(cache.get("mykey").is_none());
    }

    #[test]
    fn overlong_key_is_parameter_error() {
        let cache = PassphraseCache::new();
        let key = "x".repeat(51);
        let err = cache
            .put(&key, b"value".to_vec(), Duration::ZERO)
            .expect_err("too long");
        assert!(matches!(err, AgentError::ParameterError(_)));
    }
}
