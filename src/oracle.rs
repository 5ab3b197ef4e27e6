// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Crypto oracle adapter (`C7`): a thin marshaling layer over sign / decrypt
//! / genkey / smartcard-learn. The primitives themselves are explicitly out
//! of scope (spec §1); this is a deterministic stub, not real cryptography.

use crate::{error::AgentError, session::SessionState};

/// Anything the oracle writes back to the client travels through the wire
/// codec's data-line facility; handlers own the actual writer, so the
/// adapter returns the bytes to write rather than writing them itself.
#[derive(Default)]
pub struct CryptoOracle;

impl CryptoOracle {
    pub fn new() -> Self {
        CryptoOracle
    }

    /// Requires a selected keygrip and a pending digest.
    pub fn sign(&self, session: &SessionState) -> Result<Vec<u8>, AgentError> {
        let keygrip = session.keygrip().ok_or(AgentError::NoSecretKey)?;
        if !session.digest.is_set() {
            return Err(AgentError::ParameterError("no hash set".into()));
        }
        Ok(stub_signature(keygrip, session.digest.as_slice()))
    }

    /// Requires a selected keygrip; the ciphertext is pulled by the caller
    /// via inquire before this is invoked.
    pub fn decrypt(
        &self,
        session: &SessionState,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, AgentError> {
        let keygrip = session.keygrip().ok_or(AgentError::NoSecretKey)?;
        Ok(stub_transform(keygrip, ciphertext))
    }

    pub fn genkey(&self, keyparams: &[u8]) -> Result<Vec<u8>, AgentError> {
        Ok(stub_transform(b"genkey-oracle-salt-00", keyparams))
    }

    /// `send` mirrors `LEARN`'s optional sink (§4.7): when false, no data
    /// sink is available and any learned material is reported status-only.
    pub fn learn_smartcard(&self, send: bool) -> Result<Option<Vec<u8>>, AgentError> {
        let _ = send;
        Ok(None)
    }
}

/// Deterministic stand-in signature: a function of `(keygrip, digest)` so
/// repeated calls with the same inputs are reproducible, as the end-to-end
/// sign scenario requires.
fn stub_signature(keygrip: &[u8; 20], digest: &[u8]) -> Vec<u8> {
    stub_transform(keygrip, digest)
}

fn stub_transform(key: &[u8], data: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ key[i % key.len()])
        .collect()
}
