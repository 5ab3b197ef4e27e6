// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Command dispatcher (`C3`): a static verb table, per-connection run loop,
//! and the `Idle -> Parsing -> Executing -> Inquiring -> Replying -> Idle`
//! state machine. Mirrors `register_commands`/`start_command_handler` from
//! the original agent command table, generalized into a data-driven lookup
//! plus a match-based handler call.

pub mod agent_commands;
pub mod keybox_commands;

use std::{collections::HashMap, sync::Arc};

use dashmap::DashSet;
use once_cell::sync::Lazy;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::{
    backend::BackendTable,
    error::AgentError,
    locking::LockedBackendTable,
    oracle::CryptoOracle,
    passphrase_cache::PassphraseCache,
    session::SessionState,
    trustlist::TrustList,
    wire::codec::{Reply, Request},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Agent,
    KeyboxFrontend,
}

/// Every verb this daemon understands, independent of which role is active.
/// A role rejects verbs it doesn't own with a plain parameter error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    IsTrusted,
    ListTrusted,
    MarkTrusted,
    HaveKey,
    SigKey,
    SetHash,
    PkSign,
    PkDecrypt,
    GenKey,
    GetPassphrase,
    ClearPassphrase,
    Learn,
    Option,
    Search,
    Next,
    Store,
    Delete,
}

static VERB_TABLE: Lazy<HashMap<&'static str, Verb>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("ISTRUSTED", Verb::IsTrusted);
    m.insert("LISTTRUSTED", Verb::ListTrusted);
    m.insert("MARKTRUSTED", Verb::MarkTrusted);
    m.insert("HAVEKEY", Verb::HaveKey);
    m.insert("SIGKEY", Verb::SigKey);
    m.insert("SETKEY", Verb::SigKey); // alias, per the Open Question decision
    m.insert("SETHASH", Verb::SetHash);
    m.insert("PKSIGN", Verb::PkSign);
    m.insert("PKDECRYPT", Verb::PkDecrypt);
    m.insert("GENKEY", Verb::GenKey);
    m.insert("GET_PASSPHRASE", Verb::GetPassphrase);
    m.insert("CLEAR_PASSPHRASE", Verb::ClearPassphrase);
    m.insert("LEARN", Verb::Learn);
    m.insert("OPTION", Verb::Option);
    m.insert("SEARCH", Verb::Search);
    m.insert("NEXT", Verb::Next);
    m.insert("STORE", Verb::Store);
    m.insert("DELETE", Verb::Delete);
    m
});

/// Process-wide state shared by every connection: trust list, passphrase
/// cache, the lock-guarded backend table, the crypto oracle, and the set of
/// keygrips the (external, out-of-scope) secret-key store currently knows
/// about.
pub struct DaemonState {
    pub role: Role,
    pub trust_list: TrustList,
    pub passphrase_cache: PassphraseCache,
    pub backend_table: LockedBackendTable,
    pub oracle: CryptoOracle,
    pub known_keygrips: DashSet<[u8; 20]>,
    /// Where `MARKTRUSTED` appends newly confirmed entries. `None` keeps the
    /// trust list in-memory only (used by tests that don't care about
    /// surviving a restart).
    pub trust_list_path: Option<std::path::PathBuf>,
}

impl DaemonState {
    pub fn new(role: Role) -> Self {
        DaemonState {
            role,
            trust_list: TrustList::new(),
            passphrase_cache: PassphraseCache::new(),
            backend_table: LockedBackendTable::new(BackendTable::new()),
            oracle: CryptoOracle::new(),
            known_keygrips: DashSet::new(),
            trust_list_path: None,
        }
    }
}

/// Parses an exact-length hex string into a fixed-size byte array, matching
/// the odd-length-digits and wrong-length parameter errors from the
/// original argument parser.
pub fn parse_hex_fixed(s: &str, expected_bytes: usize) -> Result<Vec<u8>, AgentError> {
    if s.len() % 2 != 0 {
        return Err(AgentError::ParameterError(
            "odd number of digits".into(),
        ));
    }
    let bytes = hex::decode(s)
        .map_err(|e| AgentError::ParameterError(format!("invalid hex: {e}")))?;
    if bytes.len() != expected_bytes {
        return Err(AgentError::ParameterError(format!(
            "expected {expected_bytes} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

pub fn parse_keygrip(s: &str) -> Result<[u8; 20], AgentError> {
    let bytes = parse_hex_fixed(s, 20)?;
    let mut grip = [0u8; 20];
    grip.copy_from_slice(&bytes);
    Ok(grip)
}

/// One accepted connection: transport halves, session state, and a handle
/// to the shared daemon state.
pub struct Connection<R, W> {
    reader: R,
    writer: W,
    pub session: SessionState,
    pub state: Arc<DaemonState>,
}

impl<R, W> Connection<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, state: Arc<DaemonState>) -> Self {
        Connection {
            reader,
            writer,
            session: SessionState::new(),
            state,
        }
    }

    pub async fn write_reply(&mut self, reply: &Reply) -> Result<(), AgentError> {
        self.writer
            .write_all(&reply.render())
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))
    }

    pub async fn emit_status(&mut self, keyword: &str, text: &str) -> Result<(), AgentError> {
        self.write_reply(&Reply::Status(keyword.to_string(), text.to_string()))
            .await
    }

    pub async fn emit_data(&mut self, payload: &[u8]) -> Result<(), AgentError> {
        self.write_reply(&Reply::Data(payload.to_vec())).await
    }

    pub async fn inquire(&mut self, keyword: &str, max_bytes: usize) -> Result<Vec<u8>, AgentError> {
        crate::wire::inquire(&mut self.reader, &mut self.writer, keyword, max_bytes).await
    }

    /// Reads and dispatches commands until the peer disconnects or sends
    /// `BYE`. A transport error terminates the connection immediately.
    pub async fn run(&mut self) -> Result<(), AgentError> {
        loop {
            let mut line = String::new();
            let n = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| AgentError::Transport(e.to_string()))?;
            if n == 0 {
                return Ok(());
            }
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let outcome = self.dispatch_line(line).await;
            match outcome {
                DispatchOutcome::Continue(reply) => self.write_reply(&reply).await?,
                DispatchOutcome::Bye => {
                    self.write_reply(&Reply::Ok(None)).await?;
                    return Ok(());
                },
            }
        }
    }

    async fn dispatch_line(&mut self, line: &str) -> DispatchOutcome {
        let req = match Request::parse(line) {
            Ok(r) => r,
            Err(e) => return DispatchOutcome::Continue(Reply::from_error(&e)),
        };

        debug!(verb = %req.verb, "dispatching command");

        if req.verb == "RESET" {
            self.session.reset_notify();
            return DispatchOutcome::Continue(Reply::Ok(None));
        }
        if req.verb == "BYE" || req.verb == "QUIT" {
            return DispatchOutcome::Bye;
        }

        let Some(verb) = VERB_TABLE.get(req.verb.as_str()).copied() else {
            return DispatchOutcome::Continue(Reply::from_error(&AgentError::ParameterError(
                format!("unknown command: {}", req.verb),
            )));
        };

        if !self.state.role.owns(verb) {
            return DispatchOutcome::Continue(Reply::from_error(&AgentError::ParameterError(
                format!("command not valid in this role: {}", req.verb),
            )));
        }

        let result = match verb {
            Verb::IsTrusted => agent_commands::istrusted(self, &req).await,
            Verb::ListTrusted => agent_commands::listtrusted(self).await,
            Verb::MarkTrusted => agent_commands::marktrusted(self, &req).await,
            Verb::HaveKey => agent_commands::havekey(self, &req).await,
            Verb::SigKey => agent_commands::sigkey(self, &req).await,
            Verb::SetHash => agent_commands::sethash(self, &req).await,
            Verb::PkSign => agent_commands::pksign(self).await,
            Verb::PkDecrypt => agent_commands::pkdecrypt(self).await,
            Verb::GenKey => agent_commands::genkey(self).await,
            Verb::GetPassphrase => agent_commands::get_passphrase(self, &req).await,
            Verb::ClearPassphrase => agent_commands::clear_passphrase(self, &req).await,
            Verb::Learn => agent_commands::learn(self, &req).await,
            Verb::Option => agent_commands::option_set(self, &req).await,
            Verb::Search => keybox_commands::search(self, &req).await,
            Verb::Next => keybox_commands::next(self).await,
            Verb::Store => keybox_commands::store(self, &req).await,
            Verb::Delete => keybox_commands::delete(self, &req).await,
        };

        match result {
            Ok(HandlerOutcome::Ok(text)) => DispatchOutcome::Continue(Reply::Ok(text)),
            Ok(HandlerOutcome::OkConfidential(text)) => {
                DispatchOutcome::Continue(Reply::OkConfidential(text))
            },
            Err(e) => DispatchOutcome::Continue(Reply::from_error(&e)),
        }
    }
}

/// What a handler wants the dispatcher to send as its final reply, after any
/// `Status`/`Data` lines the handler already wrote directly.
pub enum HandlerOutcome {
    Ok(Option<String>),
    /// Final reply text that must never reach a log line (§4.4).
    OkConfidential(String),
}

enum DispatchOutcome {
    Continue(Reply),
    Bye,
}

impl Role {
    fn owns(self, verb: Verb) -> bool {
        match self {
            Role::Agent => !matches!(
                verb,
                Verb::Search | Verb::Next | Verb::Store | Verb::Delete
            ),
            Role::KeyboxFrontend => matches!(
                verb,
                Verb::Search | Verb::Next | Verb::Store | Verb::Delete
            ),
        }
    }
}
