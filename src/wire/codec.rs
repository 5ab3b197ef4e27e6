// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Request tokenizing and reply rendering for the line-oriented protocol
//! described by `C1` (`OK` / `ERR` / `S` / `D` / `INQUIRE` / `END`).

use crate::error::{AgentError, ErrCode};

/// A single parsed request line: an uppercase verb plus its raw argument
/// tail, exactly as it appeared after the verb (still unsplit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub verb: String,
    pub rest: String,
}

impl Request {
    /// Parses a raw line (already stripped of its trailing `\n`/`\r\n`) into
    /// a verb and the remaining argument text. Comment lines (`#...`) and
    /// blank lines are not commands; callers filter those out before this is
    /// reached.
    pub fn parse(line: &str) -> Result<Self, AgentError> {
        let line = line.trim_end();
        let mut it = line.splitn(2, char::is_whitespace);
        let verb = it
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AgentError::ParameterError("empty command line".into()))?;
        let rest = it.next().unwrap_or("").trim_start().to_string();
        Ok(Request {
            verb: verb.to_ascii_uppercase(),
            rest,
        })
    }

    /// Splits the argument tail on whitespace runs. Used by verbs whose
    /// grammar is a fixed list of positional tokens.
    pub fn tokens(&self) -> Vec<&str> {
        self.rest.split_whitespace().collect()
    }
}

/// A single reply unit. A handler may emit any number of `Status`/`Data`
/// lines before its final `Ok`/`Err`/terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok(Option<String>),
    /// Same wire shape as `Ok(Some(text))`; the variant exists so callers
    /// that log replies can refuse to log this one's text (`GET_PASSPHRASE`).
    OkConfidential(String),
    Err(ErrCode, String),
    Status(String, String),
    Data(Vec<u8>),
    Inquire(String),
    End,
}

impl Reply {
    pub fn from_error(err: &AgentError) -> Self {
        let (code, text) = err.render();
        Reply::Err(code, text)
    }

    /// Renders this reply as the exact bytes (including trailing `\n`) to
    /// write to the peer.
    pub fn render(&self) -> Vec<u8> {
        match self {
            Reply::Ok(None) => b"OK\n".to_vec(),
            Reply::Ok(Some(text)) => format!("OK {text}\n").into_bytes(),
            Reply::OkConfidential(text) => format!("OK {text}\n").into_bytes(),
            Reply::Err(code, text) => format!("ERR {code} {text}\n").into_bytes(),
            Reply::Status(keyword, text) if text.is_empty() => {
                format!("S {keyword}\n").into_bytes()
            },
            Reply::Status(keyword, text) => format!("S {keyword} {text}\n").into_bytes(),
            Reply::Data(payload) => {
                let mut out = Vec::with_capacity(payload.len() + 2);
                out.extend_from_slice(b"D ");
                out.extend_from_slice(&escape_data(payload));
                out.push(b'\n');
                out
            },
            Reply::Inquire(keyword) => format!("INQUIRE {keyword}\n").into_bytes(),
            Reply::End => b"END\n".to_vec(),
        }
    }
}

/// Percent-escapes `%`, CR and LF so an arbitrary binary payload can travel
/// on a single `D` line.
pub fn escape_data(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        match b {
            b'%' | b'\r' | b'\n' => {
                out.push(b'%');
                out.extend_from_slice(format!("{b:02X}").as_bytes());
            },
            _ => out.push(b),
        }
    }
    out
}

/// Reverses [`escape_data`]. Returns an error on a truncated or malformed
/// `%XX` escape.
pub fn unescape_data(data: &[u8]) -> Result<Vec<u8>, AgentError> {
    let mut out = Vec::with_capacity(data.len());
    let mut it = data.iter().copied();
    while let Some(b) = it.next() {
        if b == b'%' {
            let hi = it
                .next()
                .ok_or_else(|| AgentError::ParameterError("truncated escape".into()))?;
            let lo = it
                .next()
                .ok_or_else(|| AgentError::ParameterError("truncated escape".into()))?;
            let hex = [hi, lo];
            let s = std::str::from_utf8(&hex)
                .map_err(|_| AgentError::ParameterError("invalid escape".into()))?;
            let v = u8::from_str_radix(s, 16)
                .map_err(|_| AgentError::ParameterError("invalid escape".into()))?;
            out.push(v);
        } else {
            out.push(b);
        }
    }
    Ok(out)
}
