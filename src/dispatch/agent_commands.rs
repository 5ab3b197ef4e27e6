// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Agent-role verb handlers: trust list, key selection, signing/decryption,
//! passphrase cache, and the option handler. Argument parsing follows
//! `agent/command.c`'s per-verb grammar.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncWrite};

use super::{parse_keygrip, Connection, HandlerOutcome};
use crate::{
    error::AgentError,
    session::EnvKey,
    trustlist::{TrustFlag, Trusted},
    wire::codec::Request,
};

const CIPHERTEXT_MAX: usize = 4096;
const KEYPARAM_MAX: usize = 1024;

pub async fn istrusted<R, W>(
    conn: &mut Connection<R, W>,
    req: &Request,
) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let fpr = req.rest.trim();
    match conn.state.trust_list.is_trusted(fpr)? {
        Trusted::Trusted => Ok(HandlerOutcome::Ok(None)),
        Trusted::NotTrusted => Err(AgentError::NotTrusted),
    }
}

pub async fn listtrusted<R, W>(conn: &mut Connection<R, W>) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let entries: Vec<_> = {
        let mut out = Vec::new();
        conn.state.trust_list.list(|e| out.push(e.clone()));
        out
    };
    for entry in entries {
        let text = format!(
            "{} {} {}",
            entry.fingerprint,
            entry.flag.as_char(),
            entry.display_name
        );
        conn.emit_status("TRUSTLISTENTRY", &text).await?;
    }
    Ok(HandlerOutcome::Ok(None))
}

pub async fn marktrusted<R, W>(
    conn: &mut Connection<R, W>,
    req: &Request,
) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut it = req.rest.splitn(3, char::is_whitespace);
    let fpr = it
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AgentError::ParameterError("missing fingerprint".into()))?;
    let flag_str = it
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AgentError::ParameterError("missing trust flag".into()))?;
    let flag_char = flag_str.chars().next().ok_or_else(|| {
        AgentError::ParameterError("missing trust flag".into())
    })?;
    let display_name = it.next().unwrap_or("").trim().trim_matches('"');

    let flag = TrustFlag::parse(flag_char)?;
    conn.state
        .trust_list
        .mark_trusted(fpr, flag, display_name)?;
    if let Some(path) = conn.state.trust_list_path.as_deref() {
        conn.state
            .trust_list
            .append_entry(path, fpr, flag, display_name)
            .await?;
    }
    Ok(HandlerOutcome::Ok(None))
}

pub async fn havekey<R, W>(
    conn: &mut Connection<R, W>,
    req: &Request,
) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let grip = parse_keygrip(req.rest.trim())?;
    if conn.state.known_keygrips.contains(&grip) {
        Ok(HandlerOutcome::Ok(None))
    } else {
        Err(AgentError::NoSecretKey)
    }
}

pub async fn sigkey<R, W>(
    conn: &mut Connection<R, W>,
    req: &Request,
) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let grip = parse_keygrip(req.rest.trim())?;
    conn.session.set_keygrip(grip);
    Ok(HandlerOutcome::Ok(None))
}

/// Digest algorithm ids recognized by `SETHASH` (GnuPG's numbering:
/// MD5=1, SHA1=2, RMD160=3, SHA256=8, SHA384=9, SHA512=10).
const KNOWN_DIGEST_ALGOS: [u32; 6] = [1, 2, 3, 8, 9, 10];

pub async fn sethash<R, W>(
    conn: &mut Connection<R, W>,
    req: &Request,
) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let tokens = req.tokens();
    let [algo_str, hex_str] = tokens[..] else {
        return Err(AgentError::ParameterError(
            "SETHASH requires <algo-id> <hex>".into(),
        ));
    };
    let algo_id: u32 = algo_str
        .parse()
        .map_err(|_| AgentError::ParameterError("algo-id must be decimal".into()))?;
    if !KNOWN_DIGEST_ALGOS.contains(&algo_id) {
        return Err(AgentError::UnsupportedAlgorithm(format!(
            "unknown digest algorithm id {algo_id}"
        )));
    }
    if hex_str.len() % 2 != 0 {
        return Err(AgentError::ParameterError("odd number of digits".into()));
    }
    let bytes = hex::decode(hex_str)
        .map_err(|e| AgentError::ParameterError(format!("invalid hex: {e}")))?;
    conn.session.digest.set(algo_id, &bytes)?;
    Ok(HandlerOutcome::Ok(None))
}

pub async fn pksign<R, W>(conn: &mut Connection<R, W>) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let sig = conn.state.oracle.sign(&conn.session)?;
    conn.emit_data(&sig).await?;
    Ok(HandlerOutcome::Ok(None))
}

pub async fn pkdecrypt<R, W>(conn: &mut Connection<R, W>) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if conn.session.keygrip().is_none() {
        return Err(AgentError::NoSecretKey);
    }
    let ciphertext = conn.inquire("CIPHERTEXT", CIPHERTEXT_MAX).await?;
    let plain = conn.state.oracle.decrypt(&conn.session, &ciphertext)?;
    conn.emit_data(&plain).await?;
    Ok(HandlerOutcome::Ok(None))
}

pub async fn genkey<R, W>(conn: &mut Connection<R, W>) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let keyparams = conn.inquire("KEYPARAM", KEYPARAM_MAX).await?;
    let public = conn.state.oracle.genkey(&keyparams)?;
    conn.emit_data(&public).await?;
    Ok(HandlerOutcome::Ok(None))
}

/// `+` is replaced by space before the field reaches the (external)
/// passphrase-ask service; other percent-style escapes are preserved
/// verbatim, per `agent/command.c`'s `plus_to_blank`.
fn plus_to_blank(s: &str) -> String {
    s.chars().map(|c| if c == '+' { ' ' } else { c }).collect()
}

/// Stand-in for the out-of-scope ask-user service. Deterministic so the
/// passphrase-miss-then-hit scenario is reproducible without a UI.
fn ask_passphrase_stub(_errtext: Option<&str>, _prompt: Option<&str>, _desc: &str) -> Vec<u8> {
    b"hunter2".to_vec()
}

pub async fn get_passphrase<R, W>(
    conn: &mut Connection<R, W>,
    req: &Request,
) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let tokens = req.tokens();
    let [cacheid, errtext, prompt, desc] = tokens[..] else {
        return Err(AgentError::ParameterError(
            "GET_PASSPHRASE requires exactly four arguments".into(),
        ));
    };
    if desc == "X" {
        return Err(AgentError::ParameterError("desc is required".into()));
    }

    if cacheid != "X"
        && let Some(cached) = conn.state.passphrase_cache.get(cacheid)
    {
        let hex = String::from_utf8_lossy(cached.as_bytes()).to_string();
        return Ok(HandlerOutcome::OkConfidential(hex));
    }

    let errtext = (errtext != "X").then(|| plus_to_blank(errtext));
    let prompt = (prompt != "X").then(|| plus_to_blank(prompt));
    let desc = plus_to_blank(desc);

    let passphrase = ask_passphrase_stub(errtext.as_deref(), prompt.as_deref(), &desc);
    let hex = hex::encode(&passphrase);

    if cacheid != "X" {
        conn.state
            .passphrase_cache
            .put(cacheid, hex.clone().into_bytes(), Duration::ZERO)?;
    }

    Ok(HandlerOutcome::OkConfidential(hex))
}

pub async fn clear_passphrase<R, W>(
    conn: &mut Connection<R, W>,
    req: &Request,
) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let cacheid = req
        .rest
        .split_whitespace()
        .next()
        .ok_or_else(|| AgentError::ParameterError("missing cacheid".into()))?;
    conn.state.passphrase_cache.invalidate(cacheid);
    Ok(HandlerOutcome::Ok(None))
}

pub async fn learn<R, W>(
    conn: &mut Connection<R, W>,
    req: &Request,
) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let send = req.tokens().contains(&"--send");
    match conn.state.oracle.learn_smartcard(send)? {
        Some(data) => conn.emit_data(&data).await?,
        None => conn.emit_status("LEARN", "no-smartcard-data").await?,
    }
    Ok(HandlerOutcome::Ok(None))
}

pub async fn option_set<R, W>(
    conn: &mut Connection<R, W>,
    req: &Request,
) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (key, value) = req
        .rest
        .split_once('=')
        .ok_or_else(|| AgentError::InvalidOption(format!("malformed option: {}", req.rest)))?;
    let env_key = EnvKey::parse(key)
        .ok_or_else(|| AgentError::InvalidOption(format!("unknown option: {key}")))?;
    conn.session.env_overrides.set(env_key, value.to_string());
    Ok(HandlerOutcome::Ok(None))
}
