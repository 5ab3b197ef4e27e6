// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Keybox-frontend verb handlers: `SEARCH` / `NEXT` / `STORE` / `DELETE`,
//! thin wrappers over the `C6` backend-chain algorithms.

use tokio::io::{AsyncBufRead, AsyncWrite};

use super::{parse_hex_fixed, Connection, HandlerOutcome};
use crate::{
    backend::{kbxd_delete, kbxd_search, kbxd_store, SearchDesc, StoreMode},
    error::AgentError,
    wire::codec::Request,
};

fn parse_descs(tokens: &[&str]) -> Result<Vec<SearchDesc>, AgentError> {
    tokens
        .iter()
        .map(|t| {
            let bytes = parse_hex_fixed(t, 20)?;
            let mut ubid = [0u8; 20];
            ubid.copy_from_slice(&bytes);
            Ok(SearchDesc::Ubid(ubid))
        })
        .collect()
}

pub async fn search<R, W>(
    conn: &mut Connection<R, W>,
    req: &Request,
) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let tokens: Vec<&str> = req.tokens().into_iter().filter(|t| *t != "--reset").collect();
    let force_reset = req.tokens().contains(&"--reset") || tokens.is_empty();
    let desc = if tokens.is_empty() {
        None
    } else {
        Some(parse_descs(&tokens)?)
    };
    conn.session.last_search_desc = desc.clone();

    let table = conn.state.backend_table.read().await;
    let request = conn.session.request_mut();
    let blob = kbxd_search(&table, desc.as_deref(), force_reset, request)?;
    if !blob.is_empty() {
        drop(table);
        conn.emit_data(&blob).await?;
    }
    Ok(HandlerOutcome::Ok(None))
}

pub async fn next<R, W>(conn: &mut Connection<R, W>) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let desc = conn
        .session
        .last_search_desc
        .clone()
        .ok_or_else(|| AgentError::ParameterError("NEXT with no prior SEARCH".into()))?;

    let table = conn.state.backend_table.read().await;
    let request = conn.session.request_mut();
    let blob = kbxd_search(&table, Some(&desc), false, request)?;
    drop(table);
    conn.emit_data(&blob).await?;
    Ok(HandlerOutcome::Ok(None))
}

pub async fn store<R, W>(
    conn: &mut Connection<R, W>,
    req: &Request,
) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let tokens = req.tokens();
    let [mode_str, blob_hex] = tokens[..] else {
        return Err(AgentError::ParameterError(
            "STORE requires <mode> <hex-blob>".into(),
        ));
    };
    let mode = match mode_str {
        "any" => StoreMode::Any,
        "insert_only" => StoreMode::InsertOnly,
        "update_only" => StoreMode::UpdateOnly,
        other => {
            return Err(AgentError::ParameterError(format!(
                "unknown store mode: {other}"
            )));
        },
    };
    let blob = hex::decode(blob_hex)
        .map_err(|e| AgentError::ParameterError(format!("invalid hex: {e}")))?;

    let table = conn.state.backend_table.write().await;
    let request = conn.session.request_mut();
    kbxd_store(&table, &blob, mode, request)?;
    Ok(HandlerOutcome::Ok(None))
}

pub async fn delete<R, W>(
    conn: &mut Connection<R, W>,
    req: &Request,
) -> Result<HandlerOutcome, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let bytes = parse_hex_fixed(req.rest.trim(), 20)?;
    let mut ubid = [0u8; 20];
    ubid.copy_from_slice(&bytes);

    let table = conn.state.backend_table.write().await;
    let request = conn.session.request_mut();
    kbxd_delete(&table, ubid, request)?;
    Ok(HandlerOutcome::Ok(None))
}
