// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Server-initiated inquire sub-dialog (`C3`): writes `INQUIRE <keyword>`,
//! then reads `D` lines until `END`, enforcing a byte ceiling and draining
//! the whole dialog even when that ceiling is exceeded.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{error::AgentError, wire::codec::unescape_data};

fn transport_err(e: std::io::Error) -> AgentError {
    AgentError::Transport(e.to_string())
}

/// Pulls a bounded binary payload from the client. `max_bytes` caps the
/// decoded payload size; an overrun is reported only after the dialog has
/// been fully drained through `END`, per the sub-dialog's close-out
/// contract.
pub async fn inquire<R, W>(
    reader: &mut R,
    writer: &mut W,
    keyword: &str,
    max_bytes: usize,
) -> Result<Vec<u8>, AgentError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(format!("INQUIRE {keyword}\n").as_bytes())
        .await
        .map_err(transport_err)?;
    writer.flush().await.map_err(transport_err)?;

    let mut buf = Vec::new();
    let mut overrun = false;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.map_err(transport_err)?;
        if n == 0 {
            return Err(AgentError::Transport(
                "connection closed during inquire".into(),
            ));
        }
        let line = line.trim_end_matches(['\n', '\r']);

        if line == "END" {
            break;
        }
        if line == "CAN" {
            return Err(AgentError::Transport("inquire cancelled by client".into()));
        }
        if line == "D" {
            continue;
        }
        if let Some(rest) = line.strip_prefix("D ") {
            let decoded = unescape_data(rest.as_bytes())?;
            if !overrun {
                if buf.len() + decoded.len() > max_bytes {
                    overrun = true;
                } else {
                    buf.extend_from_slice(&decoded);
                }
            }
            continue;
        }
        return Err(AgentError::ParameterError(format!(
            "unexpected line during inquire: {line}"
        )));
    }

    if overrun {
        return Err(AgentError::ParameterError(
            "inquire payload exceeds the permitted size".into(),
        ));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[tokio::test]
    async fn collects_data_lines_until_end() {
        let input = b"D hello\r\nD  world\r\nEND\r\n".to_vec();
        let mut reader = Cursor::new(input);
        let mut writer = Vec::new();
        let payload = inquire(&mut reader, &mut writer, "CIPHERTEXT", 4096)
            .await
            .expect("inquire succeeds");
        assert_eq!(payload, b"hello world");
        assert_eq!(
            String::from_utf8(writer).expect("utf8"),
            "INQUIRE CIPHERTEXT\n"
        );
    }

    #[tokio::test]
    async fn overrun_drains_then_errors() {
        let input = b"D 0102030405\r\nD 06\r\nEND\r\n".to_vec();
        let mut reader = Cursor::new(input);
        let mut writer = Vec::new();
        let err = inquire(&mut reader, &mut writer, "KEYPARAM", 4)
            .await
            .expect_err("must overrun");
        assert_eq!(err.code(), AgentError::ParameterError(String::new()).code());
    }

    #[tokio::test]
    async fn cancel_reports_transport_error() {
        let input = b"CAN\r\n".to_vec();
        let mut reader = Cursor::new(input);
        let mut writer = Vec::new();
        let err = inquire(&mut reader, &mut writer, "CIPHERTEXT", 16)
            .await
            .expect_err("cancel must fail");
        assert!(matches!(err, AgentError::Transport(_)));
    }
}
