// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use keybrokerd::dispatch::{Connection, DaemonState, Role};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf},
    task::JoinHandle,
};

pub struct Session {
    pub reader: BufReader<ReadHalf<tokio::io::DuplexStream>>,
    pub writer: WriteHalf<tokio::io::DuplexStream>,
    pub server: JoinHandle<()>,
}

/// Spins up one `Connection` driven over an in-process duplex pipe, the same
/// shape a Unix-socket client would see, without touching the filesystem.
pub fn start_session(state: Arc<DaemonState>) -> Session {
    let (client, server_side) = tokio::io::duplex(8192);
    let (server_read, server_write) = tokio::io::split(server_side);
    let mut conn = Connection::new(BufReader::new(server_read), server_write, state);
    let server = tokio::spawn(async move {
        let _ = conn.run().await;
    });

    let (client_read, client_write) = tokio::io::split(client);
    Session {
        reader: BufReader::new(client_read),
        writer: client_write,
        server,
    }
}

pub fn new_state(role: Role) -> Arc<DaemonState> {
    Arc::new(DaemonState::new(role))
}

/// Same as [`new_state`] but with a trust list file path wired in, so
/// `MARKTRUSTED` persists instead of staying in-memory only.
pub fn new_state_with_trust_list_path(role: Role, path: std::path::PathBuf) -> Arc<DaemonState> {
    let mut state = DaemonState::new(role);
    state.trust_list_path = Some(path);
    Arc::new(state)
}

impl Session {
    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("write to duplex pipe");
    }

    /// Reads one raw wire line (without its trailing CR/LF). Data lines may
    /// carry non-UTF8 bytes, so this stays byte-oriented rather than
    /// assuming text.
    pub async fn recv_raw(&mut self) -> Vec<u8> {
        let mut buf = Vec::new();
        let n = self
            .reader
            .read_until(b'\n', &mut buf)
            .await
            .expect("read from duplex pipe");
        assert!(n > 0, "connection closed unexpectedly");
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        buf
    }

    pub async fn recv_text(&mut self) -> String {
        String::from_utf8(self.recv_raw().await).expect("reply line is valid utf8")
    }

    /// Sends a command and reads reply lines until the terminal `OK`/`ERR`,
    /// returning every line including the terminal one.
    pub async fn command(&mut self, line: &str) -> Vec<Vec<u8>> {
        self.send(line).await;
        let mut out = Vec::new();
        loop {
            let reply = self.recv_raw().await;
            let terminal = reply.starts_with(b"OK") || reply.starts_with(b"ERR");
            out.push(reply);
            if terminal {
                break;
            }
        }
        out
    }
}

pub fn keygrip_hex() -> &'static str {
    "1111111111111111111111111111111111111111"
}
