// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use keybrokerd::{
    backend::BackendTable,
    cfg::{
        cli::{resolve_config_path, Cli},
        config::{Config, RoleConfig, TransportMode},
        logger::init_logger,
    },
    dispatch::{Connection, DaemonState, Role},
    locking::LockedBackendTable,
    trustlist::TrustList,
};
use tokio::{
    io::{stdin, stdout, BufReader},
    net::UnixListener,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _logger_guard = init_logger(
        cli.log_config
            .to_str()
            .context("log-config path is not valid UTF-8")?,
    )
    .context("failed to initialize logging")?;

    let config_path = resolve_config_path(&cli.config)
        .with_context(|| format!("failed to resolve config path {:?}", cli.config))?;
    let cfg = Config::load_from_file(&config_path)
        .with_context(|| format!("failed to load config from {config_path:?}"))?;

    let state = match build_state(&cfg).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!(error = %e, "failed to initialize daemon state");
            std::process::exit(2);
        },
    };

    let result = if cli.server {
        run_socket_server(&cfg, state).await
    } else {
        run_single_pipe_connection(state).await
    };

    if let Err(e) = result {
        error!(error = %e, "daemon exited with an error");
        std::process::exit(2);
    }

    Ok(())
}

async fn build_state(cfg: &Config) -> Result<DaemonState> {
    let role = match cfg.role {
        RoleConfig::Agent => Role::Agent,
        RoleConfig::KeyboxFrontend => Role::KeyboxFrontend,
    };

    let mut table = BackendTable::new();
    for resource in &cfg.resources {
        table
            .add_on_disk_resource(resource)
            .with_context(|| format!("failed to register resource {resource}"))?;
    }

    let trust_list_path = cfg.trust_list_path();
    let trust_list = match tokio::fs::read_to_string(&trust_list_path).await {
        Ok(raw) => TrustList::load_from_str(&raw)
            .with_context(|| format!("failed to parse trust list at {trust_list_path:?}"))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %trust_list_path.display(), "no trust list file found, starting empty");
            TrustList::new()
        },
        Err(e) => return Err(e).context("failed to read trust list file"),
    };

    Ok(DaemonState {
        role,
        trust_list,
        passphrase_cache: keybrokerd::passphrase_cache::PassphraseCache::new(),
        backend_table: LockedBackendTable::new(table),
        oracle: keybrokerd::oracle::CryptoOracle::new(),
        known_keygrips: Default::default(),
        trust_list_path: Some(trust_list_path),
    })
}

/// Serves a single session over the process's inherited stdin/stdout pipe
/// pair, the default transport for a locally spawned secret-key agent.
async fn run_single_pipe_connection(state: Arc<DaemonState>) -> Result<()> {
    info!("serving a single connection over stdin/stdout");
    let reader = BufReader::new(stdin());
    let writer = stdout();
    let mut conn = Connection::new(reader, writer, state);
    conn.run().await.context("connection loop failed")
}

/// Listens on a Unix-domain socket and spawns one connection task per
/// accepted client, the transport used when the daemon is asked to run as a
/// long-lived server.
async fn run_socket_server(cfg: &Config, state: Arc<DaemonState>) -> Result<()> {
    let socket_path = cfg
        .transport
        .socket_path
        .as_deref()
        .filter(|_| cfg.transport.mode == TransportMode::Socket)
        .context("server mode requires Transport.mode: socket with a socket_path")?;

    let _ = tokio::fs::remove_file(socket_path).await;
    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("failed to bind socket at {socket_path}"))?;
    info!(path = socket_path, "listening for connections");

    loop {
        let (stream, _addr) = listener.accept().await.context("accept failed")?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let (read_half, write_half) = tokio::io::split(stream);
            let mut conn = Connection::new(BufReader::new(read_half), write_half, state);
            if let Err(e) = conn.run().await {
                warn!(error = %e, "connection terminated with an error");
            }
        });
    }
}
