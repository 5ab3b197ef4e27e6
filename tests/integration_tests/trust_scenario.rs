// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use keybrokerd::dispatch::Role;

use super::common::{new_state, new_state_with_trust_list_path, start_session};

#[tokio::test]
async fn marktrusted_then_istrusted_succeeds_and_lists() {
    let state = new_state(Role::Agent);
    let mut session = start_session(state);
    let fpr = "A".repeat(40);

    let untrusted = session.command(&format!("ISTRUSTED {fpr}")).await;
    assert!(untrusted[0].starts_with(b"ERR"));

    let marked = session
        .command(&format!("MARKTRUSTED {fpr} S Alice"))
        .await;
    assert!(marked[0].starts_with(b"OK"));

    let trusted = session.command(&format!("ISTRUSTED {fpr}")).await;
    assert!(trusted[0].starts_with(b"OK"));

    let listed = session.command("LISTTRUSTED").await;
    assert_eq!(listed.len(), 2, "one status line plus the terminal OK");
    assert!(listed[0].starts_with(format!("S TRUSTLISTENTRY {fpr} S Alice").as_bytes()));
    assert!(listed[1].starts_with(b"OK"));

    session.send("BYE").await;
    let _ = session.server.await;
}

#[tokio::test]
async fn a_32_hex_fingerprint_is_zero_padded_before_matching() {
    let state = new_state(Role::Agent);
    let mut session = start_session(state);
    let md5_style = "b".repeat(32);
    let canonical = format!("{}{}", "0".repeat(8), "B".repeat(32));

    let marked = session
        .command(&format!("MARKTRUSTED {md5_style} P Bob"))
        .await;
    assert!(marked[0].starts_with(b"OK"));

    let trusted = session.command(&format!("ISTRUSTED {canonical}")).await;
    assert!(trusted[0].starts_with(b"OK"));

    session.send("BYE").await;
    let _ = session.server.await;
}

#[tokio::test]
async fn marktrusted_appends_to_the_configured_trust_list_file() {
    let dir = std::env::temp_dir().join(format!(
        "keybrokerd-trust-scenario-{:?}",
        std::thread::current().id()
    ));
    tokio::fs::create_dir_all(&dir).await.expect("create temp dir");
    let path = dir.join("trustlist.txt");
    let _ = tokio::fs::remove_file(&path).await;

    let fpr = "C".repeat(40);
    let state = new_state_with_trust_list_path(Role::Agent, path.clone());
    let mut session = start_session(state);

    let marked = session
        .command(&format!("MARKTRUSTED {fpr} S Carol"))
        .await;
    assert!(marked[0].starts_with(b"OK"));

    session.send("BYE").await;
    let _ = session.server.await;

    // Simulates surviving a restart: the daemon's in-memory map is gone, but
    // the file on disk carries the entry a fresh load would pick back up.
    let on_disk = tokio::fs::read_to_string(&path).await.expect("read trust list file");
    assert!(on_disk.contains(&format!("{fpr} S Carol")));
}
