// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use keybrokerd::dispatch::Role;

use super::common::{keygrip_hex, new_state, start_session};

#[tokio::test]
async fn decrypts_after_selecting_key_and_inquire_round_trip() {
    let state = new_state(Role::Agent);
    let mut session = start_session(state);

    let reply = session
        .command(&format!("SIGKEY {}", keygrip_hex()))
        .await;
    assert!(reply[0].starts_with(b"OK"));

    session.send("PKDECRYPT").await;
    let inquire_line = session.recv_raw().await;
    assert_eq!(inquire_line, b"INQUIRE CIPHERTEXT");

    session.send("D deadbeef").await;
    session.send("END").await;

    let data_line = session.recv_raw().await;
    assert!(data_line.starts_with(b"D "));
    let ok_line = session.recv_raw().await;
    assert!(ok_line.starts_with(b"OK"));

    session.send("BYE").await;
    let _ = session.server.await;
}

#[tokio::test]
async fn decrypt_without_a_selected_key_fails_before_any_inquire() {
    let state = new_state(Role::Agent);
    let mut session = start_session(state);

    let reply = session.command("PKDECRYPT").await;
    assert!(reply[0].starts_with(b"ERR"));

    session.send("BYE").await;
    let _ = session.server.await;
}
