// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use keybrokerd::dispatch::Role;

use super::common::{keygrip_hex, new_state, start_session};

#[tokio::test]
async fn signs_after_selecting_key_and_hash() {
    let state = new_state(Role::Agent);
    let mut session = start_session(state);

    let reply = session
        .command(&format!("SIGKEY {}", keygrip_hex()))
        .await;
    assert!(reply[0].starts_with(b"OK"));

    let digest_hex = "aa".repeat(32);
    let reply = session.command(&format!("SETHASH 8 {digest_hex}")).await;
    assert!(reply[0].starts_with(b"OK"));

    let reply = session.command("PKSIGN").await;
    assert_eq!(reply.len(), 2, "expects one D line then the terminal OK");
    assert!(reply[0].starts_with(b"D "));
    assert!(reply[1].starts_with(b"OK"));

    session.send("BYE").await;
    let _ = session.server.await;
}

#[tokio::test]
async fn signing_without_a_selected_key_fails() {
    let state = new_state(Role::Agent);
    let mut session = start_session(state);

    let reply = session.command("PKSIGN").await;
    assert!(reply[0].starts_with(b"ERR"));

    session.send("BYE").await;
    let _ = session.server.await;
}
