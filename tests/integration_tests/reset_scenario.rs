// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use keybrokerd::dispatch::Role;

use super::common::{keygrip_hex, new_state, start_session};

#[tokio::test]
async fn reset_clears_keygrip_and_digest_mid_session() {
    let state = new_state(Role::Agent);
    let mut session = start_session(state);

    let reply = session
        .command(&format!("SIGKEY {}", keygrip_hex()))
        .await;
    assert!(reply[0].starts_with(b"OK"));

    let digest_hex = "bb".repeat(32);
    let reply = session.command(&format!("SETHASH 8 {digest_hex}")).await;
    assert!(reply[0].starts_with(b"OK"));

    let reset = session.command("RESET").await;
    assert!(reset[0].starts_with(b"OK"));

    // The selected key and pending digest are both gone, so signing now
    // fails exactly as it would have before SIGKEY/SETHASH were ever sent.
    let reply = session.command("PKSIGN").await;
    assert!(reply[0].starts_with(b"ERR"));

    session.send("BYE").await;
    let _ = session.server.await;
}

#[tokio::test]
async fn reset_on_a_session_with_no_prior_state_is_harmless() {
    let state = new_state(Role::Agent);
    let mut session = start_session(state);

    let reset = session.command("RESET").await;
    assert!(reset[0].starts_with(b"OK"));

    let reply = session
        .command(&format!("SIGKEY {}", keygrip_hex()))
        .await;
    assert!(reply[0].starts_with(b"OK"));

    session.send("BYE").await;
    let _ = session.server.await;
}
