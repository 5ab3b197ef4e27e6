// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use keybrokerd::dispatch::Role;

use super::common::new_state;
use super::common::start_session;

/// Hex of the stub ask-service's deterministic reply ("hunter2"), matching
/// the worked example: `GET_PASSPHRASE mykey X X "Please enter"` -> `OK
/// 68756e74657232`.
const HUNTER2_HEX: &[u8] = b"OK 68756e74657232";

#[tokio::test]
async fn passphrase_cache_miss_then_hit_returns_the_same_value() {
    let state = new_state(Role::Agent);
    let mut session = start_session(state);

    let miss = session
        .command("GET_PASSPHRASE mykey X X Please+enter")
        .await;
    assert_eq!(miss.len(), 1);
    assert_eq!(miss[0], HUNTER2_HEX);

    let hit = session
        .command("GET_PASSPHRASE mykey X X Please+enter")
        .await;
    assert_eq!(hit[0], HUNTER2_HEX);

    session.send("BYE").await;
    let _ = session.server.await;
}

#[tokio::test]
async fn clear_passphrase_forces_a_fresh_ask_on_the_next_get() {
    let state = new_state(Role::Agent);
    let mut session = start_session(state);

    let first = session
        .command("GET_PASSPHRASE anotherkey X X Please+enter")
        .await;
    assert_eq!(first[0], HUNTER2_HEX);

    let cleared = session.command("CLEAR_PASSPHRASE anotherkey").await;
    assert!(cleared[0].starts_with(b"OK"));

    // Clearing an already-absent id is a no-op, not an error.
    let cleared_again = session.command("CLEAR_PASSPHRASE anotherkey").await;
    assert!(cleared_again[0].starts_with(b"OK"));

    session.send("BYE").await;
    let _ = session.server.await;
}
