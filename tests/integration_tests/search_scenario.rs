// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use keybrokerd::{backend::probe, dispatch::Role};

use super::common::{new_state, start_session};

#[tokio::test]
async fn stores_then_finds_then_next_resumes_past_it() {
    let state = new_state(Role::KeyboxFrontend);
    {
        let mut table = state.backend_table.write().await;
        table
            .add_on_disk_resource("test-resume.kbx")
            .expect("valid resource suffix");
    }
    let mut session = start_session(state);

    let blob = hex::encode([0xAAu8; 8]);
    let (_, ubid) = probe(&hex::decode(&blob).expect("valid hex"));
    let ubid_hex = hex::encode(ubid);

    let stored = session.command(&format!("STORE any {blob}")).await;
    assert!(stored[0].starts_with(b"OK"));

    let found = session.command(&format!("SEARCH {ubid_hex}")).await;
    assert_eq!(found.len(), 2);
    assert!(found[0].starts_with(b"D "));
    assert!(found[1].starts_with(b"OK"));

    // The on-disk cursor advanced past the one matching record, so a
    // follow-up NEXT with the same descriptor resumes from there and finds
    // nothing further.
    let next = session.command("NEXT").await;
    assert!(next[0].starts_with(b"ERR"));

    session.send("BYE").await;
    let _ = session.server.await;
}

#[tokio::test]
async fn next_without_a_prior_search_is_a_parameter_error() {
    let state = new_state(Role::KeyboxFrontend);
    let mut session = start_session(state);

    let reply = session.command("NEXT").await;
    assert!(reply[0].starts_with(b"ERR"));

    session.send("BYE").await;
    let _ = session.server.await;
}
