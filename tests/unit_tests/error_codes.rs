// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use keybrokerd::error::AgentError;

fn all_variants() -> Vec<AgentError> {
    vec![
        AgentError::ParameterError(String::new()),
        AgentError::UnsupportedAlgorithm(String::new()),
        AgentError::InvalidOption(String::new()),
        AgentError::OutOfCore,
        AgentError::NoSecretKey,
        AgentError::NotTrusted,
        AgentError::NotFound,
        AgentError::Conflict,
        AgentError::NotInitialized,
        AgentError::Transport(String::new()),
        AgentError::Internal(String::new()),
    ]
}

#[test]
fn every_error_kind_has_a_distinct_status_code() {
    let codes: Vec<_> = all_variants().iter().map(AgentError::code).collect();
    let mut sorted = codes.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(
        codes.len(),
        sorted.len(),
        "two error kinds must not share a status code"
    );
}

#[test]
fn render_pairs_the_code_with_the_display_text() {
    let err = AgentError::NotFound;
    let (code, text) = err.render();
    assert_eq!(code, err.code());
    assert_eq!(text, err.to_string());
}
