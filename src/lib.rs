// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod backend;
pub mod cfg;
pub mod dispatch;
pub mod error;
pub mod locking;
pub mod oracle;
pub mod passphrase_cache;
pub mod session;
pub mod trustlist;
pub mod wire;
