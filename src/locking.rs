// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Locking discipline (`C8`): shared/exclusive advisory locks around backend
//! access. Session-scoped (acquired at request entry, released at request
//! exit); a trivial global-mutex implementation is permitted, so a single
//! `tokio::sync::RwLock` wraps the whole table.

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::BackendTable;

#[derive(Debug, Default)]
pub struct LockedBackendTable {
    inner: RwLock<BackendTable>,
}

impl LockedBackendTable {
    pub fn new(table: BackendTable) -> Self {
        LockedBackendTable {
            inner: RwLock::new(table),
        }
    }

    /// Shared lock: wraps search.
    pub async fn read(&self) -> RwLockReadGuard<'_, BackendTable> {
        self.inner.read().await
    }

    /// Exclusive lock: wraps store/delete.
    pub async fn write(&self) -> RwLockWriteGuard<'_, BackendTable> {
        self.inner.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_and_write_guards_observe_the_same_table() {
        let locked = LockedBackendTable::new(BackendTable::new());
        {
            let mut table = locked.write().await;
            table.add_on_disk_resource("a.kbx").expect("valid suffix");
        }
        let table = locked.read().await;
        assert!(table.cache().is_some());
    }
}
