// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Multi-backend lookup chain (`C6`): an ordered list of backends (the
//! in-memory cache, always first, then zero or more on-disk keybox stand-ins)
//! consulted in sequence per request, with cross-backend resume-by-identifier
//! and negative-result memoization.
//!
//! The search/store/delete algorithms below are ported from
//! `kbxd_search`/`kbxd_store`/`kbxd_delete` in the original keybox frontend.

pub mod cache;
pub mod kbx;

use enum_dispatch::enum_dispatch;

pub use self::{cache::CacheBackend, kbx::KbxBackend};
use crate::{error::AgentError, session::RequestHandle};

/// One entry of a search query. Kept opaque beyond the two forms the
/// dispatcher actually issues: a scan descriptor says "match by UBID" or
/// "match by fingerprint".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchDesc {
    Ubid([u8; 20]),
    Fingerprint([u8; 20]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Any,
    InsertOnly,
    UpdateOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Vec<u8>),
    NotFound,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    Found,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Cache,
    OnDisk,
}

/// Uniform capability set over backend variants. Not every backend
/// implements every operation; unsupported calls return
/// [`AgentError::Internal`] rather than being statically absent, per the
/// polymorphism design note.
#[enum_dispatch]
pub trait BackendOps {
    fn kind(&self) -> BackendKind;
    fn search(
        &self,
        desc: &[SearchDesc],
        request: &mut RequestHandle,
    ) -> Result<SearchOutcome, AgentError>;
    fn seek(
        &self,
        ubid: [u8; 20],
        request: &mut RequestHandle,
    ) -> Result<SeekOutcome, AgentError>;
    fn insert(
        &self,
        pktype: u8,
        blob: &[u8],
        request: &mut RequestHandle,
    ) -> Result<(), AgentError>;
    fn update(
        &self,
        pktype: u8,
        blob: &[u8],
        request: &mut RequestHandle,
    ) -> Result<(), AgentError>;
    fn delete(&self, request: &mut RequestHandle) -> Result<(), AgentError>;
    fn mark_not_found(&self, desc: &[SearchDesc]);
    fn mark_final(&self);
    fn reset(&self);
    fn release_request(&self, request: &mut RequestHandle) {
        request.reset();
    }
}

#[enum_dispatch(BackendOps)]
#[derive(Debug)]
pub enum Backend {
    Cache(CacheBackend),
    OnDisk(KbxBackend),
}

/// Derives `(pktype, ubid)` from a raw blob. The on-disk byte format is a
/// collaborator contract opaque to this crate (`spec` §1); this probe is a
/// deterministic stand-in, not a real keybox parser.
pub fn probe(blob: &[u8]) -> (u8, [u8; 20]) {
    let pktype = blob.first().copied().unwrap_or(0);
    let mut ubid = [0u8; 20];
    let n = blob.len().min(20);
    ubid[..n].copy_from_slice(&blob[..n]);
    (pktype, ubid)
}

/// Append-oriented table of backend descriptors. Slots are reused on
/// release; ordering is significant, and slot 0 is always the cache.
#[derive(Debug, Default)]
pub struct BackendTable {
    slots: Vec<Option<Backend>>,
}

impl BackendTable {
    /// Always seeds slot 0 with a fresh cache backend, per the supplemented
    /// contract that a misconfigured resource list still gets a working
    /// cache.
    pub fn new() -> Self {
        let mut table = BackendTable { slots: Vec::new() };
        table.slots.push(Some(Backend::Cache(CacheBackend::new())));
        table
    }

    pub fn cache(&self) -> Option<&CacheBackend> {
        self.slots.iter().flatten().find_map(|b| match b {
            Backend::Cache(c) => Some(c),
            Backend::OnDisk(_) => None,
        })
    }

    fn first_on_disk_idx(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(Backend::OnDisk(_))))
    }

    /// Adds an on-disk backend resource, selected by filename suffix.
    /// Reuses a released slot if one is free, otherwise grows the table.
    pub fn add_on_disk_resource(&mut self, path: &str) -> Result<usize, AgentError> {
        if !path.ends_with(".kbx") {
            return Err(AgentError::ParameterError(format!(
                "unsupported keybox resource suffix: {path}"
            )));
        }
        let backend = Backend::OnDisk(KbxBackend::new(path));
        if let Some(idx) = self.slots.iter().position(|s| s.is_none()) {
            self.slots[idx] = Some(backend);
            Ok(idx)
        } else {
            self.slots.push(Some(backend));
            Ok(self.slots.len() - 1)
        }
    }

    pub fn release(&mut self, idx: usize) {
        if let Some(slot) = self.slots.get_mut(idx) {
            *slot = None;
        }
    }
}

/// `kbxd_search`: steps through the backend chain starting at
/// `request.next_dbidx`, honoring resume-by-identifier at the cache/on-disk
/// boundary.
pub fn kbxd_search(
    table: &BackendTable,
    desc: Option<&[SearchDesc]>,
    reset: bool,
    request: &mut RequestHandle,
) -> Result<Vec<u8>, AgentError> {
    if desc.is_none() || reset {
        for slot in table.slots.iter().flatten() {
            slot.reset();
        }
        request.reset();
        if desc.is_none() {
            return Ok(Vec::new());
        }
    }
    let desc = desc.expect("desc is Some: pure-reset case already returned above");

    let mut start_at_ubid = request.last_cached_valid && !request.last_cached_final;

    loop {
        while request.next_dbidx < table.slots.len()
            && table.slots[request.next_dbidx].is_none()
        {
            request.next_dbidx += 1;
        }
        if request.next_dbidx >= table.slots.len() {
            if let Some(cache) = table.cache() {
                cache.mark_not_found(desc);
            }
            return Err(AgentError::NotFound);
        }

        let idx = request.next_dbidx;
        let backend = table.slots[idx]
            .as_ref()
            .expect("slot occupied: checked by the skip-empty loop above");
        let is_cache = matches!(backend.kind(), BackendKind::Cache);

        let used_seek = !is_cache && start_at_ubid;
        if used_seek
            && let Some(ubid) = request.last_cached_ubid
        {
            backend.seek(ubid, request)?;
        }

        match backend.search(desc, request)? {
            SearchOutcome::Found(blob) => {
                request.any_found = true;
                return Ok(blob);
            },
            SearchOutcome::NotFound => return Err(AgentError::NotFound),
            SearchOutcome::Eof => {
                if used_seek {
                    request.last_cached_final = true;
                    if let Some(cache) = table.cache() {
                        cache.mark_final();
                    }
                }
                request.next_dbidx += 1;
                start_at_ubid = is_cache && request.last_cached_valid && !request.last_cached_final;
            },
        }
        request.any_search = true;
    }
}

/// `kbxd_store`: derives `(pktype, ubid)` from `blob` and dispatches an
/// insert or update against the first on-disk backend.
pub fn kbxd_store(
    table: &BackendTable,
    blob: &[u8],
    mode: StoreMode,
    request: &mut RequestHandle,
) -> Result<(), AgentError> {
    let (pktype, ubid) = probe(blob);
    let idx = table
        .first_on_disk_idx()
        .ok_or(AgentError::NotInitialized)?;
    let backend = table.slots[idx]
        .as_ref()
        .expect("index returned by first_on_disk_idx is occupied");

    match (backend.seek(ubid, request)?, mode) {
        (SeekOutcome::Eof, StoreMode::UpdateOnly) => Err(AgentError::Conflict),
        (SeekOutcome::Found, StoreMode::InsertOnly) => Err(AgentError::Conflict),
        (SeekOutcome::Found, _) => backend.update(pktype, blob, request),
        (SeekOutcome::Eof, _) => backend.insert(pktype, blob, request),
    }
}

/// `kbxd_delete`: seeks by UBID on the first on-disk backend and deletes the
/// record found there.
pub fn kbxd_delete(
    table: &BackendTable,
    ubid: [u8; 20],
    request: &mut RequestHandle,
) -> Result<(), AgentError> {
    let idx = table
        .first_on_disk_idx()
        .ok_or(AgentError::NotInitialized)?;
    let backend = table.slots[idx]
        .as_ref()
        .expect("index returned by first_on_disk_idx is occupied");

    match backend.seek(ubid, request)? {
        SeekOutcome::Eof => Err(AgentError::NotFound),
        SeekOutcome::Found => backend.delete(request),
    }
}
