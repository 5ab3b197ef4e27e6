// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! In-memory cache backend. Always consulted first; remembers a
//! resume-by-identifier hint for the on-disk backends behind it and
//! memoizes definitive negative results.

use std::sync::RwLock;

use dashmap::{DashMap, DashSet};

use super::{BackendKind, BackendOps, SearchDesc, SearchOutcome, SeekOutcome};
use crate::{error::AgentError, session::RequestHandle};

#[derive(Debug)]
pub struct CacheBackend {
    records: DashMap<[u8; 20], Vec<u8>>,
    not_found: DashSet<Vec<SearchDesc>>,
    last_ubid: RwLock<Option<[u8; 20]>>,
}

impl CacheBackend {
    pub fn new() -> Self {
        CacheBackend {
            records: DashMap::new(),
            not_found: DashSet::new(),
            last_ubid: RwLock::new(None),
        }
    }

    /// Seeds the cache with a known record, as would happen when the daemon
    /// warms the cache from an already-open keybox at startup.
    pub fn seed(&self, ubid: [u8; 20], blob: Vec<u8>) {
        self.records.insert(ubid, blob);
        if let Ok(mut last) = self.last_ubid.write() {
            *last = Some(ubid);
        }
    }
}

impl Default for CacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendOps for CacheBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cache
    }

    fn search(
        &self,
        desc: &[SearchDesc],
        request: &mut RequestHandle,
    ) -> Result<SearchOutcome, AgentError> {
        if self.not_found.contains(desc) {
            return Ok(SearchOutcome::NotFound);
        }
        for d in desc {
            if let SearchDesc::Ubid(ubid) = d
                && let Some(blob) = self.records.get(ubid)
            {
                request.last_cached_ubid = Some(*ubid);
                request.last_cached_valid = true;
                request.last_cached_final = false;
                return Ok(SearchOutcome::Found(blob.clone()));
            }
        }
        let hint = self.last_ubid.read().ok().and_then(|g| *g);
        request.last_cached_ubid = hint;
        request.last_cached_valid = hint.is_some();
        Ok(SearchOutcome::Eof)
    }

    fn seek(&self, _ubid: [u8; 20], _request: &mut RequestHandle) -> Result<SeekOutcome, AgentError> {
        Err(AgentError::Internal("seek is unsupported on the cache backend".into()))
    }

    fn insert(
        &self,
        _pktype: u8,
        _blob: &[u8],
        _request: &mut RequestHandle,
    ) -> Result<(), AgentError> {
        Err(AgentError::Internal("insert is unsupported on the cache backend".into()))
    }

    fn update(
        &self,
        _pktype: u8,
        _blob: &[u8],
        _request: &mut RequestHandle,
    ) -> Result<(), AgentError> {
        Err(AgentError::Internal("update is unsupported on the cache backend".into()))
    }

    fn delete(&self, _request: &mut RequestHandle) -> Result<(), AgentError> {
        Err(AgentError::Internal("delete is unsupported on the cache backend".into()))
    }

    fn mark_not_found(&self, desc: &[SearchDesc]) {
        self.not_found.insert(desc.to_vec());
    }

    fn mark_final(&self) {
        if let Ok(mut last) = self.last_ubid.write() {
            *last = None;
        }
    }

    fn reset(&self) {
        self.not_found.clear();
    }
}
