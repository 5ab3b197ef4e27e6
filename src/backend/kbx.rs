// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! On-disk keybox backend stand-in. The real byte format is a collaborator
//! contract opaque to this crate (spec §1); this models it as a seekable
//! record store so the chain's control flow can be exercised faithfully.

use std::sync::Mutex;

use super::{probe, BackendKind, BackendOps, SearchDesc, SearchOutcome, SeekOutcome};
use crate::{error::AgentError, session::RequestHandle};

#[derive(Debug, Clone)]
struct Record {
    pktype: u8,
    ubid: [u8; 20],
    blob: Vec<u8>,
}

#[derive(Debug, Default)]
struct KbxState {
    records: Vec<Record>,
    cursor: usize,
}

#[derive(Debug)]
pub struct KbxBackend {
    path: String,
    state: Mutex<KbxState>,
}

impl KbxBackend {
    pub fn new(path: impl Into<String>) -> Self {
        KbxBackend {
            path: path.into(),
            state: Mutex::new(KbxState::default()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, KbxState>, AgentError> {
        self.state
            .lock()
            .map_err(|_| AgentError::Internal("keybox backend mutex poisoned".into()))
    }
}

fn matches(desc: &[SearchDesc], record: &Record) -> bool {
    desc.iter()
        .any(|d| matches!(d, SearchDesc::Ubid(u) | SearchDesc::Fingerprint(u) if *u == record.ubid))
}

impl BackendOps for KbxBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::OnDisk
    }

    fn search(
        &self,
        desc: &[SearchDesc],
        _request: &mut RequestHandle,
    ) -> Result<SearchOutcome, AgentError> {
        let mut st = self.lock()?;
        while st.cursor < st.records.len() {
            if matches(desc, &st.records[st.cursor]) {
                let blob = st.records[st.cursor].blob.clone();
                st.cursor += 1;
                return Ok(SearchOutcome::Found(blob));
            }
            st.cursor += 1;
        }
        Ok(SearchOutcome::Eof)
    }

    fn seek(
        &self,
        ubid: [u8; 20],
        _request: &mut RequestHandle,
    ) -> Result<SeekOutcome, AgentError> {
        let mut st = self.lock()?;
        match st.records.iter().position(|r| r.ubid == ubid) {
            Some(pos) => {
                st.cursor = pos;
                Ok(SeekOutcome::Found)
            },
            None => {
                st.cursor = st.records.len();
                Ok(SeekOutcome::Eof)
            },
        }
    }

    fn insert(
        &self,
        pktype: u8,
        blob: &[u8],
        _request: &mut RequestHandle,
    ) -> Result<(), AgentError> {
        let (_, ubid) = probe(blob);
        let mut st = self.lock()?;
        st.records.push(Record {
            pktype,
            ubid,
            blob: blob.to_vec(),
        });
        Ok(())
    }

    fn update(
        &self,
        pktype: u8,
        blob: &[u8],
        _request: &mut RequestHandle,
    ) -> Result<(), AgentError> {
        let (_, ubid) = probe(blob);
        let mut st = self.lock()?;
        match st.records.iter_mut().find(|r| r.ubid == ubid) {
            Some(record) => {
                record.pktype = pktype;
                record.blob = blob.to_vec();
                Ok(())
            },
            None => Err(AgentError::NotFound),
        }
    }

    fn delete(&self, _request: &mut RequestHandle) -> Result<(), AgentError> {
        let mut st = self.lock()?;
        if st.cursor >= st.records.len() {
            return Err(AgentError::NotFound);
        }
        st.records.remove(st.cursor);
        Ok(())
    }

    fn mark_not_found(&self, _desc: &[SearchDesc]) {}

    fn mark_final(&self) {}

    fn reset(&self) {
        if let Ok(mut st) = self.lock() {
            st.cursor = 0;
        }
    }
}
