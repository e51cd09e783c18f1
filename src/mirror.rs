/* This file is part of DarkFi (https://dark.fi)
 *
 * Copyright (C) 2020-2026 Dyne.org foundation
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Client-side mirror of a server change log. The active index is a
//! pure projection of the mirrored log: it is rebuilt from a replay
//! after every applied change and never mutated on its own, so the log
//! remains the single source of truth.

use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    crypto::{cipher, oprf, RistrettoPoint, CHAIN_HASH_LEN, PRF_LEN},
    store::{
        changelog::{ChangeEvent, ChangeLog, EncMeta, EventKind},
        SyncMode,
    },
    util::file::atomic_write,
    Error, Result,
};

const LOG_FILE: &str = "changes.log";
const ACTIVE_FILE: &str = "active_index";
const HISTORY_FILE: &str = "history.log";

/// Outcome of a query as shown to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryResult {
    Match(Vec<u8>),
    NoMatch,
    DecryptFailed,
}

impl QueryResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Match(_) => "MATCH",
            Self::NoMatch => "NOMATCH",
            Self::DecryptFailed => "DECRYPTFAILED",
        }
    }
}

pub struct Mirror {
    name: String,
    dir: PathBuf,
    log: ChangeLog,
    active: HashMap<[u8; PRF_LEN], EncMeta>,
}

impl Mirror {
    /// Open (or initialize) the local state for one `(server, dataset)`
    /// pair. A mirrored log that fails chain verification surfaces as
    /// `Inconsistent`; the caller answers that with a reset.
    pub fn open(dir: impl Into<PathBuf>, name: &str) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let log = ChangeLog::load(&dir.join(LOG_FILE))?;
        log.verify()?;

        let mut mirror =
            Self { name: name.to_string(), dir, log, active: HashMap::new() };
        mirror.rebuild_active()?;
        Ok(mirror)
    }

    /// The chain hash to hand to `read_changes`; `None` while the local
    /// log is empty.
    pub fn tip(&self) -> Option<[u8; CHAIN_HASH_LEN]> {
        self.log.events.last().map(|e| e.chain_hash)
    }

    /// Apply a server response. Full mode replaces the local log (the
    /// server truncated, e.g. after a rekey); delta mode extends it.
    /// Every link is verified before anything is persisted.
    pub fn apply(&mut self, mode: SyncMode, events: &[ChangeEvent]) -> Result<()> {
        let mut log = match mode {
            SyncMode::Full => ChangeLog::new(),
            SyncMode::Delta => self.log.clone(),
        };

        log.extend_verified(events)?;

        self.log = log;
        self.rebuild_active()?;
        self.persist()?;

        debug!(target: "mirror", "Applied {} {} events to {}", events.len(), mode.as_str(), self.name);
        Ok(())
    }

    /// Replay the log into the active index.
    fn rebuild_active(&mut self) -> Result<()> {
        let mut active: HashMap<[u8; PRF_LEN], EncMeta> = HashMap::new();

        for event in &self.log.events {
            match (event.kind, event.prf) {
                (EventKind::Added, Some(prf)) => {
                    let meta = event
                        .enc_meta
                        .clone()
                        .ok_or(Error::Inconsistent("ADDED event without metadata".to_string()))?;
                    active.insert(prf, meta);
                }
                (EventKind::Added, None) => {
                    return Err(Error::Inconsistent("ADDED event without PRF".to_string()))
                }
                (EventKind::Removed, Some(prf)) => {
                    active.remove(&prf);
                }
                // A REMOVED we cannot locate; only a full resync from a
                // fresh chain can reconcile this.
                (EventKind::Removed, None) => {
                    return Err(Error::Inconsistent("REMOVED event without PRF".to_string()))
                }
            }
        }

        self.active = active;
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        atomic_write(&self.dir.join(LOG_FILE), self.log.serialize().as_bytes())?;

        let mut out = String::new();
        for (prf, meta) in &self.active {
            out.push_str(&format!("{},{}\n", hex::encode(prf), meta.to_field()));
        }
        atomic_write(&self.dir.join(ACTIVE_FILE), out.as_bytes())?;

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.log.events.is_empty()
    }

    pub fn lookup(&self, prf: &[u8; PRF_LEN]) -> Option<&EncMeta> {
        self.active.get(prf)
    }

    /// Finish a query after the OPRF round: finalize the PRF, look it
    /// up, derive the entry key and decrypt. AEAD failure is a normal
    /// negative outcome.
    pub fn finish_query(&self, ioc: &[u8], q: &RistrettoPoint) -> QueryResult {
        let prf = oprf::finalize(ioc, q);

        let Some(meta) = self.active.get(&prf) else {
            return QueryResult::NoMatch;
        };

        let key = oprf::derive_key(&prf, q, &self.name);
        match cipher::open_metadata(&key, ioc, &meta.nonce, &meta.ciphertext) {
            Some(metadata) => QueryResult::Match(metadata),
            None => QueryResult::DecryptFailed,
        }
    }

    /// Append one line of match history.
    pub fn record_history(&self, ioc: &str, outcome: &QueryResult) -> Result<()> {
        let mut file =
            fs::OpenOptions::new().create(true).append(true).open(self.dir.join(HISTORY_FILE))?;
        writeln!(file, "{} {} {}", chrono::Utc::now().to_rfc3339(), ioc, outcome.as_str())?;
        Ok(())
    }

    /// Drop all local state for this mirror.
    pub fn purge(dir: &Path) -> Result<()> {
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Algorithm, Store};

    fn pairs_for_tests(data: &[(&str, &str)]) -> Vec<Result<(String, Vec<u8>)>> {
        data.iter().map(|(i, m)| Ok((i.to_string(), m.as_bytes().to_vec()))).collect()
    }

    fn scratch(name: &str) -> (tempdir::TempDir, Store, PathBuf) {
        let dir = tempdir::TempDir::new(name).unwrap();
        let store = Store::open(dir.path().join("server")).unwrap();
        store.create_dataset("ds1", Algorithm::Classic, 30).unwrap();
        let client_dir = dir.path().join("client").join("ds1");
        (dir, store, client_dir)
    }

    #[test]
    fn delta_sync_equals_full_resync() {
        let (_dir, store, client_dir) = scratch("mirror_delta");

        store
            .sync_from_source("ds1", pairs_for_tests(&[("evil.com", "{\"a\":1}")]))
            .unwrap();

        let mut mirror = Mirror::open(&client_dir, "ds1").unwrap();
        let (mode, events) = store.read_changes("ds1", None).unwrap();
        mirror.apply(mode, &events).unwrap();
        let tip = mirror.tip().unwrap();

        store
            .sync_from_source(
                "ds1",
                pairs_for_tests(&[("evil.com", "{\"a\":1}"), ("1.2.3.4", "{\"b\":2}")]),
            )
            .unwrap();

        let (mode, events) = store.read_changes("ds1", Some(tip)).unwrap();
        assert_eq!(mode, SyncMode::Delta);
        mirror.apply(mode, &events).unwrap();

        // A second mirror built from a full read lands on the same state
        let full_dir = client_dir.parent().unwrap().join("ds1-full");
        let mut full = Mirror::open(&full_dir, "ds1").unwrap();
        let (mode, events) = store.read_changes("ds1", None).unwrap();
        full.apply(mode, &events).unwrap();

        assert_eq!(mirror.tip(), full.tip());
        assert_eq!(mirror.active, full.active);
    }

    #[test]
    fn removed_entries_leave_the_active_index() {
        let (_dir, store, client_dir) = scratch("mirror_removed");

        store.sync_from_source("ds1", pairs_for_tests(&[("evil.com", "{}")])).unwrap();
        store.sync_from_source("ds1", pairs_for_tests(&[("1.2.3.4", "{}")])).unwrap();

        let mut mirror = Mirror::open(&client_dir, "ds1").unwrap();
        let (mode, events) = store.read_changes("ds1", None).unwrap();
        mirror.apply(mode, &events).unwrap();

        assert_eq!(mirror.active.len(), 1);
        let removed_prf = events
            .iter()
            .find(|e| e.kind == EventKind::Removed)
            .and_then(|e| e.prf)
            .unwrap();
        assert!(mirror.lookup(&removed_prf).is_none());
    }

    #[test]
    fn state_survives_reopen() {
        let (_dir, store, client_dir) = scratch("mirror_reopen");

        store.sync_from_source("ds1", pairs_for_tests(&[("evil.com", "{}")])).unwrap();

        let tip = {
            let mut mirror = Mirror::open(&client_dir, "ds1").unwrap();
            let (mode, events) = store.read_changes("ds1", None).unwrap();
            mirror.apply(mode, &events).unwrap();
            mirror.tip().unwrap()
        };

        let mirror = Mirror::open(&client_dir, "ds1").unwrap();
        assert_eq!(mirror.tip(), Some(tip));
        assert_eq!(mirror.active.len(), 1);
    }

    #[test]
    fn tampered_local_log_is_detected() {
        let (_dir, store, client_dir) = scratch("mirror_tamper");

        store
            .sync_from_source("ds1", pairs_for_tests(&[("a", "{}"), ("b", "{}")]))
            .unwrap();

        {
            let mut mirror = Mirror::open(&client_dir, "ds1").unwrap();
            let (mode, events) = store.read_changes("ds1", None).unwrap();
            mirror.apply(mode, &events).unwrap();
        }

        // Flip one hex digit in the middle of the mirrored log
        let log_path = client_dir.join(LOG_FILE);
        let mut bytes = fs::read(&log_path).unwrap();
        let pos = bytes.iter().position(|&b| b == b' ').unwrap() + 3;
        bytes[pos] = if bytes[pos] == b'0' { b'1' } else { b'0' };
        fs::write(&log_path, bytes).unwrap();

        assert!(matches!(Mirror::open(&client_dir, "ds1"), Err(Error::Inconsistent(_))));

        // Reset: purge and resync from scratch
        Mirror::purge(&client_dir).unwrap();
        let mut mirror = Mirror::open(&client_dir, "ds1").unwrap();
        let (mode, events) = store.read_changes("ds1", None).unwrap();
        assert_eq!(mode, SyncMode::Full);
        mirror.apply(mode, &events).unwrap();
        assert_eq!(mirror.active.len(), 2);
    }

    #[test]
    fn query_flow_over_the_blinding_round() {
        let (_dir, store, client_dir) = scratch("mirror_query");

        store
            .sync_from_source(
                "ds1",
                pairs_for_tests(&[("evil.com", "{\"desc\":\"known bad domain\"}")]),
            )
            .unwrap();

        let mut mirror = Mirror::open(&client_dir, "ds1").unwrap();
        let (mode, events) = store.read_changes("ds1", None).unwrap();
        mirror.apply(mode, &events).unwrap();

        // Match
        let blinded = oprf::blind(b"evil.com");
        let evaluated = store.evaluate_oprf("ds1", &blinded.element).unwrap();
        let q = oprf::unblind(&blinded.factor, &evaluated).unwrap();
        assert_eq!(
            mirror.finish_query(b"evil.com", &q),
            QueryResult::Match(b"{\"desc\":\"known bad domain\"}".to_vec())
        );

        // No match
        let blinded = oprf::blind(b"benign.com");
        let evaluated = store.evaluate_oprf("ds1", &blinded.element).unwrap();
        let q = oprf::unblind(&blinded.factor, &evaluated).unwrap();
        assert_eq!(mirror.finish_query(b"benign.com", &q), QueryResult::NoMatch);
    }
}
