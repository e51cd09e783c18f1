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

//! Server-side dataset state engine. Owns one directory per dataset
//! under the datastore root: the descriptor, the private scalar, the
//! canonical index and the hash-chained change log. Writers take the
//! dataset lock exclusively; OPRF evaluation and change reads share it.

use std::{
    collections::{BTreeMap, HashMap},
    fmt, fs,
    path::PathBuf,
    str::FromStr,
    sync::{Arc, RwLock},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    crypto::{
        self, cipher, oprf, Scalar, CHAIN_HASH_LEN, POINT_LEN,
    },
    util::{
        file::{atomic_write, commit_staged, sync_dir, write_staged},
        validate_dataset_name,
    },
    Error, Result,
};

/// Change events and the hash chain
pub mod changelog;

/// The canonical IOC index
pub mod index;

use changelog::{ChangeEvent, ChangeLog, EventKind};
use index::{Index, IndexEntry};

/// Cipher-suite identifiers reported to clients
pub const SUITE: &str = "oprf-ristretto255-sha512";
pub const ENCRYPTION: &str = "xchacha20poly1305-ietf";

const DESCRIPTOR_FILE: &str = "dataset.toml";
const KEY_FILE: &str = "secret.key";
const INDEX_FILE: &str = "index.csv";
const LOG_FILE: &str = "changes.log";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Classic,
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "classic" => Ok(Self::Classic),
            // "ot" appears in old docs but was never implemented
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Classic => write!(f, "classic"),
        }
    }
}

/// Persisted as `dataset.toml` in the dataset directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Descriptor {
    algorithm: String,
    rekey_interval_days: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Delta,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Delta => "delta",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(Self::Full),
            "delta" => Ok(Self::Delta),
            _ => Err(Error::ParseFailed("unknown sync mode")),
        }
    }
}

/// What a sync appended to the change log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncDelta {
    pub added: usize,
    pub removed: usize,
}

struct Dataset {
    name: String,
    dir: PathBuf,
    algorithm: Algorithm,
    secret: Scalar,
    index: Index,
    log: ChangeLog,
}

impl Dataset {
    fn create(
        dir: PathBuf,
        name: &str,
        algorithm: Algorithm,
        rekey_interval_days: u64,
    ) -> Result<Self> {
        fs::create_dir_all(&dir)?;

        let descriptor =
            Descriptor { algorithm: algorithm.to_string(), rekey_interval_days };
        let text = toml::to_string(&descriptor)
            .map_err(|e| Error::TomlDeserialize(e.to_string()))?;
        atomic_write(&dir.join(DESCRIPTOR_FILE), text.as_bytes())?;

        let secret = crypto::random_scalar();
        write_key_file(&dir, &secret)?;

        Ok(Self {
            name: name.to_string(),
            dir,
            algorithm,
            secret,
            index: Index::new(),
            log: ChangeLog::new(),
        })
    }

    fn load(dir: PathBuf, name: &str) -> Result<Self> {
        let descriptor_path = dir.join(DESCRIPTOR_FILE);
        if !descriptor_path.exists() {
            return Err(Error::UnknownDataset(name.to_string()))
        }

        let descriptor: Descriptor = toml::from_str(&fs::read_to_string(descriptor_path)?)?;
        // Only `classic` loads
        let algorithm = Algorithm::from_str(&descriptor.algorithm)?;

        let key_hex = fs::read_to_string(dir.join(KEY_FILE))?;
        let secret = crypto::decode_scalar(&hex::decode(key_hex.trim())?)?;

        let index = Index::load(&dir.join(INDEX_FILE))?;
        let log = ChangeLog::load(&dir.join(LOG_FILE))?;

        Ok(Self { name: name.to_string(), dir, algorithm, secret, index, log })
    }

    /// Persist the index/log pair as one transition. Both new files are
    /// staged and fsynced before either rename happens, and the renames
    /// are flushed together with the directory metadata; a failure while
    /// staging leaves both targets untouched.
    fn commit(&self) -> Result<()> {
        let index_path = self.dir.join(INDEX_FILE);
        let log_path = self.dir.join(LOG_FILE);

        let index_tmp = write_staged(&index_path, self.index.serialize().as_bytes())?;
        let log_tmp = write_staged(&log_path, self.log.serialize().as_bytes())?;

        commit_staged(&index_tmp, &index_path)?;
        commit_staged(&log_tmp, &log_path)?;
        sync_dir(&self.dir)?;

        Ok(())
    }

    /// Compute the index entry for a source pair under the current key.
    fn seal_entry(&self, ioc: &str, metadata: &[u8]) -> Result<IndexEntry> {
        let q = oprf::evaluate_direct(&self.secret, ioc.as_bytes());
        let prf = oprf::finalize(ioc.as_bytes(), &q);
        let key = oprf::derive_key(&prf, &q, &self.name);
        let (nonce, ciphertext) = cipher::seal_metadata(&key, ioc.as_bytes(), metadata)?;
        Ok(IndexEntry { prf, nonce, ciphertext })
    }

    /// Decrypt an existing entry's metadata. The server can always do
    /// this: it holds both the IOC and the key.
    fn open_entry(&self, ioc: &str, entry: &IndexEntry) -> Option<Vec<u8>> {
        let q = oprf::evaluate_direct(&self.secret, ioc.as_bytes());
        let key = oprf::derive_key(&entry.prf, &q, &self.name);
        cipher::open_metadata(&key, ioc.as_bytes(), &entry.nonce, &entry.ciphertext)
    }

    fn sync(&mut self, source: BTreeMap<String, Vec<u8>>) -> Result<SyncDelta> {
        let mut added: BTreeMap<String, IndexEntry> = BTreeMap::new();

        for (ioc, metadata) in &source {
            if let Some(current) = self.index.entries.get(ioc) {
                // Unchanged metadata keeps the existing nonce and
                // ciphertext, so re-syncing the same source is a no-op.
                if self.open_entry(ioc, current).as_deref() == Some(metadata.as_slice()) {
                    continue
                }
            }
            added.insert(ioc.clone(), self.seal_entry(ioc, metadata)?);
        }

        let removed: Vec<String> = self
            .index
            .entries
            .keys()
            .filter(|ioc| !source.contains_key(*ioc))
            .cloned()
            .collect();

        // ADDED first, then REMOVED, each class in IOC order; the same
        // source against the same state always extends the chain the
        // same way.
        for (ioc, entry) in &added {
            self.log.append(EventKind::Added, entry.prf, entry.enc_meta());
            self.index.entries.insert(ioc.clone(), entry.clone());
        }

        for ioc in &removed {
            let old = self.index.entries.remove(ioc).expect("removed key came from the index");
            self.log.append(EventKind::Removed, old.prf, old.enc_meta());
        }

        let delta = SyncDelta { added: added.len(), removed: removed.len() };

        if delta.added > 0 || delta.removed > 0 {
            self.commit()?;
        }

        Ok(delta)
    }

    fn rekey(&mut self, source: BTreeMap<String, Vec<u8>>) -> Result<SyncDelta> {
        self.secret = crypto::random_scalar();
        write_key_file(&self.dir, &self.secret)?;

        self.index = Index::new();
        self.log = ChangeLog::new();

        for (ioc, metadata) in &source {
            let entry = self.seal_entry(ioc, metadata)?;
            self.log.append(EventKind::Added, entry.prf, entry.enc_meta());
            self.index.entries.insert(ioc.clone(), entry);
        }

        self.commit()?;
        Ok(SyncDelta { added: self.index.entries.len(), removed: 0 })
    }

    fn read_changes(&self, since: Option<[u8; CHAIN_HASH_LEN]>) -> (SyncMode, Vec<ChangeEvent>) {
        if let Some(hash) = since {
            if let Some(pos) = self.log.position(&hash) {
                return (SyncMode::Delta, self.log.events[pos + 1..].to_vec())
            }
        }

        (SyncMode::Full, self.log.events.clone())
    }
}

fn write_key_file(dir: &std::path::Path, secret: &Scalar) -> Result<()> {
    let path = dir.join(KEY_FILE);
    atomic_write(&path, hex::encode(crypto::encode_scalar(secret)).as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Handle over a datastore root. Datasets load lazily and stay cached;
/// every cached dataset sits behind its own reader-writer lock.
pub struct Store {
    root: PathBuf,
    datasets: RwLock<HashMap<String, Arc<RwLock<Dataset>>>>,
}

impl Store {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, datasets: RwLock::new(HashMap::new()) })
    }

    fn dataset(&self, name: &str) -> Result<Arc<RwLock<Dataset>>> {
        validate_dataset_name(name)?;

        if let Some(ds) = self.datasets.read().unwrap().get(name) {
            return Ok(ds.clone())
        }

        let ds = Arc::new(RwLock::new(Dataset::load(self.root.join(name), name)?));
        self.datasets.write().unwrap().insert(name.to_string(), ds.clone());
        Ok(ds)
    }

    pub fn create_dataset(
        &self,
        name: &str,
        algorithm: Algorithm,
        rekey_interval_days: u64,
    ) -> Result<()> {
        validate_dataset_name(name)?;

        let dir = self.root.join(name);
        if dir.join(DESCRIPTOR_FILE).exists() {
            return Err(Error::DatasetExists(name.to_string()))
        }

        let ds = Dataset::create(dir, name, algorithm, rekey_interval_days)?;
        self.datasets.write().unwrap().insert(name.to_string(), Arc::new(RwLock::new(ds)));

        info!(target: "store", "Created dataset {}", name);
        Ok(())
    }

    /// Delete the descriptor and private key. Index and log files are
    /// left behind on purpose; `purge_dataset` removes everything.
    /// Takes the dataset's write lock, so in-flight evaluations and
    /// syncs drain before anything is deleted.
    pub fn remove_dataset(&self, name: &str) -> Result<()> {
        let ds = self.dataset(name)?;
        let ds = ds.write().unwrap();

        if !ds.dir.join(DESCRIPTOR_FILE).exists() {
            return Err(Error::UnknownDataset(name.to_string()))
        }

        // Drop the cache entry first so new lookups reload from disk
        // and see the removal; holders of the old handle wait on us.
        self.datasets.write().unwrap().remove(name);
        fs::remove_file(ds.dir.join(DESCRIPTOR_FILE))?;
        fs::remove_file(ds.dir.join(KEY_FILE))?;

        info!(target: "store", "Removed dataset {}", name);
        Ok(())
    }

    /// Delete the whole dataset directory, holding the dataset's write
    /// lock across the deletion.
    pub fn purge_dataset(&self, name: &str) -> Result<()> {
        match self.dataset(name) {
            Ok(ds) => {
                let ds = ds.write().unwrap();
                self.datasets.write().unwrap().remove(name);
                fs::remove_dir_all(&ds.dir)?;
            }
            // Data files left by remove_dataset have no descriptor and
            // cannot back a live dataset; delete the directory as-is.
            Err(Error::UnknownDataset(_)) => {
                let dir = self.root.join(name);
                if !dir.exists() {
                    return Err(Error::UnknownDataset(name.to_string()))
                }
                fs::remove_dir_all(dir)?;
            }
            Err(e) => return Err(e),
        }

        info!(target: "store", "Purged dataset {}", name);
        Ok(())
    }

    pub fn list_datasets(&self) -> Result<Vec<String>> {
        let mut names = vec![];

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().join(DESCRIPTOR_FILE).exists() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Recompute the target index from `source` and append the diff to
    /// the change log. A failing source iterator aborts with no state
    /// change; duplicate IOCs keep the last occurrence.
    pub fn sync_from_source(
        &self,
        name: &str,
        source: impl IntoIterator<Item = Result<(String, Vec<u8>)>>,
    ) -> Result<SyncDelta> {
        let source = collect_source(source)?;
        let ds = self.dataset(name)?;
        let mut ds = ds.write().unwrap();

        let delta = ds.sync(source)?;
        debug!(
            target: "store",
            "Synced dataset {}: {} added, {} removed", name, delta.added, delta.removed
        );
        Ok(delta)
    }

    /// Generate a fresh key, rebuild the whole index and restart the
    /// change log as an ADDED-only sequence. Every ciphertext sealed
    /// under the old key becomes undecryptable.
    pub fn rekey(&self, name: &str, source: impl IntoIterator<Item = Result<(String, Vec<u8>)>>) -> Result<SyncDelta> {
        let source = collect_source(source)?;
        let ds = self.dataset(name)?;
        let mut ds = ds.write().unwrap();

        let delta = ds.rekey(source)?;
        info!(target: "store", "Rekeyed dataset {}: {} entries", name, delta.added);
        Ok(delta)
    }

    /// The dataset's algorithm tag; doubles as an existence check.
    pub fn dataset_algorithm(&self, name: &str) -> Result<Algorithm> {
        let ds = self.dataset(name)?;
        let ds = ds.read().unwrap();
        Ok(ds.algorithm)
    }

    pub fn evaluate_oprf(&self, name: &str, blinded: &[u8]) -> Result<[u8; POINT_LEN]> {
        let ds = self.dataset(name)?;
        let ds = ds.read().unwrap();
        oprf::evaluate(&ds.secret, blinded)
    }

    pub fn read_changes(
        &self,
        name: &str,
        since: Option<[u8; CHAIN_HASH_LEN]>,
    ) -> Result<(SyncMode, Vec<ChangeEvent>)> {
        let ds = self.dataset(name)?;
        let ds = ds.read().unwrap();
        Ok(ds.read_changes(since))
    }
}

fn collect_source(
    source: impl IntoIterator<Item = Result<(String, Vec<u8>)>>,
) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut map = BTreeMap::new();
    for pair in source {
        let (ioc, metadata) = pair?;
        map.insert(ioc, metadata);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(data: &[(&str, &str)]) -> Vec<Result<(String, Vec<u8>)>> {
        data.iter().map(|(i, m)| Ok((i.to_string(), m.as_bytes().to_vec()))).collect()
    }

    fn scratch_store(name: &str) -> (tempdir::TempDir, Store) {
        let dir = tempdir::TempDir::new(name).unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn only_the_classic_algorithm_parses() {
        assert_eq!(Algorithm::from_str("classic").unwrap(), Algorithm::Classic);
        assert!(matches!(Algorithm::from_str("ot"), Err(Error::UnsupportedAlgorithm(_))));
        assert!(matches!(Algorithm::from_str("x25519"), Err(Error::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn create_is_exclusive() {
        let (_dir, store) = scratch_store("store_create");
        store.create_dataset("ds1", Algorithm::Classic, 30).unwrap();
        assert!(matches!(
            store.create_dataset("ds1", Algorithm::Classic, 30),
            Err(Error::DatasetExists(_))
        ));
    }

    #[test]
    fn unknown_dataset_is_reported() {
        let (_dir, store) = scratch_store("store_unknown");
        assert!(matches!(store.evaluate_oprf("nope", &[0u8; 32]), Err(Error::UnknownDataset(_))));
        assert!(matches!(store.read_changes("nope", None), Err(Error::UnknownDataset(_))));
    }

    #[test]
    fn sync_twice_appends_nothing() {
        let (_dir, store) = scratch_store("store_idem");
        store.create_dataset("ds1", Algorithm::Classic, 30).unwrap();

        let src = [("evil.com", "{\"desc\":\"bad\"}"), ("1.2.3.4", "{\"type\":\"ip\"}")];
        let delta = store.sync_from_source("ds1", pairs(&src)).unwrap();
        assert_eq!(delta, SyncDelta { added: 2, removed: 0 });

        let (_, events_before) = store.read_changes("ds1", None).unwrap();

        let delta = store.sync_from_source("ds1", pairs(&src)).unwrap();
        assert_eq!(delta, SyncDelta { added: 0, removed: 0 });

        let (_, events_after) = store.read_changes("ds1", None).unwrap();
        assert_eq!(events_before, events_after);

        // No staged temp files linger after a commit
        let ds_dir = _dir.path().join("ds1");
        assert!(!ds_dir.join("index.csv.tmp").exists());
        assert!(!ds_dir.join("changes.log.tmp").exists());
    }

    #[test]
    fn diff_emits_added_and_removed() {
        let (_dir, store) = scratch_store("store_diff");
        store.create_dataset("ds1", Algorithm::Classic, 30).unwrap();

        store.sync_from_source("ds1", pairs(&[("evil.com", "{}")])).unwrap();
        let delta = store
            .sync_from_source("ds1", pairs(&[("1.2.3.4", "{\"type\":\"ip\"}")]))
            .unwrap();
        assert_eq!(delta, SyncDelta { added: 1, removed: 1 });

        let (mode, events) = store.read_changes("ds1", None).unwrap();
        assert_eq!(mode, SyncMode::Full);
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].kind, EventKind::Added);
        assert_eq!(events[2].kind, EventKind::Removed);
        // The REMOVED event carries the old entry's PRF
        assert_eq!(events[2].prf, events[0].prf);
    }

    #[test]
    fn delta_reads_from_a_known_hash() {
        let (_dir, store) = scratch_store("store_delta");
        store.create_dataset("ds1", Algorithm::Classic, 30).unwrap();

        store.sync_from_source("ds1", pairs(&[("a", "{}")])).unwrap();
        let (_, events) = store.read_changes("ds1", None).unwrap();
        let tip = events.last().unwrap().chain_hash;

        store.sync_from_source("ds1", pairs(&[("a", "{}"), ("b", "{}")])).unwrap();

        let (mode, delta_events) = store.read_changes("ds1", Some(tip)).unwrap();
        assert_eq!(mode, SyncMode::Delta);
        assert_eq!(delta_events.len(), 1);

        // At the new tip, a delta read returns nothing
        let new_tip = delta_events.last().unwrap().chain_hash;
        let (mode, rest) = store.read_changes("ds1", Some(new_tip)).unwrap();
        assert_eq!(mode, SyncMode::Delta);
        assert!(rest.is_empty());

        // An unknown hash falls back to a full read
        let (mode, _) = store.read_changes("ds1", Some([0xab; CHAIN_HASH_LEN])).unwrap();
        assert_eq!(mode, SyncMode::Full);
    }

    #[test]
    fn rekey_restarts_the_log_and_key() {
        let (_dir, store) = scratch_store("store_rekey");
        store.create_dataset("ds1", Algorithm::Classic, 30).unwrap();

        let src = [("evil.com", "{\"desc\":\"bad\"}")];
        store.sync_from_source("ds1", pairs(&src)).unwrap();
        let (_, before) = store.read_changes("ds1", None).unwrap();

        store.rekey("ds1", pairs(&src)).unwrap();
        let (mode, after) = store.read_changes("ds1", None).unwrap();

        assert_eq!(mode, SyncMode::Full);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].kind, EventKind::Added);
        // Fresh key, fresh PRF
        assert_ne!(after[0].prf, before[0].prf);
        // The old tip is gone from the log
        let (mode, _) = store.read_changes("ds1", Some(before[0].chain_hash)).unwrap();
        assert_eq!(mode, SyncMode::Full);
    }

    #[test]
    fn failing_source_commits_nothing() {
        let (_dir, store) = scratch_store("store_fail");
        store.create_dataset("ds1", Algorithm::Classic, 30).unwrap();
        store.sync_from_source("ds1", pairs(&[("a", "{}")])).unwrap();

        let bad: Vec<Result<(String, Vec<u8>)>> = vec![
            Ok(("b".to_string(), vec![])),
            Err(Error::ParseFailed("broken source line")),
        ];
        assert!(store.sync_from_source("ds1", bad).is_err());

        let (_, events) = store.read_changes("ds1", None).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn state_survives_reload() {
        let dir = tempdir::TempDir::new("store_reload").unwrap();

        let tip = {
            let store = Store::open(dir.path()).unwrap();
            store.create_dataset("ds1", Algorithm::Classic, 30).unwrap();
            store.sync_from_source("ds1", pairs(&[("evil.com", "{}")])).unwrap();
            let (_, events) = store.read_changes("ds1", None).unwrap();
            events.last().unwrap().chain_hash
        };

        let store = Store::open(dir.path()).unwrap();
        let (mode, events) = store.read_changes("ds1", Some(tip)).unwrap();
        assert_eq!(mode, SyncMode::Delta);
        assert!(events.is_empty());

        // Re-sync of the same source stays a no-op across reloads
        let delta = store.sync_from_source("ds1", pairs(&[("evil.com", "{}")])).unwrap();
        assert_eq!(delta, SyncDelta::default());
    }

    #[test]
    fn remove_keeps_data_files() {
        let (dir, store) = scratch_store("store_remove");
        store.create_dataset("ds1", Algorithm::Classic, 30).unwrap();
        store.sync_from_source("ds1", pairs(&[("a", "{}")])).unwrap();

        store.remove_dataset("ds1").unwrap();
        assert!(matches!(store.read_changes("ds1", None), Err(Error::UnknownDataset(_))));
        assert!(dir.path().join("ds1").join(LOG_FILE).exists());
        assert!(!dir.path().join("ds1").join(KEY_FILE).exists());

        // purge cleans up the data files remove left behind
        store.purge_dataset("ds1").unwrap();
        assert!(!dir.path().join("ds1").exists());
        assert!(matches!(store.purge_dataset("ds1"), Err(Error::UnknownDataset(_))));

        // purge after re-creating drops the directory
        store.create_dataset("ds2", Algorithm::Classic, 30).unwrap();
        store.purge_dataset("ds2").unwrap();
        assert!(!dir.path().join("ds2").exists());
    }
}
