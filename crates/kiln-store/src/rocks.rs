//! RocksDB-backed [`KeyValueStore`].
//!
//! One database per store. With auto-commit off, writes are staged in an
//! in-memory overlay that reads consult, and [`commit`](KeyValueStore::commit)
//! applies the overlay atomically through a [`WriteBatch`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rocksdb::{Options, WriteBatch, DB};

use kiln_core::error::KvError;
use kiln_core::kv::KeyValueStore;

fn backend(e: rocksdb::Error) -> KvError {
    KvError::Backend(e.to_string())
}

pub struct RocksKeyValueStore {
    db: Option<DB>,
    path: PathBuf,
    /// Staged writes: `Some` = put, `None` = delete.
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    auto_commit: bool,
}

impl RocksKeyValueStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>, auto_commit: bool) -> Result<Self, KvError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path.as_ref()).map_err(backend)?;
        Ok(Self {
            db: Some(db),
            path: path.as_ref().to_path_buf(),
            pending: BTreeMap::new(),
            auto_commit,
        })
    }

    fn db(&self) -> Result<&DB, KvError> {
        self.db.as_ref().ok_or(KvError::Closed)
    }
}

impl KeyValueStore for RocksKeyValueStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        let db = self.db()?;
        if let Some(staged) = self.pending.get(key) {
            return Ok(staged.clone());
        }
        db.get(key).map_err(backend)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        if self.auto_commit {
            self.db()?.put(key, value).map_err(backend)
        } else {
            self.db()?;
            self.pending.insert(key.to_vec(), Some(value.to_vec()));
            Ok(())
        }
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KvError> {
        if self.auto_commit {
            self.db()?.delete(key).map_err(backend)
        } else {
            self.db()?;
            self.pending.insert(key.to_vec(), None);
            Ok(())
        }
    }

    fn commit(&mut self) -> Result<(), KvError> {
        let db = self.db()?;
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::default();
        for (key, staged) in &self.pending {
            match staged {
                Some(value) => batch.put(key, value),
                None => batch.delete(key),
            }
        }
        db.write(batch).map_err(backend)?;
        tracing::debug!(
            writes = self.pending.len(),
            path = %self.path.display(),
            "committed batch"
        );
        self.pending.clear();
        Ok(())
    }

    fn is_auto_commit_enabled(&self) -> bool {
        self.auto_commit
    }

    /// Flush memtables and release the database. Staged writes are dropped.
    fn close(&mut self) -> Result<(), KvError> {
        let db = self.db.take().ok_or(KvError::Closed)?;
        if !self.pending.is_empty() {
            tracing::warn!(
                dropped = self.pending.len(),
                path = %self.path.display(),
                "closing with uncommitted writes"
            );
            self.pending.clear();
        }
        db.flush().map_err(backend)
    }
}
