//! Key-value storage interface and in-memory implementation.
//!
//! Provides the [`KeyValueStore`] trait consumed by the height index and the
//! block-body store. The [`MemoryKeyValueStore`] is suitable for testing;
//! the node uses RocksDB (kiln-store).

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::KvError;

/// Byte-keyed storage engine.
///
/// When auto-commit is disabled, writes become durable only after
/// [`commit`](KeyValueStore::commit). Reads always observe the handle's own
/// uncommitted writes.
///
/// Not thread-safe for writers. Callers serialize mutations.
pub trait KeyValueStore: Send {
    /// Look up a key. Returns `None` if absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;

    /// Insert or overwrite a key.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&mut self, key: &[u8]) -> Result<(), KvError>;

    /// Make staged writes durable. A no-op under auto-commit.
    fn commit(&mut self) -> Result<(), KvError>;

    /// Whether every write is committed immediately.
    fn is_auto_commit_enabled(&self) -> bool;

    /// Release the underlying resources. Later calls fail with [`KvError::Closed`].
    fn close(&mut self) -> Result<(), KvError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        (**self).get(key)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        (**self).put(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KvError> {
        (**self).delete(key)
    }

    fn commit(&mut self) -> Result<(), KvError> {
        (**self).commit()
    }

    fn is_auto_commit_enabled(&self) -> bool {
        (**self).is_auto_commit_enabled()
    }

    fn close(&mut self) -> Result<(), KvError> {
        (**self).close()
    }
}

/// In-memory key-value store for testing.
///
/// Committed data lives in a shared `BTreeMap`; handles created with
/// [`reopen`](Self::reopen) see the same committed data but start with an
/// empty staging area, which models a process restart.
#[derive(Debug)]
pub struct MemoryKeyValueStore {
    /// Committed entries, shared across reopened handles.
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    /// Staged writes: `Some` = put, `None` = delete.
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    auto_commit: bool,
    closed: bool,
}

impl MemoryKeyValueStore {
    /// Create an empty auto-commit store.
    pub fn new() -> Self {
        Self::with_auto_commit(true)
    }

    /// Create an empty store with the given commit mode.
    pub fn with_auto_commit(auto_commit: bool) -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            pending: BTreeMap::new(),
            auto_commit,
            closed: false,
        }
    }

    /// A fresh handle over the same committed data.
    ///
    /// Uncommitted writes of `self` are not visible to the new handle.
    pub fn reopen(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            pending: BTreeMap::new(),
            auto_commit: self.auto_commit,
            closed: false,
        }
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether no entries are committed.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Number of staged, uncommitted writes.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn ensure_open(&self) -> Result<(), KvError> {
        if self.closed {
            return Err(KvError::Closed);
        }
        Ok(())
    }
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        self.ensure_open()?;
        if let Some(staged) = self.pending.get(key) {
            return Ok(staged.clone());
        }
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.ensure_open()?;
        if self.auto_commit {
            self.data.write().insert(key.to_vec(), value.to_vec());
        } else {
            self.pending.insert(key.to_vec(), Some(value.to_vec()));
        }
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KvError> {
        self.ensure_open()?;
        if self.auto_commit {
            self.data.write().remove(key);
        } else {
            self.pending.insert(key.to_vec(), None);
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), KvError> {
        self.ensure_open()?;
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut data = self.data.write();
        for (key, staged) in std::mem::take(&mut self.pending) {
            match staged {
                Some(value) => {
                    data.insert(key, value);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn is_auto_commit_enabled(&self) -> bool {
        self.auto_commit
    }

    fn close(&mut self) -> Result<(), KvError> {
        self.ensure_open()?;
        self.pending.clear();
        self.closed = true;
        Ok(())
    }
}
