use bytes::Bytes;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::RoutingError;

/// Backing key/value store for a DHT.
pub trait Datastore: Send + Sync {
    /// Reads the value under `key`, `None` if there is none.
    fn get(&self, key: &Bytes) -> Result<Option<Bytes>, RoutingError>;

    /// Writes `value` under `key`, replacing any previous value.
    fn put(&self, key: Bytes, value: Bytes) -> Result<(), RoutingError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn delete(&self, key: &Bytes) -> Result<(), RoutingError>;

    /// Returns whether `key` has a value.
    fn has(&self, key: &Bytes) -> Result<bool, RoutingError> {
        Ok(self.get(key)?.is_some())
    }

    /// Writes all entries. Stores that support atomic batches should override this.
    fn put_many(&self, entries: Vec<(Bytes, Bytes)>) -> Result<(), RoutingError> {
        for (key, value) in entries {
            self.put(key, value)?;
        }

        Ok(())
    }
}

/// A [`Datastore`] kept in memory.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    entries: RwLock<FxHashMap<Bytes, Bytes>>,
}

impl MemoryDatastore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Datastore for MemoryDatastore {
    fn get(&self, key: &Bytes) -> Result<Option<Bytes>, RoutingError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: Bytes, value: Bytes) -> Result<(), RoutingError> {
        self.entries.write().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &Bytes) -> Result<(), RoutingError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn put_many(&self, entries: Vec<(Bytes, Bytes)>) -> Result<(), RoutingError> {
        self.entries.write().extend(entries);
        Ok(())
    }
}
