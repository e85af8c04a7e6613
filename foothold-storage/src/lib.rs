//! Foothold Storage - Persistent Store Trait and Cache Adapter
//!
//! Defines the string-keyed bounded store abstraction the session persists
//! into, and the schema-validating, quota-safe adapter layered on top of it.
//! The in-memory implementation lives here as well; embedders supply their
//! own store (browser local storage, a file, ...) by implementing `KvStore`.

pub mod adapter;

pub use adapter::{CacheAdapter, Stamped, WriteOutcome};

use std::collections::HashMap;
use std::sync::RwLock;

use foothold_core::StorageError;

// ============================================================================
// STORE TRAIT
// ============================================================================

/// String-keyed, string-valued, bounded-capacity storage.
///
/// The store may refuse a write with [`StorageError::QuotaExceeded`]; callers
/// above the [`CacheAdapter`] never see that failure, the adapter absorbs it.
/// Implementations must be thread-safe.
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any prior value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::QuotaExceeded`] when the store cannot hold
    /// the value, or [`StorageError::Backend`] for any other store failure.
    fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value stored under `key`. Removing an absent key is a no-op.
    fn remove(&self, key: &str);

    /// All keys currently present in the store.
    fn keys(&self) -> Vec<String>;
}

impl<S: KvStore> KvStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory store with an optional byte capacity.
///
/// Capacity accounting counts key and value bytes, the way browser local
/// storage quotas roughly behave. With no capacity the store never refuses.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
    capacity_bytes: Option<usize>,
}

impl MemoryKvStore {
    /// Create an unbounded in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that refuses writes past `capacity_bytes`.
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity_bytes: Some(capacity_bytes),
        }
    }

    /// Bytes currently held, counting keys and values.
    pub fn used_bytes(&self) -> usize {
        let entries = self.entries.read().unwrap();
        entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap();
        if let Some(capacity) = self.capacity_bytes {
            let current: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if current + key.len() + value.len() > capacity {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().unwrap().keys().cloned().collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
