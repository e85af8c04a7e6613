//! Quota-safe, schema-validating adapter over a [`KvStore`].
//!
//! Every persisted value is wrapped in a schema-tagged envelope carrying a
//! write timestamp. Reads validate the envelope before trusting it: a wrong
//! schema tag or an unparseable payload is treated as a cache miss and the
//! corrupt entry is purged, never surfaced as an error. Writes enforce a
//! per-entry ceiling and a cumulative ceiling; when the store is full a
//! cleanup pass (oldest entries first, then largest) runs and the write is
//! retried once. A write that still cannot land is abandoned - persistence
//! is best-effort and refusal is never fatal for the caller.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use foothold_core::{EpochSeconds, StorageError};

use crate::KvStore;

/// Envelope wrapping every persisted payload.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    schema: String,
    written_at: EpochSeconds,
    payload: T,
}

/// A value read back from the store, with its write timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<T> {
    /// The deserialized payload.
    pub value: T,
    /// When the payload was written, in epoch seconds.
    pub written_at: EpochSeconds,
}

impl<T> Stamped<T> {
    /// Age of this entry relative to `now`, in seconds (clamped to zero).
    pub fn age_secs(&self, now: EpochSeconds) -> i64 {
        (now - self.written_at).max(0)
    }
}

/// Outcome of a best-effort write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The payload landed in the store.
    Written,
    /// The payload was abandoned; the caller continues without persistence.
    Refused,
}

impl WriteOutcome {
    /// Whether the payload landed in the store.
    pub fn was_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

/// Schema-validating, quota-safe wrapper around a [`KvStore`].
pub struct CacheAdapter<S: KvStore> {
    store: S,
    max_entry_bytes: usize,
    max_store_bytes: usize,
}

impl<S: KvStore> CacheAdapter<S> {
    /// Wrap a store with the given per-entry and cumulative byte ceilings.
    pub fn new(store: S, max_entry_bytes: usize, max_store_bytes: usize) -> Self {
        Self {
            store,
            max_entry_bytes,
            max_store_bytes,
        }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read and validate the entry under `key`.
    ///
    /// Returns `None` for an absent entry, a schema mismatch, or an
    /// unparseable payload; the latter two purge the entry. Never an error.
    pub fn read<T: DeserializeOwned>(&self, key: &str, schema: &str) -> Option<Stamped<T>> {
        let raw = self.store.get(key)?;
        match serde_json::from_str::<Envelope<T>>(&raw) {
            Ok(envelope) if envelope.schema == schema => Some(Stamped {
                value: envelope.payload,
                written_at: envelope.written_at,
            }),
            Ok(envelope) => {
                warn!(
                    key,
                    found = %envelope.schema,
                    expected = %schema,
                    "purging cache entry with unexpected schema"
                );
                self.store.remove(key);
                None
            }
            Err(err) => {
                warn!(key, %err, "purging unparseable cache entry");
                self.store.remove(key);
                None
            }
        }
    }

    /// Write `payload` under `key`, best-effort.
    ///
    /// Enforces the per-entry ceiling, runs a cleanup pass when the
    /// cumulative ceiling would be exceeded or the store signals a quota
    /// violation, and retries exactly once. Refusal leaves the caller's
    /// state untouched.
    pub fn write<T: Serialize>(
        &self,
        key: &str,
        schema: &str,
        payload: &T,
        now: EpochSeconds,
    ) -> WriteOutcome {
        let envelope = Envelope {
            schema: schema.to_string(),
            written_at: now,
            payload,
        };
        let encoded = match serde_json::to_string(&envelope) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, %err, "failed to encode cache payload");
                return WriteOutcome::Refused;
            }
        };

        if encoded.len() > self.max_entry_bytes {
            warn!(
                key,
                bytes = encoded.len(),
                ceiling = self.max_entry_bytes,
                "cache payload exceeds per-entry ceiling"
            );
            return WriteOutcome::Refused;
        }

        let used = self.used_bytes_excluding(key);
        if used + encoded.len() > self.max_store_bytes {
            self.cleanup(key, used + encoded.len() - self.max_store_bytes);
        }

        match self.store.put(key, &encoded) {
            Ok(()) => WriteOutcome::Written,
            Err(StorageError::QuotaExceeded { .. }) => {
                // The store's own capacity is opaque; free at least the
                // incoming payload's size and retry once.
                self.cleanup(key, encoded.len());
                match self.store.put(key, &encoded) {
                    Ok(()) => WriteOutcome::Written,
                    Err(err) => {
                        warn!(key, %err, "abandoning cache write after cleanup");
                        WriteOutcome::Refused
                    }
                }
            }
            Err(err) => {
                warn!(key, %err, "abandoning cache write");
                WriteOutcome::Refused
            }
        }
    }

    /// Remove the entry under `key`.
    pub fn remove(&self, key: &str) {
        self.store.remove(key);
    }

    /// Bytes held by entries other than `key`.
    fn used_bytes_excluding(&self, key: &str) -> usize {
        self.store
            .keys()
            .into_iter()
            .filter(|k| k != key)
            .filter_map(|k| self.store.get(&k).map(|v| k.len() + v.len()))
            .sum()
    }

    /// Evict entries (oldest first, then largest) until at least
    /// `free_at_least` bytes have been released. Unparseable entries sort
    /// first and go before anything with a valid timestamp.
    fn cleanup(&self, incoming_key: &str, free_at_least: usize) {
        let mut candidates: Vec<(String, usize, EpochSeconds)> = Vec::new();
        for key in self.store.keys() {
            if key == incoming_key {
                continue;
            }
            let Some(raw) = self.store.get(&key) else {
                continue;
            };
            let written_at = serde_json::from_str::<Envelope<serde_json::Value>>(&raw)
                .map(|e| e.written_at)
                .unwrap_or(EpochSeconds::MIN);
            candidates.push((key, raw.len(), written_at));
        }
        candidates.sort_by(|a, b| a.2.cmp(&b.2).then(b.1.cmp(&a.1)));

        let mut freed = 0usize;
        for (key, size, _) in candidates {
            if freed >= free_at_least {
                break;
            }
            debug!(key = %key, bytes = size, "evicting cache entry to free space");
            self.store.remove(&key);
            freed += size + key.len();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryKvStore;
    use serde::{Deserialize, Serialize};

    const SCHEMA: &str = "test.payload.v1";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        value: String,
    }

    fn payload(value: &str) -> Payload {
        Payload {
            value: value.to_string(),
        }
    }

    fn adapter(max_entry: usize, max_store: usize) -> CacheAdapter<MemoryKvStore> {
        CacheAdapter::new(MemoryKvStore::new(), max_entry, max_store)
    }

    #[test]
    fn test_read_absent_returns_none() {
        let adapter = adapter(1024, 4096);
        assert!(adapter.read::<Payload>("missing", SCHEMA).is_none());
    }

    #[test]
    fn test_write_read_roundtrip() {
        let adapter = adapter(1024, 4096);
        let outcome = adapter.write("k", SCHEMA, &payload("hello"), 1_700_000_000);
        assert!(outcome.was_written());

        let read = adapter.read::<Payload>("k", SCHEMA).unwrap();
        assert_eq!(read.value, payload("hello"));
        assert_eq!(read.written_at, 1_700_000_000);
        assert_eq!(read.age_secs(1_700_000_060), 60);
    }

    #[test]
    fn test_corrupt_entry_is_purged() {
        let adapter = adapter(1024, 4096);
        adapter.store().put("k", "not json at all").unwrap();

        assert!(adapter.read::<Payload>("k", SCHEMA).is_none());
        assert!(adapter.store().get("k").is_none());
    }

    #[test]
    fn test_schema_mismatch_is_purged() {
        let adapter = adapter(1024, 4096);
        adapter.write("k", "other.schema.v2", &payload("x"), 0);

        assert!(adapter.read::<Payload>("k", SCHEMA).is_none());
        assert!(adapter.store().get("k").is_none());
    }

    #[test]
    fn test_wrong_shape_is_purged() {
        let adapter = adapter(1024, 4096);
        adapter
            .store()
            .put("k", r#"{"schema":"test.payload.v1","written_at":0,"payload":{"value":7}}"#)
            .unwrap();

        assert!(adapter.read::<Payload>("k", SCHEMA).is_none());
        assert!(adapter.store().get("k").is_none());
    }

    #[test]
    fn test_oversized_entry_refused() {
        let adapter = adapter(32, 4096);
        let outcome = adapter.write("k", SCHEMA, &payload(&"x".repeat(100)), 0);
        assert_eq!(outcome, WriteOutcome::Refused);
        assert!(adapter.store().get("k").is_none());
    }

    #[test]
    fn test_cumulative_ceiling_evicts_oldest_first() {
        let adapter = adapter(512, 400);
        assert!(adapter.write("old", SCHEMA, &payload(&"a".repeat(100)), 100).was_written());
        assert!(adapter.write("new", SCHEMA, &payload(&"b".repeat(100)), 200).was_written());

        // A third entry cannot fit; the oldest entry must be evicted for it.
        assert!(adapter.write("third", SCHEMA, &payload(&"c".repeat(100)), 300).was_written());
        assert!(adapter.store().get("old").is_none());
        assert!(adapter.store().get("new").is_some());
        assert!(adapter.store().get("third").is_some());
    }

    #[test]
    fn test_store_quota_triggers_cleanup_then_retry() {
        // The adapter's own ceiling is generous, but the store itself is
        // tight, so the first put fails with a quota violation.
        let store = MemoryKvStore::with_capacity(220);
        let adapter = CacheAdapter::new(store, 512, 4096);

        assert!(adapter.write("old", SCHEMA, &payload(&"a".repeat(100)), 100).was_written());
        assert!(adapter.write("new", SCHEMA, &payload(&"b".repeat(100)), 200).was_written());
        assert!(adapter.store().get("old").is_none());
        assert!(adapter.store().get("new").is_some());
    }

    #[test]
    fn test_refusal_is_not_fatal_and_leaves_store_usable() {
        // Store too small for the payload even after cleanup.
        let store = MemoryKvStore::with_capacity(16);
        let adapter = CacheAdapter::new(store, 512, 4096);

        let outcome = adapter.write("k", SCHEMA, &payload(&"x".repeat(100)), 0);
        assert_eq!(outcome, WriteOutcome::Refused);
        assert!(adapter.read::<Payload>("k", SCHEMA).is_none());
    }
}
