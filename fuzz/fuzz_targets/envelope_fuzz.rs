//! Fuzz test for the cache adapter read path
//!
//! This fuzz target stores arbitrary bytes and reads them back through the
//! schema-validating adapter to find:
//! - Panics or crashes
//! - Corrupt entries surviving a failed read
//!
//! Run with: cargo +nightly fuzz run envelope_fuzz -- -max_total_time=60

#![no_main]

use foothold_storage::{CacheAdapter, KvStore, MemoryKvStore};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The adapter should handle any stored string without panicking
    if let Ok(raw) = std::str::from_utf8(data) {
        let adapter = CacheAdapter::new(MemoryKvStore::new(), 1 << 20, 4 << 20);
        if adapter.store().put("entry", raw).is_err() {
            return;
        }

        let read = adapter.read::<serde_json::Value>("entry", "fuzz.entry.v1");

        // An entry that fails validation must be purged, never left behind
        if read.is_none() {
            assert!(
                adapter.store().get("entry").is_none(),
                "Invalid entry survived a failed read"
            );
        }
    }
});
