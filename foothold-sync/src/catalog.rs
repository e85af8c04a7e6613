//! TTL-gated catalog cache.
//!
//! Routes a catalog load to the persistent cache when a valid, non-empty
//! entry is younger than the TTL; otherwise fetches through the catalog
//! service with bounded retries and exponential backoff. A successful
//! fetch is cached best-effort; an invalid or empty payload is never
//! cached. When every attempt fails but a stale cached copy exists, the
//! stale copy is served instead of failing the caller.

use std::time::Duration;

use tracing::{debug, warn};

use foothold_core::{EpochSeconds, FetchError, Problem, RetryConfig};
use foothold_storage::{CacheAdapter, KvStore};

use crate::services::{parse_catalog, CatalogService};

/// Store key holding the persisted catalog.
pub const CATALOG_KEY: &str = "foothold.catalog";
/// Schema tag of the persisted catalog payload.
pub const CATALOG_SCHEMA: &str = "foothold.catalog.v1";

/// TTL + retry policy for catalog loads.
#[derive(Debug, Clone)]
pub struct CatalogCache {
    ttl: Duration,
    retry: RetryConfig,
}

impl CatalogCache {
    /// Create a cache with the given TTL and retry policy.
    pub fn new(ttl: Duration, retry: RetryConfig) -> Self {
        Self { ttl, retry }
    }

    /// Load the catalog, preferring a fresh persisted copy.
    ///
    /// # Errors
    ///
    /// Returns the last fetch error once every attempt is exhausted and no
    /// cached copy (fresh or stale) is available.
    pub async fn load<S: KvStore>(
        &self,
        service: &dyn CatalogService,
        adapter: &CacheAdapter<S>,
        now: EpochSeconds,
    ) -> Result<Vec<Problem>, FetchError> {
        let cached = adapter
            .read::<Vec<Problem>>(CATALOG_KEY, CATALOG_SCHEMA)
            .filter(|stamped| !stamped.value.is_empty());

        if let Some(stamped) = &cached {
            if stamped.age_secs(now) <= self.ttl.as_secs() as i64 {
                debug!(
                    age_secs = stamped.age_secs(now),
                    problems = stamped.value.len(),
                    "serving catalog from cache"
                );
                return Ok(stamped.value.clone());
            }
        }

        match self.fetch_with_retry(service).await {
            Ok(problems) => {
                adapter.write(CATALOG_KEY, CATALOG_SCHEMA, &problems, now);
                Ok(problems)
            }
            Err(err) => match cached {
                Some(stamped) => {
                    warn!(%err, "catalog fetch exhausted; serving stale cache");
                    Ok(stamped.value)
                }
                None => Err(err),
            },
        }
    }

    async fn fetch_with_retry(
        &self,
        service: &dyn CatalogService,
    ) -> Result<Vec<Problem>, FetchError> {
        let mut last_err = FetchError::Network {
            reason: "no attempts configured".to_string(),
        };
        for attempt in 1..=self.retry.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry.backoff_delay(attempt - 1)).await;
            }
            match service.fetch_catalog().await.and_then(parse_catalog) {
                Ok(problems) => return Ok(problems),
                Err(err) => {
                    warn!(attempt, %err, "catalog fetch attempt failed");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{CatalogPayload, RawProblem};
    use async_trait::async_trait;
    use foothold_storage::MemoryKvStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    const HOUR: i64 = 3600;
    const NOW: EpochSeconds = 1_700_000_000;

    /// Service that fails a configured number of times, then succeeds.
    struct FlakyCatalogService {
        fail_first: u32,
        calls: AtomicU32,
        payload: CatalogPayload,
    }

    impl FlakyCatalogService {
        fn new(fail_first: u32, payload: CatalogPayload) -> Self {
            Self {
                fail_first,
                calls: AtomicU32::new(0),
                payload,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogService for FlakyCatalogService {
        async fn fetch_catalog(&self) -> Result<CatalogPayload, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(FetchError::Network {
                    reason: "connection reset".to_string(),
                })
            } else {
                Ok(self.payload.clone())
            }
        }
    }

    fn payload() -> CatalogPayload {
        CatalogPayload {
            problems: vec![RawProblem {
                group_id: Some("4".to_string()),
                index: Some("A".to_string()),
                name: Some("Watermelon".to_string()),
                rating: Some(800),
                tags: vec![],
            }],
            statistics: vec![],
        }
    }

    fn cache() -> CatalogCache {
        CatalogCache::new(
            Duration::from_secs(6 * 3600),
            RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    fn adapter() -> CacheAdapter<MemoryKvStore> {
        CacheAdapter::new(MemoryKvStore::new(), 1 << 20, 4 << 20)
    }

    #[tokio::test]
    async fn test_fresh_cache_hit_makes_zero_service_calls() {
        let cache = cache();
        let adapter = adapter();
        let service = FlakyCatalogService::new(0, payload());

        // Seed the cache one hour in the past.
        let seeded = cache.load(&service, &adapter, NOW - HOUR).await.unwrap();
        assert_eq!(seeded.len(), 1);
        assert_eq!(service.calls(), 1);

        let loaded = cache.load(&service, &adapter, NOW).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(service.calls(), 1, "a fresh cache entry must not hit the service");
    }

    #[tokio::test]
    async fn test_stale_cache_triggers_refetch() {
        let cache = cache();
        let adapter = adapter();
        let service = FlakyCatalogService::new(0, payload());

        // Seed seven hours in the past: older than the six hour TTL.
        cache.load(&service, &adapter, NOW - 7 * HOUR).await.unwrap();
        assert_eq!(service.calls(), 1);

        cache.load(&service, &adapter, NOW).await.unwrap();
        assert_eq!(service.calls(), 2, "a stale entry must be refetched");
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let cache = cache();
        let adapter = adapter();
        let service = FlakyCatalogService::new(2, payload());

        let loaded = cache.load(&service, &adapter, NOW).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(service.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_surface_failure() {
        let cache = cache();
        let adapter = adapter();
        let service = FlakyCatalogService::new(10, payload());

        let err = cache.load(&service, &adapter, NOW).await.unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }));
        assert_eq!(service.calls(), 3, "exactly three attempts");
        // Nothing was cached for the next caller to trip over.
        assert!(adapter.store().get(CATALOG_KEY).is_none());
    }

    #[tokio::test]
    async fn test_empty_payload_is_a_failure_and_never_cached() {
        let cache = cache();
        let adapter = adapter();
        let service = FlakyCatalogService::new(0, CatalogPayload::default());

        let err = cache.load(&service, &adapter, NOW).await.unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
        assert!(adapter.store().get(CATALOG_KEY).is_none());
    }

    #[tokio::test]
    async fn test_stale_cache_served_when_fetch_exhausted() {
        let cache = cache();
        let adapter = adapter();

        let seeding = FlakyCatalogService::new(0, payload());
        cache.load(&seeding, &adapter, NOW - 7 * HOUR).await.unwrap();

        let down = FlakyCatalogService::new(10, payload());
        let loaded = cache.load(&down, &adapter, NOW).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(down.calls(), 3);
    }
}
