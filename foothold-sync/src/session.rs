//! The session facade exposed to the UI layer.
//!
//! A [`Session`] owns every piece of mutable state: the cache adapter, the
//! catalog snapshot, the single-flight coordinators, the submission ledger
//! and its derived aggregates, and a generation counter. There are no
//! ambient singletons; construct one session per logical user context and
//! pass it by reference.
//!
//! The generation counter closes the late-resolution hazard: every fetch
//! captures the generation before suspending, and its result is applied
//! only if the generation is still current. `clear_user` (and a user
//! switch) advances the generation, so a superseded fetch that resolves
//! afterwards is discarded instead of clobbering newer state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use foothold_core::{
    AttemptInfo, EpochSeconds, FetchError, FootholdError, FootholdResult, GroupId, Handle,
    Problem, ProblemKey, SessionConfig, ValidationError,
};
use foothold_engine::{CatalogCounts, DerivedState, SubmissionLedger};
use foothold_storage::{CacheAdapter, KvStore};

use crate::catalog::CatalogCache;
use crate::flight::{FlightGroup, FlightStatus};
use crate::services::{parse_submissions, ActivityService, CatalogService};

/// Store key holding the persisted user handle.
pub const HANDLE_KEY: &str = "foothold.user-handle";
/// Schema tag of the persisted handle payload.
pub const HANDLE_SCHEMA: &str = "foothold.handle.v1";

/// Immutable catalog snapshot shared with callers.
#[derive(Debug)]
pub struct CatalogSnapshot {
    /// The full item list, statistics already merged.
    pub problems: Vec<Problem>,
    /// Key set for membership checks.
    pub keys: HashSet<ProblemKey>,
}

impl CatalogSnapshot {
    fn new(problems: Vec<Problem>) -> Self {
        let keys = problems.iter().map(Problem::key).collect();
        Self { problems, keys }
    }
}

#[derive(Debug)]
struct CatalogEntry {
    snapshot: Arc<CatalogSnapshot>,
    loaded_at: EpochSeconds,
}

#[derive(Debug)]
struct UserState {
    handle: Handle,
    ledger: SubmissionLedger,
    derived: DerivedState,
}

/// One logical session: catalog, ledger, derived state and coordination.
pub struct Session<S: KvStore> {
    config: SessionConfig,
    adapter: CacheAdapter<S>,
    catalog_service: Arc<dyn CatalogService>,
    activity_service: Arc<dyn ActivityService>,
    catalog_cache: CatalogCache,
    catalog: RwLock<Option<CatalogEntry>>,
    catalog_flight: FlightGroup<(), Arc<CatalogSnapshot>>,
    init_flight: FlightGroup<Handle, ()>,
    user: RwLock<Option<UserState>>,
    generation: AtomicU64,
}

impl<S: KvStore> Session<S> {
    /// Build a session over a store and the two service collaborators.
    ///
    /// # Errors
    ///
    /// Returns a config error when `config` fails validation.
    pub fn new(
        config: SessionConfig,
        store: S,
        catalog_service: Arc<dyn CatalogService>,
        activity_service: Arc<dyn ActivityService>,
    ) -> FootholdResult<Self> {
        config.validate()?;
        let adapter = CacheAdapter::new(store, config.max_entry_bytes, config.max_store_bytes);
        let catalog_cache = CatalogCache::new(config.catalog_ttl, config.retry.clone());
        Ok(Self {
            config,
            adapter,
            catalog_service,
            activity_service,
            catalog_cache,
            catalog: RwLock::new(None),
            catalog_flight: FlightGroup::new(),
            init_flight: FlightGroup::new(),
            user: RwLock::new(None),
            generation: AtomicU64::new(0),
        })
    }

    // ========================================================================
    // CATALOG
    // ========================================================================

    /// Load the catalog. Idempotent and safe to call repeatedly: a fresh
    /// in-memory snapshot is returned as-is, concurrent loads share one
    /// fetch, and the persistent cache absorbs cold starts.
    pub async fn load_catalog(&self) -> FootholdResult<Arc<CatalogSnapshot>> {
        if let Some(snapshot) = self.fresh_catalog(Self::now()) {
            return Ok(snapshot);
        }

        let snapshot = self
            .catalog_flight
            .run((), || self.load_catalog_flight())
            .await?;

        // Catalog-intersected counts change with the catalog.
        self.recompute_derived();
        Ok(snapshot)
    }

    /// Single-flight status of the catalog load.
    pub fn catalog_status(&self) -> FlightStatus {
        self.catalog_flight.status(&())
    }

    async fn load_catalog_flight(&self) -> Result<Arc<CatalogSnapshot>, FetchError> {
        let now = Self::now();
        // A waiter that became leader after a reset may find the snapshot
        // already fresh; skip the fetch entirely in that case.
        if let Some(snapshot) = self.fresh_catalog(now) {
            return Ok(snapshot);
        }

        let problems = self
            .catalog_cache
            .load(self.catalog_service.as_ref(), &self.adapter, now)
            .await?;
        info!(problems = problems.len(), "catalog loaded");

        let snapshot = Arc::new(CatalogSnapshot::new(problems));
        *self.catalog.write().unwrap() = Some(CatalogEntry {
            snapshot: Arc::clone(&snapshot),
            loaded_at: now,
        });
        Ok(snapshot)
    }

    fn fresh_catalog(&self, now: EpochSeconds) -> Option<Arc<CatalogSnapshot>> {
        let catalog = self.catalog.read().unwrap();
        catalog.as_ref().and_then(|entry| {
            let age = (now - entry.loaded_at).max(0) as u64;
            (age <= self.config.catalog_ttl.as_secs()).then(|| Arc::clone(&entry.snapshot))
        })
    }

    // ========================================================================
    // USER LIFECYCLE
    // ========================================================================

    /// First full fetch for a user; replaces any prior ledger.
    ///
    /// Switching handles discards the previous user's state before any
    /// fetch is issued. Concurrent calls for the same handle share one
    /// fetch.
    ///
    /// # Errors
    ///
    /// `ValidationError` for a malformed handle (before any I/O);
    /// `FetchError::NotFound` when the service knows no such user (the
    /// persisted handle is cleared so the failure does not repeat on
    /// reload); `FetchError::Network` when the full fetch fails. On every
    /// failure no partial ledger is left behind.
    pub async fn init_user(&self, raw_handle: &str) -> FootholdResult<()> {
        let handle = Handle::parse(raw_handle)?;

        let switching = {
            let user = self.user.read().unwrap();
            matches!(user.as_ref(), Some(state) if state.handle != handle)
        };
        if switching {
            self.clear_user();
        }

        let generation = self.generation.load(Ordering::SeqCst);
        self.init_flight
            .run(handle.clone(), || self.init_user_flight(&handle, generation))
            .await?;
        Ok(())
    }

    /// Single-flight status of the initial fetch for `handle`.
    pub fn init_status(&self, handle: &Handle) -> FlightStatus {
        self.init_flight.status(handle)
    }

    async fn init_user_flight(
        &self,
        handle: &Handle,
        generation: u64,
    ) -> Result<(), FetchError> {
        let raw = match self.activity_service.fetch_full(handle).await {
            Ok(raw) => raw,
            Err(err) => {
                if matches!(err, FetchError::NotFound { .. }) {
                    // Forget the persisted handle so a reload does not
                    // re-trigger the same failing fetch.
                    self.adapter.remove(HANDLE_KEY);
                }
                return Err(err);
            }
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(%handle, "discarding superseded initial fetch");
            return Ok(());
        }

        let records = parse_submissions(raw);
        let mut ledger = SubmissionLedger::new();
        let adopted = ledger.replace(records);
        info!(%handle, submissions = adopted, "initialized user ledger");

        let derived = self.compute_derived(&ledger);
        *self.user.write().unwrap() = Some(UserState {
            handle: handle.clone(),
            ledger,
            derived,
        });
        self.adapter
            .write(HANDLE_KEY, HANDLE_SCHEMA, handle, Self::now());
        Ok(())
    }

    /// Incremental refresh across all groups.
    ///
    /// Transient fetch failures are swallowed and logged; the caller sees
    /// no new data until the next successful refresh.
    pub async fn refresh_user(&self, raw_handle: &str) -> FootholdResult<()> {
        let handle = Handle::parse(raw_handle)?;
        self.refresh(handle, None).await
    }

    /// Incremental refresh scoped to one catalog group.
    pub async fn refresh_user_scoped(
        &self,
        raw_handle: &str,
        raw_group_id: &str,
    ) -> FootholdResult<()> {
        let handle = Handle::parse(raw_handle)?;
        let group_id = GroupId::parse(raw_group_id)?;
        self.refresh(handle, Some(group_id)).await
    }

    async fn refresh(&self, handle: Handle, scope: Option<GroupId>) -> FootholdResult<()> {
        {
            let user = self.user.read().unwrap();
            match user.as_ref() {
                None => return Err(FootholdError::from(ValidationError::NoActiveUser)),
                Some(state) if state.handle != handle => {
                    return Err(FootholdError::from(ValidationError::HandleMismatch {
                        active: state.handle.to_string(),
                        requested: handle.to_string(),
                    }))
                }
                Some(_) => {}
            }
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let raw = match self
            .activity_service
            .fetch_incremental(&handle, scope.as_ref())
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%handle, %err, "incremental refresh failed; keeping existing state");
                return Ok(());
            }
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(%handle, "discarding superseded refresh");
            return Ok(());
        }

        let records = parse_submissions(raw);
        let catalog = self.catalog_snapshot();
        let today = self.today();
        let mut user = self.user.write().unwrap();
        let Some(state) = user.as_mut() else {
            return Ok(());
        };
        if state.handle != handle {
            return Ok(());
        }

        let outcome = state.ledger.merge(records);
        if !outcome.is_noop() {
            debug!(%handle, added = outcome.added, duplicates = outcome.duplicates, "merged refresh batch");
            state.derived = DerivedState::compute(
                &state.ledger,
                Self::keys_of(&catalog),
                today,
                self.config.utc_offset,
            );
        }
        Ok(())
    }

    /// Discard the ledger and derived state synchronously.
    ///
    /// Advances the generation so any in-flight fetch result is dropped on
    /// arrival, and clears the persisted handle.
    pub fn clear_user(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.user.write().unwrap() = None;
        self.init_flight.reset();
        self.adapter.remove(HANDLE_KEY);
        info!("cleared user state");
    }

    // ========================================================================
    // READ-ONLY VIEW
    // ========================================================================

    /// The currently active handle, if a user is initialized.
    pub fn active_handle(&self) -> Option<Handle> {
        self.user.read().unwrap().as_ref().map(|s| s.handle.clone())
    }

    /// The handle persisted from an earlier session, for the restore path.
    pub fn persisted_handle(&self) -> Option<Handle> {
        self.adapter
            .read::<Handle>(HANDLE_KEY, HANDLE_SCHEMA)
            .map(|stamped| stamped.value)
    }

    /// Keys with at least one accepted submission.
    pub fn solved(&self) -> HashSet<ProblemKey> {
        self.with_derived(|d| d.solved.clone()).unwrap_or_default()
    }

    /// Keys attempted but never solved, with their attempt summaries.
    pub fn attempted_unsolved(&self) -> HashMap<ProblemKey, AttemptInfo> {
        self.with_derived(|d| d.attempted_unsolved.clone())
            .unwrap_or_default()
    }

    /// Accepted submissions per local calendar date.
    pub fn daily_counts(&self) -> BTreeMap<NaiveDate, u32> {
        self.with_derived(|d| d.daily_counts.clone())
            .unwrap_or_default()
    }

    /// Consecutive active days ending at or adjacent to today.
    pub fn streak(&self) -> u32 {
        self.with_derived(|d| d.streak).unwrap_or(0)
    }

    /// Catalog-intersected solved / attempted / untouched counts.
    pub fn catalog_counts(&self) -> CatalogCounts {
        self.with_derived(|d| d.catalog).unwrap_or_default()
    }

    /// Number of records in the active ledger.
    pub fn ledger_len(&self) -> usize {
        self.user
            .read()
            .unwrap()
            .as_ref()
            .map(|s| s.ledger.len())
            .unwrap_or(0)
    }

    // ========================================================================
    // INTERNAL
    // ========================================================================

    fn now() -> EpochSeconds {
        Utc::now().timestamp()
    }

    fn today(&self) -> NaiveDate {
        foothold_engine::local_date(Self::now(), self.config.utc_offset)
    }

    fn catalog_snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        self.catalog
            .read()
            .unwrap()
            .as_ref()
            .map(|entry| Arc::clone(&entry.snapshot))
    }

    fn keys_of(catalog: &Option<Arc<CatalogSnapshot>>) -> &HashSet<ProblemKey> {
        static EMPTY_KEYS: Lazy<HashSet<ProblemKey>> = Lazy::new(HashSet::new);
        match catalog {
            Some(snapshot) => &snapshot.keys,
            None => &EMPTY_KEYS,
        }
    }

    fn compute_derived(&self, ledger: &SubmissionLedger) -> DerivedState {
        let catalog = self.catalog_snapshot();
        DerivedState::compute(
            ledger,
            Self::keys_of(&catalog),
            self.today(),
            self.config.utc_offset,
        )
    }

    fn recompute_derived(&self) {
        let catalog = self.catalog_snapshot();
        let today = self.today();
        let mut user = self.user.write().unwrap();
        if let Some(state) = user.as_mut() {
            state.derived = DerivedState::compute(
                &state.ledger,
                Self::keys_of(&catalog),
                today,
                self.config.utc_offset,
            );
        }
    }

    fn with_derived<R>(&self, f: impl FnOnce(&DerivedState) -> R) -> Option<R> {
        self.user.read().unwrap().as_ref().map(|s| f(&s.derived))
    }
}
