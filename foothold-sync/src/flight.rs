//! Single-flight fetch coordination.
//!
//! A [`FlightGroup`] guarantees at most one pending execution per logical
//! resource key. Concurrent callers for the same key share the leader's
//! eventual result through a watch channel (hence `Clone` results and
//! errors). The group also records per-key status so re-entrant
//! initialization paths can avoid scheduling redundant fetches.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;

use tokio::sync::watch;

use foothold_core::FetchError;

/// Lifecycle of a logical resource fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightStatus {
    /// Never fetched.
    Never,
    /// A fetch is pending; callers joining now share its result.
    InFlight,
    /// At least one fetch has completed.
    Done,
}

type Shared<T> = Option<Result<T, FetchError>>;

#[derive(Debug)]
struct FlightEntry<T> {
    status: FlightStatus,
    rx: Option<watch::Receiver<Shared<T>>>,
}

enum Role<T> {
    Leader(watch::Sender<Shared<T>>),
    Waiter(watch::Receiver<Shared<T>>),
}

/// Per-resource single-flight coordinator.
#[derive(Debug, Default)]
pub struct FlightGroup<K, T> {
    flights: Mutex<HashMap<K, FlightEntry<T>>>,
}

impl<K: Eq + Hash + Clone, T: Clone> FlightGroup<K, T> {
    /// Create an empty group.
    pub fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Status of the flight for `key`.
    pub fn status(&self, key: &K) -> FlightStatus {
        let flights = self.flights.lock().unwrap();
        flights
            .get(key)
            .map(|entry| entry.status)
            .unwrap_or(FlightStatus::Never)
    }

    /// Forget every flight record. Pending waiters observe an abandoned
    /// fetch; used when the owning session is cleared.
    pub fn reset(&self) {
        self.flights.lock().unwrap().clear();
    }

    /// Execute `fetch` for `key`, or join the pending execution.
    ///
    /// The first caller for a key becomes the leader and runs `fetch`;
    /// callers arriving while the flight is pending await the leader's
    /// result instead of triggering a duplicate fetch. A completed flight
    /// does not pin its value - calling again re-executes; value caching
    /// belongs to the layers above.
    pub async fn run<F, Fut>(&self, key: K, fetch: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let role = {
            let mut flights = self.flights.lock().unwrap();
            let entry = flights.entry(key.clone()).or_insert(FlightEntry {
                status: FlightStatus::Never,
                rx: None,
            });

            // A live pending flight has a receiver whose sender is still
            // around; a flight whose leader was dropped mid-await is taken
            // over instead of joined.
            let live_rx = match (&entry.status, &entry.rx) {
                (FlightStatus::InFlight, Some(rx)) if rx.has_changed().is_ok() => Some(rx.clone()),
                _ => None,
            };

            match live_rx {
                Some(rx) => Role::Waiter(rx),
                None => {
                    let (tx, rx) = watch::channel(None);
                    entry.status = FlightStatus::InFlight;
                    entry.rx = Some(rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Waiter(mut rx) => loop {
                if let Some(result) = rx.borrow_and_update().clone() {
                    return result;
                }
                if rx.changed().await.is_err() {
                    // Sender dropped; the final value (if any) is retained.
                    return rx.borrow().clone().unwrap_or(Err(FetchError::Network {
                        reason: "fetch abandoned".to_string(),
                    }));
                }
            },
            Role::Leader(tx) => {
                let result = fetch().await;
                {
                    let mut flights = self.flights.lock().unwrap();
                    if let Some(entry) = flights.get_mut(&key) {
                        entry.status = FlightStatus::Done;
                        entry.rx = None;
                    }
                }
                let _ = tx.send(Some(result.clone()));
                result
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
