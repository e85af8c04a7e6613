//! Foothold Sync - Fetch Coordination and the Session Facade
//!
//! This crate ties the engine to its collaborators: the catalog and
//! activity services (trait seams, implementations are supplied by the
//! embedder), the TTL-gated catalog cache, the single-flight fetch
//! coordinator, and the [`Session`] object the UI layer talks to.
//!
//! # Architecture
//!
//! ```text
//! UI -> Session -> FlightGroup -> CatalogService / ActivityService
//!            |          |
//!            v          v
//!     SubmissionLedger  CatalogCache -> CacheAdapter -> KvStore
//!            |
//!            v
//!       DerivedState
//! ```
//!
//! All session state lives on the constructed [`Session`] value; there are
//! no ambient singletons. Failures that only affect freshness or
//! persistence (incremental refresh, quota, corrupt cache) are absorbed and
//! logged; everything that changes externally-visible correctness is
//! surfaced as an error.

mod catalog;
mod flight;
mod services;
mod session;

pub use catalog::{CatalogCache, CATALOG_KEY, CATALOG_SCHEMA};
pub use flight::{FlightGroup, FlightStatus};
pub use services::{
    parse_catalog, parse_submissions, ActivityService, CatalogPayload, CatalogService,
    RawProblem, RawProblemStat, RawSubmission,
};
pub use session::{CatalogSnapshot, Session, HANDLE_KEY, HANDLE_SCHEMA};
