// # routedns-core
//
// Core library for the route-driven DNS reconciler.
//
// ## Architecture Overview
//
// This library keeps the records of one DNS zone in line with the hostnames
// a reverse proxy routes:
// - **RouteSource**: Trait for discovering the desired hostnames
// - **DnsUpdater**: Trait for adding and deleting address records
// - **StateStore**: Trait for persistent ownership (which records we created)
// - **ReconcileEngine**: Core engine that diffs desired against managed and
//   applies the difference on a fixed schedule
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from the proxy and DNS clients
// 2. **Ownership Safety**: Only records recorded in the state store are ever deleted
// 3. **Idempotency**: An unchanged desired set produces no DNS traffic
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod engine;
pub mod error;
pub mod hostname;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{DnsConfig, EngineConfig, ProxyConfig, RouteDnsConfig, StoreConfig};
pub use engine::{EngineEvent, Operation, PassSummary, ReconcileEngine, ReconciliationDiff, reconcile};
pub use error::{Error, Result};
pub use hostname::DomainSuffix;
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{Clock, DnsUpdater, ManagedRecord, ManagedRecords, RouteSource, StateStore, SystemClock};
