//! Core traits for the routedns system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RouteSource`]: Discover the hostnames the proxy routes
//! - [`DnsUpdater`]: Add and delete address records in the zone
//! - [`StateStore`]: Persistent ownership tracking
//! - [`Clock`]: Time source for record timestamps

pub mod route_source;
pub mod dns_updater;
pub mod state_store;

pub use route_source::RouteSource;
pub use dns_updater::DnsUpdater;
pub use state_store::{StateStore, ManagedRecord, ManagedRecords};

use chrono::{DateTime, Utc};

/// Time source for record timestamps
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
