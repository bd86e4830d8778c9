// # DNS Updater Trait
//
// Defines the interface for mutating address records in the managed zone.
//
// ## Implementations
//
// - RFC 2136 dynamic update: `routedns-update-rfc2136` crate
//
// ## Usage
//
// ```rust,ignore
// use routedns_core::DnsUpdater;
//
// let updater = /* DnsUpdater implementation */;
//
// updater.add("app.example.com", "10.0.0.2".parse()?).await?;
// updater.delete("old.example.com", "10.0.0.2".parse()?).await?;
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for DNS update client implementations
///
/// # Transactions
///
/// Every call is exactly one independent transaction for exactly one
/// hostname. There is no batching across hostnames, so a failure on one
/// hostname never affects another.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Talk to the configured DNS server only
/// - ✅ Return success or a classified failure
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (the next pass is the retry)
/// - ❌ Access the state store (owned by `ReconcileEngine`)
/// - ❌ Decide whether an update is needed (owned by `ReconcileEngine`)
/// - ❌ Spawn tasks that outlive the call
///
/// # Errors
///
/// - `Error::UpdateRejected`: the server answered with a refusal
/// - `Error::UpdateTimeout`: no answer within the per-call timeout
/// - `Error::UpdateUnreachable`: any other transport failure
#[async_trait]
pub trait DnsUpdater: Send + Sync {
    /// Set the address record of `hostname` to `ip`, replacing any existing
    /// record of the same address family
    async fn add(&self, hostname: &str, ip: IpAddr) -> Result<(), crate::Error>;

    /// Remove the address record of `hostname`
    ///
    /// `ip` selects the address family (A or AAAA) to remove.
    async fn delete(&self, hostname: &str, ip: IpAddr) -> Result<(), crate::Error>;

    /// Get the updater name (for logging/debugging)
    fn updater_name(&self) -> &'static str;
}
