// # Route Source Trait
//
// Defines the interface for discovering the hostnames the reverse proxy
// currently routes.
//
// ## Implementations
//
// - Traefik API: `routedns-source-traefik` crate
//
// ## Usage
//
// ```rust,ignore
// use routedns_core::RouteSource;
//
// let source = /* RouteSource implementation */;
// let hostnames = source.collect().await?;
// ```

use async_trait::async_trait;
use std::collections::BTreeSet;

/// Trait for desired-hostname collectors
///
/// # Partial Success
///
/// A single malformed router must not fail the collection: implementations
/// skip it with a warning. Only a failure that leaves nothing trustworthy to
/// report is an error.
///
/// # Errors
///
/// - `Error::UpstreamUnavailable`: the API is unreachable, timed out, or
///   returned a non-success status
/// - `Error::MalformedResponse`: the payload as a whole cannot be parsed
///
/// An error must never be replaced by an empty set: an empty set means
/// "delete everything we manage".
#[async_trait]
pub trait RouteSource: Send + Sync {
    /// Collect the hostnames currently routed on the configured entry points
    ///
    /// Returned names are normalized (see [`crate::hostname::normalize`]) but
    /// not yet filtered by domain suffix.
    async fn collect(&self) -> Result<BTreeSet<String>, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
