//! Desired-vs-managed diff
//!
//! Pure set arithmetic, no I/O. The engine applies the result.

use crate::hostname::DomainSuffix;
use crate::traits::ManagedRecords;
use std::collections::BTreeSet;

/// Changes needed to converge the zone on the desired hostnames
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationDiff {
    /// Desired but not managed: add to DNS, then record
    pub to_create: BTreeSet<String>,
    /// Managed but no longer desired: delete from DNS, then forget
    pub to_delete: BTreeSet<String>,
    /// Desired and managed: refresh `last_confirmed_at` only
    pub to_confirm: BTreeSet<String>,
    /// Managed entries outside the domain suffix, left untouched
    pub foreign: BTreeSet<String>,
}

impl ReconciliationDiff {
    /// Whether the pass needs any DNS traffic
    pub fn is_converged(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

/// Compute the diff between desired hostnames and managed records
///
/// Desired names outside `suffix` are ignored. Managed names outside
/// `suffix` are reported in `foreign` and never scheduled for deletion.
pub fn reconcile(
    desired: &BTreeSet<String>,
    managed: &ManagedRecords,
    suffix: &DomainSuffix,
) -> ReconciliationDiff {
    let desired: BTreeSet<&String> = desired.iter().filter(|h| suffix.matches(h)).collect();

    let mut diff = ReconciliationDiff::default();

    for hostname in managed.keys() {
        if !suffix.matches(hostname) {
            diff.foreign.insert(hostname.clone());
        } else if desired.contains(hostname) {
            diff.to_confirm.insert(hostname.clone());
        } else {
            diff.to_delete.insert(hostname.clone());
        }
    }

    diff.to_create = desired
        .into_iter()
        .filter(|h| !managed.contains_key(h.as_str()))
        .cloned()
        .collect();

    diff
}
