//! Core reconciliation engine
//!
//! The ReconcileEngine is responsible for:
//! - Collecting desired hostnames via RouteSource
//! - Diffing them against the StateStore
//! - Adding and deleting records via DnsUpdater
//! - Persisting ownership after each successful DNS change
//! - Scheduling passes until shutdown
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ RouteSource │─── desired hostnames ──┐
//! └─────────────┘                        │
//!                                        ▼
//!                             ┌─────────────────┐
//!                             │ ReconcileEngine │
//!                             └─────────────────┘
//!                                        │
//!         ┌──────────────────────────────┼──────────────────────────┐
//!         │                              │                          │
//!         ▼                              ▼                          ▼
//! ┌─────────────┐              ┌──────────────┐            ┌─────────────┐
//! │ StateStore  │              │  DnsUpdater  │            │   Events    │
//! │ (ownership) │              │ (add/delete) │            │  (notify)   │
//! └─────────────┘              └──────────────┘            └─────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Collect desired hostnames; on failure abandon the pass untouched
//! 2. Load managed records and compute the diff
//! 3. For each hostname to create: add in DNS, then record ownership
//! 4. For each hostname to delete: delete in DNS, then forget ownership
//! 5. Refresh confirmation timestamps of hostnames still desired
//! 6. Emit a summary event and log it

pub mod diff;

pub use diff::{ReconciliationDiff, reconcile};

use crate::config::RouteDnsConfig;
use crate::error::Result;
use crate::hostname::DomainSuffix;
use crate::traits::{Clock, DnsUpdater, ManagedRecord, RouteSource, StateStore, SystemClock};
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// DNS operation attempted for a hostname
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Record added for a newly desired hostname
    Create,
    /// Record re-pointed after the target address changed
    Retarget,
    /// Record removed for a hostname no longer desired
    Delete,
}

/// Outcome counters of one completed pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Desired hostnames inside the managed suffix
    pub desired: usize,
    /// Records added
    pub created: usize,
    /// Records re-pointed to the current target address
    pub retargeted: usize,
    /// Records removed
    pub deleted: usize,
    /// Records confirmed without DNS traffic
    pub confirmed: usize,
    /// DNS operations that failed and will be retried next pass
    pub failed: usize,
}

impl PassSummary {
    /// Hostnames whose records the pass changed or tried to change
    ///
    /// A retarget across address families issues two DNS transactions but
    /// counts once here.
    pub fn changes(&self) -> usize {
        self.created + self.retargeted + self.deleted + self.failed
    }
}

/// Events emitted by the ReconcileEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started { interval: Duration },

    /// Pass started
    PassStarted { pass: u64 },

    /// Record added and now owned
    RecordCreated { hostname: String, ip: IpAddr },

    /// Record re-pointed to a new address
    RecordRetargeted {
        hostname: String,
        previous_ip: IpAddr,
        ip: IpAddr,
    },

    /// Record removed and no longer owned
    RecordDeleted { hostname: String },

    /// DNS operation failed; retried next pass
    UpdateFailed {
        hostname: String,
        operation: Operation,
        error: String,
    },

    /// Pass abandoned before completion
    PassAborted { pass: u64, error: String },

    /// Pass completed (possibly with per-record failures)
    PassCompleted { pass: u64, summary: PassSummary },

    /// Engine stopped
    Stopped { reason: String },
}

/// Core reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`ReconcileEngine::new()`]
/// 2. Start with [`ReconcileEngine::run()`]
/// 3. Engine runs passes until a shutdown signal is received
///
/// ## Scheduling
///
/// Passes run strictly one after another. The interval is measured from the
/// start of one pass to the start of the next; a pass that overruns the
/// interval is followed immediately by the next one. Shutdown is only
/// observed between passes, so an in-flight pass always completes.
pub struct ReconcileEngine {
    /// Desired hostname collector
    source: Box<dyn RouteSource>,

    /// DNS update client
    updater: Box<dyn DnsUpdater>,

    /// Ownership store
    state_store: Box<dyn StateStore>,

    /// Time source for record timestamps
    clock: Box<dyn Clock>,

    /// Managed domain suffix
    domain: DomainSuffix,

    /// Address every managed record points to
    target_ip: IpAddr,

    /// Time between pass starts
    interval: Duration,

    /// Passes started so far
    passes: AtomicU64,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ReconcileEngine {
    /// Create a new reconciliation engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        source: Box<dyn RouteSource>,
        updater: Box<dyn DnsUpdater>,
        state_store: Box<dyn StateStore>,
        config: &RouteDnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            source,
            updater,
            state_store,
            clock: Box::new(SystemClock),
            domain: config.dns.domain.clone(),
            target_ip: config.dns.target_ip,
            interval: config.engine.interval(),
            passes: AtomicU64::new(0),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the interval between pass starts
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run passes until Ctrl-C
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error (state store corruption)
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(None).await
    }

    /// Run passes until `shutdown_rx` fires (or Ctrl-C when `None`)
    ///
    /// Dropping the sender counts as a shutdown request.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        let mut shutdown: Pin<Box<dyn Future<Output = ()> + Send>> = match shutdown_rx {
            Some(rx) => Box::pin(async move {
                let _ = rx.await;
            }),
            None => Box::pin(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            }),
        };

        info!(interval = ?self.interval, domain = %self.domain, target = %self.target_ip, "Engine started");
        self.emit_event(EngineEvent::Started {
            interval: self.interval,
        });

        loop {
            let started = Instant::now();

            match self.run_pass().await {
                Err(e) if e.is_fatal() => {
                    self.emit_event(EngineEvent::Stopped {
                        reason: e.to_string(),
                    });
                    return Err(e);
                }
                _ => {}
            }

            let next_start = started + self.interval;
            debug!("Next pass in {:?}", next_start.saturating_duration_since(Instant::now()));

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                _ = tokio::time::sleep_until(next_start) => {}
            }
        }

        info!("Engine stopped");
        Ok(())
    }

    /// Run one reconciliation pass
    ///
    /// Per-record DNS failures do not fail the pass; they are counted in the
    /// summary and retried next pass. The pass fails when the desired set
    /// cannot be collected (nothing is changed) or the state store fails
    /// (the rest of the pass is abandoned).
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit_event(EngineEvent::PassStarted { pass });
        debug!(pass, "Starting pass");

        match self.execute_pass().await {
            Ok(summary) => {
                info!(
                    pass,
                    desired = summary.desired,
                    created = summary.created,
                    retargeted = summary.retargeted,
                    deleted = summary.deleted,
                    confirmed = summary.confirmed,
                    failed = summary.failed,
                    "Pass completed"
                );
                self.emit_event(EngineEvent::PassCompleted { pass, summary });
                Ok(summary)
            }
            Err(e) => {
                if e.is_fatal() {
                    error!(pass, error = %e, "Pass failed fatally");
                } else {
                    warn!(pass, error = %e, "Pass aborted, retrying next interval");
                }
                self.emit_event(EngineEvent::PassAborted {
                    pass,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn execute_pass(&self) -> Result<PassSummary> {
        let source = self.source.source_name();
        let desired = self.source.collect().await.map_err(|e| {
            warn!(source, error = %e, "Failed to collect desired hostnames");
            e
        })?;
        debug!(source, hostnames = desired.len(), "Collected desired hostnames");
        let managed = self.state_store.load().await?;

        let diff = reconcile(&desired, &managed, &self.domain);

        for hostname in &diff.foreign {
            warn!(
                hostname = %hostname,
                domain = %self.domain,
                "Managed record outside domain suffix, leaving it untouched"
            );
        }

        let mut summary = PassSummary {
            desired: diff.to_create.len() + diff.to_confirm.len(),
            ..PassSummary::default()
        };

        for hostname in &diff.to_create {
            match self.updater.add(hostname, self.target_ip).await {
                Ok(()) => {
                    let record = ManagedRecord::new(hostname.clone(), self.target_ip, self.clock.now());
                    self.state_store.put(&record).await?;
                    info!(hostname = %hostname, ip = %self.target_ip, "Created record");
                    summary.created += 1;
                    self.emit_event(EngineEvent::RecordCreated {
                        hostname: hostname.clone(),
                        ip: self.target_ip,
                    });
                }
                Err(e) => self.record_failure(&mut summary, hostname, Operation::Create, e),
            }
        }

        for hostname in &diff.to_delete {
            let Some(record) = managed.get(hostname) else {
                continue;
            };
            match self.updater.delete(hostname, record.target_ip).await {
                Ok(()) => {
                    self.state_store.delete(hostname).await?;
                    info!(hostname = %hostname, "Deleted record");
                    summary.deleted += 1;
                    self.emit_event(EngineEvent::RecordDeleted {
                        hostname: hostname.clone(),
                    });
                }
                Err(e) => self.record_failure(&mut summary, hostname, Operation::Delete, e),
            }
        }

        let mut confirmed = diff.to_confirm.clone();
        for hostname in &diff.to_confirm {
            let Some(record) = managed.get(hostname) else {
                continue;
            };
            if record.target_ip == self.target_ip {
                continue;
            }
            confirmed.remove(hostname);
            if self.retarget(&mut summary, record).await? {
                summary.retargeted += 1;
            }
        }

        if !confirmed.is_empty() {
            self.state_store.confirm(&confirmed, self.clock.now()).await?;
            summary.confirmed = confirmed.len();
        }

        Ok(summary)
    }

    /// Re-point a managed record at the current target address
    ///
    /// Returns whether the record now points at the target. DNS failures are
    /// recorded in the summary; state store failures propagate.
    async fn retarget(&self, summary: &mut PassSummary, record: &ManagedRecord) -> Result<bool> {
        let hostname = &record.hostname;

        // A and AAAA live in separate RRsets, so the old one must go explicitly
        if record.target_ip.is_ipv4() != self.target_ip.is_ipv4() {
            if let Err(e) = self.updater.delete(hostname, record.target_ip).await {
                self.record_failure(summary, hostname, Operation::Retarget, e);
                return Ok(false);
            }
        }

        if let Err(e) = self.updater.add(hostname, self.target_ip).await {
            self.record_failure(summary, hostname, Operation::Retarget, e);
            return Ok(false);
        }

        let now = self.clock.now();
        let updated = ManagedRecord {
            target_ip: self.target_ip,
            last_confirmed_at: now,
            ..record.clone()
        };
        self.state_store.put(&updated).await?;

        info!(hostname = %hostname, from = %record.target_ip, to = %self.target_ip, "Retargeted record");
        self.emit_event(EngineEvent::RecordRetargeted {
            hostname: hostname.clone(),
            previous_ip: record.target_ip,
            ip: self.target_ip,
        });
        Ok(true)
    }

    fn record_failure(
        &self,
        summary: &mut PassSummary,
        hostname: &str,
        operation: Operation,
        error: crate::Error,
    ) {
        warn!(
            hostname = %hostname,
            operation = ?operation,
            updater = self.updater.updater_name(),
            error = %error,
            "DNS update failed, retrying next pass"
        );
        summary.failed += 1;
        self.emit_event(EngineEvent::UpdateFailed {
            hostname: hostname.to_string(),
            operation,
            error: error.to_string(),
        });
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Event channel full, dropping event: {:?}", event);
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
