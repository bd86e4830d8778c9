//! Test doubles and common utilities for architecture contract tests
//!
//! This module provides minimal test doubles that record every call the
//! engine makes, so contracts can be asserted on observed behavior.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use routedns_core::error::{Error, Result};
use routedns_core::traits::{Clock, DnsUpdater, ManagedRecord, ManagedRecords, RouteSource, StateStore};
use routedns_core::MemoryStateStore;
use std::collections::{BTreeSet, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A route source whose desired set tests can change between passes
#[derive(Clone, Default)]
pub struct ControlledRouteSource {
    hostnames: Arc<Mutex<BTreeSet<String>>>,
    failing: Arc<Mutex<bool>>,
    delay: Arc<Mutex<Duration>>,
    collect_call_count: Arc<AtomicUsize>,
}

impl ControlledRouteSource {
    pub fn new(hostnames: &[&str]) -> Self {
        let source = Self::default();
        source.set_hostnames(hostnames);
        source
    }

    /// Replace the desired set returned by the next collect()
    pub fn set_hostnames(&self, hostnames: &[&str]) {
        *self.hostnames.lock().unwrap() = hostnames.iter().map(|h| h.to_string()).collect();
    }

    /// Make collect() fail as if the proxy API were down
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Make collect() take this long before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Get the number of times collect() was called
    pub fn collect_call_count(&self) -> usize {
        self.collect_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RouteSource for ControlledRouteSource {
    async fn collect(&self) -> Result<BTreeSet<String>> {
        self.collect_call_count.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if *self.failing.lock().unwrap() {
            return Err(Error::upstream("connection refused"));
        }
        Ok(self.hostnames.lock().unwrap().clone())
    }

    fn source_name(&self) -> &'static str {
        "controlled"
    }
}

/// A DNS call observed by [`MockDnsUpdater`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsCall {
    Add(String, IpAddr),
    Delete(String, IpAddr),
}

/// A mock DnsUpdater that tracks calls and fails on demand
#[derive(Clone, Default)]
pub struct MockDnsUpdater {
    calls: Arc<Mutex<Vec<DnsCall>>>,
    failing_hosts: Arc<Mutex<HashSet<String>>>,
}

impl MockDnsUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every update touching this hostname
    pub fn fail_for(&self, hostname: &str) {
        self.failing_hosts.lock().unwrap().insert(hostname.to_string());
    }

    /// Stop rejecting updates
    pub fn recover(&self) {
        self.failing_hosts.lock().unwrap().clear();
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<DnsCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn added(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DnsCall::Add(h, _) => Some(h),
                DnsCall::Delete(..) => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DnsCall::Delete(h, _) => Some(h),
                DnsCall::Add(..) => None,
            })
            .collect()
    }

    fn check(&self, hostname: &str) -> Result<()> {
        if self.failing_hosts.lock().unwrap().contains(hostname) {
            return Err(Error::rejected(hostname, "REFUSED"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DnsUpdater for MockDnsUpdater {
    async fn add(&self, hostname: &str, ip: IpAddr) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(DnsCall::Add(hostname.to_string(), ip));
        self.check(hostname)
    }

    async fn delete(&self, hostname: &str, ip: IpAddr) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(DnsCall::Delete(hostname.to_string(), ip));
        self.check(hostname)
    }

    fn updater_name(&self) -> &'static str {
        "mock"
    }
}

/// A memory store whose put() fails a set number of times
#[derive(Clone, Default)]
pub struct FlakyStateStore {
    inner: MemoryStateStore,
    put_failures_left: Arc<AtomicUsize>,
    put_call_count: Arc<AtomicUsize>,
}

impl FlakyStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` put() calls as if the disk were unwritable
    pub fn fail_puts(&self, count: usize) {
        self.put_failures_left.store(count, Ordering::SeqCst);
    }

    pub fn put_call_count(&self) -> usize {
        self.put_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StateStore for FlakyStateStore {
    async fn load(&self) -> Result<ManagedRecords> {
        self.inner.load().await
    }

    async fn put(&self, record: &ManagedRecord) -> Result<()> {
        self.put_call_count.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .put_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::store_unavailable("No space left on device"));
        }
        self.inner.put(record).await
    }

    async fn delete(&self, hostname: &str) -> Result<()> {
        self.inner.delete(hostname).await
    }

    async fn confirm(&self, hostnames: &BTreeSet<String>, at: DateTime<Utc>) -> Result<()> {
        self.inner.confirm(hostnames, at).await
    }
}

/// A clock that only moves when told to
#[derive(Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub const TARGET_IP: [u8; 4] = [192, 168, 178, 2];

pub fn target_ip() -> IpAddr {
    IpAddr::from(TARGET_IP)
}

/// Helper to create a minimal RouteDnsConfig for testing
pub fn minimal_config(domain: &str) -> routedns_core::RouteDnsConfig {
    let domain = domain.to_string();
    routedns_core::RouteDnsConfig::from_lookup(move |key| match key {
        "DNS_DOMAIN" => Some(domain.clone()),
        "DNS_SERVER" => Some("127.0.0.1:5353".to_string()),
        "TARGET_IP" => Some("192.168.178.2".to_string()),
        _ => None,
    })
    .expect("minimal config is valid")
}
