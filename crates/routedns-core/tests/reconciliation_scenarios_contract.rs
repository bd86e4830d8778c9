//! Architectural Contract Test: Reconciliation Scenarios
//!
//! End-to-end passes against test doubles for the situations operators hit:
//!
//! - A new route appears: exactly one add, ownership recorded
//! - A route disappears: exactly one delete, ownership forgotten
//! - The proxy API is down: the pass is abandoned, nothing is touched
//! - The state store is corrupt: the pass fails fatally
//!
//! If this test fails, the pass flow itself is broken.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::*;
use routedns_core::traits::StateStore;
use routedns_core::{
    EngineEvent, Error, ManagedRecord, ManagedRecords, MemoryStateStore, ReconcileEngine,
};
use std::collections::BTreeSet;

#[tokio::test]
async fn new_route_creates_one_record() {
    let source = ControlledRouteSource::new(&[]);
    let updater = MockDnsUpdater::new();
    let store = MemoryStateStore::new();
    let config = minimal_config("example.com");

    let (engine, mut event_rx) = ReconcileEngine::new(
        Box::new(source.clone()),
        Box::new(updater.clone()),
        Box::new(store.clone()),
        &config,
    )
    .expect("engine construction succeeds");

    engine.run_pass().await.unwrap();
    assert_eq!(updater.call_count(), 0);

    source.set_hostnames(&["app.example.com"]);
    let summary = engine.run_pass().await.unwrap();

    assert_eq!(summary.created, 1);
    assert_eq!(
        updater.calls(),
        vec![DnsCall::Add("app.example.com".to_string(), target_ip())]
    );
    let records = store.load().await.unwrap();
    assert_eq!(records["app.example.com"].target_ip, target_ip());

    let mut created = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        if let EngineEvent::RecordCreated { hostname, ip } = event {
            created.push((hostname, ip));
        }
    }
    assert_eq!(created, vec![("app.example.com".to_string(), target_ip())]);
}

#[tokio::test]
async fn removed_route_deletes_one_record() {
    let source = ControlledRouteSource::new(&["a.example.com", "b.example.com"]);
    let updater = MockDnsUpdater::new();
    let store = MemoryStateStore::new();
    let config = minimal_config("example.com");

    let (engine, _event_rx) = ReconcileEngine::new(
        Box::new(source.clone()),
        Box::new(updater.clone()),
        Box::new(store.clone()),
        &config,
    )
    .expect("engine construction succeeds");

    engine.run_pass().await.unwrap();

    source.set_hostnames(&["a.example.com"]);
    let summary = engine.run_pass().await.unwrap();

    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.confirmed, 1);
    assert_eq!(updater.deleted(), vec!["b.example.com"]);
    assert_eq!(
        store.list().await.unwrap().into_iter().collect::<Vec<_>>(),
        vec!["a.example.com"]
    );
}

#[tokio::test]
async fn upstream_failure_touches_nothing() {
    let clock = FixedClock::new();
    let store = MemoryStateStore::with_records([ManagedRecord::new(
        "a.example.com",
        target_ip(),
        clock_now(&clock),
    )]);
    let source = ControlledRouteSource::new(&[]);
    source.set_failing(true);
    let updater = MockDnsUpdater::new();
    let config = minimal_config("example.com");

    let (engine, mut event_rx) = ReconcileEngine::new(
        Box::new(source),
        Box::new(updater.clone()),
        Box::new(store.clone()),
        &config,
    )
    .expect("engine construction succeeds");
    let engine = engine.with_clock(Box::new(clock.clone()));

    clock.advance(chrono::Duration::minutes(1));
    let before = store.load().await.unwrap();

    let result = engine.run_pass().await;
    assert!(matches!(result, Err(Error::UpstreamUnavailable(_))));

    // An unreachable proxy must never be mistaken for "no routes"
    assert_eq!(updater.call_count(), 0);
    assert_eq!(store.load().await.unwrap(), before);

    let mut aborted = false;
    while let Ok(event) = event_rx.try_recv() {
        if matches!(event, EngineEvent::PassAborted { .. }) {
            aborted = true;
        }
    }
    assert!(aborted);
}

#[tokio::test]
async fn corrupt_store_fails_pass_fatally() {
    struct CorruptStore;

    #[async_trait]
    impl StateStore for CorruptStore {
        async fn load(&self) -> routedns_core::Result<ManagedRecords> {
            Err(Error::store_corrupt("unexpected end of file"))
        }

        async fn put(&self, _record: &ManagedRecord) -> routedns_core::Result<()> {
            unreachable!("pass must stop at load")
        }

        async fn delete(&self, _hostname: &str) -> routedns_core::Result<()> {
            unreachable!("pass must stop at load")
        }

        async fn confirm(
            &self,
            _hostnames: &BTreeSet<String>,
            _at: DateTime<Utc>,
        ) -> routedns_core::Result<()> {
            unreachable!("pass must stop at load")
        }
    }

    let updater = MockDnsUpdater::new();
    let config = minimal_config("example.com");

    let (engine, _event_rx) = ReconcileEngine::new(
        Box::new(ControlledRouteSource::new(&["a.example.com"])),
        Box::new(updater.clone()),
        Box::new(CorruptStore),
        &config,
    )
    .expect("engine construction succeeds");

    let err = engine.run_pass().await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(updater.call_count(), 0);

    // The scheduler stops instead of retrying
    let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        engine.run_with_shutdown(Some(shutdown_rx)),
    )
    .await
    .expect("engine stops on fatal error");
    assert!(matches!(result, Err(Error::StoreCorrupt(_))));
}

fn clock_now(clock: &FixedClock) -> DateTime<Utc> {
    use routedns_core::Clock;
    clock.now()
}
