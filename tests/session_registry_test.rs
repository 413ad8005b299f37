mod common;

use common::*;
use giving_checkout::payments::checkout::{CheckoutEvent, CheckoutLauncher, CheckoutResponse, RelayCheckout};
use giving_checkout::payments::types::ProviderName;
use giving_checkout::services::session::{
    AttemptKey, AttemptStatus, AttemptStore, MemoryAttemptStore, SessionRegistry, StoreProvider,
};
use giving_checkout::workers::session_sweeper::{SessionSweeper, SessionSweeperConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

const IDLE_TTL: Duration = Duration::from_secs(600);

/// One process: its own gateway, relay and registry over the shared `store`
struct Process {
    gateway: Arc<MockGateway>,
    relay: Arc<RelayCheckout>,
    registry: Arc<SessionRegistry>,
}

fn process(store: &MemoryAttemptStore) -> Process {
    let gateway = Arc::new(MockGateway::new());
    let relay = Arc::new(RelayCheckout::new());
    let launcher: Arc<dyn CheckoutLauncher> = relay.clone();
    let registry = Arc::new(SessionRegistry::new(
        gateway.clone(),
        launcher,
        StoreProvider::Memory(store.clone()),
        session_config(Some("PZ78-PKTEST-0001")),
    ));
    Process {
        gateway,
        relay,
        registry,
    }
}

fn sweeper(process: &Process) -> SessionSweeper {
    SessionSweeper::new(
        Arc::clone(&process.registry),
        SessionSweeperConfig {
            interval: Duration::from_secs(60),
            idle_ttl: IDLE_TTL,
        },
    )
}

async fn submit_momo(process: &Process) -> Uuid {
    let (id, controller) = process.registry.create().await;
    let submitted = controller.submit(Some(ProviderName::MomoPsb), momo_form()).await;
    assert_eq!(submitted.status, AttemptStatus::AwaitingUserConfirmation);
    id
}

// ============================================================================
// Restart recovery
// ============================================================================

#[tokio::test]
async fn test_mobile_money_attempt_resumes_after_restart() {
    let store = MemoryAttemptStore::new();
    let before = process(&store);
    let id = submit_momo(&before).await;
    drop(before);

    let after = process(&store);
    assert!(after.registry.get(&id).await.is_none());

    let controller = after.registry.resume(&id).await.unwrap().unwrap();
    let restored = controller.snapshot().await;
    assert_eq!(restored.status, AttemptStatus::AwaitingUserConfirmation);
    assert_eq!(restored.collection_no.as_deref(), Some(COLLECTION_NO));
    assert_eq!(restored.provider, Some(ProviderName::MomoPsb));
    assert!(restored.last_notification().unwrap().message.contains("unconfirmed gift"));

    let pending = controller.pending_collection().await.unwrap().unwrap();
    assert_eq!(pending.collection_no, COLLECTION_NO);

    let done = controller.confirm_payment().await;
    assert_eq!(done.status, AttemptStatus::Succeeded);
    assert_eq!(done.receipt.unwrap().donor_name, "Ama Mensah");
    assert_eq!(after.gateway.completions(), 1);
    assert!(store.is_empty().await);

    // Live now, so a second resume hands back the same session
    let again = after.registry.resume(&id).await.unwrap().unwrap();
    assert_eq!(again.snapshot().await.status, AttemptStatus::Succeeded);
}

#[tokio::test]
async fn test_checkout_attempt_resumes_as_indeterminate() {
    let store = MemoryAttemptStore::new();
    let before = process(&store);
    let (id, controller) = before.registry.create().await;
    let submitted = controller.submit(Some(ProviderName::Payaza), checkout_form()).await;
    assert_eq!(submitted.status, AttemptStatus::AwaitingProvider);
    let reference = submitted.reference.unwrap();

    let after = process(&store);
    let resumed = after.registry.resume(&id).await.unwrap().unwrap();
    let restored = resumed.snapshot().await;
    assert_eq!(restored.status, AttemptStatus::Indeterminate);
    assert_eq!(restored.reference.as_deref(), Some(reference.as_str()));
    assert!(!after.relay.is_open(&reference).await);

    let done = resumed.confirm_payment().await;
    assert_eq!(done.status, AttemptStatus::Succeeded);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_unknown_session_is_not_resumed() {
    let store = MemoryAttemptStore::new();
    let after = process(&store);
    assert!(after.registry.resume(&Uuid::new_v4()).await.unwrap().is_none());
    assert!(after.registry.is_empty().await);
}

#[tokio::test]
async fn test_identifiers_without_attempt_details_are_still_reported() {
    let store = MemoryAttemptStore::new();
    let id = Uuid::new_v4();
    let scoped = store.scoped(format!("session:{}", id));
    scoped
        .set(&AttemptKey::CurrentCollectionNo, "COL-LEGACY")
        .await
        .unwrap();

    let after = process(&store);
    let controller = after.registry.resume(&id).await.unwrap().unwrap();
    assert_eq!(controller.snapshot().await.status, AttemptStatus::NotStarted);
    let pending = controller.pending_collection().await.unwrap().unwrap();
    assert_eq!(pending.collection_no, "COL-LEGACY");

    assert!(after.registry.remove(&id).await.unwrap());
    assert!(store.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_marker_from_interrupted_completion_expires() {
    let store = MemoryAttemptStore::new();
    let before = process(&store);
    let id = submit_momo(&before).await;

    // The earlier process claimed the collection and died before releasing it
    let ttl = session_config(None).marker_ttl();
    assert!(store
        .set_if_absent(&AttemptKey::processed(COLLECTION_NO), "true", Some(ttl))
        .await
        .unwrap());
    drop(before);

    let after = process(&store);
    let controller = after.registry.resume(&id).await.unwrap().unwrap();
    let blocked = controller.confirm_payment().await;
    assert_eq!(blocked.status, AttemptStatus::AwaitingUserConfirmation);
    assert_eq!(after.gateway.completions(), 0);

    tokio::time::advance(ttl + Duration::from_secs(1)).await;
    let done = controller.confirm_payment().await;
    assert_eq!(done.status, AttemptStatus::Succeeded);
    assert_eq!(after.gateway.completions(), 1);
    assert!(store.is_empty().await);
}

// ============================================================================
// Idle eviction
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_sessions_are_evicted_and_stay_resumable() {
    let store = MemoryAttemptStore::new();
    let p = process(&store);
    let momo_id = submit_momo(&p).await;
    let (empty_id, _) = p.registry.create().await;
    assert_eq!(p.registry.len().await, 2);

    tokio::time::advance(IDLE_TTL + Duration::from_secs(1)).await;
    assert_eq!(sweeper(&p).sweep_once().await, 2);
    assert!(p.registry.is_empty().await);
    assert!(p.registry.get(&momo_id).await.is_none());

    // The unconfirmed gift is still in the store
    let resumed = p.registry.resume(&momo_id).await.unwrap().unwrap();
    assert_eq!(
        resumed.snapshot().await.status,
        AttemptStatus::AwaitingUserConfirmation
    );
    assert!(p.registry.resume(&empty_id).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_recently_used_sessions_are_kept() {
    let store = MemoryAttemptStore::new();
    let p = process(&store);
    let (id, _) = p.registry.create().await;

    tokio::time::advance(IDLE_TTL / 2).await;
    assert!(p.registry.get(&id).await.is_some());
    tokio::time::advance(IDLE_TTL / 2 + Duration::from_secs(1)).await;

    assert_eq!(sweeper(&p).sweep_once().await, 0);
    assert_eq!(p.registry.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_eviction_closes_checkout_kept_open_after_failure() {
    let store = MemoryAttemptStore::new();
    let p = process(&store);
    let (_, controller) = p.registry.create().await;
    let submitted = controller.submit(Some(ProviderName::Payaza), checkout_form()).await;
    let reference = submitted.reference.unwrap();

    let failed = CheckoutEvent::from_callback(CheckoutResponse::with_status(json!("failed")));
    assert!(p.relay.deliver(&reference, failed).await);
    wait_for(&controller, AttemptStatus::Failed).await;
    assert!(p.relay.is_open(&reference).await);

    tokio::time::advance(IDLE_TTL).await;
    assert_eq!(sweeper(&p).sweep_once().await, 1);
    assert!(!p.relay.is_open(&reference).await);
    assert!(p.registry.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_session_mid_completion_is_not_evicted() {
    let store = MemoryAttemptStore::new();
    let p = process(&store);
    let id = submit_momo(&p).await;
    let controller = p.registry.get(&id).await.unwrap();
    p.gateway.set_complete_delay(Duration::from_secs(25));

    let confirming = tokio::spawn({
        let controller = controller.clone();
        async move { controller.confirm_payment().await }
    });
    wait_for(&controller, AttemptStatus::Completing).await;

    let sweeper = SessionSweeper::new(
        Arc::clone(&p.registry),
        SessionSweeperConfig {
            interval: Duration::from_secs(1),
            idle_ttl: Duration::from_secs(5),
        },
    );
    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(sweeper.sweep_once().await, 0);
    assert_eq!(p.registry.len().await, 1);

    let done = confirming.await.unwrap();
    assert_eq!(done.status, AttemptStatus::Succeeded);
    assert_eq!(sweeper.sweep_once().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_runs_until_shutdown() {
    let store = MemoryAttemptStore::new();
    let p = process(&store);
    p.registry.create().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(sweeper(&p).run(shutdown_rx));

    tokio::time::sleep(IDLE_TTL + Duration::from_secs(61)).await;
    assert!(p.registry.is_empty().await);

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}
