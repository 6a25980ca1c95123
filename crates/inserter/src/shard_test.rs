//! Tests for the shard worker, driven against the in-memory wire client.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use chfan_block::{Batch, Row, RowShape};
use chfan_client::mock::MockDialer;
use chfan_client::{ClientError, ClientOptions};

use crate::error::InserterError;
use crate::host::{HostInfo, HostState};
use crate::shard::Shard;

struct Entry {
    name: String,
    value: u64,
}

impl Row for Entry {
    fn shape() -> RowShape<Self> {
        RowShape::builder()
            .column("Name", |r: &Entry| &r.name)
            .column("Value", |r: &Entry| &r.value)
            .build()
    }
}

fn entry(value: u64) -> Entry {
    Entry {
        name: format!("row{value}"),
        value,
    }
}

const TABLE: &str = "table_insert";
const FLUSH: Duration = Duration::from_millis(50);

struct Harness {
    cancel: CancellationToken,
    data: mpsc::Sender<Entry>,
    /// Receives batches the shard hands off after failed flushes.
    peer_batches: async_channel::Receiver<Batch<Entry>>,
    states: async_channel::Receiver<HostInfo>,
    worker: JoinHandle<Result<(), InserterError>>,
    /// Keeps the shard's inbound shared-batches channel open.
    _peer_feed: async_channel::Sender<Batch<Entry>>,
}

/// Spawns a worker wired like the dispatcher does it, except that failed
/// batches land on a channel the test owns instead of back on the shard.
async fn spawn_shard(dialer: &MockDialer, address: &str) -> Harness {
    let shard: Shard<Entry, HostInfo> = Shard::connect(
        dialer,
        HostInfo::new(address, "default"),
        ClientOptions::default().with_address(address),
    )
    .await
    .unwrap();

    let cancel = CancellationToken::new();
    let (data_tx, mut data_rx) = mpsc::channel(1);
    let (peer_tx, peer_rx) = async_channel::bounded(1);
    let (inbound_tx, inbound_rx) = async_channel::bounded::<Batch<Entry>>(1);
    let (state_tx, state_rx) = async_channel::bounded(1);

    let worker = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shard
                .run(
                    &cancel,
                    FLUSH,
                    TABLE,
                    &mut data_rx,
                    &peer_tx,
                    &inbound_rx,
                    &state_tx,
                )
                .await
        }
    });

    Harness {
        cancel,
        data: data_tx,
        peer_batches: peer_rx,
        states: state_rx,
        worker,
        _peer_feed: inbound_tx,
    }
}

#[tokio::test]
async fn zero_flush_interval_is_rejected() {
    let dialer = MockDialer::new();
    let shard: Shard<Entry, HostInfo> = Shard::connect(
        &dialer,
        HostInfo::new("replica-1:9000", "default"),
        ClientOptions::default(),
    )
    .await
    .unwrap();

    let cancel = CancellationToken::new();
    let (_data_tx, mut data_rx) = mpsc::channel(1);
    let (shared_tx, shared_rx) = async_channel::bounded(1);
    let (state_tx, _state_rx) = async_channel::bounded(1);

    let result = shard
        .run(
            &cancel,
            Duration::ZERO,
            TABLE,
            &mut data_rx,
            &shared_tx,
            &shared_rx,
            &state_tx,
        )
        .await;

    assert!(matches!(result, Err(InserterError::InvalidFlushInterval)));
}

#[tokio::test]
async fn schema_is_validated_at_connect() {
    struct Clashing {
        a: u64,
        b: u64,
    }

    impl Row for Clashing {
        fn shape() -> RowShape<Self> {
            RowShape::builder()
                .named("A", "same", |r: &Clashing| &r.a)
                .named("B", "same", |r: &Clashing| &r.b)
                .build()
        }
    }

    let dialer = MockDialer::new();
    let result: Result<Shard<Clashing, HostInfo>, _> = Shard::connect(
        &dialer,
        HostInfo::new("replica-1:9000", "default"),
        ClientOptions::default(),
    )
    .await;

    assert!(matches!(result, Err(InserterError::Schema(_))));
}

#[tokio::test(start_paused = true)]
async fn rows_flow_to_the_wire_client() {
    let dialer = MockDialer::new();
    let harness = spawn_shard(&dialer, "replica-1:9000").await;
    let client = dialer.client("replica-1:9000");

    assert_eq!(
        harness.states.recv().await.unwrap().state,
        HostState::Up,
    );

    for value in 0..1000 {
        harness.data.send(entry(value)).await.unwrap();
    }

    // Give the ticker a few flush windows, then shut down.
    tokio::time::sleep(FLUSH * 3).await;
    harness.cancel.cancel();

    let result = harness.worker.await.unwrap();
    assert!(result.unwrap_err().is_cancel());
    assert_eq!(client.rows(TABLE), 1000);
    assert_eq!(
        client.bodies()[0],
        "INSERT INTO table_insert (name,value) VALUES",
    );
}

#[tokio::test(start_paused = true)]
async fn failed_batches_are_handed_to_peers() {
    let dialer = MockDialer::new();
    dialer
        .client("replica-1:9000")
        .fail_always(ClientError::Network("connection reset".into()));

    let harness = spawn_shard(&dialer, "replica-1:9000").await;
    assert_eq!(
        harness.states.recv().await.unwrap().state,
        HostState::Up,
    );

    for value in 0..3 {
        harness.data.send(entry(value)).await.unwrap();
    }

    // The first tick submits, the submission fails, and the batch must
    // arrive on the peer channel with its rows intact.
    let redirected = harness.peer_batches.recv().await.unwrap();
    assert_eq!(redirected.rows(), 3);

    let result = harness.worker.await.unwrap();
    match result {
        Err(err) if !err.is_cancel() => {}
        other => panic!("expected a wire failure, got {other:?}"),
    }

    // A failing exit announces the replica down.
    assert_eq!(
        harness.states.recv().await.unwrap().state,
        HostState::Down,
    );
}

#[tokio::test(start_paused = true)]
async fn redirected_batches_are_resubmitted() {
    let dialer = MockDialer::new();
    let shard: Shard<Entry, HostInfo> = Shard::connect(
        &dialer,
        HostInfo::new("replica-2:9000", "default"),
        ClientOptions::default().with_address("replica-2:9000"),
    )
    .await
    .unwrap();
    let client = dialer.client("replica-2:9000");

    let cancel = CancellationToken::new();
    let (_data_tx, mut data_rx) = mpsc::channel::<Entry>(1);
    let (shared_tx, shared_rx) = async_channel::bounded(1);
    let (state_tx, state_rx) = async_channel::bounded(1);

    // A peer's failed batch, carrying two rows.
    let mut peer_batch = Batch::<Entry>::new().unwrap();
    peer_batch.append(&entry(1));
    peer_batch.append(&entry(2));
    shared_tx.send(peer_batch).await.unwrap();

    let worker = tokio::spawn({
        let cancel = cancel.clone();
        let shared_tx = shared_tx.clone();
        async move {
            shard
                .run(
                    &cancel,
                    FLUSH,
                    TABLE,
                    &mut data_rx,
                    &shared_tx,
                    &shared_rx,
                    &state_tx,
                )
                .await
        }
    });

    assert_eq!(state_rx.recv().await.unwrap().state, HostState::Up);

    tokio::time::sleep(FLUSH).await;
    cancel.cancel();
    let result = worker.await.unwrap();
    assert!(result.unwrap_err().is_cancel());

    assert_eq!(client.rows(TABLE), 2);
}

#[tokio::test(start_paused = true)]
async fn canceled_exit_skips_the_down_announcement() {
    let dialer = MockDialer::new();
    let harness = spawn_shard(&dialer, "replica-1:9000").await;

    assert_eq!(
        harness.states.recv().await.unwrap().state,
        HostState::Up,
    );

    harness.cancel.cancel();
    let result = harness.worker.await.unwrap();
    assert!(result.unwrap_err().is_cancel());

    assert!(harness.states.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn empty_ticks_flush_empty_batches() {
    let dialer = MockDialer::new();
    let harness = spawn_shard(&dialer, "replica-1:9000").await;
    let client = dialer.client("replica-1:9000");

    harness.states.recv().await.unwrap();

    tokio::time::sleep(FLUSH * 2).await;
    harness.cancel.cancel();
    harness.worker.await.unwrap().unwrap_err();

    assert!(client.inserts() >= 1);
    assert_eq!(client.total_rows(), 0);
}
