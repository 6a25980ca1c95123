//! End-to-end dispatcher tests over the in-memory wire client.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use chfan_block::{Row, RowShape};
use chfan_client::ClientError;
use chfan_client::mock::MockDialer;
use chfan_inserter::{
    ClusterOptions, GlobalOptions, HostInfo, HostOptions, Inserter, RoundRobinSelector,
    WeightedHostInfo, WeightedRoundRobinSelector,
};

struct Event {
    name: String,
    value: u64,
}

impl Row for Event {
    fn shape() -> RowShape<Self> {
        RowShape::builder()
            .column("Name", |e: &Event| &e.name)
            .column("Value", |e: &Event| &e.value)
            .build()
    }
}

fn event(value: u64) -> Event {
    Event {
        name: format!("event{value}"),
        value,
    }
}

const TABLE: &str = "events";
const FLUSH: Duration = Duration::from_millis(50);

fn rr_cluster(dialer: Arc<MockDialer>, addresses: &[&str]) -> ClusterOptions<HostInfo> {
    let mut cluster = ClusterOptions::new(GlobalOptions::default().with_dialer(dialer));
    for address in addresses {
        cluster = cluster.with_host(HostOptions::new(HostInfo::new(*address, "default")));
    }
    cluster
}

#[tokio::test(start_paused = true)]
async fn rows_spread_across_replicas() {
    let dialer = Arc::new(MockDialer::new());
    let cluster = rr_cluster(Arc::clone(&dialer), &["replica-1:9000", "replica-2:9000"]);

    let inserter = Arc::new(
        Inserter::<Event, _>::new(cluster, RoundRobinSelector::new())
            .unwrap()
            .with_flush_interval(FLUSH),
    );

    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let inserter = Arc::clone(&inserter);
        let cancel = cancel.clone();
        async move { inserter.start(&cancel, TABLE).await }
    });

    for value in 0..1000 {
        inserter.push(&cancel, event(value)).await.unwrap();
    }

    // Let every accumulated batch go through a flush window.
    tokio::time::sleep(FLUSH * 4).await;
    cancel.cancel();
    let result = runner.await.unwrap();
    assert!(result.unwrap_err().is_cancel());

    assert_eq!(dialer.total_rows(), 1000);
    let first = dialer.client("replica-1:9000").rows(TABLE);
    let second = dialer.client("replica-2:9000").rows(TABLE);
    assert!(first > 0, "replica-1 received no rows");
    assert!(second > 0, "replica-2 received no rows");
}

#[tokio::test(start_paused = true)]
async fn weighted_replicas_receive_proportional_shares() {
    let dialer = Arc::new(MockDialer::new());
    let cluster = ClusterOptions::new(
        GlobalOptions::default().with_dialer(Arc::clone(&dialer) as Arc<dyn chfan_client::Dialer>),
    )
        .with_host(HostOptions::new(WeightedHostInfo::new(
            "replica-1:9000",
            "default",
            3,
        )))
        .with_host(HostOptions::new(WeightedHostInfo::new(
            "replica-2:9000",
            "default",
            1,
        )));

    let inserter = Arc::new(
        Inserter::<Event, _>::new(cluster, WeightedRoundRobinSelector::new())
            .unwrap()
            .with_flush_interval(FLUSH),
    );

    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let inserter = Arc::clone(&inserter);
        let cancel = cancel.clone();
        async move { inserter.start(&cancel, TABLE).await }
    });

    for value in 0..400 {
        inserter.push(&cancel, event(value)).await.unwrap();
    }

    tokio::time::sleep(FLUSH * 4).await;
    cancel.cancel();
    runner.await.unwrap().unwrap_err();

    let heavy = dialer.client("replica-1:9000").rows(TABLE);
    let light = dialer.client("replica-2:9000").rows(TABLE);
    assert_eq!(heavy + light, 400);
    assert!(
        heavy > light,
        "weight-3 replica got {heavy} rows, weight-1 got {light}",
    );
}

#[tokio::test(start_paused = true)]
async fn failed_replica_redirects_batches_to_the_survivor() {
    let dialer = Arc::new(MockDialer::new());
    dialer
        .client("replica-2:9000")
        .fail_always(ClientError::Network("connection reset".into()));

    let cluster = rr_cluster(Arc::clone(&dialer), &["replica-1:9000", "replica-2:9000"]);

    let failures = Arc::new(AtomicUsize::new(0));
    let handler = {
        let failures = Arc::clone(&failures);
        Arc::new(move |_: &chfan_inserter::InserterError| {
            failures.fetch_add(1, Ordering::Relaxed);
        })
    };

    let inserter = Arc::new(
        Inserter::<Event, _>::new(cluster, RoundRobinSelector::new())
            .unwrap()
            .with_flush_interval(FLUSH)
            .with_reconnect_timeout(FLUSH)
            .with_shard_err_handler(handler),
    );

    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let inserter = Arc::clone(&inserter);
        let cancel = cancel.clone();
        async move { inserter.start(&cancel, TABLE).await }
    });

    for value in 0..200 {
        inserter.push(&cancel, event(value)).await.unwrap();
    }

    // Enough windows for failed batches to be handed over and for the
    // failing shard to cycle through restarts.
    tokio::time::sleep(FLUSH * 10).await;
    cancel.cancel();
    runner.await.unwrap().unwrap_err();

    // Every row ends up on the healthy replica, none are written twice.
    assert_eq!(dialer.client("replica-1:9000").rows(TABLE), 200);
    assert_eq!(dialer.client("replica-2:9000").rows(TABLE), 0);

    // The restart loop reported the wire failures to the handler.
    assert!(failures.load(Ordering::Relaxed) > 0);
}

#[tokio::test(start_paused = true)]
async fn push_fails_only_on_cancellation() {
    let dialer = Arc::new(MockDialer::new());
    let cluster = rr_cluster(Arc::clone(&dialer), &["replica-1:9000"]);

    let inserter = Arc::new(
        Inserter::<Event, _>::new(cluster, RoundRobinSelector::new())
            .unwrap()
            .with_flush_interval(FLUSH),
    );

    let cancel = CancellationToken::new();
    let runner = tokio::spawn({
        let inserter = Arc::clone(&inserter);
        let cancel = cancel.clone();
        async move { inserter.start(&cancel, TABLE).await }
    });

    inserter.push(&cancel, event(0)).await.unwrap();

    cancel.cancel();
    let err = inserter.push(&cancel, event(1)).await.unwrap_err();
    assert!(err.is_cancel());

    runner.await.unwrap().unwrap_err();
}
