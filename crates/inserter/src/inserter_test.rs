//! Tests for dispatcher construction and option resolution.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use chfan_block::{Row, RowShape};
use chfan_client::mock::MockDialer;
use chfan_client::{ClientError, Compression, Setting};

use crate::error::InserterError;
use crate::host::{Host, HostInfo, HostState};
use crate::inserter::{
    ClusterOptions, GlobalOptions, HostOptions, Inserter, resolve_client_options,
};
use crate::selector::{HostSelector, RoundRobinSelector};

struct Entry {
    value: u64,
}

impl Row for Entry {
    fn shape() -> RowShape<Self> {
        RowShape::builder()
            .column("Value", |r: &Entry| &r.value)
            .build()
    }
}

fn cluster_of(hosts: &[&str]) -> ClusterOptions<HostInfo> {
    let mut cluster = ClusterOptions::new(
        GlobalOptions::default().with_dialer(Arc::new(MockDialer::new())),
    );
    for address in hosts {
        cluster = cluster.with_host(HostOptions::new(HostInfo::new(*address, "default")));
    }
    cluster
}

#[test]
fn new_rejects_an_empty_cluster() {
    let cluster: ClusterOptions<HostInfo> = ClusterOptions::default();
    assert!(matches!(
        Inserter::<Entry, _>::new(cluster, RoundRobinSelector::new()),
        Err(InserterError::EmptyCluster),
    ));
}

#[test]
fn new_rejects_a_down_host() {
    let cluster = ClusterOptions::default().with_host(HostOptions::new(
        HostInfo::new("replica-1:9000", "default").with_state(HostState::Down),
    ));
    assert!(matches!(
        Inserter::<Entry, _>::new(cluster, RoundRobinSelector::new()),
        Err(InserterError::InvalidHostState { .. }),
    ));
}

#[test]
fn new_registers_every_host_with_the_selector() {
    let cluster = cluster_of(&["replica-1:9000", "replica-2:9000"]);
    let inserter = Inserter::<Entry, _>::new(cluster, RoundRobinSelector::new()).unwrap();

    // Both hosts cycle through picks before any shard is started.
    let selector = inserter.selector_for_tests();
    assert_eq!(selector.pick().address, "replica-1:9000");
    assert_eq!(selector.pick().address, "replica-2:9000");
    assert_eq!(selector.pick().address, "replica-1:9000");
}

#[tokio::test]
async fn start_requires_a_dialer() {
    let cluster = ClusterOptions::default()
        .with_host(HostOptions::new(HostInfo::new("replica-1:9000", "default")));
    let inserter = Inserter::<Entry, _>::new(cluster, RoundRobinSelector::new()).unwrap();

    let cancel = CancellationToken::new();
    assert!(matches!(
        inserter.start(&cancel, "t").await,
        Err(InserterError::NoDialer(_)),
    ));
}

#[tokio::test]
async fn start_surfaces_dial_failures() {
    let dialer = Arc::new(MockDialer::new());
    dialer.fail_dial(ClientError::Network("refused".into()));

    let cluster = ClusterOptions::new(GlobalOptions::default().with_dialer(dialer))
        .with_host(HostOptions::new(HostInfo::new("replica-1:9000", "default")));
    let inserter = Inserter::<Entry, _>::new(cluster, RoundRobinSelector::new()).unwrap();

    let cancel = CancellationToken::new();
    let err = inserter.start(&cancel, "t").await.unwrap_err();
    assert!(matches!(err, InserterError::Client(_)));
}

#[test]
fn host_options_override_globals() {
    let global = GlobalOptions::default()
        .with_database("analytics")
        .with_credentials("global-user", "global-pass")
        .with_dial_timeout(Duration::from_secs(3));

    let host = HostOptions::new(HostInfo::new("replica-1:9000", ""))
        .with_credentials("host-user", "host-pass")
        .with_compression(Compression::Lz4)
        .with_setting(Setting::new("async_insert", "1"));

    let resolved = resolve_client_options(&global, &host);
    assert_eq!(resolved.address, "replica-1:9000");
    // The host declares no database, so the global one applies.
    assert_eq!(resolved.database, "analytics");
    assert_eq!(resolved.user.as_deref(), Some("host-user"));
    assert_eq!(resolved.password.as_deref(), Some("host-pass"));
    assert_eq!(resolved.compression, Compression::Lz4);
    assert_eq!(resolved.settings.len(), 1);
    assert_eq!(resolved.dial_timeout, Duration::from_secs(3));
}

#[test]
fn global_defaults_fill_unset_host_options() {
    let global = GlobalOptions::default()
        .with_credentials("global-user", "global-pass");
    let host = HostOptions::new(HostInfo::new("replica-1:9000", "metrics"));

    let resolved = resolve_client_options(&global, &host);
    // The host's own database wins over the global default.
    assert_eq!(resolved.database, "metrics");
    assert_eq!(resolved.user.as_deref(), Some("global-user"));
    assert_eq!(resolved.compression, Compression::Disabled);
    assert!(resolved.settings.is_empty());
    assert!(resolved.tls.is_none());
}
