//! The daemon served on a real socket, driven through the client helpers.

use std::sync::Arc;
use std::time::Duration;

use minion_core::testing::{numbered_records, valid_config, FakeRegistry, FakeTenants, RegistryCall};
use minion_daemon::{
    request_health, request_progress, request_recrawl, serve, DaemonError, LoggingHandler,
};
use minion_sync::{Minion, SyncError};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

async fn bound() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}", listener.local_addr().expect("addr"));
    (listener, url)
}

fn minion(registry: &Arc<FakeRegistry>) -> Arc<Minion> {
    Arc::new(
        Minion::new(
            valid_config(),
            registry.clone(),
            Arc::new(FakeTenants::new(&[])),
            Arc::new(LoggingHandler),
        )
        .expect("minion"),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serves_ingress_and_backfills_until_shutdown() {
    let registry = Arc::new(FakeRegistry::new().with_records(numbered_records(30), 10));
    let minion = minion(&registry);
    let (listener, url) = bound().await;
    let (shutdown, _) = broadcast::channel(4);

    let daemon = tokio::spawn(serve(listener, minion.clone(), shutdown.clone()));

    let health_url = url.clone();
    tokio::task::spawn_blocking(move || request_health(&health_url))
        .await
        .expect("join")
        .expect("healthy");

    let done = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let progress_url = url.clone();
            let progress = tokio::task::spawn_blocking(move || request_progress(&progress_url))
                .await
                .expect("join")
                .expect("progress");
            if !progress.progress.is_crawling && progress.progress.crawled_record_number == 30 {
                return progress;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("backfill finished");
    assert!(done.is_success);
    assert_eq!(
        registry.count_calls(|call| matches!(call, RegistryCall::PutWebHook(_))),
        1
    );

    let recrawl_url = url.clone();
    let recrawl = tokio::task::spawn_blocking(move || request_recrawl(&recrawl_url))
        .await
        .expect("join")
        .expect("recrawl");
    assert!(recrawl.is_success);
    minion.crawler().wait_until_idle().await;

    shutdown.send(()).expect("daemon subscribed");
    tokio::time::timeout(Duration::from_secs(5), daemon)
        .await
        .expect("daemon stopped")
        .expect("join")
        .expect("clean exit");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn startup_failure_stops_ingress_and_is_returned() {
    let registry = Arc::new(FakeRegistry::new().fail_registration());
    let (listener, _) = bound().await;
    let (shutdown, _) = broadcast::channel(4);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        serve(listener, minion(&registry), shutdown),
    )
    .await
    .expect("serve returned");

    match result {
        Err(DaemonError::Sync(SyncError::Registration { webhook, .. })) => {
            assert_eq!(webhook, "indexer");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
