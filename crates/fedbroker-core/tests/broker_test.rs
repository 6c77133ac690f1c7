//! End-to-end broker tests
//!
//! Each test runs a real broker over Unix-domain sockets in a temporary
//! runtime directory, with workers, clients, and peer brokers played by
//! raw sockets so every admission and routing decision is observable.

use std::time::Duration;

use tempfile::TempDir;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use fedbroker_common::protocol::ready_envelope;
use fedbroker_common::transport::{
    DealerSocket, Endpoints, PubSocket, RouterConnector, RouterSocket, SubSocket,
};
use fedbroker_common::{Envelope, StateMessage};
use fedbroker_core::{Broker, BrokerConfig, BrokerStats};

const DEADLINE: Duration = Duration::from_secs(3);

/// Long enough for a background connector to dial a bound socket.
const SETTLE: Duration = Duration::from_millis(150);

async fn start_broker(
    dir: &TempDir,
    name: &str,
    peers: &[&str],
) -> (
    CancellationToken,
    tokio::task::JoinHandle<fedbroker_common::Result<BrokerStats>>,
) {
    let config = BrokerConfig::new(name)
        .with_peers(peers.iter().map(|p| p.to_string()).collect())
        .with_runtime_dir(dir.path())
        .with_heartbeat(Duration::from_millis(100));
    let cancel = CancellationToken::new();
    let broker = Broker::bind(config, cancel.clone()).await.unwrap();
    let handle = tokio::spawn(broker.run());
    (cancel, handle)
}

async fn stop_broker(
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<fedbroker_common::Result<BrokerStats>>,
) -> BrokerStats {
    cancel.cancel();
    timeout(DEADLINE, handle).await.unwrap().unwrap().unwrap()
}

#[tokio::test]
async fn test_ready_signals_accumulate_capacity_without_routing() {
    let dir = TempDir::new().unwrap();
    let endpoints = Endpoints::new(dir.path());
    let (cancel, handle) = start_broker(&dir, "alpha", &["beta"]).await;

    let mut state = SubSocket::new();
    state.connect(endpoints.state("alpha"));
    sleep(SETTLE).await;

    let w1 = DealerSocket::connect(endpoints.localbe("alpha"));
    let w2 = DealerSocket::connect(endpoints.localbe("alpha"));
    w1.send(ready_envelope()).unwrap();
    w2.send(ready_envelope()).unwrap();

    // One beacon per capacity change, carrying the new count.
    let first = StateMessage::decode(&timeout(DEADLINE, state.recv()).await.unwrap().unwrap());
    let second = StateMessage::decode(&timeout(DEADLINE, state.recv()).await.unwrap().unwrap());
    assert_eq!(first.unwrap().capacity, 1);
    let second = second.unwrap();
    assert_eq!(second.capacity, 2);
    assert_eq!(second.peer, "alpha");

    let stats = stop_broker(cancel, handle).await;
    assert_eq!(stats.ready_signals, 2);
    assert_eq!(stats.requests_admitted(), 0);
    assert_eq!(stats.local_replies + stats.cloud_replies, 0);
}

#[tokio::test]
async fn test_request_served_by_oldest_idle_worker() {
    let dir = TempDir::new().unwrap();
    let endpoints = Endpoints::new(dir.path());
    let (cancel, handle) = start_broker(&dir, "alpha", &[]).await;

    let mut w1 = DealerSocket::connect(endpoints.localbe("alpha"));
    w1.send(ready_envelope()).unwrap();
    sleep(SETTLE).await;
    let mut w2 = DealerSocket::connect(endpoints.localbe("alpha"));
    w2.send(ready_envelope()).unwrap();
    sleep(SETTLE).await;

    let mut client = DealerSocket::connect(endpoints.localfe("alpha"));
    client.send(Envelope::from_body("job-1")).unwrap();

    // Oldest-idle worker gets the job, wrapped with the client's address.
    let job = timeout(DEADLINE, w1.recv()).await.unwrap().unwrap();
    assert_eq!(job.frame_count(), 2);
    assert_eq!(job.body().unwrap().as_ref(), b"job-1");
    assert!(w2.try_recv().unwrap().is_none());

    // The echoed reply finds its way back, stripped of addressing.
    w1.send(job).unwrap();
    let reply = timeout(DEADLINE, client.recv()).await.unwrap().unwrap();
    assert_eq!(reply.frame_count(), 1);
    assert_eq!(reply.body().unwrap().as_ref(), b"job-1");

    let stats = stop_broker(cancel, handle).await;
    assert_eq!(stats.ready_signals, 2);
    assert_eq!(stats.local_requests, 1);
    assert_eq!(stats.local_replies, 1);
    assert_eq!(stats.overflowed, 0);
}

#[tokio::test]
async fn test_overflow_forwards_to_peer_exactly_once() {
    let dir = TempDir::new().unwrap();
    let endpoints = Endpoints::new(dir.path());

    // Fake peer "beta": bound cloud endpoint plus state publisher.
    let mut beta_cloud = RouterSocket::bind(endpoints.cloud("beta")).await.unwrap();
    let beta_state = PubSocket::bind(endpoints.state("beta")).await.unwrap();

    let (cancel, handle) = start_broker(&dir, "alpha", &["beta"]).await;
    timeout(DEADLINE, async {
        while beta_state.subscriber_count() < 1 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // Queue the request first; with zero local workers the broker sits in
    // its indefinite wait until the beacon wakes it.
    let client = DealerSocket::connect(endpoints.localfe("alpha"));
    client.send(Envelope::from_body("task")).unwrap();
    sleep(SETTLE).await;
    beta_state
        .send(StateMessage::new("beta", 3).encode())
        .unwrap();

    let borrowed = timeout(DEADLINE, beta_cloud.recv()).await.unwrap().unwrap();
    assert_eq!(borrowed.first().unwrap().as_ref(), b"alpha");
    assert_eq!(borrowed.body().unwrap().as_ref(), b"task");

    // Forwarded to exactly one peer, exactly once.
    sleep(Duration::from_millis(200)).await;
    assert!(beta_cloud.try_recv().unwrap().is_none());

    let stats = stop_broker(cancel, handle).await;
    assert_eq!(stats.local_requests, 1);
    assert_eq!(stats.overflowed, 1);
    assert_eq!(stats.beacons_received, 1);
}

#[tokio::test]
async fn test_worker_reply_addressed_to_peer_routes_to_cloud_frontend() {
    let dir = TempDir::new().unwrap();
    let endpoints = Endpoints::new(dir.path());
    let (cancel, handle) = start_broker(&dir, "alpha", &["beta"]).await;

    let mut beta = RouterConnector::new("beta");
    beta.connect("alpha", endpoints.cloud("alpha"));
    sleep(SETTLE).await;

    // A worker finishing a borrowed job answers with the peer's name on the
    // address stack.
    let worker = DealerSocket::connect(endpoints.localbe("alpha"));
    worker
        .send(Envelope::from_body("result").push_address("beta"))
        .unwrap();

    let reply = timeout(DEADLINE, beta.recv()).await.unwrap().unwrap();
    assert_eq!(reply.first().unwrap().as_ref(), b"alpha");
    assert_eq!(reply.body().unwrap().as_ref(), b"result");

    let stats = stop_broker(cancel, handle).await;
    assert_eq!(stats.cloud_replies, 1);
    assert_eq!(stats.local_replies, 0);
}

#[tokio::test]
async fn test_peer_demand_admitted_before_local_demand() {
    let dir = TempDir::new().unwrap();
    let endpoints = Endpoints::new(dir.path());
    let (cancel, handle) = start_broker(&dir, "alpha", &["beta"]).await;

    let mut beta = RouterConnector::new("beta");
    beta.connect("alpha", endpoints.cloud("alpha"));
    let mut client = DealerSocket::connect(endpoints.localfe("alpha"));
    sleep(SETTLE).await;

    // Both demands are queued while no worker is idle.
    beta.send(Envelope::from_body("cloud-task").push_address("alpha"))
        .unwrap();
    client.send(Envelope::from_body("local-task")).unwrap();
    sleep(SETTLE).await;

    let mut worker = DealerSocket::connect(endpoints.localbe("alpha"));
    worker.send(ready_envelope()).unwrap();

    // The single idle worker goes to the peer's request first.
    let job = timeout(DEADLINE, worker.recv()).await.unwrap().unwrap();
    assert_eq!(job.body().unwrap().as_ref(), b"cloud-task");
    assert_eq!(job.first().unwrap().as_ref(), b"beta");

    // Echo it; the reply returns to the peer and the freed worker then
    // serves the queued local request.
    worker.send(job).unwrap();
    let reply = timeout(DEADLINE, beta.recv()).await.unwrap().unwrap();
    assert_eq!(reply.body().unwrap().as_ref(), b"cloud-task");

    let local_job = timeout(DEADLINE, worker.recv()).await.unwrap().unwrap();
    assert_eq!(local_job.body().unwrap().as_ref(), b"local-task");
    worker.send(local_job).unwrap();
    let local_reply = timeout(DEADLINE, client.recv()).await.unwrap().unwrap();
    assert_eq!(local_reply.body().unwrap().as_ref(), b"local-task");

    let stats = stop_broker(cancel, handle).await;
    assert_eq!(stats.cloud_requests, 1);
    assert_eq!(stats.local_requests, 1);
    assert_eq!(stats.cloud_replies, 1);
    assert_eq!(stats.local_replies, 1);
}

#[tokio::test]
async fn test_beacon_sent_only_when_capacity_changes() {
    let dir = TempDir::new().unwrap();
    let endpoints = Endpoints::new(dir.path());
    let (cancel, handle) = start_broker(&dir, "alpha", &["beta"]).await;

    let mut state = SubSocket::new();
    state.connect(endpoints.state("alpha"));
    sleep(SETTLE).await;

    let worker = DealerSocket::connect(endpoints.localbe("alpha"));
    worker.send(ready_envelope()).unwrap();

    let beacon = StateMessage::decode(&timeout(DEADLINE, state.recv()).await.unwrap().unwrap());
    assert_eq!(beacon.unwrap().capacity, 1);

    // Heartbeat ticks keep firing while capacity is unchanged; none of them
    // may broadcast.
    assert!(timeout(Duration::from_millis(500), state.recv()).await.is_err());

    let stats = stop_broker(cancel, handle).await;
    assert_eq!(stats.beacons_sent, 1);
}
