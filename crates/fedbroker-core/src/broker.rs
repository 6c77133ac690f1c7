use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fedbroker_common::transport::{
    Endpoints, PubSocket, PullSocket, RouterConnector, RouterSocket, SubSocket,
};
use fedbroker_common::{BrokerError, Envelope, Result};

use crate::config::BrokerConfig;
use crate::gossip::CapacityGossip;
use crate::routing::{self, ReplyDestination};
use crate::stats::BrokerStats;
use crate::worker_pool::WorkerPool;

/// A federated request broker node.
///
/// The broker owns six channels: the local frontend (clients) and backend
/// (workers), the cloud frontend and backend (peer brokers acting as clients
/// and workers respectively), the state channel pair (capacity gossip), and
/// a monitor channel collecting printable status lines.
///
/// Each tick of the event loop moves through three states:
///
/// 1. **primary-wait**: block on the backends plus the service channels.
///    With no idle workers the wait is indefinite; there is no point
///    admitting requests that nothing can serve, so they stay queued in the
///    transport. With idle workers the wait times out at the configured
///    heartbeat so the local/cloud mix gets re-evaluated.
/// 2. **primary-dispatch**: handle exactly one ready event, in priority
///    order: local backend, cloud backend, state, monitor. A backend event
///    may yield one reply to route toward a local client or a peer.
/// 3. **secondary-drain**: admit frontend requests while any capacity
///    remains, peer demand ahead of local demand, placing each on a local
///    worker when possible and on a random peer otherwise.
///
/// After the drain, a capacity beacon is broadcast if and only if the
/// idle-worker count changed during the tick.
///
/// Any transport failure is fatal: the loop exits and teardown releases the
/// queued worker identities and every endpoint. Reliability against lost
/// requests belongs to clients, not the broker.
pub struct Broker {
    config: BrokerConfig,
    localfe: RouterSocket,
    localbe: RouterSocket,
    cloudfe: RouterSocket,
    cloudbe: RouterConnector,
    statebe: PubSocket,
    statefe: SubSocket,
    monitor: PullSocket,
    pool: WorkerPool,
    gossip: CapacityGossip,
    stats: BrokerStats,
    cancel: CancellationToken,
}

/// Outcome of one primary readiness wait.
enum Primary {
    LocalBackend(Envelope),
    CloudBackend(Envelope),
    State(Envelope),
    Monitor(Envelope),
    Heartbeat,
    Cancelled,
}

impl Broker {
    /// Binds this node's endpoints and starts dialing every configured peer.
    ///
    /// Peer connections are established lazily in the background, so brokers
    /// in a federation may start in any order. Cancelling the token stops
    /// the event loop at the next wait.
    pub async fn bind(config: BrokerConfig, cancel: CancellationToken) -> Result<Self> {
        info!("preparing broker at {}", config.name);
        let endpoints = Endpoints::new(&config.runtime_dir);

        let localfe = RouterSocket::bind(endpoints.localfe(&config.name)).await?;
        let localbe = RouterSocket::bind(endpoints.localbe(&config.name)).await?;
        let cloudfe = RouterSocket::bind(endpoints.cloud(&config.name)).await?;
        let statebe = PubSocket::bind(endpoints.state(&config.name)).await?;
        let monitor = PullSocket::bind(endpoints.monitor(&config.name)).await?;

        let mut cloudbe = RouterConnector::new(config.name.clone());
        let mut statefe = SubSocket::new();
        for peer in &config.peers {
            info!("connecting to cloud frontend at '{}'", peer);
            cloudbe.connect(peer, endpoints.cloud(peer));
            info!("connecting to state backend at '{}'", peer);
            statefe.connect(endpoints.state(peer));
        }

        let gossip = CapacityGossip::new(config.name.clone());
        Ok(Self {
            config,
            localfe,
            localbe,
            cloudfe,
            cloudbe,
            statebe,
            statefe,
            monitor,
            pool: WorkerPool::new(),
            gossip,
            stats: BrokerStats::default(),
            cancel,
        })
    }

    /// Runs the event loop until cancellation or a fatal transport error,
    /// then tears down and reports the lifetime counters.
    pub async fn run(mut self) -> Result<BrokerStats> {
        let result = self.event_loop().await;
        self.teardown();
        match result {
            Ok(()) => Ok(self.stats),
            Err(e) => {
                error!("broker {} failed: {}", self.config.name, e);
                Err(e)
            }
        }
    }

    async fn event_loop(&mut self) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            let capacity_at_tick_start = self.pool.capacity();

            match self.primary_wait().await? {
                Primary::Cancelled => return Ok(()),
                Primary::Heartbeat => {}
                Primary::LocalBackend(message) => {
                    match self.pool.on_worker_message(message)? {
                        Some(reply) => self.route_reply(reply)?,
                        None => self.stats.ready_signals += 1,
                    }
                }
                Primary::CloudBackend(message) => {
                    // The peer's own identity frame carries no further
                    // meaning to this node.
                    let Some((_peer, reply)) = message.pop_address() else {
                        return Err(BrokerError::MalformedMessage(
                            "cloud backend message without identity".to_string(),
                        ));
                    };
                    if reply.is_empty() {
                        warn!("dropping empty reply from peer");
                    } else {
                        self.route_reply(reply)?;
                    }
                }
                Primary::State(envelope) => {
                    if self.gossip.ingest(envelope) {
                        self.stats.beacons_received += 1;
                    }
                }
                Primary::Monitor(envelope) => {
                    if let Some(status) = envelope.body() {
                        info!("{}", String::from_utf8_lossy(status));
                    }
                }
            }

            self.drain_frontends()?;

            if self.pool.capacity() != capacity_at_tick_start {
                self.gossip.broadcast(&self.statebe, self.pool.capacity())?;
                self.stats.beacons_sent += 1;
            }
        }
    }

    /// Blocks until a backend or service channel is ready, in priority
    /// order: cancellation, local backend, cloud backend, state, monitor.
    async fn primary_wait(&mut self) -> Result<Primary> {
        let has_idle_workers = self.pool.capacity() > 0;
        let heartbeat = self.config.heartbeat;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(Primary::Cancelled),
            result = self.localbe.recv() => result.map(Primary::LocalBackend),
            result = self.cloudbe.recv() => result.map(Primary::CloudBackend),
            result = self.statefe.recv() => result.map(Primary::State),
            result = self.monitor.recv() => result.map(Primary::Monitor),
            _ = tokio::time::sleep(heartbeat), if has_idle_workers => Ok(Primary::Heartbeat),
        }
    }

    /// Admits as many frontend requests as current capacity allows.
    ///
    /// The cloud frontend is offered only while a local worker is idle
    /// (borrowed work is never re-exported) and is drained ahead of the
    /// local frontend so peers depending on this node as overflow capacity
    /// are not starved. When nothing is ready the drain ends; unserved
    /// demand stays queued in the transport for a later tick.
    fn drain_frontends(&mut self) -> Result<()> {
        while self.pool.capacity() + self.gossip.cloud_capacity() as usize > 0 {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let request = if self.pool.capacity() > 0 {
                match self.cloudfe.try_recv()? {
                    Some(request) => {
                        self.stats.cloud_requests += 1;
                        Some(request)
                    }
                    None => self.admit_local()?,
                }
            } else {
                self.admit_local()?
            };
            let Some(request) = request else {
                break;
            };

            if self.pool.capacity() > 0 {
                let worker = self.pool.take_worker();
                self.localbe.send(request.push_address(worker))?;
            } else {
                let peer = routing::choose_peer(&self.config.peers)
                    .expect("cloud capacity advertised with no configured peers");
                debug!("overflowing request to peer {}", peer);
                self.stats.overflowed += 1;
                self.cloudbe.send(request.push_address(peer.to_string()))?;
            }
        }
        Ok(())
    }

    fn admit_local(&mut self) -> Result<Option<Envelope>> {
        let request = self.localfe.try_recv()?;
        if request.is_some() {
            self.stats.local_requests += 1;
        }
        Ok(request)
    }

    /// Sends a routed reply toward its destination: back to the originating
    /// peer when the leading address frame names one, to a local client
    /// otherwise.
    fn route_reply(&mut self, reply: Envelope) -> Result<()> {
        match routing::reply_destination(&reply, &self.config.peers) {
            ReplyDestination::Cloud => {
                self.cloudfe.send(reply)?;
                self.stats.cloud_replies += 1;
            }
            ReplyDestination::Local => {
                self.localfe.send(reply)?;
                self.stats.local_replies += 1;
            }
        }
        Ok(())
    }

    fn teardown(&mut self) {
        let released = self.pool.drain();
        if released > 0 {
            debug!("released {} idle worker identities", released);
        }
        info!(
            "broker {} stopping: {} requests admitted ({} local, {} cloud), {} overflowed, {} replies ({} local, {} cloud)",
            self.config.name,
            self.stats.requests_admitted(),
            self.stats.local_requests,
            self.stats.cloud_requests,
            self.stats.overflowed,
            self.stats.local_replies + self.stats.cloud_replies,
            self.stats.local_replies,
            self.stats.cloud_replies,
        );
    }
}
