//! LanMeshTransport - mesh sessions over the local network.
//!
//! Every node broadcasts a small beacon on the discovery port and listens for
//! the beacons of others. An invitation opens a TCP connection to the port a
//! beacon advertises; both ends exchange peer ids before the session counts as
//! connected. Incoming invitations are always accepted.
//!
//! Wire format on a session: length-prefixed frames (see `frame`), the first
//! frame in each direction being the sender's 16-byte peer id.

use super::frame::{read_frame, write_frame};
use super::{MeshEvent, MeshTransport, Observer, TransportError, MAX_MESSAGE_SIZE};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use deckrocket_core::ConnectionState;
use deckrocket_types::PeerId;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// Service name peers advertise and browse for.
pub const DEFAULT_SERVICE: &str = "deckrocket";

/// UDP port beacons are exchanged on.
pub const DEFAULT_DISCOVERY_PORT: u16 = 48_611;

const MAX_BEACON_SIZE: usize = 1024;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for LanMeshTransport.
#[derive(Clone, Debug)]
pub struct LanMeshConfig {
    /// Only peers advertising the same service are reported.
    pub service: String,
    /// Human-readable name carried in beacons.
    pub display_name: String,
    /// UDP port we listen for beacons on.
    pub discovery_port: u16,
    /// UDP port we send beacons to.
    pub beacon_port: u16,
    /// Destination of our beacons (broadcast address by default).
    pub beacon_address: IpAddr,
    /// TCP address sessions are accepted on. Port 0 picks a free port.
    pub listen_address: SocketAddr,
    /// How often we advertise.
    pub beacon_interval: Duration,
    /// A peer silent for this long is reported lost.
    pub peer_ttl: Duration,
}

impl Default for LanMeshConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            display_name: DEFAULT_SERVICE.to_string(),
            discovery_port: DEFAULT_DISCOVERY_PORT,
            beacon_port: DEFAULT_DISCOVERY_PORT,
            beacon_address: IpAddr::V4(Ipv4Addr::BROADCAST),
            listen_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            beacon_interval: Duration::from_secs(2),
            peer_ttl: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Beacon {
    service: String,
    peer: PeerId,
    name: String,
    port: u16,
}

#[derive(Debug)]
struct Discovered {
    addr: SocketAddr,
    last_seen: Instant,
}

#[derive(Debug)]
struct Session {
    id: u64,
    initiator: PeerId,
    outbox: mpsc::UnboundedSender<Vec<u8>>,
}

#[derive(Debug)]
struct Shared {
    local: PeerId,
    config: LanMeshConfig,
    observer: OnceLock<Observer>,
    discovered: DashMap<PeerId, Discovered>,
    sessions: DashMap<PeerId, Session>,
    next_session: AtomicU64,
    shutdown: watch::Sender<bool>,
}

/// LanMeshTransport implements MeshTransport with UDP discovery and TCP
/// sessions.
///
/// # Example
///
/// ```ignore
/// let transport = LanMeshTransport::new(LanMeshConfig::default());
/// transport.start(Observer::Dispatch(dispatcher)).await?;
/// // PeerFound events arrive as beacons are heard
/// transport.invite(peer, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct LanMeshTransport {
    shared: Arc<Shared>,
}

impl LanMeshTransport {
    /// Create a transport with a random identity.
    pub fn new(config: LanMeshConfig) -> Self {
        Self::with_local_peer(PeerId::random(), config)
    }

    /// Create a transport with a fixed identity.
    pub fn with_local_peer(local: PeerId, config: LanMeshConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                local,
                config,
                observer: OnceLock::new(),
                discovered: DashMap::new(),
                sessions: DashMap::new(),
                next_session: AtomicU64::new(0),
                shutdown,
            }),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &LanMeshConfig {
        &self.shared.config
    }

    /// Peers currently advertising.
    pub fn discovered_peers(&self) -> Vec<PeerId> {
        self.shared.discovered.iter().map(|e| *e.key()).collect()
    }
}

#[async_trait]
impl MeshTransport for LanMeshTransport {
    fn local_peer(&self) -> PeerId {
        self.shared.local
    }

    async fn start(&self, observer: Observer) -> Result<(), TransportError> {
        if self.shared.observer.get().is_some() {
            return Err(TransportError::AlreadyStarted);
        }
        let config = &self.shared.config;

        let listener = TcpListener::bind(config.listen_address)
            .await
            .map_err(|e| TransportError::Bind(format!("{}: {e}", config.listen_address)))?;
        let port = listener
            .local_addr()
            .map_err(|e| TransportError::Bind(e.to_string()))?
            .port();

        let discovery = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.discovery_port);
        let socket = UdpSocket::bind(discovery)
            .await
            .map_err(|e| TransportError::Bind(format!("{discovery}: {e}")))?;
        socket
            .set_broadcast(true)
            .map_err(|e| TransportError::Bind(format!("Failed to enable broadcast: {e}")))?;
        let socket = Arc::new(socket);

        let beacon = Beacon {
            service: config.service.clone(),
            peer: self.shared.local,
            name: config.display_name.clone(),
            port,
        };
        let beacon = rmp_serde::to_vec_named(&beacon)
            .map_err(|e| TransportError::Bind(format!("Failed to encode beacon: {e}")))?;

        self.shared
            .observer
            .set(observer)
            .map_err(|_| TransportError::AlreadyStarted)?;

        tokio::spawn(Arc::clone(&self.shared).accept_loop(listener));
        tokio::spawn(Arc::clone(&self.shared).advertise(Arc::clone(&socket), beacon));
        tokio::spawn(Arc::clone(&self.shared).browse(socket));

        info!(
            peer = %self.shared.local,
            port,
            discovery_port = config.discovery_port,
            "mesh transport started"
        );
        Ok(())
    }

    fn invite(&self, peer: PeerId, timeout: Duration) {
        let Some(addr) = self.shared.discovered.get(&peer).map(|d| d.addr) else {
            debug!(%peer, "cannot invite a peer that is not advertising");
            self.shared.set_state(peer, ConnectionState::NotConnected);
            return;
        };

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, shared.dial(peer, addr)).await {
                Ok(Ok(stream)) => {
                    let initiator = shared.local;
                    shared.run_session(peer, initiator, stream).await;
                }
                Ok(Err(e)) => {
                    info!(%peer, error = %e, "invitation failed");
                    shared.set_state(peer, ConnectionState::NotConnected);
                }
                Err(_) => {
                    info!(%peer, ?timeout, "invitation timed out");
                    shared.set_state(peer, ConnectionState::NotConnected);
                }
            }
        });
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        self.shared.sessions.iter().map(|e| *e.key()).collect()
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        if self.shared.sessions.is_empty() {
            return Err(TransportError::NotConnected);
        }

        for session in self.shared.sessions.iter() {
            if session.outbox.send(payload.to_vec()).is_err() {
                trace!(peer = %session.key(), "session closing, payload dropped");
            }
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.shared.shutdown.send_replace(true);
        self.shared.sessions.clear();
        self.shared.discovered.clear();
        info!(peer = %self.shared.local, "mesh transport stopped");
        Ok(())
    }
}

impl Shared {
    fn notify(&self, event: MeshEvent) {
        if let Some(observer) = self.observer.get() {
            observer.mesh(event);
        }
    }

    fn set_state(&self, peer: PeerId, state: ConnectionState) {
        self.notify(MeshEvent::StateChanged { peer, state });
    }

    fn on_beacon(&self, bytes: &[u8], from: SocketAddr) {
        let beacon: Beacon = match rmp_serde::from_slice(bytes) {
            Ok(beacon) => beacon,
            Err(e) => {
                trace!(%from, error = %e, "ignoring malformed beacon");
                return;
            }
        };
        if beacon.service != self.config.service || beacon.peer == self.local {
            return;
        }

        let addr = SocketAddr::new(from.ip(), beacon.port);
        let seen = Discovered {
            addr,
            last_seen: Instant::now(),
        };
        if self.discovered.insert(beacon.peer, seen).is_none() {
            info!(peer = %beacon.peer, name = %beacon.name, %addr, "discovered mesh peer");
        }
        self.notify(MeshEvent::PeerFound { peer: beacon.peer });
    }

    fn expire_stale(&self) {
        let ttl = self.config.peer_ttl;
        let stale: Vec<PeerId> = self
            .discovered
            .iter()
            .filter(|e| e.last_seen.elapsed() > ttl)
            .map(|e| *e.key())
            .collect();

        for peer in stale {
            if self
                .discovered
                .remove_if(&peer, |_, d| d.last_seen.elapsed() > ttl)
                .is_some()
            {
                info!(%peer, "mesh peer stopped advertising");
                self.notify(MeshEvent::PeerLost { peer });
            }
        }
    }

    async fn advertise(self: Arc<Self>, socket: Arc<UdpSocket>, beacon: Vec<u8>) {
        let target = SocketAddr::new(self.config.beacon_address, self.config.beacon_port);
        let mut shutdown = self.shutdown.subscribe();
        let mut ticker = tokio::time::interval(self.config.beacon_interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = socket.send_to(&beacon, target).await {
                        debug!(%target, error = %e, "failed to send beacon");
                    }
                    self.expire_stale();
                }
            }
        }
    }

    async fn browse(self: Arc<Self>, socket: Arc<UdpSocket>) {
        let mut shutdown = self.shutdown.subscribe();
        let mut buf = vec![0u8; MAX_BEACON_SIZE];

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, from)) => self.on_beacon(&buf[..len], from),
                    Err(e) => debug!(error = %e, "beacon receive failed"),
                },
            }
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, from)) => {
                        let shared = Arc::clone(&self);
                        tokio::spawn(async move { shared.answer(stream, from).await });
                    }
                    Err(e) => warn!(error = %e, "mesh accept failed"),
                },
            }
        }
    }

    /// Outgoing half of the handshake.
    async fn dial(&self, peer: PeerId, addr: SocketAddr) -> Result<TcpStream, TransportError> {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("{addr}: {e}")))?;
        self.set_state(peer, ConnectionState::Connecting);

        write_frame(&mut stream, self.local.as_bytes()).await?;
        let hello = read_frame(&mut stream).await?;
        match PeerId::from_bytes(&hello) {
            Some(id) if id == peer => Ok(stream),
            Some(other) => Err(TransportError::ConnectionFailed(format!(
                "expected {peer}, reached {other}"
            ))),
            None => Err(TransportError::ConnectionFailed(
                "malformed handshake".to_string(),
            )),
        }
    }

    /// Incoming half of the handshake. Invitations are always accepted.
    async fn answer(&self, mut stream: TcpStream, from: SocketAddr) {
        let hello = match tokio::time::timeout(HANDSHAKE_TIMEOUT, read_frame(&mut stream)).await {
            Ok(Ok(hello)) => hello,
            Ok(Err(e)) => {
                debug!(%from, error = %e, "incoming mesh handshake failed");
                return;
            }
            Err(_) => {
                debug!(%from, "incoming mesh handshake timed out");
                return;
            }
        };
        let Some(peer) = PeerId::from_bytes(&hello) else {
            debug!(%from, "rejected incoming mesh connection with malformed handshake");
            return;
        };

        self.set_state(peer, ConnectionState::Connecting);
        if let Err(e) = write_frame(&mut stream, self.local.as_bytes()).await {
            debug!(%peer, error = %e, "failed to answer mesh invitation");
            self.set_state(peer, ConnectionState::NotConnected);
            return;
        }
        self.run_session(peer, peer, stream).await;
    }

    /// Pump frames for one session until either side closes.
    ///
    /// When both peers invite each other at once, both ends keep the
    /// connection initiated by the lower peer id.
    async fn run_session(&self, peer: PeerId, initiator: PeerId, stream: TcpStream) {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let preferred = self.local.min(peer);
        let (outbox, mut pending) = mpsc::unbounded_channel::<Vec<u8>>();
        let session = Session {
            id,
            initiator,
            outbox,
        };

        let kept = match self.sessions.entry(peer) {
            Entry::Occupied(mut existing) => {
                if existing.get().initiator == preferred && initiator != preferred {
                    false
                } else {
                    existing.insert(session);
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(session);
                true
            }
        };
        if !kept {
            debug!(%peer, "duplicate mesh connection dropped");
            self.set_state(peer, ConnectionState::Connected);
            return;
        }

        self.set_state(peer, ConnectionState::Connected);
        info!(%peer, "mesh session established");

        let mut shutdown = self.shutdown.subscribe();
        let (mut reader, mut writer) = stream.into_split();
        let write = async {
            while let Some(payload) = pending.recv().await {
                if let Err(e) = write_frame(&mut writer, &payload).await {
                    debug!(%peer, error = %e, "mesh write failed");
                    break;
                }
            }
        };
        let read = async {
            loop {
                match read_frame(&mut reader).await {
                    Ok(payload) => self.notify(MeshEvent::Received {
                        from: peer,
                        payload,
                    }),
                    Err(e) => {
                        debug!(%peer, error = %e, "mesh session closed");
                        break;
                    }
                }
            }
        };

        tokio::select! {
            _ = write => {}
            _ = read => {}
            _ = shutdown.changed() => {}
        }

        self.sessions.remove_if(&peer, |_, s| s.id == id);
        if !self.sessions.contains_key(&peer) {
            info!(%peer, "mesh session ended");
            self.set_state(peer, ConnectionState::NotConnected);
        }
    }
}
