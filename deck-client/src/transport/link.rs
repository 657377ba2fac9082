//! LinkCompanionTransport - companion link over a single TCP connection.
//!
//! The presenter either listens for its companion or dials it. At most one
//! link is active; a newer connection replaces the older one. The link is
//! reachable while a connection is up.
//!
//! Each length-prefixed frame carries a 5-byte header:
//! `[kind u8][request id u32 big-endian][payload]`. Kinds are fire-and-forget
//! data, a request expecting an answer, and the answer to a request.

use super::frame::{read_frame, write_frame};
use super::{CompanionEvent, CompanionTransport, Observer, Reply, TransportError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

const KIND_DATA: u8 = 0;
const KIND_REQUEST: u8 = 1;
const KIND_REPLY: u8 = 2;
const HEADER_LEN: usize = 5;

/// Which side opens the link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkRole {
    /// Wait for the companion to connect.
    Listen(SocketAddr),
    /// Dial the companion, redialing whenever the link drops.
    Connect(SocketAddr),
}

/// Configuration for LinkCompanionTransport.
#[derive(Clone, Debug)]
pub struct LinkConfig {
    /// Listen or dial.
    pub role: LinkRole,
    /// How long `request` waits for an answer, and how long an inbound
    /// request may wait for ours.
    pub request_timeout: Duration,
    /// Pause between redial attempts.
    pub reconnect_delay: Duration,
}

impl LinkConfig {
    /// Listen on `addr` with default timeouts.
    pub fn listen(addr: SocketAddr) -> Self {
        Self {
            role: LinkRole::Listen(addr),
            request_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(2),
        }
    }

    /// Dial `addr` with default timeouts.
    pub fn connect(addr: SocketAddr) -> Self {
        Self {
            role: LinkRole::Connect(addr),
            ..Self::listen(addr)
        }
    }
}

fn encode_frame(kind: u8, id: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.push(kind);
    frame.extend_from_slice(&id.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn decode_frame(frame: &[u8]) -> Option<(u8, u32, &[u8])> {
    if frame.len() < HEADER_LEN {
        return None;
    }
    let id = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
    Some((frame[0], id, &frame[HEADER_LEN..]))
}

/// Table entry for a running link. Dropping it closes the link.
#[derive(Debug)]
struct Link {
    outbox: mpsc::UnboundedSender<Vec<u8>>,
    _close: oneshot::Sender<()>,
}

#[derive(Debug)]
struct Shared {
    config: LinkConfig,
    observer: OnceLock<Observer>,
    local_addr: OnceLock<SocketAddr>,
    links: DashMap<u64, Link>,
    pending: DashMap<u32, oneshot::Sender<Vec<u8>>>,
    next_request: AtomicU32,
    next_link: AtomicU64,
    shutdown: watch::Sender<bool>,
}

/// LinkCompanionTransport implements CompanionTransport over TCP.
///
/// # Example
///
/// ```ignore
/// let link = LinkCompanionTransport::new(LinkConfig::listen("0.0.0.0:48612".parse()?));
/// link.start(Observer::Dispatch(dispatcher)).await?;
/// if link.is_reachable() {
///     link.send_message_data(&deck.to_bytes()?)?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct LinkCompanionTransport {
    shared: Arc<Shared>,
}

impl LinkCompanionTransport {
    /// Create a transport; nothing happens until `start`.
    pub fn new(config: LinkConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                config,
                observer: OnceLock::new(),
                local_addr: OnceLock::new(),
                links: DashMap::new(),
                pending: DashMap::new(),
                next_request: AtomicU32::new(1),
                next_link: AtomicU64::new(0),
                shutdown,
            }),
        }
    }

    /// Address we listen on, once started in the listen role.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.local_addr.get().copied()
    }

    fn outbox(&self) -> Result<mpsc::UnboundedSender<Vec<u8>>, TransportError> {
        self.shared
            .links
            .iter()
            .next()
            .map(|link| link.outbox.clone())
            .ok_or(TransportError::NotConnected)
    }
}

#[async_trait]
impl CompanionTransport for LinkCompanionTransport {
    async fn start(&self, observer: Observer) -> Result<(), TransportError> {
        if self.shared.observer.get().is_some() {
            return Err(TransportError::AlreadyStarted);
        }

        match self.shared.config.role.clone() {
            LinkRole::Listen(addr) => {
                let listener = TcpListener::bind(addr)
                    .await
                    .map_err(|e| TransportError::Bind(format!("{addr}: {e}")))?;
                let bound = listener
                    .local_addr()
                    .map_err(|e| TransportError::Bind(e.to_string()))?;
                let _ = self.shared.local_addr.set(bound);
                self.shared
                    .observer
                    .set(observer)
                    .map_err(|_| TransportError::AlreadyStarted)?;
                tokio::spawn(Arc::clone(&self.shared).accept_loop(listener));
                info!(%bound, "companion link listening");
            }
            LinkRole::Connect(addr) => {
                self.shared
                    .observer
                    .set(observer)
                    .map_err(|_| TransportError::AlreadyStarted)?;
                tokio::spawn(Arc::clone(&self.shared).dial_loop(addr));
                info!(%addr, "companion link dialing");
            }
        }
        Ok(())
    }

    fn is_reachable(&self) -> bool {
        !self.shared.links.is_empty()
    }

    fn send_message_data(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.outbox()?
            .send(encode_frame(KIND_DATA, 0, payload))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn request(&self, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
        let outbox = self.outbox()?;
        let id = self.shared.next_request.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(id, tx);

        if outbox.send(encode_frame(KIND_REQUEST, id, payload)).is_err() {
            self.shared.pending.remove(&id);
            return Err(TransportError::ConnectionClosed);
        }

        match tokio::time::timeout(self.shared.config.request_timeout, rx).await {
            Ok(Ok(answer)) => Ok(answer),
            Ok(Err(_)) => Err(TransportError::ConnectionClosed),
            Err(_) => {
                self.shared.pending.remove(&id);
                Err(TransportError::Timeout)
            }
        }
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.shared.shutdown.send_replace(true);
        self.shared.links.clear();
        self.shared.pending.clear();
        info!("companion link stopped");
        Ok(())
    }
}

impl Shared {
    fn notify(&self, event: CompanionEvent) {
        if let Some(observer) = self.observer.get() {
            observer.companion(event);
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, from)) => {
                        info!(%from, "companion connected");
                        let shared = Arc::clone(&self);
                        tokio::spawn(async move { shared.run_link(stream).await });
                    }
                    Err(e) => warn!(error = %e, "companion accept failed"),
                },
            }
        }
    }

    async fn dial_loop(self: Arc<Self>, addr: SocketAddr) {
        let mut shutdown = self.shutdown.subscribe();

        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    info!(%addr, "connected to companion");
                    self.run_link(stream).await;
                }
                Err(e) => debug!(%addr, error = %e, "companion not reachable"),
            }
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }
    }

    async fn run_link(&self, stream: TcpStream) {
        let id = self.next_link.fetch_add(1, Ordering::Relaxed);
        let (outbox, mut queued) = mpsc::unbounded_channel::<Vec<u8>>();
        let replies = outbox.clone();
        let (close, mut closed) = oneshot::channel::<()>();
        if !self.links.is_empty() {
            debug!("replacing previous companion link");
            self.links.clear();
        }
        self.links.insert(
            id,
            Link {
                outbox,
                _close: close,
            },
        );
        self.notify(CompanionEvent::ReachabilityChanged { reachable: true });

        let mut shutdown = self.shutdown.subscribe();
        let (mut reader, mut writer) = stream.into_split();
        let write = async {
            while let Some(frame) = queued.recv().await {
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    debug!(error = %e, "companion write failed");
                    break;
                }
            }
        };
        let read = async {
            loop {
                match read_frame(&mut reader).await {
                    Ok(frame) => self.on_frame(&frame, &replies),
                    Err(e) => {
                        debug!(error = %e, "companion link closed");
                        break;
                    }
                }
            }
        };

        tokio::select! {
            _ = write => {}
            _ = read => {}
            _ = shutdown.changed() => {}
            _ = &mut closed => debug!("companion link superseded"),
        }

        self.links.remove(&id);
        if self.links.is_empty() {
            info!("companion unreachable");
            self.notify(CompanionEvent::ReachabilityChanged { reachable: false });
        }
    }

    fn on_frame(&self, frame: &[u8], replies: &mpsc::UnboundedSender<Vec<u8>>) {
        let Some((kind, id, payload)) = decode_frame(frame) else {
            debug!(len = frame.len(), "ignoring truncated companion frame");
            return;
        };

        match kind {
            KIND_DATA => self.notify(CompanionEvent::Message {
                payload: payload.to_vec(),
                reply: Reply::NotExpected,
            }),
            KIND_REQUEST => {
                let (reply, answer) = Reply::channel();
                self.notify(CompanionEvent::Message {
                    payload: payload.to_vec(),
                    reply,
                });
                let replies = replies.clone();
                let timeout = self.config.request_timeout;
                tokio::spawn(async move {
                    match tokio::time::timeout(timeout, answer).await {
                        Ok(Ok(answer)) => {
                            let _ = replies.send(encode_frame(KIND_REPLY, id, &answer));
                        }
                        Ok(Err(_)) => debug!(id, "companion request dropped without answer"),
                        Err(_) => debug!(id, "companion request answer timed out"),
                    }
                });
            }
            KIND_REPLY => match self.pending.remove(&id) {
                Some((_, waiter)) => {
                    let _ = waiter.send(payload.to_vec());
                }
                None => debug!(id, "ignoring late companion reply"),
            },
            other => debug!(kind = other, "ignoring unknown companion frame"),
        }
    }
}
