//! Transport abstraction for DeckRocket.
//!
//! The presenter talks to two kinds of endpoints:
//! - a **mesh** of nearby peers, discovered on the local network and invited
//!   into a session ([`MeshTransport`])
//! - a paired **companion** device over a point-to-point link
//!   ([`CompanionTransport`])
//!
//! # Design
//!
//! Sends are fire-and-forget: they enqueue bytes for a background writer and
//! return immediately. Nothing waits for the remote side. Inbound traffic and
//! state changes are reported as events through an [`Observer`], which hands
//! them to the presenter task; transports never touch presenter state.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockMeshTransport::new();
//! transport.start(Observer::Dispatch(dispatcher)).await?;
//! transport.invite(peer, Duration::from_secs(30));
//! transport.send(b"3")?;
//! ```

mod frame;
mod lan;
mod link;
mod mock;

pub use lan::{LanMeshConfig, LanMeshTransport, DEFAULT_DISCOVERY_PORT, DEFAULT_SERVICE};
pub use link::{LinkCompanionTransport, LinkConfig, LinkRole};
pub use mock::{MockCompanionTransport, MockMeshTransport};

use async_trait::async_trait;
use deckrocket_core::ConnectionState;
use deckrocket_types::PeerId;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::dispatch::{Dispatcher, Inbound};

/// Maximum frame size (16MB, enough for a deck of full-screen images).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not bind a local socket.
    #[error("bind failed: {0}")]
    Bind(String),

    /// Transport was started twice.
    #[error("transport already started")]
    AlreadyStarted,

    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// No peer or companion to talk to.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Frame exceeds [`MAX_MESSAGE_SIZE`].
    #[error("message too large: {size} > {max}")]
    MessageTooLarge {
        /// Size of the rejected frame.
        size: usize,
        /// Limit in force.
        max: usize,
    },

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,
}

/// Events reported by a mesh transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    /// A peer is advertising on the local network. Reported again on every
    /// advertisement.
    PeerFound {
        /// The peer.
        peer: PeerId,
    },
    /// A peer stopped advertising.
    PeerLost {
        /// The peer.
        peer: PeerId,
    },
    /// Session state of a peer changed.
    StateChanged {
        /// The peer.
        peer: PeerId,
        /// Its new state.
        state: ConnectionState,
    },
    /// Bytes arrived from a session peer.
    Received {
        /// Sender.
        from: PeerId,
        /// Raw payload.
        payload: Vec<u8>,
    },
}

/// Reply slot attached to an inbound companion message.
#[derive(Debug)]
pub enum Reply {
    /// The sender waits for an answer.
    Expected(oneshot::Sender<Vec<u8>>),
    /// Fire-and-forget message.
    NotExpected,
}

impl Reply {
    /// Create an expecting reply slot and the receiver for its answer.
    pub fn channel() -> (Self, oneshot::Receiver<Vec<u8>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Expected(tx), rx)
    }

    /// Check if the sender waits for an answer.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Expected(_))
    }

    /// Answer the message. Returns false when no answer was expected or the
    /// sender stopped waiting.
    pub fn send(self, payload: Vec<u8>) -> bool {
        match self {
            Self::Expected(tx) => tx.send(payload).is_ok(),
            Self::NotExpected => false,
        }
    }
}

/// Events reported by a companion transport.
#[derive(Debug)]
pub enum CompanionEvent {
    /// The companion became reachable or unreachable.
    ReachabilityChanged {
        /// New reachability.
        reachable: bool,
    },
    /// The companion sent a message.
    Message {
        /// Raw payload.
        payload: Vec<u8>,
        /// Where to send the answer, if one is expected.
        reply: Reply,
    },
}

/// Receiver of transport events.
///
/// Transports run on background tasks; the observer forwards their events to
/// the presenter task. Events raised before an observer is registered are
/// dropped.
#[derive(Debug, Clone, Default)]
pub enum Observer {
    /// Nobody listens.
    #[default]
    Unregistered,
    /// Forward to the presenter task.
    Dispatch(Dispatcher),
}

impl Observer {
    /// Report a mesh event.
    pub fn mesh(&self, event: MeshEvent) {
        self.submit(Inbound::Mesh(event));
    }

    /// Report a companion event.
    pub fn companion(&self, event: CompanionEvent) {
        self.submit(Inbound::Companion(event));
    }

    fn submit(&self, inbound: Inbound) {
        match self {
            Self::Unregistered => {
                tracing::trace!(?inbound, "no observer registered, dropping transport event");
            }
            Self::Dispatch(dispatcher) => {
                if !dispatcher.submit(inbound) {
                    tracing::debug!("presenter stopped, dropping transport event");
                }
            }
        }
    }
}

/// Local peer-to-peer mesh: discovery, invitations, and a broadcast session.
#[async_trait]
pub trait MeshTransport: Send + Sync {
    /// Our own identity on the mesh.
    fn local_peer(&self) -> PeerId;

    /// Start advertising, browsing, and accepting invitations.
    ///
    /// Events are handed to `observer` from background tasks.
    async fn start(&self, observer: Observer) -> Result<(), TransportError>;

    /// Invite a discovered peer into our session.
    ///
    /// The outcome is reported through `StateChanged` events; an invitation
    /// that is not answered within `timeout` ends as `NotConnected`.
    fn invite(&self, peer: PeerId, timeout: Duration);

    /// Peers currently in session with us.
    fn connected_peers(&self) -> Vec<PeerId>;

    /// Check if at least one peer would receive a send.
    fn is_reachable(&self) -> bool {
        !self.connected_peers().is_empty()
    }

    /// Queue bytes for every session peer. Does not wait for delivery.
    fn send(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Stop all background work and drop every session.
    async fn shutdown(&self) -> Result<(), TransportError>;
}

/// Point-to-point link with the paired companion device.
#[async_trait]
pub trait CompanionTransport: Send + Sync {
    /// Start the link. Events are handed to `observer` from background tasks.
    async fn start(&self, observer: Observer) -> Result<(), TransportError>;

    /// Check if the companion is currently reachable.
    fn is_reachable(&self) -> bool;

    /// Queue bytes for the companion; no answer is expected.
    fn send_message_data(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Send a message and wait for the companion's answer.
    async fn request(&self, payload: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Stop all background work and drop the link.
    async fn shutdown(&self) -> Result<(), TransportError>;
}
