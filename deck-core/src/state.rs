//! Peer connection state machine for DeckRocket.
//!
//! This module provides a pure, side-effect-free state machine for the mesh
//! session. It takes transport events as input and produces a list of actions
//! to execute (send an invitation, recolor the connection indicator).
//!
//! The actual I/O is performed by deck-client, not by this module. This
//! enables instant unit testing without network mocks.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use deckrocket_types::PeerId;

use crate::IndicatorColor;

/// How long an outbound invitation may stay unanswered.
pub const DEFAULT_INVITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection state of a single peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No session with this peer.
    #[default]
    NotConnected,
    /// Invitation accepted or incoming connection, not yet confirmed.
    Connecting,
    /// Session established.
    Connected,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if a connection is being set up.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }
}

/// A discovered peer and its connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerRecord {
    /// Peer identity.
    pub peer: PeerId,
    /// Current state.
    pub state: ConnectionState,
}

/// Invitation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerPolicy {
    /// Timeout passed along with every invitation.
    pub invite_timeout: Duration,
    /// Re-invite a peer as soon as an established session with it is lost,
    /// instead of waiting for it to be discovered again.
    pub reinvite_on_loss: bool,
}

impl Default for PeerPolicy {
    fn default() -> Self {
        Self {
            invite_timeout: DEFAULT_INVITE_TIMEOUT,
            reinvite_on_loss: true,
        }
    }
}

/// Events reported by the mesh transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A peer was seen on the local network.
    PeerFound {
        /// The peer.
        peer: PeerId,
    },
    /// A peer stopped advertising.
    ///
    /// Idle peers are forgotten. A peer with a session stays tracked until
    /// the transport reports the session down.
    PeerLost {
        /// The peer.
        peer: PeerId,
    },
    /// The session state of a peer changed.
    StateChanged {
        /// The peer.
        peer: PeerId,
        /// Its new state.
        state: ConnectionState,
    },
}

/// Actions to be executed by the caller.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Invite a peer into our session.
    Invite {
        /// The peer to invite.
        peer: PeerId,
        /// How long the invitation stays open.
        timeout: Duration,
    },
    /// Recolor the connection indicator.
    SetIndicator(IndicatorColor),
}

/// Tracks every discovered peer and decides when to invite.
///
/// At most one session is pursued at a time: while an invitation is
/// outstanding or any peer is connecting or connected, discovery events
/// issue no new invitations.
#[derive(Debug, Clone, Default)]
pub struct PeerMachine {
    peers: BTreeMap<PeerId, ConnectionState>,
    pending_invite: Option<PeerId>,
    /// In-session peers that stopped advertising.
    lost: BTreeSet<PeerId>,
    policy: PeerPolicy,
}

impl PeerMachine {
    /// Create a machine with the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a machine with a custom policy.
    pub fn with_policy(policy: PeerPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Process an event and return the actions to execute.
    pub fn on_event(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::PeerFound { peer } => {
                self.lost.remove(&peer);
                self.peers.entry(peer).or_default();
                self.invite_if_idle(peer).into_iter().collect()
            }

            Event::PeerLost { peer } => match self.peers.get(&peer).copied() {
                None => vec![],
                Some(ConnectionState::NotConnected) => {
                    self.peers.remove(&peer);
                    if self.pending_invite == Some(peer) {
                        self.pending_invite = None;
                    }
                    vec![Action::SetIndicator(self.indicator())]
                }
                Some(_) => {
                    self.lost.insert(peer);
                    vec![Action::SetIndicator(self.indicator())]
                }
            },

            Event::StateChanged { peer, state } => {
                let previous = match self.peers.get_mut(&peer) {
                    Some(current) => std::mem::replace(current, state),
                    // Incoming connection from a peer we never discovered
                    None if state != ConnectionState::NotConnected => {
                        self.peers.insert(peer, state);
                        ConnectionState::NotConnected
                    }
                    None => ConnectionState::NotConnected,
                };

                if state != ConnectionState::Connecting && self.pending_invite == Some(peer) {
                    self.pending_invite = None;
                }

                // Lost while in session: forget it instead of re-inviting
                if state == ConnectionState::NotConnected && self.lost.remove(&peer) {
                    self.peers.remove(&peer);
                    return vec![Action::SetIndicator(self.indicator())];
                }

                let mut actions = vec![Action::SetIndicator(self.indicator())];
                if state == ConnectionState::NotConnected
                    && previous == ConnectionState::Connected
                    && self.policy.reinvite_on_loss
                {
                    actions.extend(self.invite_if_idle(peer));
                }
                actions
            }
        }
    }

    fn invite_if_idle(&mut self, peer: PeerId) -> Option<Action> {
        if self.peers.get(&peer) != Some(&ConnectionState::NotConnected) || self.has_session() {
            return None;
        }
        self.pending_invite = Some(peer);
        Some(Action::Invite {
            peer,
            timeout: self.policy.invite_timeout,
        })
    }

    /// True while an invitation is outstanding or any peer is not idle.
    pub fn has_session(&self) -> bool {
        self.pending_invite.is_some()
            || self
                .peers
                .values()
                .any(|state| *state != ConnectionState::NotConnected)
    }

    /// Best state across all peers.
    pub fn session_state(&self) -> ConnectionState {
        let mut best = ConnectionState::NotConnected;
        for state in self.peers.values() {
            match state {
                ConnectionState::Connected => return ConnectionState::Connected,
                ConnectionState::Connecting => best = ConnectionState::Connecting,
                ConnectionState::NotConnected => {}
            }
        }
        best
    }

    /// Indicator color for the current session state.
    pub fn indicator(&self) -> IndicatorColor {
        self.session_state().into()
    }

    /// State of one peer, if known.
    pub fn state_of(&self, peer: &PeerId) -> Option<ConnectionState> {
        self.peers.get(peer).copied()
    }

    /// All known peers.
    pub fn records(&self) -> impl Iterator<Item = PeerRecord> + '_ {
        self.peers
            .iter()
            .map(|(peer, state)| PeerRecord { peer: *peer, state: *state })
    }

    /// Peers with an established session.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|(_, state)| state.is_connected())
            .map(|(peer, _)| *peer)
            .collect()
    }

    /// The peer we are waiting on, if an invitation is outstanding.
    pub fn pending_invitation(&self) -> Option<PeerId> {
        self.pending_invite
    }

    /// The active policy.
    pub fn policy(&self) -> &PeerPolicy {
        &self.policy
    }
}
