//! Mesh session driver.
//!
//! Couples a [`MeshTransport`] with the pure [`PeerMachine`]: events go into
//! the machine, the actions it returns are carried out here.

use deckrocket_core::{Action, Event, IndicatorColor, PeerMachine, PeerPolicy};
use tracing::{debug, info};

use crate::transport::MeshTransport;

/// Owns the mesh transport and its peer state.
#[derive(Debug)]
pub struct PeerConnection<M> {
    transport: M,
    machine: PeerMachine,
}

impl<M: MeshTransport> PeerConnection<M> {
    /// Wrap a transport with the default invitation policy.
    pub fn new(transport: M) -> Self {
        Self::with_policy(transport, PeerPolicy::default())
    }

    /// Wrap a transport with a custom invitation policy.
    pub fn with_policy(transport: M, policy: PeerPolicy) -> Self {
        Self {
            transport,
            machine: PeerMachine::with_policy(policy),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &M {
        &self.transport
    }

    /// Current peer state.
    pub fn machine(&self) -> &PeerMachine {
        &self.machine
    }

    /// Indicator color for the current session state.
    pub fn indicator(&self) -> IndicatorColor {
        self.machine.indicator()
    }

    /// Feed one event through the machine and execute the resulting actions.
    ///
    /// Returns the indicator color to apply, if the event produced one.
    pub fn handle(&mut self, event: Event) -> Option<IndicatorColor> {
        let mut indicator = None;
        for action in self.machine.on_event(event) {
            match action {
                Action::Invite { peer, timeout } => {
                    info!(%peer, ?timeout, "inviting mesh peer");
                    self.transport.invite(peer, timeout);
                }
                Action::SetIndicator(color) => indicator = Some(color),
            }
        }
        indicator
    }

    /// Check if a broadcast would reach anyone.
    pub fn is_reachable(&self) -> bool {
        self.transport.is_reachable()
    }

    /// Send to every session peer. Returns false if nothing was sent.
    pub fn broadcast(&self, payload: &[u8]) -> bool {
        if !self.transport.is_reachable() {
            debug!("no mesh peers connected, broadcast dropped");
            return false;
        }
        match self.transport.send(payload) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "mesh broadcast failed");
                false
            }
        }
    }
}
