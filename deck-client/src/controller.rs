//! Sync controller: owns the deck and the current slide, and fans changes
//! out to the mesh, the companion, and the surface.
//!
//! All methods run on the presenter task. Sends are reachability-checked and
//! silently dropped when nobody is listening.

use std::sync::Arc;

use deckrocket_core::{plan, Event, IndicatorColor, NavigationSource, Relay};
use deckrocket_types::{Deck, MeshMessage, PeerId, RowUpdate, SlideIndex};
use tracing::{debug, info, warn};

use crate::peer::PeerConnection;
use crate::surface::PresentationSurface;
use crate::transport::{CompanionEvent, CompanionTransport, MeshEvent, MeshTransport};

/// Authoritative presenter state plus the endpoints it is mirrored to.
pub struct SyncController<M, C, S> {
    peers: PeerConnection<M>,
    companion: C,
    surface: S,
    deck: Option<Arc<Deck>>,
    index: SlideIndex,
}

impl<M, C, S> SyncController<M, C, S>
where
    M: MeshTransport,
    C: CompanionTransport,
    S: PresentationSurface,
{
    /// Create a controller with no deck loaded.
    pub fn new(peers: PeerConnection<M>, companion: C, mut surface: S) -> Self {
        surface.refresh_deck(None);
        surface.show_onboarding(true);
        surface.set_indicator_color(peers.indicator());
        Self {
            peers,
            companion,
            surface,
            deck: None,
            index: SlideIndex::FIRST,
        }
    }

    /// The loaded deck. `None` means onboarding.
    pub fn deck(&self) -> Option<Arc<Deck>> {
        self.deck.clone()
    }

    /// Last applied slide index.
    pub fn current_index(&self) -> SlideIndex {
        self.index
    }

    /// Indicator color for the current session state.
    pub fn indicator(&self) -> IndicatorColor {
        self.peers.indicator()
    }

    /// Mesh session driver.
    pub fn peers(&self) -> &PeerConnection<M> {
        &self.peers
    }

    /// Companion transport.
    pub fn companion(&self) -> &C {
        &self.companion
    }

    /// Presentation surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Presentation surface, mutably.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Replace the deck.
    ///
    /// Resets to the first slide, refreshes the surface, and pushes the deck
    /// to the companion if it is reachable. An empty deck counts as none.
    pub fn set_deck(&mut self, deck: Option<Deck>) {
        self.deck = deck.filter(|d| !d.is_empty()).map(Arc::new);
        self.index = SlideIndex::FIRST;

        let deck = self.deck.clone();
        self.surface.show_onboarding(deck.is_none());
        self.surface.refresh_deck(deck.as_deref());
        self.surface.scroll_to(SlideIndex::FIRST);
        self.surface.set_indicator_color(self.peers.indicator());

        match &deck {
            Some(deck) => info!(slides = deck.len(), "deck installed"),
            None => info!("deck cleared"),
        }
        self.push_deck_to_companion();
    }

    /// The presenter moved to `index` locally.
    pub fn on_local_navigate(&mut self, index: SlideIndex) {
        self.navigate(index, NavigationSource::Local);
    }

    /// Local scrolling stopped; publish wherever the surface came to rest.
    pub fn on_scroll_settled(&mut self) {
        let index = self.surface.current_slide_index();
        self.on_local_navigate(index);
    }

    /// A remote endpoint moved to `index`.
    pub fn on_remote_navigate(&mut self, index: SlideIndex, source: NavigationSource) {
        self.navigate(index, source);
    }

    /// Apply a mesh transport event.
    ///
    /// Returns the new deck when the event installed one, so the caller can
    /// persist it.
    pub fn on_mesh_event(&mut self, event: MeshEvent) -> Option<Arc<Deck>> {
        let event = match event {
            MeshEvent::PeerFound { peer } => Event::PeerFound { peer },
            MeshEvent::PeerLost { peer } => Event::PeerLost { peer },
            MeshEvent::StateChanged { peer, state } => Event::StateChanged { peer, state },
            MeshEvent::Received { from, payload } => return self.on_mesh_payload(from, &payload),
        };
        if let Some(color) = self.peers.handle(event) {
            self.surface.set_indicator_color(color);
        }
        None
    }

    /// Apply a companion transport event.
    pub fn on_companion_event(&mut self, event: CompanionEvent) {
        match event {
            CompanionEvent::ReachabilityChanged { reachable } => {
                info!(reachable, "companion reachability changed");
                if reachable {
                    self.push_deck_to_companion();
                }
            }
            CompanionEvent::Message { payload, reply } => {
                // The companion treats the echo as its acknowledgement.
                reply.send(payload.clone());

                match RowUpdate::from_bytes(&payload).map(|update| update.slide_index()) {
                    Ok(Some(index)) => self.on_remote_navigate(index, NavigationSource::Companion),
                    Ok(None) => debug!("ignoring companion row that is not a slide index"),
                    Err(e) => debug!(error = %e, "ignoring companion message"),
                }
            }
        }
    }

    /// Send the whole deck to the companion, if there is one to send and
    /// someone to receive it.
    pub fn push_deck_to_companion(&self) {
        let Some(deck) = &self.deck else {
            return;
        };
        if !self.companion.is_reachable() {
            debug!("companion unreachable, deck push dropped");
            return;
        }

        let bytes = match deck.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to encode deck for companion");
                return;
            }
        };
        match self.companion.send_message_data(&bytes) {
            Ok(()) => info!(slides = deck.len(), "pushed deck to companion"),
            Err(e) => debug!(error = %e, "deck push to companion failed"),
        }
    }

    fn on_mesh_payload(&mut self, from: PeerId, payload: &[u8]) -> Option<Arc<Deck>> {
        match MeshMessage::from_bytes(payload) {
            Ok(MeshMessage::Navigate(index)) => {
                self.on_remote_navigate(index, NavigationSource::Mesh);
                None
            }
            Ok(MeshMessage::Deck(deck)) => {
                info!(%from, slides = deck.len(), "received deck from mesh peer");
                self.set_deck(Some(deck));
                self.deck()
            }
            Err(e) => {
                debug!(%from, error = %e, "ignoring mesh payload");
                None
            }
        }
    }

    fn navigate(&mut self, index: SlideIndex, source: NavigationSource) {
        let deck_len = self.deck.as_ref().map_or(0, |d| d.len());
        let relays = plan(source, index, deck_len);
        if relays.is_empty() {
            debug!(%index, ?source, deck_len, "ignoring navigation outside the deck");
            return;
        }

        self.index = index;
        for relay in relays {
            match relay {
                Relay::ScrollTo(index) => self.surface.scroll_to(index),
                Relay::BroadcastMesh(index) => self.broadcast_index(index),
            }
        }
    }

    fn broadcast_index(&self, index: SlideIndex) {
        match MeshMessage::Navigate(index).to_bytes() {
            Ok(bytes) => {
                self.peers.broadcast(&bytes);
            }
            Err(e) => warn!(error = %e, "failed to encode slide index"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;
    use crate::transport::{MockCompanionTransport, MockMeshTransport, Reply};
    use deckrocket_core::{ConnectionState, DEFAULT_INVITE_TIMEOUT};
    use deckrocket_types::Slide;

    type TestController =
        SyncController<MockMeshTransport, MockCompanionTransport, RecordingSurface>;

    struct Harness {
        controller: TestController,
        mesh: MockMeshTransport,
        companion: MockCompanionTransport,
    }

    fn harness() -> Harness {
        let mesh = MockMeshTransport::new();
        let companion = MockCompanionTransport::new();
        let controller = SyncController::new(
            PeerConnection::new(mesh.clone()),
            companion.clone(),
            RecordingSurface::new(),
        );
        Harness {
            controller,
            mesh,
            companion,
        }
    }

    fn deck(n: usize) -> Deck {
        Deck::new(
            (0..n)
                .map(|i| Slide::new(vec![i as u8; 4], format!("notes {i}")))
                .collect(),
        )
    }

    fn row(value: f64) -> Vec<u8> {
        RowUpdate { row: value }.to_bytes().unwrap()
    }

    // ===========================================
    // Deck Replacement Tests
    // ===========================================

    #[test]
    fn new_controller_shows_onboarding() {
        let h = harness();
        let surface = h.controller.surface();

        assert!(surface.onboarding_visible);
        assert_eq!(surface.indicator, Some(IndicatorColor::Red));
        assert!(h.controller.deck().is_none());
    }

    #[test]
    fn set_deck_resets_surface() {
        let mut h = harness();
        h.controller.set_deck(Some(deck(3)));
        h.controller.surface_mut().swipe_to(SlideIndex::new(2));
        h.controller.on_scroll_settled();

        h.controller.set_deck(Some(deck(5)));

        let surface = h.controller.surface();
        assert_eq!(surface.slide_count, 5);
        assert_eq!(surface.position, SlideIndex::FIRST);
        assert!(!surface.onboarding_visible);
        assert_eq!(h.controller.current_index(), SlideIndex::FIRST);
        assert_eq!(h.controller.deck().unwrap().len(), 5);
    }

    #[test]
    fn set_deck_none_or_empty_shows_onboarding() {
        let mut h = harness();
        h.controller.set_deck(Some(deck(2)));

        h.controller.set_deck(None);
        assert!(h.controller.surface().onboarding_visible);
        assert_eq!(h.controller.surface().slide_count, 0);

        h.controller.set_deck(Some(deck(2)));
        h.controller.set_deck(Some(Deck::default()));
        assert!(h.controller.surface().onboarding_visible);
        assert!(h.controller.deck().is_none());
    }

    #[test]
    fn set_deck_reapplies_indicator() {
        let mut h = harness();
        let peer = PeerId::random();
        h.controller.on_mesh_event(MeshEvent::StateChanged {
            peer,
            state: ConnectionState::Connected,
        });
        h.controller.surface_mut().indicator = None;

        h.controller.set_deck(Some(deck(1)));

        assert_eq!(h.controller.surface().indicator, Some(IndicatorColor::Green));
    }

    #[test]
    fn readers_keep_old_deck_after_swap() {
        let mut h = harness();
        h.controller.set_deck(Some(deck(3)));
        let before = h.controller.deck().unwrap();

        h.controller.set_deck(Some(deck(1)));

        assert_eq!(before.len(), 3);
        assert_eq!(h.controller.deck().unwrap().len(), 1);
    }

    // ===========================================
    // Companion Deck Push Tests
    // ===========================================

    #[test]
    fn set_deck_pushes_to_reachable_companion() {
        let mut h = harness();
        h.companion.set_reachable(true);

        h.controller.set_deck(Some(deck(2)));

        let sent = h.companion.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(Deck::from_bytes(&sent[0]).unwrap(), deck(2));
    }

    #[test]
    fn unreachable_companion_gets_nothing() {
        let mut h = harness();

        h.controller.set_deck(Some(deck(2)));
        h.controller.on_local_navigate(SlideIndex::new(1));

        assert!(h.companion.sent_messages().is_empty());
    }

    #[test]
    fn empty_deck_is_never_pushed() {
        let mut h = harness();
        h.companion.set_reachable(true);

        h.controller.set_deck(None);
        h.controller
            .on_companion_event(CompanionEvent::ReachabilityChanged { reachable: true });

        assert!(h.companion.sent_messages().is_empty());
    }

    #[test]
    fn companion_becoming_reachable_receives_deck_once() {
        let mut h = harness();
        h.controller.set_deck(Some(deck(5)));
        assert!(h.companion.sent_messages().is_empty());

        h.companion.set_reachable(true);
        h.controller
            .on_companion_event(CompanionEvent::ReachabilityChanged { reachable: true });

        let sent = h.companion.sent_messages();
        assert_eq!(sent.len(), 1);
        let pushed = Deck::from_bytes(&sent[0]).unwrap();
        assert_eq!(pushed.len(), 5);
        assert_eq!(pushed, deck(5));
    }

    #[test]
    fn companion_becoming_unreachable_sends_nothing() {
        let mut h = harness();
        h.controller.set_deck(Some(deck(5)));

        h.controller
            .on_companion_event(CompanionEvent::ReachabilityChanged { reachable: false });

        assert!(h.companion.sent_messages().is_empty());
    }

    // ===========================================
    // Navigation Tests
    // ===========================================

    #[test]
    fn local_navigation_goes_to_mesh_only() {
        let mut h = harness();
        h.mesh.set_connected(&[PeerId::random()]);
        h.companion.set_reachable(true);
        h.controller.set_deck(Some(deck(5)));
        let pushes = h.companion.sent_messages().len();

        h.controller.surface_mut().swipe_to(SlideIndex::new(3));
        h.controller.on_scroll_settled();

        assert_eq!(h.mesh.sent_messages(), vec![b"3".to_vec()]);
        assert_eq!(h.companion.sent_messages().len(), pushes);
        assert_eq!(h.controller.current_index(), SlideIndex::new(3));
    }

    #[test]
    fn companion_index_is_applied_and_echoed_once() {
        for i in 0..5 {
            let mut h = harness();
            h.mesh.set_connected(&[PeerId::random()]);
            h.controller.set_deck(Some(deck(5)));

            h.controller
                .on_remote_navigate(SlideIndex::new(i), NavigationSource::Companion);

            assert_eq!(h.mesh.sent_messages(), vec![i.to_string().into_bytes()]);
            assert_eq!(h.controller.surface().position, SlideIndex::new(i));
        }
    }

    #[test]
    fn mesh_index_is_never_echoed_to_mesh() {
        let mut h = harness();
        let peer = PeerId::random();
        h.mesh.set_connected(&[peer]);
        h.controller.set_deck(Some(deck(5)));

        let installed = h.controller.on_mesh_event(MeshEvent::Received {
            from: peer,
            payload: b"4".to_vec(),
        });

        assert!(installed.is_none());
        assert_eq!(h.controller.surface().position, SlideIndex::new(4));
        assert!(h.mesh.sent_messages().is_empty());
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let mut h = harness();
        h.mesh.set_connected(&[PeerId::random()]);
        h.controller.set_deck(Some(deck(3)));
        let scrolls = h.controller.surface().scrolls.len();

        h.controller
            .on_remote_navigate(SlideIndex::new(3), NavigationSource::Companion);
        h.controller
            .on_remote_navigate(SlideIndex::new(99), NavigationSource::Mesh);
        h.controller.on_local_navigate(SlideIndex::new(7));

        assert_eq!(h.controller.surface().scrolls.len(), scrolls);
        assert!(h.mesh.sent_messages().is_empty());
        assert_eq!(h.controller.current_index(), SlideIndex::FIRST);
    }

    #[test]
    fn navigation_without_deck_is_ignored() {
        let mut h = harness();
        h.mesh.set_connected(&[PeerId::random()]);

        h.controller
            .on_remote_navigate(SlideIndex::FIRST, NavigationSource::Companion);

        assert!(h.mesh.sent_messages().is_empty());
    }

    #[test]
    fn unreachable_mesh_drops_index_silently() {
        let mut h = harness();
        h.controller.set_deck(Some(deck(3)));

        h.controller.on_local_navigate(SlideIndex::new(2));

        assert!(h.mesh.sent_messages().is_empty());
        assert_eq!(h.controller.current_index(), SlideIndex::new(2));
    }

    #[test]
    fn last_index_wins() {
        let mut h = harness();
        let peer = PeerId::random();
        h.controller.set_deck(Some(deck(5)));

        for payload in [b"3", b"1"] {
            h.controller.on_mesh_event(MeshEvent::Received {
                from: peer,
                payload: payload.to_vec(),
            });
        }

        assert_eq!(h.controller.current_index(), SlideIndex::new(1));
    }

    // ===========================================
    // Companion Message Tests
    // ===========================================

    #[test]
    fn companion_row_moves_surface_relays_and_echoes() {
        let mut h = harness();
        h.mesh.set_connected(&[PeerId::random()]);
        h.controller.set_deck(Some(deck(5)));
        let message = row(2.0);
        let (reply, mut answer) = Reply::channel();

        h.controller.on_companion_event(CompanionEvent::Message {
            payload: message.clone(),
            reply,
        });

        assert_eq!(h.controller.surface().position, SlideIndex::new(2));
        assert_eq!(h.mesh.sent_messages(), vec![b"2".to_vec()]);
        assert_eq!(answer.try_recv().unwrap(), message);
    }

    #[test]
    fn unparseable_companion_message_is_still_echoed() {
        let mut h = harness();
        h.mesh.set_connected(&[PeerId::random()]);
        h.controller.set_deck(Some(deck(5)));
        let (reply, mut answer) = Reply::channel();

        h.controller.on_companion_event(CompanionEvent::Message {
            payload: b"not a row".to_vec(),
            reply,
        });

        assert_eq!(answer.try_recv().unwrap(), b"not a row");
        assert!(h.mesh.sent_messages().is_empty());
        assert_eq!(h.controller.current_index(), SlideIndex::FIRST);
    }

    #[test]
    fn negative_companion_row_is_ignored() {
        let mut h = harness();
        h.controller.set_deck(Some(deck(5)));
        h.controller.on_local_navigate(SlideIndex::new(3));

        h.controller.on_companion_event(CompanionEvent::Message {
            payload: row(-1.0),
            reply: Reply::NotExpected,
        });

        assert_eq!(h.controller.current_index(), SlideIndex::new(3));
    }

    // ===========================================
    // Mesh Session Tests
    // ===========================================

    #[test]
    fn discovered_peer_is_invited_once() {
        let mut h = harness();
        let peer = PeerId::random();

        h.controller.on_mesh_event(MeshEvent::PeerFound { peer });
        h.controller.on_mesh_event(MeshEvent::StateChanged {
            peer,
            state: ConnectionState::Connecting,
        });
        h.controller.on_mesh_event(MeshEvent::PeerFound { peer });

        assert_eq!(h.mesh.invitations(), vec![(peer, DEFAULT_INVITE_TIMEOUT)]);
        assert_eq!(h.controller.surface().indicator, Some(IndicatorColor::Orange));
    }

    #[test]
    fn indicator_follows_session_state() {
        let mut h = harness();
        let peer = PeerId::random();
        h.controller.on_mesh_event(MeshEvent::PeerFound { peer });

        for (state, color) in [
            (ConnectionState::Connecting, IndicatorColor::Orange),
            (ConnectionState::Connected, IndicatorColor::Green),
            (ConnectionState::NotConnected, IndicatorColor::Red),
        ] {
            h.controller
                .on_mesh_event(MeshEvent::StateChanged { peer, state });
            assert_eq!(h.controller.surface().indicator, Some(color));
        }
    }

    #[test]
    fn mesh_deck_push_installs_deck() {
        let mut h = harness();
        h.companion.set_reachable(true);
        let pushed = deck(4);

        let installed = h.controller.on_mesh_event(MeshEvent::Received {
            from: PeerId::random(),
            payload: pushed.to_bytes().unwrap(),
        });

        assert_eq!(installed.as_deref(), Some(&pushed));
        assert_eq!(h.controller.surface().slide_count, 4);
        assert_eq!(h.companion.sent_messages().len(), 1);
    }

    #[test]
    fn garbage_mesh_payload_is_ignored() {
        let mut h = harness();
        h.controller.set_deck(Some(deck(2)));

        let installed = h.controller.on_mesh_event(MeshEvent::Received {
            from: PeerId::random(),
            payload: vec![0xc1, 0xff],
        });

        assert!(installed.is_none());
        assert_eq!(h.controller.deck().unwrap().len(), 2);
    }
}
