//! Presenter runtime: the one task that owns the controller.
//!
//! Transports report through the [`Dispatcher`]; `run` drains the queue and
//! applies each item in order until shutdown.

use std::ops::ControlFlow;

use deckrocket_types::Deck;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::controller::SyncController;
use crate::dispatch::{Dispatcher, Inbound};
use crate::store::DeckStore;
use crate::surface::PresentationSurface;
use crate::transport::{CompanionTransport, MeshTransport, Observer, TransportError};

/// Controller plus the optional deck cache.
pub struct Presenter<M, C, S> {
    controller: SyncController<M, C, S>,
    store: Option<DeckStore>,
}

impl<M, C, S> Presenter<M, C, S>
where
    M: MeshTransport,
    C: CompanionTransport,
    S: PresentationSurface,
{
    /// Create a presenter. Without a store, received decks are not cached.
    pub fn new(controller: SyncController<M, C, S>, store: Option<DeckStore>) -> Self {
        Self { controller, store }
    }

    /// The controller.
    pub fn controller(&self) -> &SyncController<M, C, S> {
        &self.controller
    }

    /// The controller, mutably.
    pub fn controller_mut(&mut self) -> &mut SyncController<M, C, S> {
        &mut self.controller
    }

    /// Start both transports reporting to `dispatcher`, then install the
    /// cached deck, if any.
    pub async fn start(&mut self, dispatcher: &Dispatcher) -> Result<(), TransportError> {
        self.controller
            .peers()
            .transport()
            .start(Observer::Dispatch(dispatcher.clone()))
            .await?;
        self.controller
            .companion()
            .start(Observer::Dispatch(dispatcher.clone()))
            .await?;

        if let Some(store) = &self.store {
            let deck = store.load().await;
            if deck.is_some() {
                info!(path = %store.path().display(), "loaded cached deck");
            }
            self.controller.set_deck(deck);
        }
        Ok(())
    }

    /// Apply one queued item.
    pub async fn handle(&mut self, inbound: Inbound) -> ControlFlow<()> {
        match inbound {
            Inbound::Mesh(event) => {
                if let Some(deck) = self.controller.on_mesh_event(event) {
                    self.persist(&deck).await;
                }
            }
            Inbound::Companion(event) => self.controller.on_companion_event(event),
            Inbound::LocalNavigate(index) => self.controller.on_local_navigate(index),
            Inbound::ScrollSettled => self.controller.on_scroll_settled(),
            Inbound::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Drain `inbox` until shutdown or until every dispatcher is gone, then
    /// stop the transports.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Inbound>) -> Self {
        while let Some(inbound) = inbox.recv().await {
            if self.handle(inbound).await.is_break() {
                break;
            }
        }
        self.shutdown().await;
        self
    }

    /// Stop both transports.
    pub async fn shutdown(&self) {
        if let Err(e) = self.controller.peers().transport().shutdown().await {
            warn!(error = %e, "mesh transport shutdown failed");
        }
        if let Err(e) = self.controller.companion().shutdown().await {
            warn!(error = %e, "companion transport shutdown failed");
        }
        info!("presenter stopped");
    }

    async fn persist(&self, deck: &Deck) {
        let Some(store) = &self.store else {
            return;
        };
        match store.save(deck).await {
            Ok(()) => info!(path = %store.path().display(), "cached received deck"),
            Err(e) => warn!(error = %e, "failed to cache received deck"),
        }
    }
}
