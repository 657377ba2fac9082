//! Hand-off from transport tasks to the presenter task.
//!
//! Everything that mutates presenter state (transport events, local
//! navigation, shutdown) travels through one queue and is applied by one
//! task, in arrival order.

use deckrocket_types::SlideIndex;
use tokio::sync::mpsc;

use crate::transport::{CompanionEvent, MeshEvent};

/// Work item for the presenter task.
#[derive(Debug)]
pub enum Inbound {
    /// Event from the mesh transport.
    Mesh(MeshEvent),
    /// Event from the companion transport.
    Companion(CompanionEvent),
    /// The presenter picked a slide locally.
    LocalNavigate(SlideIndex),
    /// Local scrolling came to rest; read the index from the surface.
    ScrollSettled,
    /// Stop the presenter loop.
    Shutdown,
}

/// Cloneable sending side of the presenter queue.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl Dispatcher {
    /// Create a dispatcher and the receiving end for the presenter task.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue work for the presenter. Returns false if the presenter is gone.
    pub fn submit(&self, inbound: Inbound) -> bool {
        self.tx.send(inbound).is_ok()
    }

    /// Check if the presenter stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submissions_arrive_in_order() {
        let (dispatcher, mut inbox) = Dispatcher::channel();

        assert!(dispatcher.submit(Inbound::LocalNavigate(SlideIndex::new(1))));
        assert!(dispatcher.submit(Inbound::ScrollSettled));
        assert!(dispatcher.submit(Inbound::Shutdown));

        assert!(matches!(inbox.try_recv().unwrap(), Inbound::LocalNavigate(i) if i.value() == 1));
        assert!(matches!(inbox.try_recv().unwrap(), Inbound::ScrollSettled));
        assert!(matches!(inbox.try_recv().unwrap(), Inbound::Shutdown));
    }

    #[test]
    fn clones_feed_the_same_queue() {
        let (dispatcher, mut inbox) = Dispatcher::channel();
        let other = dispatcher.clone();

        other.submit(Inbound::ScrollSettled);

        assert!(matches!(inbox.try_recv().unwrap(), Inbound::ScrollSettled));
    }

    #[test]
    fn submit_after_receiver_dropped_fails() {
        let (dispatcher, inbox) = Dispatcher::channel();
        drop(inbox);

        assert!(dispatcher.is_closed());
        assert!(!dispatcher.submit(Inbound::Shutdown));
    }
}
