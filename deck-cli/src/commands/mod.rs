//! CLI command implementations.

pub mod companion;
pub mod present;
pub mod send_deck;
pub mod spectate;
pub mod status;

use deckrocket_client::{Dispatcher, Inbound};

/// Submit `Shutdown` on Ctrl-C.
pub(crate) fn shutdown_on_ctrl_c(dispatcher: Dispatcher) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            dispatcher.submit(Inbound::Shutdown);
        }
    });
}

/// Parse a 1-based slide number typed by the user into a 0-based index.
pub(crate) fn parse_slide_number(input: &str) -> Option<usize> {
    input.trim().parse::<usize>().ok()?.checked_sub(1)
}
