//! Follow the mesh without driving it.

use anyhow::{Context, Result};
use deckrocket_client::{
    Dispatcher, Inbound, LanMeshTransport, MeshEvent, MeshTransport, Observer, PeerConnection,
};
use deckrocket_core::Event;
use deckrocket_types::MeshMessage;

use super::shutdown_on_ctrl_c;
use crate::config::PresenterConfig;

/// Run the spectate command.
pub async fn run(config: &PresenterConfig) -> Result<()> {
    let mut peers = PeerConnection::with_policy(
        LanMeshTransport::new(config.mesh.transport()),
        config.mesh.policy(),
    );
    let (dispatcher, mut inbox) = Dispatcher::channel();
    peers
        .transport()
        .start(Observer::Dispatch(dispatcher.clone()))
        .await
        .context("Failed to start mesh transport")?;
    shutdown_on_ctrl_c(dispatcher);

    println!("spectating as {}", peers.transport().local_peer());
    let mut indicator = peers.indicator();

    while let Some(inbound) = inbox.recv().await {
        let event = match inbound {
            Inbound::Mesh(event) => event,
            Inbound::Shutdown => break,
            _ => continue,
        };
        let event = match event {
            MeshEvent::Received { from, payload } => {
                match MeshMessage::from_bytes(&payload) {
                    Ok(MeshMessage::Navigate(index)) => {
                        println!("{from}: slide {}", index.value() + 1)
                    }
                    Ok(MeshMessage::Deck(deck)) => {
                        println!("{from}: deck of {} slides", deck.len())
                    }
                    Err(e) => println!("{from}: unreadable payload ({e})"),
                }
                continue;
            }
            MeshEvent::PeerFound { peer } => Event::PeerFound { peer },
            MeshEvent::PeerLost { peer } => Event::PeerLost { peer },
            MeshEvent::StateChanged { peer, state } => Event::StateChanged { peer, state },
        };
        if let Some(color) = peers.handle(event) {
            if color != indicator {
                println!("[{color}]");
                indicator = color;
            }
        }
    }

    peers
        .transport()
        .shutdown()
        .await
        .context("Failed to stop mesh transport")?;
    Ok(())
}
