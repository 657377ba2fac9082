//! Run the presenter.

use anyhow::{Context, Result};
use deckrocket_client::{
    CompanionTransport, DeckStore, Dispatcher, Inbound, LanMeshTransport, LinkCompanionTransport,
    MeshTransport, PeerConnection, PresentationSurface, Presenter, SyncController,
};
use deckrocket_types::SlideIndex;
use std::ops::ControlFlow;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{parse_slide_number, shutdown_on_ctrl_c};
use crate::config::PresenterConfig;
use crate::surface::ConsoleSurface;

/// Run the present command.
pub async fn run(config: &PresenterConfig, data_dir: &Path) -> Result<()> {
    let mesh = LanMeshTransport::new(config.mesh.transport());
    let companion = LinkCompanionTransport::new(config.companion.listen());
    let peers = PeerConnection::with_policy(mesh, config.mesh.policy());

    let controller = SyncController::new(peers, companion, ConsoleSurface::new());
    let store = config
        .store
        .cache_received_decks
        .then(|| DeckStore::in_dir(data_dir));
    let mut presenter = Presenter::new(controller, store);

    let (dispatcher, mut inbox) = Dispatcher::channel();
    presenter
        .start(&dispatcher)
        .await
        .context("Failed to start transports")?;

    println!(
        "presenting as {} (companion on {})",
        presenter.controller().peers().transport().local_peer(),
        config.companion.listen_address
    );
    println!("type a slide number to jump, q to quit");

    shutdown_on_ctrl_c(dispatcher.clone());
    forward_keyboard(dispatcher);

    while let Some(inbound) = inbox.recv().await {
        if apply(&mut presenter, inbound).await.is_break() {
            break;
        }
    }
    presenter.shutdown().await;
    Ok(())
}

/// Apply one inbox item.
///
/// Typed numbers behave like a swipe: the surface moves, then settles.
/// Numbers outside the deck are reported and skipped.
async fn apply<M, C, S>(presenter: &mut Presenter<M, C, S>, inbound: Inbound) -> ControlFlow<()>
where
    M: MeshTransport,
    C: CompanionTransport,
    S: PresentationSurface,
{
    let Inbound::LocalNavigate(index) = inbound else {
        return presenter.handle(inbound).await;
    };
    let in_deck = presenter
        .controller()
        .deck()
        .is_some_and(|deck| deck.contains(index));
    if !in_deck {
        eprintln!("no slide {}", index.value() + 1);
        return ControlFlow::Continue(());
    }
    presenter.controller_mut().surface_mut().scroll_to(index);
    presenter.handle(Inbound::ScrollSettled).await
}

/// Turn stdin lines into local navigation.
fn forward_keyboard(dispatcher: Dispatcher) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let inbound = match line.trim() {
                "q" | "quit" => Inbound::Shutdown,
                input => match parse_slide_number(input) {
                    Some(index) => Inbound::LocalNavigate(SlideIndex::new(index)),
                    None => {
                        eprintln!("not a slide number: {input}");
                        continue;
                    }
                },
            };
            if !dispatcher.submit(inbound) {
                break;
            }
        }
    });
}
