//! Companion simulator.
//!
//! Dials the presenter, prints the decks it pushes, and sends typed slide
//! numbers as row updates, printing the echoed acknowledgement.

use anyhow::{Context, Result};
use deckrocket_client::{
    CompanionEvent, CompanionTransport, Dispatcher, Inbound, LinkCompanionTransport, Observer,
};
use deckrocket_types::{Deck, RowUpdate, SlideIndex};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{parse_slide_number, shutdown_on_ctrl_c};
use crate::config::PresenterConfig;

/// Run the companion command.
pub async fn run(config: &PresenterConfig, presenter: SocketAddr) -> Result<()> {
    let link = LinkCompanionTransport::new(config.companion.connect(presenter));
    let (dispatcher, mut inbox) = Dispatcher::channel();
    link.start(Observer::Dispatch(dispatcher.clone()))
        .await
        .context("Failed to start companion link")?;
    shutdown_on_ctrl_c(dispatcher);

    println!("companion dialing {presenter}; type a slide number to jump, q to quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            inbound = inbox.recv() => match inbound {
                Some(Inbound::Companion(event)) => show(event),
                Some(Inbound::Shutdown) | None => break,
                Some(_) => {}
            },
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) if matches!(line.trim(), "q" | "quit") => break,
                Some(line) => match parse_slide_number(&line) {
                    Some(index) => jump(&link, SlideIndex::new(index)).await,
                    None => eprintln!("not a slide number: {}", line.trim()),
                },
                None => break,
            },
        }
    }

    link.shutdown().await.context("Failed to stop companion link")?;
    Ok(())
}

fn show(event: CompanionEvent) {
    match event {
        CompanionEvent::ReachabilityChanged { reachable: true } => println!("presenter reachable"),
        CompanionEvent::ReachabilityChanged { reachable: false } => {
            println!("presenter unreachable")
        }
        CompanionEvent::Message { payload, reply } => {
            match Deck::from_bytes(&payload) {
                Ok(deck) => println!("received deck: {} slides", deck.len()),
                Err(_) => println!("received {} bytes", payload.len()),
            }
            reply.send(payload);
        }
    }
}

async fn jump(link: &LinkCompanionTransport, index: SlideIndex) {
    let message = match RowUpdate::new(index).to_bytes() {
        Ok(message) => message,
        Err(e) => {
            eprintln!("failed to encode row: {e}");
            return;
        }
    };
    match link.request(&message).await {
        Ok(echo) if echo == message => println!("slide {} acknowledged", index.value() + 1),
        Ok(_) => println!("slide {} answered with a different payload", index.value() + 1),
        Err(e) => eprintln!("slide {} not delivered: {e}", index.value() + 1),
    }
}
