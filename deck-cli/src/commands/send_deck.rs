//! Push a directory of slide images to the mesh.

use anyhow::{bail, Context, Result};
use deckrocket_client::{
    Dispatcher, Inbound, LanMeshTransport, MeshEvent, MeshTransport, Observer, PeerConnection,
};
use deckrocket_core::{ConnectionState, Event};
use deckrocket_types::{Deck, Slide};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::PresenterConfig;

/// Optional speaker notes file: a JSON array of strings, one per slide.
pub const NOTES_FILE_NAME: &str = "notes.json";

/// Time for queued frames to leave before the sessions are dropped.
const FLUSH_GRACE: Duration = Duration::from_secs(1);

/// Run the send-deck command.
pub async fn run(config: &PresenterConfig, dir: &Path, wait_secs: u64) -> Result<()> {
    let deck = load_deck_dir(dir).await?;
    let bytes = deck.to_bytes().context("Failed to encode deck")?;
    println!("loaded {} slides from {}", deck.len(), dir.display());

    let mut peers = PeerConnection::with_policy(
        LanMeshTransport::new(config.mesh.transport()),
        config.mesh.policy(),
    );
    let (dispatcher, mut inbox) = Dispatcher::channel();
    peers
        .transport()
        .start(Observer::Dispatch(dispatcher))
        .await
        .context("Failed to start mesh transport")?;

    println!("waiting up to {wait_secs}s for a mesh session...");
    let connected = tokio::time::timeout(Duration::from_secs(wait_secs), async {
        while let Some(inbound) = inbox.recv().await {
            let Inbound::Mesh(event) = inbound else {
                continue;
            };
            let event = match event {
                MeshEvent::PeerFound { peer } => Event::PeerFound { peer },
                MeshEvent::PeerLost { peer } => Event::PeerLost { peer },
                MeshEvent::StateChanged { peer, state } => Event::StateChanged { peer, state },
                MeshEvent::Received { .. } => continue,
            };
            peers.handle(event);
            if peers.machine().session_state() == ConnectionState::Connected {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    if !connected {
        tracing::warn!(wait_secs, "no mesh session");
        peers.transport().shutdown().await.ok();
        bail!("No mesh peer joined within {wait_secs}s");
    }

    tracing::info!(slides = deck.len(), bytes = bytes.len(), "sending deck");
    peers
        .transport()
        .send(&bytes)
        .context("Failed to send deck")?;
    println!(
        "sent deck to {} peer(s)",
        peers.transport().connected_peers().len()
    );

    tokio::time::sleep(FLUSH_GRACE).await;
    peers
        .transport()
        .shutdown()
        .await
        .context("Failed to stop mesh transport")?;
    Ok(())
}

/// Build a deck from every file in `dir` except the notes file, in file name
/// order.
pub async fn load_deck_dir(dir: &Path) -> Result<Deck> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read {}", dir.display()))?;

    let mut images: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await.context("Failed to list slides")? {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|kind| kind.is_file())
            .unwrap_or(false);
        if is_file && path.file_name() != Some(NOTES_FILE_NAME.as_ref()) {
            images.push(path);
        }
    }
    images.sort();

    if images.is_empty() {
        bail!("No slide images in {}", dir.display());
    }

    let notes = load_notes(&dir.join(NOTES_FILE_NAME)).await?;
    let mut slides = Vec::with_capacity(images.len());
    for (i, path) in images.iter().enumerate() {
        let image = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let note = notes.get(i).cloned().unwrap_or_default();
        slides.push(Slide::new(image, note));
    }

    Ok(Deck::new(slides))
}

async fn load_notes(path: &Path) -> Result<Vec<String>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("{} must be a JSON array of strings", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}
