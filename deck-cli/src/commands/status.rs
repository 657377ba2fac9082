//! Show configuration and cached deck.

use anyhow::{Context, Result};
use deckrocket_client::DeckStore;
use std::path::Path;

use crate::config::PresenterConfig;

/// Run the status command.
pub async fn run(config: &PresenterConfig, data_dir: &Path) -> Result<()> {
    println!("=== deckrocket status ===");
    println!();

    println!("Data directory: {}", data_dir.display());
    let store = DeckStore::in_dir(data_dir);
    match store.load().await {
        Some(deck) => {
            let bytes: usize = deck.iter().map(|s| s.image().len()).sum();
            let with_notes = deck.iter().filter(|s| !s.notes().is_empty()).count();
            println!("Cached deck:");
            println!("  Slides: {}", deck.len());
            println!("  Images: {bytes} bytes");
            println!("  Notes:  {with_notes} slide(s)");
        }
        None => {
            println!("Cached deck: NONE");
            println!();
            println!("Run 'deckrocket send-deck <dir>' while 'deckrocket present' is running.");
        }
    }

    println!();
    println!("Configuration:");
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    for line in rendered.lines() {
        println!("  {line}");
    }

    Ok(())
}
