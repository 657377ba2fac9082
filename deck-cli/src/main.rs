//! # deckrocket
//!
//! Slide remote for presenters: keeps a mesh of nearby devices and a paired
//! companion on the same slide.
//!
//! ## Commands
//!
//! - `present`: Run the presenter
//! - `companion`: Simulate the companion device
//! - `spectate`: Join the mesh and follow along
//! - `send-deck`: Push a directory of slide images to the mesh
//! - `status`: Show configuration and cached deck
//!
//! ## Example
//!
//! ```bash
//! # On the presenter machine
//! deckrocket present
//!
//! # From the machine with the slides
//! deckrocket send-deck ./talk
//!
//! # Pretend to be the companion
//! deckrocket companion --connect 192.168.1.20:48612
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod surface;

use commands::{companion, present, send_deck, spectate, status};
use config::PresenterConfig;

/// Slide remote for presenters.
#[derive(Parser, Debug)]
#[command(name = "deckrocket")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the cached deck
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the presenter (type a slide number to navigate, `q` to quit)
    Present,

    /// Simulate the companion device
    Companion {
        /// Presenter's companion address
        #[arg(long)]
        connect: SocketAddr,
    },

    /// Join the mesh and print every slide change
    Spectate,

    /// Push a directory of slide images to the mesh
    SendDeck {
        /// Directory with one image per slide (sorted by name) and an
        /// optional notes.json
        dir: PathBuf,

        /// Seconds to wait for a mesh session
        #[arg(long, default_value = "60")]
        wait: u64,
    },

    /// Show configuration and cached deck
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PresenterConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PresenterConfig::default(),
    };

    // Determine data directory
    let data_dir = match cli.data_dir.or_else(|| config.store.data_dir.clone()) {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    match cli.command {
        Commands::Present => {
            present::run(&config, &data_dir).await?;
        }
        Commands::Companion { connect } => {
            companion::run(&config, connect).await?;
        }
        Commands::Spectate => {
            spectate::run(&config).await?;
        }
        Commands::SendDeck { dir, wait } => {
            send_deck::run(&config, &dir, wait).await?;
        }
        Commands::Status => {
            status::run(&config, &data_dir).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("deckrocket=info,deckrocket_client=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Get the default data directory for deckrocket.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "deckrocket", "deckrocket")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
