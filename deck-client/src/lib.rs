//! # deck-client
//!
//! Presenter runtime for DeckRocket.
//!
//! This is the library the presenter application embeds. It connects the
//! pure state machine from deck-core to real transports and to the UI.
//!
//! ## Features
//!
//! - **Transport Abstraction**: mesh and companion transports behind traits
//!   (LAN, TCP link, mock)
//! - **Peer Sessions**: automatic invitation and reconnection driven by
//!   discovery events
//! - **Slide Sync**: deck pushes and slide-index relay across both transports
//! - **Single Owner**: all state lives on one task; transports hand events
//!   over through a [`Dispatcher`]
//!
//! ## Example
//!
//! ```ignore
//! use deckrocket_client::{
//!     Dispatcher, MockCompanionTransport, MockMeshTransport, PeerConnection, Presenter,
//!     RecordingSurface, SyncController,
//! };
//!
//! let controller = SyncController::new(
//!     PeerConnection::new(MockMeshTransport::new()),
//!     MockCompanionTransport::new(),
//!     RecordingSurface::new(),
//! );
//! let mut presenter = Presenter::new(controller, None);
//! let (dispatcher, inbox) = Dispatcher::channel();
//! presenter.start(&dispatcher).await?;
//! presenter.run(inbox).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod controller;
pub mod dispatch;
pub mod peer;
pub mod presenter;
pub mod store;
pub mod surface;
pub mod transport;

pub use controller::SyncController;
pub use dispatch::{Dispatcher, Inbound};
pub use peer::PeerConnection;
pub use presenter::Presenter;
pub use store::{DeckStore, StoreError, SLIDES_FILE_NAME};
pub use surface::{PresentationSurface, RecordingSurface};
pub use transport::{
    CompanionEvent, CompanionTransport, LanMeshConfig, LanMeshTransport, LinkCompanionTransport,
    LinkConfig, LinkRole, MeshEvent, MeshTransport, MockCompanionTransport, MockMeshTransport,
    Observer, Reply, TransportError, DEFAULT_DISCOVERY_PORT, DEFAULT_SERVICE, MAX_MESSAGE_SIZE,
};
