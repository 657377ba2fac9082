//! # deck-core
//!
//! Pure logic for the DeckRocket presenter (no I/O, instant tests).
//!
//! This crate implements the peer connection state machine and the
//! navigation relay rules without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (sockets, disk, UI) is performed by `deck-client`, which
//! interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod indicator;
pub mod navigation;
pub mod state;

pub use indicator::IndicatorColor;
pub use navigation::{plan, NavigationSource, Relay};
pub use state::{
    Action, ConnectionState, Event, PeerMachine, PeerPolicy, PeerRecord, DEFAULT_INVITE_TIMEOUT,
};
