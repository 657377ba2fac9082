//! # deck-types
//!
//! Wire format types for the DeckRocket presenter.
//!
//! This crate provides the foundational types used across all DeckRocket crates:
//! - [`PeerId`] - Opaque identity of a mesh peer
//! - [`Slide`], [`Deck`], [`SlideIndex`] - The presentation being shown
//! - [`MeshMessage`] - Payloads carried by the local mesh transport
//! - [`RowUpdate`] - Single-index updates from the companion device
//! - [`DeckError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;
mod slide;

pub use error::DeckError;
pub use ids::PeerId;
pub use messages::{MeshMessage, RowUpdate};
pub use slide::{Deck, Slide, SlideIndex};
