//! Navigation relay rules.
//!
//! Decides what a slide-index change does depending on where it came from.
//! The controller in deck-client executes the returned relays.
//!
//! | source    | scroll surface | broadcast on mesh |
//! |-----------|----------------|-------------------|
//! | local     | no (already there) | yes           |
//! | mesh      | yes            | no (would loop back) |
//! | companion | yes            | yes               |
//!
//! There is no sequence number on index messages: the last one applied wins,
//! even if the network delivered it out of order.

use deckrocket_types::SlideIndex;

/// Where a navigation event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationSource {
    /// The presenter scrolled the surface.
    Local,
    /// A peer on the mesh.
    Mesh,
    /// The companion device.
    Companion,
}

/// One step of applying a navigation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    /// Move the presentation surface.
    ScrollTo(SlideIndex),
    /// Send the index to mesh peers.
    BroadcastMesh(SlideIndex),
}

/// Plan the relays for `index` arriving from `source`.
///
/// Returns nothing when `index` is outside a deck of `deck_len` slides.
pub fn plan(source: NavigationSource, index: SlideIndex, deck_len: usize) -> Vec<Relay> {
    if index.value() >= deck_len {
        return vec![];
    }
    match source {
        NavigationSource::Local => vec![Relay::BroadcastMesh(index)],
        NavigationSource::Mesh => vec![Relay::ScrollTo(index)],
        NavigationSource::Companion => vec![Relay::ScrollTo(index), Relay::BroadcastMesh(index)],
    }
}
