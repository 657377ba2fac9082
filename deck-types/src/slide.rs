//! Slide model: slides, decks, and slide positions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DeckError;

/// One slide of a presentation.
///
/// Immutable once constructed. Serializes as a map with `image` and `notes`
/// keys, which is the form the companion device and the slide cache expect.
/// The image is a binary blob; an integer array is still accepted on decode.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    #[serde(with = "serde_bytes")]
    image: Vec<u8>,
    #[serde(default)]
    notes: String,
}

impl Slide {
    /// Create a slide from encoded image bytes and speaker notes.
    pub fn new(image: impl Into<Vec<u8>>, notes: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            notes: notes.into(),
        }
    }

    /// Encoded image bytes. The presenter never decodes them.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Speaker notes.
    pub fn notes(&self) -> &str {
        &self.notes
    }
}

impl fmt::Debug for Slide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slide")
            .field("image", &format!("[{} bytes]", self.image.len()))
            .field("notes", &self.notes)
            .finish()
    }
}

/// An ordered, immutable sequence of slides.
///
/// A slide's ordinal is its position in the deck. Decks are never edited in
/// place; a new deck replaces the old one wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deck {
    slides: Vec<Slide>,
}

impl Deck {
    /// Create a deck from slides in presentation order.
    pub fn new(slides: Vec<Slide>) -> Self {
        Self { slides }
    }

    /// Number of slides.
    pub fn len(&self) -> usize {
        self.slides.len()
    }

    /// True when the deck holds no slides.
    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    /// Slide at `index`, if inside the deck.
    pub fn get(&self, index: SlideIndex) -> Option<&Slide> {
        self.slides.get(index.value())
    }

    /// Check that `index` addresses a slide of this deck.
    pub fn contains(&self, index: SlideIndex) -> bool {
        index.value() < self.slides.len()
    }

    /// Iterate slides in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Slide> {
        self.slides.iter()
    }

    /// Serialize to MessagePack: an array of `{image, notes}` maps.
    ///
    /// Used for full-deck pushes on both transports and for the slide cache.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DeckError> {
        rmp_serde::to_vec_named(self).map_err(DeckError::Serialization)
    }

    /// Deserialize from MessagePack bytes produced by [`Deck::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeckError> {
        rmp_serde::from_slice(bytes).map_err(DeckError::Deserialization)
    }
}

impl From<Vec<Slide>> for Deck {
    fn from(slides: Vec<Slide>) -> Self {
        Self::new(slides)
    }
}

impl<'a> IntoIterator for &'a Deck {
    type Item = &'a Slide;
    type IntoIter = std::slice::Iter<'a, Slide>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Position of the current slide within a deck.
///
/// Zero-based. Whether it is in bounds depends on the deck it is applied to;
/// see [`Deck::contains`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SlideIndex(usize);

impl SlideIndex {
    /// The first slide.
    pub const FIRST: SlideIndex = SlideIndex(0);

    /// Create a slide index.
    pub const fn new(value: usize) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub const fn value(&self) -> usize {
        self.0
    }
}

impl From<usize> for SlideIndex {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl fmt::Display for SlideIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
