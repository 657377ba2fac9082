//! Payloads exchanged over the mesh and companion transports.

use serde::{Deserialize, Serialize};

use crate::{Deck, DeckError, SlideIndex};

/// A message carried by the local mesh transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshMessage {
    /// Move to a slide. On the wire: the index as a UTF-8 decimal string.
    Navigate(SlideIndex),
    /// Replace the whole deck. On the wire: the deck's MessagePack form.
    Deck(Deck),
}

impl MeshMessage {
    /// Encode for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DeckError> {
        match self {
            Self::Navigate(index) => Ok(index.to_string().into_bytes()),
            Self::Deck(deck) => deck.to_bytes(),
        }
    }

    /// Classify and decode a mesh payload.
    ///
    /// Decimal text is a navigation; a MessagePack slide array is a deck push.
    /// Anything else is rejected so the caller can ignore it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeckError> {
        if let Ok(text) = std::str::from_utf8(bytes) {
            let text = text.trim();
            if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
                return text
                    .parse::<usize>()
                    .map(|value| Self::Navigate(SlideIndex::new(value)))
                    .map_err(|e| DeckError::InvalidIndex(e.to_string()));
            }
        }

        Deck::from_bytes(bytes)
            .map(Self::Deck)
            .map_err(|_| DeckError::UnrecognizedPayload(bytes.len()))
    }
}

/// Single-index update exchanged with the companion device.
///
/// On the wire this is a MessagePack map `{"row": <float>}`. Extra keys are
/// ignored; a missing `row` key makes the payload invalid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowUpdate {
    /// Slide position as a float, as the companion reports it.
    pub row: f64,
}

impl RowUpdate {
    /// Build an update pointing at `index`.
    pub fn new(index: SlideIndex) -> Self {
        Self {
            row: index.value() as f64,
        }
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DeckError> {
        rmp_serde::to_vec_named(self).map_err(DeckError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeckError> {
        rmp_serde::from_slice(bytes).map_err(DeckError::Deserialization)
    }

    /// The slide this update points at.
    ///
    /// Fractional rows round to the nearest slide. Negative or non-finite
    /// rows have no slide.
    pub fn slide_index(&self) -> Option<SlideIndex> {
        if self.row.is_finite() && self.row >= 0.0 {
            Some(SlideIndex::new(self.row.round() as usize))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Slide;
    use std::collections::BTreeMap;

    #[test]
    fn navigate_encodes_as_decimal_text() {
        let bytes = MeshMessage::Navigate(SlideIndex::new(3)).to_bytes().unwrap();
        assert_eq!(bytes, b"3");
    }

    #[test]
    fn decimal_text_decodes_as_navigate() {
        assert_eq!(
            MeshMessage::from_bytes(b"12").unwrap(),
            MeshMessage::Navigate(SlideIndex::new(12))
        );
        assert_eq!(
            MeshMessage::from_bytes(b" 4\n").unwrap(),
            MeshMessage::Navigate(SlideIndex::new(4))
        );
    }

    #[test]
    fn deck_payload_decodes_as_deck() {
        let deck = Deck::new(vec![Slide::new(vec![9, 9], "a"), Slide::new(vec![8], "b")]);
        let bytes = MeshMessage::Deck(deck.clone()).to_bytes().unwrap();

        assert_eq!(MeshMessage::from_bytes(&bytes).unwrap(), MeshMessage::Deck(deck));
    }

    #[test]
    fn other_payloads_are_rejected() {
        let payloads: [&[u8]; 5] = [b"hello", b"-1", b"2.5", b"", b"\xff\xfe"];
        for payload in payloads {
            assert!(
                MeshMessage::from_bytes(payload).is_err(),
                "payload {:?} should be rejected",
                payload
            );
        }
    }

    #[test]
    fn oversized_index_is_invalid() {
        let result = MeshMessage::from_bytes(b"99999999999999999999999999");
        assert!(matches!(result, Err(DeckError::InvalidIndex(_))));
    }

    #[test]
    fn row_update_is_a_row_keyed_map() {
        let bytes = RowUpdate::new(SlideIndex::new(2)).to_bytes().unwrap();
        let map: BTreeMap<String, f64> = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(map.get("row"), Some(&2.0));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn row_update_ignores_extra_keys() {
        let mut map = BTreeMap::new();
        map.insert("row", 1.0);
        map.insert("extra", 7.0);
        let bytes = rmp_serde::to_vec_named(&map).unwrap();

        let update = RowUpdate::from_bytes(&bytes).unwrap();
        assert_eq!(update.slide_index(), Some(SlideIndex::new(1)));
    }

    #[test]
    fn row_update_without_row_key_is_invalid() {
        let mut map = BTreeMap::new();
        map.insert("column", 1.0);
        let bytes = rmp_serde::to_vec_named(&map).unwrap();

        assert!(RowUpdate::from_bytes(&bytes).is_err());
    }

    #[test]
    fn row_slide_index_rounds_and_rejects_negatives() {
        assert_eq!(RowUpdate { row: 2.0 }.slide_index(), Some(SlideIndex::new(2)));
        assert_eq!(RowUpdate { row: 2.4 }.slide_index(), Some(SlideIndex::new(2)));
        assert_eq!(RowUpdate { row: 2.6 }.slide_index(), Some(SlideIndex::new(3)));
        assert_eq!(RowUpdate { row: -1.0 }.slide_index(), None);
        assert_eq!(RowUpdate { row: f64::NAN }.slide_index(), None);
        assert_eq!(RowUpdate { row: f64::INFINITY }.slide_index(), None);
    }

    #[test]
    fn row_update_json_shape_matches_wire_keys() {
        let json = serde_json::to_string(&RowUpdate { row: 2.0 }).unwrap();
        assert_eq!(json, r#"{"row":2.0}"#);
    }
}
