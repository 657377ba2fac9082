//! Terminal stand-in for the slide view.

use deckrocket_client::PresentationSurface;
use deckrocket_core::IndicatorColor;
use deckrocket_types::{Deck, SlideIndex};

/// Prints slide changes, indicator colors, and speaker notes to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSurface {
    position: SlideIndex,
    notes: Vec<String>,
    indicator: Option<IndicatorColor>,
}

impl ConsoleSurface {
    /// Create a surface with nothing loaded.
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&self, index: SlideIndex) -> String {
        let mut line = format!("slide {}/{}", index.value() + 1, self.notes.len());
        match self.notes.get(index.value()) {
            Some(notes) if !notes.is_empty() => {
                line.push_str(" | ");
                line.push_str(notes);
            }
            _ => {}
        }
        line
    }
}

impl PresentationSurface for ConsoleSurface {
    fn current_slide_index(&self) -> SlideIndex {
        self.position
    }

    fn scroll_to(&mut self, index: SlideIndex) {
        self.position = index;
        if !self.notes.is_empty() {
            println!("{}", self.line(index));
        }
    }

    fn refresh_deck(&mut self, deck: Option<&Deck>) {
        self.notes = deck
            .map(|deck| deck.iter().map(|slide| slide.notes().to_string()).collect())
            .unwrap_or_default();
        if let Some(deck) = deck {
            println!("deck loaded: {} slides", deck.len());
        }
    }

    fn set_indicator_color(&mut self, color: IndicatorColor) {
        if self.indicator != Some(color) {
            println!("[{color}]");
            self.indicator = Some(color);
        }
    }

    fn show_onboarding(&mut self, visible: bool) {
        if visible {
            println!("no deck yet: run `deckrocket send-deck <dir>` on the mesh");
        }
    }
}
