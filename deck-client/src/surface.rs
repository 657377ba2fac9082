//! The presenter's view of its UI.

use deckrocket_core::IndicatorColor;
use deckrocket_types::{Deck, SlideIndex};

/// Slide display driven by the sync controller.
///
/// Implementations render however they like; the controller only needs to
/// read the current position and push state in.
pub trait PresentationSurface {
    /// Slide currently shown.
    fn current_slide_index(&self) -> SlideIndex;

    /// Bring a slide into view.
    fn scroll_to(&mut self, index: SlideIndex);

    /// Redraw with new slides. `None` clears the display.
    fn refresh_deck(&mut self, deck: Option<&Deck>);

    /// Recolor the connection indicator.
    fn set_indicator_color(&mut self, color: IndicatorColor);

    /// Show or hide the "no deck loaded" onboarding prompt.
    fn show_onboarding(&mut self, visible: bool);
}

/// Surface that records what it was told, for tests and headless runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSurface {
    /// Slide in view.
    pub position: SlideIndex,
    /// Slides in the last refresh.
    pub slide_count: usize,
    /// Whether the onboarding prompt is up.
    pub onboarding_visible: bool,
    /// Last indicator color.
    pub indicator: Option<IndicatorColor>,
    /// Every `scroll_to` target, in order.
    pub scrolls: Vec<SlideIndex>,
    /// Number of refreshes.
    pub refreshes: usize,
}

impl RecordingSurface {
    /// Empty surface with the onboarding prompt up.
    pub fn new() -> Self {
        Self {
            position: SlideIndex::FIRST,
            slide_count: 0,
            onboarding_visible: true,
            indicator: None,
            scrolls: Vec::new(),
            refreshes: 0,
        }
    }

    /// Simulate the presenter swiping, without recording a programmatic scroll.
    pub fn swipe_to(&mut self, index: SlideIndex) {
        self.position = index;
    }
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationSurface for RecordingSurface {
    fn current_slide_index(&self) -> SlideIndex {
        self.position
    }

    fn scroll_to(&mut self, index: SlideIndex) {
        self.position = index;
        self.scrolls.push(index);
    }

    fn refresh_deck(&mut self, deck: Option<&Deck>) {
        self.slide_count = deck.map_or(0, Deck::len);
        self.refreshes += 1;
    }

    fn set_indicator_color(&mut self, color: IndicatorColor) {
        self.indicator = Some(color);
    }

    fn show_onboarding(&mut self, visible: bool) {
        self.onboarding_visible = visible;
    }
}
