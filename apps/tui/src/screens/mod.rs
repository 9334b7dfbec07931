//! TUI screen definitions.
//!
//! Each screen corresponds to a tab in the TUI. Screens keep only view
//! state; the picklist and its progress live in the shared [`Session`].

mod picklist;
mod summary;

use std::fmt;

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;

use crate::session::Session;

/// Screen identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScreenId {
    Picklist,
    Summary,
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Picklist => write!(f, "Picklist"),
            Self::Summary => write!(f, "Summary"),
        }
    }
}

/// Per-screen view state.
pub(crate) struct Screens {
    picklist: picklist::PicklistScreen,
    summary: summary::SummaryScreen,
}

impl Screens {
    pub(crate) fn new() -> Self {
        Self {
            picklist: picklist::PicklistScreen::new(),
            summary: summary::SummaryScreen::new(),
        }
    }

    /// Whether the screen has an active text input field.
    pub(crate) fn is_editing(&self, id: ScreenId) -> bool {
        match id {
            ScreenId::Picklist => self.picklist.is_editing(),
            ScreenId::Summary => false,
        }
    }

    pub(crate) fn draw(&self, id: ScreenId, f: &mut Frame, area: Rect, session: &Session) {
        match id {
            ScreenId::Picklist => self.picklist.draw(f, area, session),
            ScreenId::Summary => self.summary.draw(f, area, session),
        }
    }

    /// Returns a status bar message when the key did something worth saying.
    pub(crate) fn handle_key(
        &mut self,
        id: ScreenId,
        code: KeyCode,
        modifiers: KeyModifiers,
        session: &mut Session,
    ) -> Option<String> {
        match id {
            ScreenId::Picklist => self.picklist.handle_key(code, modifiers, session),
            ScreenId::Summary => self.summary.handle_key(code, modifiers, session),
        }
    }

    /// Work to do between frames, e.g. fetching the selected card's image.
    pub(crate) fn tick(&mut self, id: ScreenId, session: &mut Session) {
        if id == ScreenId::Picklist {
            self.picklist.tick(session);
        }
    }
}
