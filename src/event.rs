#![forbid(unsafe_code)]

//! Canonical decoded-input event types.
//!
//! Everything the decoder emits is one of these. All types derive `Clone`,
//! `PartialEq`, and `Eq` for use in tests and pattern matching.
//!
//! # Design Notes
//!
//! - A [`KeyEvent`] always carries the raw `sequence` text that produced it,
//!   so downstream consumers can re-match against the original input.
//! - Terminal focus reports are classified inside the decoder and discarded;
//!   there is no focus variant here.
//! - Pasted and drag-dropped content both surface as [`Event::Paste`],
//!   distinguished by [`PasteSource`].

use bitflags::bitflags;

/// A fully decoded logical input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A keyboard event.
    Key(KeyEvent),

    /// Coalesced text from bracketed paste or a file drag-drop.
    Paste(PasteEvent),
}

/// A keyboard event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key that was pressed.
    pub code: KeyCode,

    /// Modifier keys held during the event.
    pub modifiers: Modifiers,

    /// The raw text that produced this event.
    ///
    /// Empty only for events synthesized without terminal input.
    pub sequence: String,
}

impl KeyEvent {
    /// Create a key event with no modifiers and an empty sequence.
    #[must_use]
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
            sequence: String::new(),
        }
    }

    /// Attach modifiers.
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Attach the raw sequence text.
    #[must_use]
    pub fn with_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.sequence = sequence.into();
        self
    }

    /// Check if this is a specific character key.
    #[must_use]
    pub fn is_char(&self, c: char) -> bool {
        matches!(self.code, KeyCode::Char(ch) if ch == c)
    }

    /// Check if Ctrl is held.
    #[must_use]
    pub fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }

    /// Check if Alt/Meta is held.
    #[must_use]
    pub fn alt(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    /// Check if Shift is held.
    #[must_use]
    pub fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }

    /// True for the Ctrl+C interrupt key.
    #[must_use]
    pub fn is_interrupt(&self) -> bool {
        self.ctrl() && self.is_char('c')
    }
}

/// Key codes for keyboard events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A regular character key.
    Char(char),

    /// Enter/Return.
    Enter,

    /// Escape.
    Escape,

    /// Backspace.
    Backspace,

    /// Tab.
    Tab,

    /// Shift+Tab (back-tab).
    BackTab,

    /// Delete.
    Delete,

    /// Insert.
    Insert,

    /// Home.
    Home,

    /// End.
    End,

    /// Page Up.
    PageUp,

    /// Page Down.
    PageDown,

    /// Up arrow.
    Up,

    /// Down arrow.
    Down,

    /// Left arrow.
    Left,

    /// Right arrow.
    Right,

    /// Function key (F1-F24).
    F(u8),

    /// Null character (Ctrl+Space or Ctrl+@).
    Null,
}

bitflags! {
    /// Modifier keys that can be held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b0000;
        /// Shift key.
        const SHIFT = 0b0001;
        /// Alt/Option/Meta key.
        const ALT   = 0b0010;
        /// Control key.
        const CTRL  = 0b0100;
        /// Super/Command key.
        const SUPER = 0b1000;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

/// Coalesced text delivered as a single logical event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteEvent {
    /// The text content, with line endings normalized to `\n`.
    pub text: String,

    /// How the text arrived.
    pub source: PasteSource,
}

impl PasteEvent {
    /// Create a paste event.
    #[must_use]
    pub fn new(text: impl Into<String>, source: PasteSource) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }

    /// Create a bracketed-paste event (the common case).
    #[must_use]
    pub fn bracketed(text: impl Into<String>) -> Self {
        Self::new(text, PasteSource::Bracketed)
    }

    /// Create a file-drop event.
    #[must_use]
    pub fn file_drop(text: impl Into<String>) -> Self {
        Self::new(text, PasteSource::FileDrop)
    }
}

/// How coalesced text arrived at the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PasteSource {
    /// Wrapped in bracketed-paste markers by the terminal.
    #[default]
    Bracketed,

    /// Accumulated from a file drag-drop burst.
    FileDrop,
}
