//! What the reader reads from and highlights into.

use std::fmt;

/// Opaque id of a UI element that can be marked as being read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HighlightHandle(String);

impl HighlightHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HighlightHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One highlightable element and the length of the text it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightTarget {
    pub handle: HighlightHandle,
    pub text_len: usize,
}

/// The text currently on screen, in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleTextSnapshot {
    pub text: String,
    pub highlight_targets: Vec<HighlightTarget>,
}

/// Document text provider.
pub trait TextSource: Send + Sync {
    /// Polled once at the start of every session.
    fn visible_text(&self) -> VisibleTextSnapshot;

    fn full_text(&self) -> String;
}

/// Applies highlight state to UI elements.
pub trait Highlighter: Send + Sync {
    fn set_active(&self, handle: &HighlightHandle, active: bool);
}

/// Highlighter for front ends without highlightable elements.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHighlight;

impl Highlighter for NoHighlight {
    fn set_active(&self, _handle: &HighlightHandle, _active: bool) {}
}
