//! Anchor/caret selection state machine.
//!
//! Two states: `Idle` (no selection) and `Active`. Any extend operation
//! moves to `Active`, anchoring at the caret position it was given if the
//! model was idle; any plain navigation cancels back to `Idle` before the
//! caret moves. Consumers read normalized `(start, end)` coordinates only.

use core_text::Position;

/// The selection endpoints as the user created them: `anchor` is fixed,
/// `caret` follows the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionSpan {
    pub anchor: Position,
    pub caret: Position,
}

impl SelectionSpan {
    /// `(start, end)` in row-then-column order. Normalizing an already
    /// normalized range returns the same range.
    pub fn normalized(&self) -> (Position, Position) {
        if self.anchor <= self.caret {
            (self.anchor, self.caret)
        } else {
            (self.caret, self.anchor)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.caret
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionModel {
    active: Option<SelectionSpan>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn span(&self) -> Option<SelectionSpan> {
        self.active
    }

    /// Normalized endpoints of the active selection, if any.
    pub fn normalized(&self) -> Option<(Position, Position)> {
        self.active.map(|span| span.normalized())
    }

    /// Begin (or continue) extending: anchors at `caret` when idle.
    pub fn extend_from(&mut self, caret: Position) {
        if self.active.is_none() {
            self.active = Some(SelectionSpan {
                anchor: caret,
                caret,
            });
        }
    }

    /// Move the caret endpoint of an active selection.
    pub fn extend_to(&mut self, caret: Position) {
        if let Some(span) = &mut self.active {
            span.caret = caret;
        }
    }

    /// Replace the selection wholesale (select-all, restore after undo).
    pub fn set(&mut self, anchor: Position, caret: Position) {
        self.active = Some(SelectionSpan { anchor, caret });
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_anchors_once() {
        let mut sel = SelectionModel::new();
        sel.extend_from(Position::new(1, 2));
        sel.extend_to(Position::new(3, 0));
        sel.extend_from(Position::new(3, 0)); // second extend keeps anchor
        sel.extend_to(Position::new(0, 1));
        let (start, end) = sel.normalized().unwrap();
        assert_eq!(start, Position::new(0, 1));
        assert_eq!(end, Position::new(1, 2));
    }

    #[test]
    fn normalization_is_idempotent() {
        let span = SelectionSpan {
            anchor: Position::new(2, 5),
            caret: Position::new(0, 1),
        };
        let (start, end) = span.normalized();
        let renorm = SelectionSpan {
            anchor: start,
            caret: end,
        };
        assert_eq!(renorm.normalized(), (start, end));
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut sel = SelectionModel::new();
        sel.extend_from(Position::origin());
        assert!(sel.is_active());
        sel.cancel();
        assert!(!sel.is_active());
        assert_eq!(sel.normalized(), None);
    }
}
