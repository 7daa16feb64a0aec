//! Undo/redo history with compound transactions.
//!
//! Two stacks of [`Action`]: `done` and `undone`. Adding an action outside a
//! compound clears the redo stack; inside a compound the contained actions
//! are collected and committed as one [`Action::Compound`] step when the
//! compound ends, clearing the redo stack exactly once.
//!
//! Undo applies the inverse of an action against the buffer/selection/caret
//! it is handed; redo re-applies it. When an undo would restore a state
//! identical to the current one it is a no-op that still reports a status
//! message and leaves `done` untouched.
//!
//! `BulkReplace`, `OpenFile` and `NewFile` are markers: history is cleared
//! by the operations that record them, so they carry no structural undo.

use std::path::PathBuf;

use core_text::{Buffer, Position};
use tracing::{debug, warn};

use crate::selection::SelectionModel;

/// One restorable line edit inside a block operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineChange {
    pub line_index: usize,
    pub original_text: String,
    pub new_text: String,
}

/// Shared payload of the four block-shaped actions. `token` is the indent
/// string for indent/unindent and the comment prefix for comment/uncomment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEdit {
    pub changes: Vec<LineChange>,
    pub token: String,
    pub selection_before: Option<(Position, Position)>,
    pub selection_after: Option<(Position, Position)>,
    pub cursor_before: Position,
    pub cursor_after: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Insert {
        text: String,
        pos: Position,
    },
    DeleteChar {
        ch: char,
        pos: Position,
    },
    /// A line merge: the caret sat at `pos` after the merge and
    /// `merged_line` is the content that was pulled up.
    DeleteNewline {
        merged_line: String,
        pos: Position,
    },
    DeleteSelection {
        segments: Vec<String>,
        start: Position,
        end: Position,
    },
    BlockIndent(BlockEdit),
    BlockUnindent(BlockEdit),
    CommentBlock(BlockEdit),
    UncommentBlock(BlockEdit),
    /// Marker: bulk replace clears history; only the count survives.
    BulkReplace {
        count: usize,
    },
    /// Marker recorded when a file is opened.
    OpenFile {
        path: Option<PathBuf>,
        content: String,
        encoding: String,
    },
    /// Marker recorded when a new unnamed buffer is created.
    NewFile {
        name: String,
    },
    /// A composite user gesture committed as one undo step.
    Compound(Vec<Action>),
}

impl Action {
    fn is_marker(&self) -> bool {
        matches!(
            self,
            Action::BulkReplace { .. } | Action::OpenFile { .. } | Action::NewFile { .. }
        )
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Action::Insert { .. } => "insert",
            Action::DeleteChar { .. } => "delete_char",
            Action::DeleteNewline { .. } => "delete_newline",
            Action::DeleteSelection { .. } => "delete_selection",
            Action::BlockIndent(_) => "block_indent",
            Action::BlockUnindent(_) => "block_unindent",
            Action::CommentBlock(_) => "comment_block",
            Action::UncommentBlock(_) => "uncomment_block",
            Action::BulkReplace { .. } => "bulk_replace",
            Action::OpenFile { .. } => "open_file",
            Action::NewFile { .. } => "new_file",
            Action::Compound(_) => "compound",
        }
    }
}

/// Result of an undo/redo attempt: whether buffer/caret/selection changed,
/// plus the status message to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryOutcome {
    pub changed: bool,
    pub message: String,
}

impl HistoryOutcome {
    fn status(message: impl Into<String>) -> Self {
        Self {
            changed: false,
            message: message.into(),
        }
    }

    fn changed(message: impl Into<String>) -> Self {
        Self {
            changed: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct History {
    done: Vec<Action>,
    undone: Vec<Action>,
    compound: Option<Vec<Action>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn undo_depth(&self) -> usize {
        self.done.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.undone.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Begin collecting actions into one compound step.
    pub fn begin_compound(&mut self) {
        if self.compound.is_none() {
            self.compound = Some(Vec::new());
            debug!(target: "state.history", "compound_begin");
        }
    }

    /// Commit the collected actions as a single step; the redo stack is
    /// cleared once here rather than per contained action.
    pub fn end_compound(&mut self) {
        if let Some(actions) = self.compound.take() {
            match actions.len() {
                0 => {}
                1 => self
                    .done
                    .push(actions.into_iter().next().expect("len checked")),
                _ => self.done.push(Action::Compound(actions)),
            }
            self.undone.clear();
            debug!(target: "state.history", depth = self.done.len(), "compound_end");
        }
    }

    pub fn add_action(&mut self, action: Action) {
        debug!(target: "state.history", kind = action.kind_name(), "add_action");
        match &mut self.compound {
            Some(pending) => pending.push(action),
            None => {
                self.done.push(action);
                self.undone.clear();
            }
        }
    }

    /// Drop everything; called on file open/new and after bulk replace.
    pub fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
        self.compound = None;
        debug!(target: "state.history", "cleared");
    }

    pub fn undo(
        &mut self,
        buffer: &mut Buffer,
        selection: &mut SelectionModel,
        caret: &mut Position,
    ) -> HistoryOutcome {
        let Some(last) = self.done.last() else {
            return HistoryOutcome::status("Nothing to undo");
        };
        if last.is_marker() {
            return HistoryOutcome::status(format!("Cannot undo {}", last.kind_name()));
        }
        let action = self.done.pop().expect("checked non-empty");

        // Apply against a trial copy first so a no-effect undo leaves the
        // done stack untouched.
        let mut trial_buf = buffer.clone();
        let mut trial_sel = selection.clone();
        let mut trial_caret = *caret;
        apply_undo(&action, &mut trial_buf, &mut trial_sel, &mut trial_caret);

        let changed = !same_content(&trial_buf, buffer)
            || trial_caret != *caret
            || trial_sel != *selection;
        if !changed {
            self.done.push(action);
            return HistoryOutcome::status("Undo: no effective change from current state");
        }

        *buffer = trial_buf;
        *selection = trial_sel;
        *caret = buffer.clamp(trial_caret);
        self.undone.push(action);
        HistoryOutcome::changed("Action undone")
    }

    pub fn redo(
        &mut self,
        buffer: &mut Buffer,
        selection: &mut SelectionModel,
        caret: &mut Position,
    ) -> HistoryOutcome {
        let Some(action) = self.undone.pop() else {
            return HistoryOutcome::status("Nothing to redo");
        };
        if action.is_marker() {
            // Markers never reach the redo stack through undo(); guard anyway.
            warn!(target: "state.history", kind = action.kind_name(), "marker_on_redo_stack");
            self.undone.push(action);
            return HistoryOutcome::status("Nothing to redo");
        }

        let mut trial_buf = buffer.clone();
        let mut trial_sel = selection.clone();
        let mut trial_caret = *caret;
        apply_redo(&action, &mut trial_buf, &mut trial_sel, &mut trial_caret);

        let changed = !same_content(&trial_buf, buffer)
            || trial_caret != *caret
            || trial_sel != *selection;
        if !changed {
            self.done.push(action);
            return HistoryOutcome::status("Redo: no effective change from current state");
        }

        *buffer = trial_buf;
        *selection = trial_sel;
        *caret = buffer.clamp(trial_caret);
        self.done.push(action);
        HistoryOutcome::changed("Action redone")
    }
}

fn same_content(a: &Buffer, b: &Buffer) -> bool {
    a.line_count() == b.line_count() && a.lines().eq(b.lines())
}

/// End position of `text` inserted at `pos` (for removing it again).
fn insert_end(pos: Position, text: &str) -> Position {
    let mut lines = text.split('\n');
    let first = lines.next().unwrap_or("");
    let mut end = Position::new(pos.row, pos.col + first.chars().count());
    for line in lines {
        end.row += 1;
        end.col = line.chars().count();
    }
    end
}

fn apply_undo(
    action: &Action,
    buffer: &mut Buffer,
    selection: &mut SelectionModel,
    caret: &mut Position,
) {
    match action {
        Action::Insert { text, pos } => {
            buffer.delete_range(*pos, insert_end(*pos, text));
            *caret = *pos;
        }
        Action::DeleteChar { ch, pos } => {
            let mut b = [0u8; 4];
            buffer.insert(*pos, ch.encode_utf8(&mut b));
            *caret = *pos;
        }
        Action::DeleteNewline { merged_line, pos } => {
            // Split back; the suffix past pos.col is exactly the merged line.
            debug_assert!(
                buffer
                    .line(pos.row)
                    .map(|l| l.chars().skip(pos.col).collect::<String>() == *merged_line)
                    .unwrap_or(false)
                    || merged_line.is_empty()
            );
            buffer.split_line(*pos);
            *caret = *pos;
        }
        Action::DeleteSelection {
            segments, start, ..
        } => {
            buffer.insert(*start, &segments.join("\n"));
            selection.cancel();
            *caret = *start;
        }
        Action::BlockIndent(edit)
        | Action::BlockUnindent(edit)
        | Action::CommentBlock(edit)
        | Action::UncommentBlock(edit) => {
            for change in edit.changes.iter().rev() {
                if change.line_index < buffer.line_count() {
                    if buffer.line(change.line_index) != Some(change.original_text.as_str()) {
                        buffer.set_line(change.line_index, change.original_text.clone());
                    }
                } else {
                    warn!(target: "state.history", line = change.line_index, "undo_block_line_out_of_range");
                }
            }
            match edit.selection_before {
                Some((anchor, end)) => {
                    selection.set(anchor, end);
                    *caret = end;
                }
                None => {
                    selection.cancel();
                    *caret = edit.cursor_before;
                }
            }
        }
        Action::Compound(actions) => {
            for inner in actions.iter().rev() {
                apply_undo(inner, buffer, selection, caret);
            }
        }
        Action::BulkReplace { .. } | Action::OpenFile { .. } | Action::NewFile { .. } => {}
    }
}

fn apply_redo(
    action: &Action,
    buffer: &mut Buffer,
    selection: &mut SelectionModel,
    caret: &mut Position,
) {
    match action {
        Action::Insert { text, pos } => {
            *caret = buffer.insert(*pos, text);
        }
        Action::DeleteChar { pos, .. } => {
            buffer.delete_char(*pos);
            *caret = *pos;
        }
        Action::DeleteNewline { pos, .. } => {
            buffer.merge_line_up(pos.row + 1);
            *caret = *pos;
        }
        Action::DeleteSelection { start, end, .. } => {
            buffer.delete_range(*start, *end);
            selection.cancel();
            *caret = *start;
        }
        Action::BlockIndent(edit)
        | Action::BlockUnindent(edit)
        | Action::CommentBlock(edit)
        | Action::UncommentBlock(edit) => {
            for change in &edit.changes {
                if change.line_index < buffer.line_count() {
                    if buffer.line(change.line_index) != Some(change.new_text.as_str()) {
                        buffer.set_line(change.line_index, change.new_text.clone());
                    }
                } else {
                    warn!(target: "state.history", line = change.line_index, "redo_block_line_out_of_range");
                }
            }
            match edit.selection_after {
                Some((anchor, end)) => {
                    selection.set(anchor, end);
                    *caret = end;
                }
                None => {
                    selection.cancel();
                    *caret = edit.cursor_after;
                }
            }
        }
        Action::Compound(actions) => {
            for inner in actions {
                apply_redo(inner, buffer, selection, caret);
            }
        }
        Action::BulkReplace { .. } | Action::OpenFile { .. } | Action::NewFile { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(lines: &[&str]) -> Buffer {
        Buffer::from_content(&lines.join("\n"))
    }

    fn lines_of(b: &Buffer) -> Vec<String> {
        b.lines().map(str::to_string).collect()
    }

    #[test]
    fn insert_then_undo_restores_buffer_and_caret() {
        let mut buffer = buf(&["hello"]);
        let mut selection = SelectionModel::new();
        let mut caret = Position::new(0, 5);
        let mut history = History::new();

        let pos = caret;
        caret = buffer.insert(pos, " world");
        history.add_action(Action::Insert {
            text: " world".to_string(),
            pos,
        });
        assert_eq!(buffer.line(0), Some("hello world"));
        assert_eq!(caret, Position::new(0, 11));

        let out = history.undo(&mut buffer, &mut selection, &mut caret);
        assert!(out.changed);
        assert_eq!(out.message, "Action undone");
        assert_eq!(buffer.line(0), Some("hello"));
        assert_eq!(caret, Position::new(0, 5));
        assert!(history.is_empty());
    }

    #[test]
    fn multi_line_insert_undo_rejoins_suffix() {
        let mut buffer = buf(&["abcd"]);
        let mut selection = SelectionModel::new();
        let mut caret = Position::new(0, 2);
        let mut history = History::new();

        caret = buffer.insert(Position::new(0, 2), "X\nYZ");
        history.add_action(Action::Insert {
            text: "X\nYZ".to_string(),
            pos: Position::new(0, 2),
        });
        assert_eq!(buffer.line(0), Some("abX"));
        assert_eq!(buffer.line(1), Some("YZcd"));

        history.undo(&mut buffer, &mut selection, &mut caret);
        assert_eq!(buffer.line(0), Some("abcd"));
        assert_eq!(caret, Position::new(0, 2));
    }

    #[test]
    fn delete_selection_round_trip() {
        let mut buffer = buf(&["abc", "def", "ghi"]);
        let mut selection = SelectionModel::new();
        let mut history = History::new();

        let start = Position::new(0, 1);
        let end = Position::new(2, 2);
        let segments = buffer.delete_range(start, end);
        let mut caret = start;
        history.add_action(Action::DeleteSelection {
            segments,
            start,
            end,
        });
        assert_eq!(buffer.line(0), Some("ai"));

        let out = history.undo(&mut buffer, &mut selection, &mut caret);
        assert!(out.changed);
        assert_eq!(
            lines_of(&buffer),
            vec!["abc", "def", "ghi", ""]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
        assert!(!selection.is_active());
        assert_eq!(caret, Position::new(0, 1));

        let out = history.redo(&mut buffer, &mut selection, &mut caret);
        assert!(out.changed);
        assert_eq!(buffer.line(0), Some("ai"));
        assert_eq!(caret, Position::new(0, 1));
    }

    #[test]
    fn undo_redo_inverse_over_sequence() {
        let mut buffer = buf(&["one"]);
        let mut selection = SelectionModel::new();
        let mut caret = Position::new(0, 3);
        let mut history = History::new();

        caret = buffer.insert(caret, "!");
        history.add_action(Action::Insert {
            text: "!".into(),
            pos: Position::new(0, 3),
        });
        caret = buffer.insert(caret, "\ntwo");
        history.add_action(Action::Insert {
            text: "\ntwo".into(),
            pos: Position::new(0, 4),
        });
        assert_eq!(caret, Position::new(1, 3));
        let deleted = buffer.delete_char(Position::new(1, 0)).unwrap();
        history.add_action(Action::DeleteChar {
            ch: deleted,
            pos: Position::new(1, 0),
        });
        caret = Position::new(1, 0);

        let snapshot = (lines_of(&buffer), caret, selection.clone());
        for _ in 0..3 {
            history.undo(&mut buffer, &mut selection, &mut caret);
        }
        assert_eq!(lines_of(&buffer), vec!["one".to_string(), String::new()]);
        for _ in 0..3 {
            history.redo(&mut buffer, &mut selection, &mut caret);
        }
        assert_eq!((lines_of(&buffer), caret, selection.clone()), snapshot);
    }

    #[test]
    fn compound_is_single_undo_step() {
        let mut buffer = buf(&["hello world"]);
        let mut selection = SelectionModel::new();
        let mut caret;
        let mut history = History::new();

        // Overwrite-with-selection: delete "hello", insert "bye".
        history.begin_compound();
        let segments = buffer.delete_range(Position::new(0, 0), Position::new(0, 5));
        history.add_action(Action::DeleteSelection {
            segments,
            start: Position::new(0, 0),
            end: Position::new(0, 5),
        });
        caret = buffer.insert(Position::new(0, 0), "bye");
        history.add_action(Action::Insert {
            text: "bye".into(),
            pos: Position::new(0, 0),
        });
        history.end_compound();

        assert_eq!(buffer.line(0), Some("bye world"));
        assert_eq!(history.undo_depth(), 1);

        history.undo(&mut buffer, &mut selection, &mut caret);
        assert_eq!(buffer.line(0), Some("hello world"));

        history.redo(&mut buffer, &mut selection, &mut caret);
        assert_eq!(buffer.line(0), Some("bye world"));
        assert_eq!(caret, Position::new(0, 3));
    }

    #[test]
    fn add_action_outside_compound_clears_redo() {
        let mut buffer = buf(&["a"]);
        let mut selection = SelectionModel::new();
        let mut caret = Position::new(0, 1);
        let mut history = History::new();

        caret = buffer.insert(caret, "b");
        history.add_action(Action::Insert {
            text: "b".into(),
            pos: Position::new(0, 1),
        });
        history.undo(&mut buffer, &mut selection, &mut caret);
        assert_eq!(history.redo_depth(), 1);

        caret = buffer.insert(caret, "c");
        history.add_action(Action::Insert {
            text: "c".into(),
            pos: Position::new(0, 1),
        });
        assert_eq!(history.redo_depth(), 0);
    }

    #[test]
    fn block_edit_restores_selection_exactly() {
        let mut buffer = buf(&["foo", "bar"]);
        let mut selection = SelectionModel::new();
        let mut caret;
        let mut history = History::new();

        // Block indent by two spaces.
        let edit = BlockEdit {
            changes: vec![
                LineChange {
                    line_index: 0,
                    original_text: "foo".into(),
                    new_text: "  foo".into(),
                },
                LineChange {
                    line_index: 1,
                    original_text: "bar".into(),
                    new_text: "  bar".into(),
                },
            ],
            token: "  ".into(),
            selection_before: Some((Position::new(0, 0), Position::new(1, 3))),
            selection_after: Some((Position::new(0, 2), Position::new(1, 5))),
            cursor_before: Position::new(1, 3),
            cursor_after: Position::new(1, 5),
        };
        buffer.set_line(0, "  foo");
        buffer.set_line(1, "  bar");
        selection.set(Position::new(0, 2), Position::new(1, 5));
        caret = Position::new(1, 5);
        history.add_action(Action::BlockIndent(edit));

        history.undo(&mut buffer, &mut selection, &mut caret);
        assert_eq!(buffer.line(0), Some("foo"));
        assert_eq!(buffer.line(1), Some("bar"));
        assert_eq!(
            selection.normalized(),
            Some((Position::new(0, 0), Position::new(1, 3)))
        );
        assert_eq!(caret, Position::new(1, 3));

        history.redo(&mut buffer, &mut selection, &mut caret);
        assert_eq!(buffer.line(0), Some("  foo"));
        assert_eq!(
            selection.normalized(),
            Some((Position::new(0, 2), Position::new(1, 5)))
        );
    }

    #[test]
    fn undo_with_no_effect_keeps_done_stack() {
        let mut buffer = buf(&["same"]);
        let mut selection = SelectionModel::new();
        let mut caret = Position::origin();
        let mut history = History::new();

        // A block action whose original and new text are identical.
        history.add_action(Action::CommentBlock(BlockEdit {
            changes: vec![LineChange {
                line_index: 0,
                original_text: "same".into(),
                new_text: "same".into(),
            }],
            token: "# ".into(),
            selection_before: None,
            selection_after: None,
            cursor_before: Position::origin(),
            cursor_after: Position::origin(),
        }));

        let out = history.undo(&mut buffer, &mut selection, &mut caret);
        assert!(!out.changed);
        assert_eq!(out.message, "Undo: no effective change from current state");
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn markers_refuse_structural_undo() {
        let mut buffer = buf(&["x"]);
        let mut selection = SelectionModel::new();
        let mut caret = Position::origin();
        let mut history = History::new();
        history.clear();
        history.add_action(Action::BulkReplace { count: 3 });

        let out = history.undo(&mut buffer, &mut selection, &mut caret);
        assert!(!out.changed);
        assert!(out.message.contains("bulk_replace"));
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    fn empty_stacks_report_status() {
        let mut buffer = buf(&["x"]);
        let mut selection = SelectionModel::new();
        let mut caret = Position::origin();
        let mut history = History::new();
        assert_eq!(
            history.undo(&mut buffer, &mut selection, &mut caret).message,
            "Nothing to undo"
        );
        assert_eq!(
            history.redo(&mut buffer, &mut selection, &mut caret).message,
            "Nothing to redo"
        );
    }
}
