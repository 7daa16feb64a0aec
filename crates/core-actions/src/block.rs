//! Block indent / unindent over the selected line range.
//!
//! Both operations record per-line change sets plus the exact selection and
//! caret before/after, so undo restores them precisely. Blank lines inside
//! the range are left untouched.

use core_config::EditorSection;
use core_state::{Action, BlockEdit, EditorState, LineChange};
use core_text::Position;

fn target_rows(state: &EditorState) -> (usize, usize) {
    match state.selection.normalized() {
        Some((start, end)) => (start.row, end.row.min(state.buffer.line_count() - 1)),
        None => (state.caret.row, state.caret.row),
    }
}

fn indent_unit(cfg: &EditorSection) -> String {
    if cfg.use_spaces {
        " ".repeat(cfg.tab_size)
    } else {
        "\t".to_string()
    }
}

/// Indent every non-blank line in the selected range by one unit.
pub fn indent_block(state: &mut EditorState, cfg: &EditorSection) -> bool {
    let (first, last) = target_rows(state);
    let unit = indent_unit(cfg);
    let shift = unit.chars().count();

    let mut changes = Vec::new();
    for row in first..=last {
        let Some(line) = state.buffer.line(row) else {
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        changes.push(LineChange {
            line_index: row,
            original_text: line.to_string(),
            new_text: format!("{unit}{line}"),
        });
    }
    if changes.is_empty() {
        state.set_status("Nothing to indent");
        return true;
    }

    let selection_before = state.selection.normalized();
    let cursor_before = state.caret;
    let changed_rows: Vec<usize> = changes.iter().map(|c| c.line_index).collect();
    for change in &changes {
        state.buffer.set_line(change.line_index, change.new_text.clone());
    }

    let shift_pos = |pos: Position| -> Position {
        if changed_rows.contains(&pos.row) {
            Position::new(pos.row, pos.col + shift)
        } else {
            pos
        }
    };
    let selection_after = selection_before.map(|(s, e)| (shift_pos(s), shift_pos(e)));
    if let Some((anchor, end)) = selection_after {
        state.selection.set(anchor, end);
        state.caret = end;
    } else {
        state.caret = shift_pos(cursor_before);
    }
    let cursor_after = state.caret;

    state.history.add_action(Action::BlockIndent(BlockEdit {
        changes,
        token: unit,
        selection_before,
        selection_after,
        cursor_before,
        cursor_after,
    }));
    state.set_status(format!("Indented {} lines", changed_rows.len()));
    state.normalize_after_edit();
    true
}

/// Remove one indent unit (a tab, or up to `tab_size` spaces) from each
/// line in the selected range.
pub fn unindent_block(state: &mut EditorState, cfg: &EditorSection) -> bool {
    let (first, last) = target_rows(state);

    let mut changes = Vec::new();
    let mut removed_by_row: Vec<(usize, usize)> = Vec::new();
    for row in first..=last {
        let Some(line) = state.buffer.line(row) else {
            continue;
        };
        let removed = if line.starts_with('\t') {
            1
        } else {
            line.chars()
                .take(cfg.tab_size)
                .take_while(|c| *c == ' ')
                .count()
        };
        if removed == 0 {
            continue;
        }
        let new_text: String = line.chars().skip(removed).collect();
        changes.push(LineChange {
            line_index: row,
            original_text: line.to_string(),
            new_text,
        });
        removed_by_row.push((row, removed));
    }
    if changes.is_empty() {
        state.set_status("Nothing to unindent");
        return true;
    }

    let selection_before = state.selection.normalized();
    let cursor_before = state.caret;
    for change in &changes {
        state.buffer.set_line(change.line_index, change.new_text.clone());
    }

    let shift_pos = |pos: Position| -> Position {
        match removed_by_row.iter().find(|(row, _)| *row == pos.row) {
            Some((_, removed)) => Position::new(pos.row, pos.col.saturating_sub(*removed)),
            None => pos,
        }
    };
    let selection_after = selection_before.map(|(s, e)| (shift_pos(s), shift_pos(e)));
    if let Some((anchor, end)) = selection_after {
        state.selection.set(anchor, end);
        state.caret = end;
    } else {
        state.caret = shift_pos(cursor_before);
    }
    let cursor_after = state.caret;

    let token = indent_unit(cfg);
    state.history.add_action(Action::BlockUnindent(BlockEdit {
        changes: changes.clone(),
        token,
        selection_before,
        selection_after,
        cursor_before,
        cursor_after,
    }));
    state.set_status(format!("Unindented {} lines", changes.len()));
    state.normalize_after_edit();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::undo;
    use core_text::Buffer;

    fn cfg2() -> EditorSection {
        EditorSection {
            tab_size: 2,
            use_spaces: true,
            ..Default::default()
        }
    }

    fn state_with(lines: &[&str]) -> EditorState {
        EditorState::new(Buffer::from_content(&lines.join("\n")))
    }

    #[test]
    fn indent_shifts_selection_and_undo_restores_it() {
        let mut state = state_with(&["foo", "bar"]);
        state
            .selection
            .set(Position::new(0, 0), Position::new(1, 3));
        state.caret = Position::new(1, 3);

        indent_block(&mut state, &cfg2());
        assert_eq!(state.buffer.line(0), Some("  foo"));
        assert_eq!(state.buffer.line(1), Some("  bar"));
        assert_eq!(
            state.selection.normalized(),
            Some((Position::new(0, 2), Position::new(1, 5)))
        );

        undo(&mut state);
        assert_eq!(state.buffer.line(0), Some("foo"));
        assert_eq!(state.buffer.line(1), Some("bar"));
        assert_eq!(
            state.selection.normalized(),
            Some((Position::new(0, 0), Position::new(1, 3)))
        );
    }

    #[test]
    fn indent_skips_blank_lines() {
        let mut state = state_with(&["a", "", "b"]);
        state
            .selection
            .set(Position::new(0, 0), Position::new(2, 1));
        indent_block(&mut state, &cfg2());
        assert_eq!(state.buffer.line(0), Some("  a"));
        assert_eq!(state.buffer.line(1), Some(""));
        assert_eq!(state.buffer.line(2), Some("  b"));
    }

    #[test]
    fn unindent_removes_partial_indent() {
        let mut state = state_with(&["  foo", " bar", "\tbaz", "qux"]);
        state
            .selection
            .set(Position::new(0, 2), Position::new(3, 1));
        unindent_block(&mut state, &cfg2());
        assert_eq!(state.buffer.line(0), Some("foo"));
        assert_eq!(state.buffer.line(1), Some("bar"));
        assert_eq!(state.buffer.line(2), Some("baz"));
        assert_eq!(state.buffer.line(3), Some("qux"));
        // Start column shifted back by what its own line lost.
        assert_eq!(
            state.selection.normalized(),
            Some((Position::new(0, 0), Position::new(3, 1)))
        );
    }

    #[test]
    fn unindent_without_indent_reports_status() {
        let mut state = state_with(&["foo"]);
        state.caret = Position::origin();
        unindent_block(&mut state, &cfg2());
        assert_eq!(state.status_message, "Nothing to unindent");
        assert_eq!(state.history.undo_depth(), 0);
    }

    #[test]
    fn caret_only_indent_uses_caret_row() {
        let mut state = state_with(&["one", "two"]);
        state.caret = Position::new(1, 1);
        indent_block(&mut state, &cfg2());
        assert_eq!(state.buffer.line(0), Some("one"));
        assert_eq!(state.buffer.line(1), Some("  two"));
        assert_eq!(state.caret, Position::new(1, 3));
    }
}
