//! Text edit actions: insert, backspace, delete, newline, tab.
//!
//! Selection-replace rule: any text insert while a selection is active
//! becomes a compound (delete selection, then insert) and undoes as one
//! step. All edits re-establish the trailing-line invariant and clamp the
//! caret before returning.

use core_config::EditorSection;
use core_state::{Action, CaretMode, EditorState};
use core_text::Position;
use tracing::trace;

/// Insert `text` at the caret, honoring the selection-replace rule and the
/// Replace caret mode for single printable characters.
pub fn insert_text(state: &mut EditorState, text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let had_selection = state
        .selection
        .normalized()
        .map(|(s, e)| s != e)
        .unwrap_or(false);

    if had_selection {
        state.history.begin_compound();
        delete_selection_inner(state);
        insert_inner(state, text);
        state.history.end_compound();
    } else if state.caret_mode == CaretMode::Replace && is_single_printable(text) {
        replace_at_caret(state, text);
    } else {
        insert_inner(state, text);
    }
    state.selection.cancel();
    state.normalize_after_edit();
    true
}

fn is_single_printable(text: &str) -> bool {
    let mut chars = text.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c != '\n')
}

fn insert_inner(state: &mut EditorState, text: &str) {
    let pos = state.buffer.clamp(state.caret);
    state.caret = state.buffer.insert(pos, text);
    state.history.add_action(Action::Insert {
        text: text.to_string(),
        pos,
    });
    trace!(target: "actions.edit", row = pos.row, col = pos.col, len = text.len(), "insert");
}

fn replace_at_caret(state: &mut EditorState, text: &str) {
    let pos = state.buffer.clamp(state.caret);
    let ch = text.chars().next().expect("single printable");
    match state.buffer.delete_char(pos) {
        Some(removed) => {
            state.history.begin_compound();
            state
                .history
                .add_action(Action::DeleteChar { ch: removed, pos });
            let mut b = [0u8; 4];
            state.caret = state.buffer.insert(pos, ch.encode_utf8(&mut b));
            state.history.add_action(Action::Insert {
                text: ch.to_string(),
                pos,
            });
            state.history.end_compound();
        }
        // Nothing under the caret (end of line): plain insert.
        None => insert_inner(state, text),
    }
}

/// Delete the active selection as a single history action. Returns false
/// when there is nothing to delete.
pub fn delete_selection(state: &mut EditorState) -> bool {
    let deleted = delete_selection_inner(state);
    if deleted {
        state.selection.cancel();
        state.normalize_after_edit();
    }
    deleted
}

fn delete_selection_inner(state: &mut EditorState) -> bool {
    let Some((start, end)) = state.selection.normalized() else {
        return false;
    };
    if start == end {
        return false;
    }
    let segments = state.buffer.delete_range(start, end);
    state.history.add_action(Action::DeleteSelection {
        segments,
        start,
        end,
    });
    state.caret = start;
    trace!(target: "actions.edit", from_row = start.row, to_row = end.row, "delete_selection");
    true
}

/// Backspace: selection delete, char delete, or line merge. At `(0,0)` a
/// no-op with a "beginning of file" message.
pub fn backspace(state: &mut EditorState) -> bool {
    if delete_selection(state) {
        return true;
    }
    let caret = state.buffer.clamp(state.caret);
    if caret.row == 0 && caret.col == 0 {
        state.set_status("Beginning of file");
        return true;
    }
    if caret.col > 0 {
        let pos = Position::new(caret.row, caret.col - 1);
        if let Some(ch) = state.buffer.delete_char(pos) {
            state.history.add_action(Action::DeleteChar { ch, pos });
            state.caret = pos;
        }
    } else {
        let prev_len = state.buffer.line_len(caret.row - 1);
        if let Some(merged) = state.buffer.merge_line_up(caret.row) {
            let pos = Position::new(caret.row - 1, prev_len);
            state.history.add_action(Action::DeleteNewline {
                merged_line: merged,
                pos,
            });
            state.caret = pos;
        }
    }
    state.normalize_after_edit();
    true
}

/// Forward delete. At the end of the buffer a no-op with an "end of file"
/// message.
pub fn delete_forward(state: &mut EditorState) -> bool {
    if delete_selection(state) {
        return true;
    }
    let caret = state.buffer.clamp(state.caret);
    let last_row = state.buffer.line_count() - 1;
    let at_line_end = caret.col >= state.buffer.line_len(caret.row);

    if at_line_end {
        // Merging the virtual trailing line would be a net no-op.
        let next_is_virtual =
            caret.row + 1 == last_row && state.buffer.line_len(last_row) == 0;
        if caret.row >= last_row || next_is_virtual {
            state.set_status("End of file");
            return true;
        }
        if let Some(merged) = state.buffer.merge_line_up(caret.row + 1) {
            state.history.add_action(Action::DeleteNewline {
                merged_line: merged,
                pos: caret,
            });
            state.caret = caret;
        }
    } else if let Some(ch) = state.buffer.delete_char(caret) {
        state.history.add_action(Action::DeleteChar { ch, pos: caret });
        state.caret = caret;
    }
    state.normalize_after_edit();
    true
}

/// Insert a line break at the caret (selection-replace rule applies).
pub fn insert_newline(state: &mut EditorState) -> bool {
    insert_text(state, "\n")
}

/// Smart tab: at column 0 with no selection and an indented previous line,
/// copy that line's leading whitespace; otherwise insert spaces or a tab
/// per configuration. With a selection the whole block indents.
pub fn smart_tab(state: &mut EditorState, editor_cfg: &EditorSection) -> bool {
    if state
        .selection
        .normalized()
        .map(|(s, e)| s != e)
        .unwrap_or(false)
    {
        return crate::block::indent_block(state, editor_cfg);
    }
    let caret = state.buffer.clamp(state.caret);
    if caret.col == 0 && caret.row > 0 {
        let prev_indent: String = state
            .buffer
            .line(caret.row - 1)
            .map(|l| l.chars().take_while(|c| c.is_whitespace()).collect())
            .unwrap_or_default();
        if !prev_indent.is_empty() {
            return insert_text(state, &prev_indent);
        }
    }
    let fill = if editor_cfg.use_spaces {
        " ".repeat(editor_cfg.tab_size)
    } else {
        "\t".to_string()
    };
    insert_text(state, &fill)
}

/// Toggle Insert/Replace caret mode.
pub fn toggle_caret_mode(state: &mut EditorState) -> bool {
    state.caret_mode = match state.caret_mode {
        CaretMode::Insert => CaretMode::Replace,
        CaretMode::Replace => CaretMode::Insert,
    };
    state.set_status(match state.caret_mode {
        CaretMode::Insert => "Insert mode",
        CaretMode::Replace => "Replace mode",
    });
    true
}

/// Undo the last action, then clamp and recompute the modified flag.
pub fn undo(state: &mut EditorState) -> bool {
    let outcome = state
        .history
        .undo(&mut state.buffer, &mut state.selection, &mut state.caret);
    state.buffer.ensure_trailing_line();
    state.caret = state.buffer.clamp(state.caret);
    state.recompute_modified();
    state.set_status(outcome.message.clone());
    true
}

pub fn redo(state: &mut EditorState) -> bool {
    let outcome = state
        .history
        .redo(&mut state.buffer, &mut state.selection, &mut state.caret);
    state.buffer.ensure_trailing_line();
    state.caret = state.buffer.clamp(state.caret);
    state.recompute_modified();
    state.set_status(outcome.message.clone());
    true
}
