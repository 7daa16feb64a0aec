//! Caret navigation and selection extension.
//!
//! Plain motions cancel the selection before moving; `extend_*` variants
//! anchor at the previous caret when idle and drag the caret endpoint.
//! Scroll clamping happens afterwards in the main loop, which knows the
//! viewport geometry.

use core_state::EditorState;
use core_text::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp(usize),
    PageDown(usize),
}

fn apply_motion(state: &EditorState, motion: Motion) -> Position {
    let caret = state.buffer.clamp(state.caret);
    let last_row = state.buffer.line_count() - 1;
    match motion {
        Motion::Up => {
            if caret.row == 0 {
                caret
            } else {
                state.buffer.clamp(Position::new(caret.row - 1, caret.col))
            }
        }
        Motion::Down => {
            if caret.row >= last_row {
                caret
            } else {
                state.buffer.clamp(Position::new(caret.row + 1, caret.col))
            }
        }
        Motion::Left => {
            if caret.col > 0 {
                Position::new(caret.row, caret.col - 1)
            } else if caret.row > 0 {
                Position::new(caret.row - 1, state.buffer.line_len(caret.row - 1))
            } else {
                caret
            }
        }
        Motion::Right => {
            if caret.col < state.buffer.line_len(caret.row) {
                Position::new(caret.row, caret.col + 1)
            } else if caret.row < last_row {
                Position::new(caret.row + 1, 0)
            } else {
                caret
            }
        }
        Motion::Home => Position::new(caret.row, 0),
        Motion::End => Position::new(caret.row, state.buffer.line_len(caret.row)),
        Motion::PageUp(rows) => state
            .buffer
            .clamp(Position::new(caret.row.saturating_sub(rows.max(1)), caret.col)),
        Motion::PageDown(rows) => state
            .buffer
            .clamp(Position::new(caret.row + rows.max(1), caret.col)),
    }
}

fn plain_move(state: &mut EditorState, motion: Motion) -> bool {
    let had_selection = state.selection.is_active();
    state.selection.cancel();
    let next = apply_motion(state, motion);
    let moved = next != state.caret;
    state.caret = next;
    moved || had_selection
}

fn extend_move(state: &mut EditorState, motion: Motion) -> bool {
    let caret = state.buffer.clamp(state.caret);
    state.selection.extend_from(caret);
    let next = apply_motion(state, motion);
    let moved = next != state.caret;
    state.caret = next;
    state.selection.extend_to(next);
    moved
}

pub fn move_up(state: &mut EditorState) -> bool {
    plain_move(state, Motion::Up)
}
pub fn move_down(state: &mut EditorState) -> bool {
    plain_move(state, Motion::Down)
}
pub fn move_left(state: &mut EditorState) -> bool {
    plain_move(state, Motion::Left)
}
pub fn move_right(state: &mut EditorState) -> bool {
    plain_move(state, Motion::Right)
}
pub fn move_home(state: &mut EditorState) -> bool {
    plain_move(state, Motion::Home)
}
pub fn move_end(state: &mut EditorState) -> bool {
    plain_move(state, Motion::End)
}
pub fn page_up(state: &mut EditorState, text_rows: usize) -> bool {
    plain_move(state, Motion::PageUp(text_rows))
}
pub fn page_down(state: &mut EditorState, text_rows: usize) -> bool {
    plain_move(state, Motion::PageDown(text_rows))
}

pub fn extend_up(state: &mut EditorState) -> bool {
    extend_move(state, Motion::Up)
}
pub fn extend_down(state: &mut EditorState) -> bool {
    extend_move(state, Motion::Down)
}
pub fn extend_left(state: &mut EditorState) -> bool {
    extend_move(state, Motion::Left)
}
pub fn extend_right(state: &mut EditorState) -> bool {
    extend_move(state, Motion::Right)
}
pub fn extend_home(state: &mut EditorState) -> bool {
    extend_move(state, Motion::Home)
}
pub fn extend_end(state: &mut EditorState) -> bool {
    extend_move(state, Motion::End)
}

/// Anchor `(0,0)`, caret at end-of-buffer.
pub fn select_all(state: &mut EditorState) -> bool {
    let end = state.buffer.end_position();
    state.selection.set(Position::origin(), end);
    state.caret = end;
    true
}

/// Go to a 1-based line number, or a `N%` proportional position mapped as
/// `round(total * N / 100)` clamped to `[1, total]`.
pub fn goto_line(state: &mut EditorState, input: &str) -> bool {
    let input = input.trim();
    if input.is_empty() {
        return false;
    }
    let total = state.buffer.line_count();
    let line = if let Some(percent) = input.strip_suffix('%') {
        match percent.trim().parse::<f64>() {
            Ok(n) if n.is_finite() && n >= 0.0 => {
                let mapped = (total as f64 * n / 100.0).round() as usize;
                mapped.clamp(1, total)
            }
            _ => {
                state.set_status(format!("Goto error: invalid percentage '{input}'"));
                return true;
            }
        }
    } else {
        match input.parse::<usize>() {
            Ok(n) if (1..=total).contains(&n) => n,
            Ok(n) => {
                state.set_status(format!("Goto error: line {n} out of range 1..{total}"));
                return true;
            }
            Err(_) => {
                state.set_status(format!("Goto error: invalid line '{input}'"));
                return true;
            }
        }
    };
    state.selection.cancel();
    state.caret = state.buffer.clamp(Position::new(line - 1, 0));
    state.set_status(format!("Line {line}"));
    true
}
