//! Matching-bracket scan.
//!
//! Multi-line forward/backward depth counting over the raw text. Brackets
//! inside strings and comments are not excluded; the scan is intentionally
//! token-blind.

use core_text::{Buffer, Position};

const PAIRS: [(char, char); 3] = [('(', ')'), ('[', ']'), ('{', '}')];

fn partner(ch: char) -> Option<(char, bool)> {
    for (open, close) in PAIRS {
        if ch == open {
            return Some((close, true));
        }
        if ch == close {
            return Some((open, false));
        }
    }
    None
}

fn char_at(buffer: &Buffer, pos: Position) -> Option<char> {
    buffer.line(pos.row)?.chars().nth(pos.col)
}

/// The bracket the caret refers to: the one under it, else the one
/// immediately to its left.
pub fn bracket_at_caret(buffer: &Buffer, caret: Position) -> Option<(Position, char)> {
    if let Some(ch) = char_at(buffer, caret) {
        if partner(ch).is_some() {
            return Some((caret, ch));
        }
    }
    if caret.col > 0 {
        let left = Position::new(caret.row, caret.col - 1);
        if let Some(ch) = char_at(buffer, left) {
            if partner(ch).is_some() {
                return Some((left, ch));
            }
        }
    }
    None
}

/// Position of the partner bracket, if one exists in the buffer.
pub fn find_matching(buffer: &Buffer, pos: Position, ch: char) -> Option<Position> {
    let (target, forward) = partner(ch)?;
    let mut depth = 1i32;

    if forward {
        let mut row = pos.row;
        let mut col = pos.col + 1;
        while row < buffer.line_count() {
            let line: Vec<char> = buffer.line(row)?.chars().collect();
            while col < line.len() {
                let c = line[col];
                if c == ch {
                    depth += 1;
                } else if c == target {
                    depth -= 1;
                    if depth == 0 {
                        return Some(Position::new(row, col));
                    }
                }
                col += 1;
            }
            row += 1;
            col = 0;
        }
    } else {
        let mut row = pos.row;
        let mut col = pos.col;
        loop {
            let line: Vec<char> = buffer.line(row)?.chars().collect();
            while col > 0 {
                col -= 1;
                let c = line[col];
                if c == ch {
                    depth += 1;
                } else if c == target {
                    depth -= 1;
                    if depth == 0 {
                        return Some(Position::new(row, col));
                    }
                }
            }
            if row == 0 {
                break;
            }
            row -= 1;
            col = buffer.line_len(row);
        }
    }
    None
}
