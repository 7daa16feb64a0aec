//! Comment toggling engine.
//!
//! Strategy priority per language: docstring (when the range sits in a
//! docstring-valid slot and the language has a delimiter), then line
//! comments, then block comments. Decision and placement rules:
//!
//! * line comments: uncomment iff every non-blank line in the range already
//!   starts (after its indent) with the prefix; commenting inserts the
//!   prefix at the minimum indent column of the non-blank lines, leaving
//!   blank lines untouched;
//! * block comments: wrapped iff the first non-space token of the first
//!   line is the open delimiter and the last line ends with the close
//!   delimiter; toggling removes one occurrence of each;
//! * docstrings: valid at the top of the file or immediately after a
//!   function/class definition with only blanks/comments between; existing
//!   docstrings are recognized in both single-line and multi-line form.
//!
//! Selection and caret are recorded in the history action so undo/redo
//! restore them exactly.

use core_config::{CommentSyntax, Config};
use core_state::{Action, BlockEdit, EditorState, LineChange};
use core_text::Position;
use regex::Regex;
use tracing::debug;

/// Definition shapes that open a docstring slot on the following line.
fn definition_patterns() -> &'static [(&'static str, &'static str)] {
    &[
        (r"^def\s+\w+.*:\s*$", "function"),
        (r"^class\s+\w+.*:\s*$", "class"),
        (r"^async\s+def\s+\w+.*:\s*$", "async function"),
    ]
}

/// How many lines above the range the definition scan examines.
const DEFINITION_SCAN_WINDOW: usize = 20;

struct DocstringContext {
    valid: bool,
    indentation: usize,
}

/// Toggle comments over the selected line range (or the caret line).
/// `aliases` are the language lookup keys from the syntax engine.
pub fn toggle_comment(state: &mut EditorState, config: &Config, aliases: &[String]) -> bool {
    let Some(syntax) = config
        .comment_syntax(aliases.iter().map(String::as_str))
        .cloned()
    else {
        state.set_status("Comments not supported for this language.");
        return true;
    };

    let (start_y, end_y) = match state.selection.normalized() {
        Some((start, end)) => (start.row, end.row.min(state.buffer.line_count() - 1)),
        None => (state.caret.row, state.caret.row),
    };

    let context = analyze_context(state, start_y);
    if let Some(delim) = syntax.docstring_delim.as_deref() {
        if context.valid {
            toggle_docstring(state, start_y, end_y, delim, context.indentation);
            return true;
        }
    }
    if let Some(prefix) = syntax.line_prefix.as_deref() {
        toggle_line_comments(state, start_y, end_y, prefix);
        return true;
    }
    if let Some((open, close)) = syntax.block_pair() {
        let (open, close) = (open.to_string(), close.to_string());
        toggle_block_comment(state, start_y, end_y, &open, &close);
        return true;
    }
    state.set_status("No suitable comment method available.");
    true
}

pub fn comment_syntax_available(config: &Config, aliases: &[String]) -> Option<CommentSyntax> {
    config
        .comment_syntax(aliases.iter().map(String::as_str))
        .cloned()
}

// -------------------------------------------------------------------------
// Context analysis
// -------------------------------------------------------------------------

fn analyze_context(state: &EditorState, start_y: usize) -> DocstringContext {
    // Module docstring: at the very top, with only shebang/coding/modeline
    // or comment lines above.
    if start_y <= 1 {
        let mut significant_code_before = false;
        for y in 0..start_y.min(state.buffer.line_count()) {
            let line = state.buffer.line(y).unwrap_or("").trim();
            if !line.is_empty()
                && !line.starts_with('#')
                && !line.contains("coding:")
                && !line.contains("encoding:")
                && !line.contains("vim:")
                && !line.contains("emacs:")
            {
                significant_code_before = true;
                break;
            }
        }
        if !significant_code_before {
            return DocstringContext {
                valid: true,
                indentation: 0,
            };
        }
    }

    if let Some((def_line, def_indent, def_kind)) = find_preceding_definition(state, start_y) {
        debug!(target: "actions.comment", def_line, kind = def_kind, "docstring_context");
        return DocstringContext {
            valid: true,
            indentation: def_indent + 4,
        };
    }
    DocstringContext {
        valid: false,
        indentation: 0,
    }
}

fn find_preceding_definition(
    state: &EditorState,
    start_y: usize,
) -> Option<(usize, usize, &'static str)> {
    let patterns: Vec<(Regex, &'static str)> = definition_patterns()
        .iter()
        .map(|(p, kind)| (Regex::new(p).expect("static pattern"), *kind))
        .collect();

    let lowest = start_y.saturating_sub(DEFINITION_SCAN_WINDOW);
    let mut y = start_y;
    while y > lowest {
        y -= 1;
        let Some(full_line) = state.buffer.line(y) else {
            continue;
        };
        let stripped = full_line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }
        for (pattern, kind) in &patterns {
            if pattern.is_match(stripped) {
                if is_valid_docstring_position(state, y, start_y) {
                    let indent = leading_ws(full_line);
                    return Some((y, indent, kind));
                }
                break;
            }
        }
        // Any other significant code breaks the link to a definition above.
        return None;
    }
    None
}

/// The lines between a definition and the candidate docstring may contain
/// only blanks, comments, and existing docstring delimiters.
fn is_valid_docstring_position(state: &EditorState, def_line: usize, comment_start: usize) -> bool {
    for y in def_line + 1..comment_start {
        let line = state.buffer.line(y).unwrap_or("").trim();
        if !line.is_empty()
            && !line.starts_with('#')
            && !(line.starts_with("\"\"\"") || line.starts_with("'''"))
        {
            return false;
        }
    }
    true
}

fn leading_ws(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

// -------------------------------------------------------------------------
// Line comments
// -------------------------------------------------------------------------

fn toggle_line_comments(state: &mut EditorState, start_y: usize, end_y: usize, prefix: &str) {
    let prefix_stripped = prefix.trim().to_string();
    let non_blank: Vec<&str> = (start_y..=end_y)
        .filter_map(|y| state.buffer.line(y))
        .filter(|l| !l.trim().is_empty())
        .collect();
    let should_uncomment = !non_blank.is_empty()
        && non_blank
            .iter()
            .all(|l| l.trim_start().starts_with(&prefix_stripped));

    if should_uncomment {
        remove_line_comments(state, start_y, end_y, &prefix_stripped);
    } else {
        add_line_comments(state, start_y, end_y, &prefix_stripped);
    }
}

fn add_line_comments(state: &mut EditorState, start_y: usize, end_y: usize, prefix: &str) {
    let mut min_indent = usize::MAX;
    let mut rows = Vec::new();
    for y in start_y..=end_y {
        let Some(line) = state.buffer.line(y) else {
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        min_indent = min_indent.min(leading_ws(line));
        rows.push(y);
    }
    if rows.is_empty() {
        return;
    }

    let insert = format!("{prefix} ");
    let mut changes = Vec::new();
    for y in rows {
        let line = state.buffer.line(y).expect("row collected above");
        if line.trim_start().starts_with(prefix) {
            continue;
        }
        let head: String = line.chars().take(min_indent).collect();
        let tail: String = line.chars().skip(min_indent).collect();
        changes.push(LineChange {
            line_index: y,
            original_text: line.to_string(),
            new_text: format!("{head}{insert}{tail}"),
        });
    }
    commit_block(
        state,
        changes,
        prefix.to_string(),
        true,
        format!("Added '{prefix}' line comments"),
    );
}

fn remove_line_comments(state: &mut EditorState, start_y: usize, end_y: usize, prefix: &str) {
    let mut changes = Vec::new();
    for y in start_y..=end_y {
        let Some(line) = state.buffer.line(y) else {
            continue;
        };
        let stripped = line.trim_start();
        if !stripped.starts_with(prefix) {
            continue;
        }
        let mut rest = &stripped[prefix.len()..];
        if let Some(after_space) = rest.strip_prefix(' ') {
            rest = after_space;
        }
        let indent: String = line.chars().take(leading_ws(line)).collect();
        changes.push(LineChange {
            line_index: y,
            original_text: line.to_string(),
            new_text: format!("{indent}{rest}"),
        });
    }
    commit_block(
        state,
        changes,
        prefix.to_string(),
        false,
        format!("Removed '{prefix}' line comments"),
    );
}

/// Apply a set of same-line changes and record them with the surrounding
/// selection/caret so undo restores both.
fn commit_block(
    state: &mut EditorState,
    changes: Vec<LineChange>,
    token: String,
    commenting: bool,
    message: String,
) {
    if changes.is_empty() {
        state.set_status(message);
        return;
    }
    let selection_before = state.selection.normalized();
    let cursor_before = state.caret;
    for change in &changes {
        state.buffer.set_line(change.line_index, change.new_text.clone());
    }
    state.caret = state.buffer.clamp(state.caret);
    let cursor_after = state.caret;
    let selection_after = selection_before.map(|(s, e)| (state.buffer.clamp(s), state.buffer.clamp(e)));
    if let Some((anchor, end)) = selection_after {
        state.selection.set(anchor, end);
    }

    let edit = BlockEdit {
        changes,
        token,
        selection_before,
        selection_after,
        cursor_before,
        cursor_after,
    };
    state.history.add_action(if commenting {
        Action::CommentBlock(edit)
    } else {
        Action::UncommentBlock(edit)
    });
    state.set_status(message);
    state.normalize_after_edit();
}

// -------------------------------------------------------------------------
// Block comments
// -------------------------------------------------------------------------

fn toggle_block_comment(
    state: &mut EditorState,
    start_y: usize,
    end_y: usize,
    open: &str,
    close: &str,
) {
    let first = state.buffer.line(start_y).unwrap_or("").to_string();
    let last = state.buffer.line(end_y).unwrap_or("").to_string();
    let is_wrapped = first.trim_start().starts_with(open) && last.trim_end().ends_with(close);

    let mut changes = Vec::new();
    if is_wrapped {
        let new_first = first.replacen(open, "", 1);
        changes.push(LineChange {
            line_index: start_y,
            original_text: first,
            new_text: new_first,
        });
        if let Some(idx) = last.rfind(close) {
            let new_last = last[..idx].to_string();
            if start_y == end_y {
                // Same line: compose both removals.
                let base = changes[0].new_text.clone();
                let idx = base.rfind(close).unwrap_or(base.len());
                changes[0].new_text = base[..idx].to_string();
            } else {
                changes.push(LineChange {
                    line_index: end_y,
                    original_text: last,
                    new_text: new_last,
                });
            }
        }
        commit_block(
            state,
            changes,
            open.to_string(),
            false,
            format!("Removed {open}...{close} block comment"),
        );
    } else {
        let indent = leading_ws(&first);
        let head: String = first.chars().take(indent).collect();
        let tail: String = first.chars().skip(indent).collect();
        let new_first = format!("{head}{open} {tail}");
        if start_y == end_y {
            changes.push(LineChange {
                line_index: start_y,
                original_text: first,
                new_text: format!("{new_first} {close}"),
            });
        } else {
            changes.push(LineChange {
                line_index: start_y,
                original_text: first,
                new_text: new_first,
            });
            changes.push(LineChange {
                line_index: end_y,
                original_text: last.clone(),
                new_text: format!("{last} {close}"),
            });
        }
        commit_block(
            state,
            changes,
            open.to_string(),
            true,
            format!("Wrapped selection in {open}...{close}"),
        );
    }
}

// -------------------------------------------------------------------------
// Docstrings
// -------------------------------------------------------------------------

fn toggle_docstring(
    state: &mut EditorState,
    start_y: usize,
    end_y: usize,
    delim: &str,
    indentation: usize,
) {
    let indent_str = " ".repeat(indentation);
    let (exists, single_line) = check_existing_docstring(state, start_y, end_y, delim);
    if exists {
        remove_docstring(state, start_y, end_y, delim, &indent_str, single_line);
    } else {
        add_docstring(state, start_y, end_y, delim, &indent_str);
    }
}

fn check_existing_docstring(
    state: &EditorState,
    start_y: usize,
    end_y: usize,
    delim: &str,
) -> (bool, bool) {
    let Some(first) = state.buffer.line(start_y) else {
        return (false, false);
    };
    let first_stripped = first.trim();
    if start_y == end_y && first_stripped.starts_with(delim) && first_stripped.ends_with(delim) {
        return (true, true);
    }
    if end_y < state.buffer.line_count()
        && first_stripped == delim
        && state.buffer.line(end_y).map(str::trim) == Some(delim)
    {
        return (true, false);
    }
    (false, false)
}

fn add_docstring(
    state: &mut EditorState,
    start_y: usize,
    end_y: usize,
    delim: &str,
    indent_str: &str,
) {
    let original_cursor_y = state.caret.row;
    if start_y == end_y {
        let line = state.buffer.line(start_y).unwrap_or("").to_string();
        let content = line.trim();
        if content.contains(delim) {
            state.set_status(format!(
                "Error: Text contains docstring delimiter '{delim}'."
            ));
            return;
        }
        let selection_before = state.selection.normalized();
        let cursor_before = state.caret;
        let new_text = format!("{indent_str}{delim}{content}{delim}");
        state.buffer.set_line(start_y, new_text.clone());
        state.selection.cancel();
        state.caret = state.buffer.clamp(Position::new(original_cursor_y, 0));
        state.history.add_action(Action::CommentBlock(BlockEdit {
            changes: vec![LineChange {
                line_index: start_y,
                original_text: line,
                new_text,
            }],
            token: delim.to_string(),
            selection_before,
            selection_after: None,
            cursor_before,
            cursor_after: state.caret,
        }));
    } else {
        // Close first so start_y keeps its meaning, mirroring the
        // bottom-up insertion order.
        state.history.begin_compound();
        let end_len = state.buffer.line_len(end_y);
        let closing = format!("\n{indent_str}{delim}");
        state.buffer.insert(Position::new(end_y, end_len), &closing);
        state.history.add_action(Action::Insert {
            text: closing,
            pos: Position::new(end_y, end_len),
        });
        let opening = format!("{indent_str}{delim}\n");
        state.buffer.insert(Position::new(start_y, 0), &opening);
        state.history.add_action(Action::Insert {
            text: opening,
            pos: Position::new(start_y, 0),
        });
        state.history.end_compound();

        state.selection.cancel();
        let final_y = if original_cursor_y >= start_y {
            original_cursor_y + 1
        } else {
            original_cursor_y
        };
        state.caret = state.buffer.clamp(Position::new(final_y, 0));
    }
    state.set_status(format!("Added docstring with {delim}"));
    state.normalize_after_edit();
}

fn remove_docstring(
    state: &mut EditorState,
    start_y: usize,
    end_y: usize,
    delim: &str,
    indent_str: &str,
    single_line: bool,
) {
    let original_cursor_y = state.caret.row;
    if single_line {
        let line = state.buffer.line(start_y).unwrap_or("").to_string();
        let content = line.trim();
        let inner = content
            .strip_prefix(delim)
            .and_then(|s| s.strip_suffix(delim))
            .unwrap_or(content);
        let selection_before = state.selection.normalized();
        let cursor_before = state.caret;
        let new_text = format!("{indent_str}{inner}");
        state.buffer.set_line(start_y, new_text.clone());
        state.selection.cancel();
        state.caret = state.buffer.clamp(Position::new(original_cursor_y, 0));
        state.history.add_action(Action::UncommentBlock(BlockEdit {
            changes: vec![LineChange {
                line_index: start_y,
                original_text: line,
                new_text,
            }],
            token: delim.to_string(),
            selection_before,
            selection_after: None,
            cursor_before,
            cursor_after: state.caret,
        }));
    } else {
        let mut deleted_before_cursor = 0;
        state.history.begin_compound();
        // Bottom-up so indices stay stable.
        if state.buffer.line(end_y).map(str::trim) == Some(delim) {
            let start = Position::new(end_y, 0);
            let end = Position::new(end_y + 1, 0);
            let segments = state.buffer.delete_range(start, end);
            state.history.add_action(Action::DeleteSelection {
                segments,
                start,
                end,
            });
            if end_y < original_cursor_y {
                deleted_before_cursor += 1;
            }
        }
        if state.buffer.line(start_y).map(str::trim) == Some(delim) {
            let start = Position::new(start_y, 0);
            let end = Position::new(start_y + 1, 0);
            let segments = state.buffer.delete_range(start, end);
            state.history.add_action(Action::DeleteSelection {
                segments,
                start,
                end,
            });
            if start_y < original_cursor_y {
                deleted_before_cursor += 1;
            }
        }
        state.history.end_compound();
        state.selection.cancel();
        let final_y = original_cursor_y.saturating_sub(deleted_before_cursor);
        state.caret = state.buffer.clamp(Position::new(final_y, 0));
    }
    state.set_status("Removed docstring");
    state.normalize_after_edit();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::undo;
    use core_config::ConfigFile;
    use core_text::Buffer;

    fn config() -> Config {
        Config::from_file(ConfigFile::default())
    }

    fn python() -> Vec<String> {
        vec!["python".to_string()]
    }

    fn rust_lang() -> Vec<String> {
        vec!["rust".to_string()]
    }

    fn css() -> Vec<String> {
        vec!["css".to_string()]
    }

    fn state_with(lines: &[&str]) -> EditorState {
        EditorState::new(Buffer::from_content(&lines.join("\n")))
    }

    fn select_rows(state: &mut EditorState, first: usize, last: usize) {
        let end_col = state.buffer.line_len(last);
        state
            .selection
            .set(Position::new(first, 0), Position::new(last, end_col));
        state.caret = Position::new(last, end_col);
    }

    #[test]
    fn unknown_language_reports_unsupported() {
        let mut state = state_with(&["text"]);
        toggle_comment(&mut state, &config(), &["plain text".to_string()]);
        assert_eq!(
            state.status_message,
            "Comments not supported for this language."
        );
    }

    #[test]
    fn line_comment_inserts_prefix_at_min_indent() {
        // Rust is used so the docstring path stays out of the picture.
        let mut state = state_with(&["    print(1)", "    print(2)", "print(3)"]);
        select_rows(&mut state, 0, 2);
        toggle_comment(&mut state, &config(), &rust_lang());
        assert_eq!(state.buffer.line(0), Some("//     print(1)"));
        assert_eq!(state.buffer.line(1), Some("//     print(2)"));
        assert_eq!(state.buffer.line(2), Some("// print(3)"));
    }

    #[test]
    fn line_comment_round_trip_restores_text_and_selection() {
        let mut state = state_with(&["  a", "  b"]);
        select_rows(&mut state, 0, 1);
        let before_sel = state.selection.normalized();

        toggle_comment(&mut state, &config(), &rust_lang());
        assert_eq!(state.buffer.line(0), Some("  // a"));
        toggle_comment(&mut state, &config(), &rust_lang());
        assert_eq!(state.buffer.line(0), Some("  a"));
        assert_eq!(state.buffer.line(1), Some("  b"));
        assert_eq!(state.selection.normalized(), before_sel);
    }

    #[test]
    fn blank_lines_are_ignored_by_decision_and_untouched() {
        let mut state = state_with(&["x = 1", "", "y = 2"]);
        select_rows(&mut state, 0, 2);
        toggle_comment(&mut state, &config(), &rust_lang());
        assert_eq!(state.buffer.line(0), Some("// x = 1"));
        assert_eq!(state.buffer.line(1), Some(""));
        assert_eq!(state.buffer.line(2), Some("// y = 2"));
    }

    #[test]
    fn mixed_commented_lines_comment_everything() {
        let mut state = state_with(&["// done", "todo"]);
        select_rows(&mut state, 0, 1);
        toggle_comment(&mut state, &config(), &rust_lang());
        // Line 0 already carries the prefix and is skipped.
        assert_eq!(state.buffer.line(0), Some("// done"));
        assert_eq!(state.buffer.line(1), Some("// todo"));
    }

    #[test]
    fn uncomment_strips_one_optional_space() {
        let mut state = state_with(&["  //no space", "  // with space"]);
        select_rows(&mut state, 0, 1);
        toggle_comment(&mut state, &config(), &rust_lang());
        assert_eq!(state.buffer.line(0), Some("  no space"));
        assert_eq!(state.buffer.line(1), Some("  with space"));
    }

    #[test]
    fn comment_undo_restores_exactly() {
        let mut state = state_with(&["    print(1)", "print(3)"]);
        select_rows(&mut state, 0, 1);
        toggle_comment(&mut state, &config(), &rust_lang());
        undo(&mut state);
        assert_eq!(state.buffer.line(0), Some("    print(1)"));
        assert_eq!(state.buffer.line(1), Some("print(3)"));
        assert_eq!(
            state.selection.normalized(),
            Some((Position::new(0, 0), Position::new(1, 8)))
        );
    }

    #[test]
    fn block_comment_wraps_and_unwraps() {
        let mut state = state_with(&["  body {", "  }"]);
        select_rows(&mut state, 0, 1);
        toggle_comment(&mut state, &config(), &css());
        assert_eq!(state.buffer.line(0), Some("  /* body {"));
        assert_eq!(state.buffer.line(1), Some("  } */"));
        assert!(state.status_message.contains("Wrapped"));

        toggle_comment(&mut state, &config(), &css());
        assert_eq!(state.buffer.line(0), Some("   body {"));
        assert_eq!(state.buffer.line(1), Some("  } "));
        assert!(state.status_message.contains("Removed"));
    }

    #[test]
    fn module_docstring_added_at_top_of_file() {
        let mut state = state_with(&["summary line"]);
        state.caret = Position::new(0, 0);
        toggle_comment(&mut state, &config(), &python());
        assert_eq!(state.buffer.line(0), Some("\"\"\"summary line\"\"\""));
        assert!(state.status_message.contains("Added docstring"));

        toggle_comment(&mut state, &config(), &python());
        assert_eq!(state.buffer.line(0), Some("summary line"));
        assert_eq!(state.status_message, "Removed docstring");
    }

    #[test]
    fn function_docstring_uses_def_indent_plus_four() {
        let mut state = state_with(&["def f():", "    body()"]);
        select_rows(&mut state, 1, 1);
        // Selecting only the body line right after the definition.
        state.caret = Position::new(1, 0);
        state
            .selection
            .set(Position::new(1, 0), Position::new(1, 0));
        toggle_comment(&mut state, &config(), &python());
        assert_eq!(state.buffer.line(1), Some("    \"\"\"body()\"\"\""));
    }

    #[test]
    fn multi_line_docstring_round_trip() {
        let mut state = state_with(&["first", "second"]);
        select_rows(&mut state, 0, 1);
        state.caret = Position::new(1, 0);
        toggle_comment(&mut state, &config(), &python());
        assert_eq!(state.buffer.line(0), Some("\"\"\""));
        assert_eq!(state.buffer.line(1), Some("first"));
        assert_eq!(state.buffer.line(2), Some("second"));
        assert_eq!(state.buffer.line(3), Some("\"\"\""));

        // The wrapped block is rows 0..=3 now.
        select_rows(&mut state, 0, 3);
        toggle_comment(&mut state, &config(), &python());
        assert_eq!(state.buffer.line(0), Some("first"));
        assert_eq!(state.buffer.line(1), Some("second"));
    }

    #[test]
    fn multi_line_docstring_is_single_undo_step() {
        let mut state = state_with(&["first", "second"]);
        select_rows(&mut state, 0, 1);
        toggle_comment(&mut state, &config(), &python());
        assert_eq!(state.buffer.line_count(), 5); // 4 + trailing
        undo(&mut state);
        assert_eq!(state.buffer.line(0), Some("first"));
        assert_eq!(state.buffer.line(1), Some("second"));
        assert_eq!(state.buffer.line_count(), 3);
    }

    #[test]
    fn docstring_with_embedded_delimiter_is_rejected() {
        let mut state = state_with(&["has \"\"\" inside"]);
        select_rows(&mut state, 0, 0);
        toggle_comment(&mut state, &config(), &python());
        assert!(state.status_message.contains("Error"));
        assert_eq!(state.buffer.line(0), Some("has \"\"\" inside"));
    }

    #[test]
    fn definition_scan_stops_at_executable_code() {
        let mut state = state_with(&["def f():", "    x = 1", "    y = 2"]);
        // Row 2 follows executable code, so no docstring slot: line comment.
        state.caret = Position::new(2, 0);
        toggle_comment(&mut state, &config(), &python());
        assert_eq!(state.buffer.line(2), Some("    # y = 2"));
    }
}
