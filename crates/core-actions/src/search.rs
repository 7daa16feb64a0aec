//! Search and replace.
//!
//! Find is a case-insensitive substring collection over the whole buffer;
//! the match list doubles as the highlight set the renderer paints.
//! Find-next cycles through the list modulo its length and parks the hit in
//! roughly the upper third of the text area. Replace compiles the pattern
//! as a case-insensitive regex, substitutes per line, and clears history:
//! bulk replace is not individually undoable, only its count is recorded.

use core_state::{Action, EditorState, SearchMatch};
use core_text::Position;
use regex::RegexBuilder;
use tracing::debug;

/// Collect all case-insensitive substring matches of `query`.
/// An empty query clears the match set.
pub fn find_all(state: &mut EditorState, query: &str) -> bool {
    state.clear_search();
    state.last_query = query.to_string();
    if query.is_empty() {
        state.set_status("Search cancelled");
        return true;
    }
    let needle: Vec<char> = query.chars().flat_map(char::to_lowercase).collect();
    let mut matches = Vec::new();
    for (row, line) in state.buffer.lines().enumerate() {
        let haystack: Vec<char> = line.chars().flat_map(char::to_lowercase).collect();
        if needle.len() > haystack.len() {
            continue;
        }
        let mut col = 0;
        while col + needle.len() <= haystack.len() {
            if haystack[col..col + needle.len()] == needle[..] {
                matches.push(SearchMatch {
                    row,
                    start_col: col,
                    end_col: col + needle.len(),
                });
                col += needle.len().max(1);
            } else {
                col += 1;
            }
        }
    }
    let count = matches.len();
    state.search_matches = matches;
    debug!(target: "actions.search", query, count, "find_all");
    if count == 0 {
        state.set_status(format!("'{query}' not found"));
    } else {
        state.set_status(format!("Found {count} match(es) for '{query}'"));
    }
    true
}

/// Jump to the next match, wrapping modulo the list length. The hit is
/// scrolled into roughly the upper third of a `text_rows`-tall viewport.
pub fn find_next(state: &mut EditorState, text_rows: usize) -> bool {
    if state.search_matches.is_empty() {
        state.set_status("No matches");
        return true;
    }
    let next = match state.search_index {
        Some(current) => (current + 1) % state.search_matches.len(),
        None => 0,
    };
    state.search_index = Some(next);
    let hit = state.search_matches[next];
    state.selection.cancel();
    state.caret = state
        .buffer
        .clamp(Position::new(hit.row, hit.start_col));
    state.scroll_top = hit.row.saturating_sub(text_rows.max(1) / 3);
    state.set_status(format!(
        "Match {}/{}",
        next + 1,
        state.search_matches.len()
    ));
    true
}

/// Regex replace across the whole buffer. History is cleared (bulk
/// change); the caret returns to the origin.
pub fn replace_all(state: &mut EditorState, pattern: &str, replacement: &str) -> bool {
    if pattern.is_empty() {
        state.set_status("Replace error: empty pattern");
        return true;
    }
    let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => regex,
        Err(err) => {
            state.set_status(format!("Replace error: {err}"));
            return true;
        }
    };

    let mut count = 0usize;
    let rows = state.buffer.line_count();
    for row in 0..rows {
        let replaced = {
            let Some(line) = state.buffer.line(row) else {
                continue;
            };
            let line_hits = regex.find_iter(line).count();
            if line_hits == 0 {
                continue;
            }
            (regex.replace_all(line, replacement).into_owned(), line_hits)
        };
        state.buffer.set_line(row, replaced.0);
        count += replaced.1;
    }

    state.history.clear();
    state.history.add_action(Action::BulkReplace { count });
    state.buffer.set_modified(count > 0);
    state.selection.cancel();
    state.caret = Position::origin();
    state.normalize_after_edit();
    state.set_status(format!("Replaced {count} occurrence(s)"));
    debug!(target: "actions.search", pattern, count, "replace_all");
    true
}

/// Esc: clear search highlights, selection, and the status line.
pub fn cancel_operation(state: &mut EditorState) -> bool {
    let had_anything = !state.search_matches.is_empty()
        || state.selection.is_active()
        || !state.status_message.is_empty();
    state.clear_search();
    state.last_query.clear();
    state.selection.cancel();
    state.set_status("");
    had_anything
}
