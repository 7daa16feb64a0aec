//! Frame renderer.
//!
//! A render call is a pure function of editor state against the terminal
//! surface abstraction: text area with syntax colors, gutter, search and
//! selection highlights, matching-bracket highlight, separator, status
//! bar, cursor placement, then exactly one flush.

pub mod bracket;
pub mod palette;

pub use palette::Palette;

use anyhow::Result;
use core_state::{CaretMode, EditorState, Focus};
use core_syntax::SyntaxEngine;
use core_terminal::{Attr, Surface};
use core_text::width::{char_width, display_width, prefix_width};
use core_text::Position;

/// Layout of the editing surface for the current terminal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub text_rows: usize,
    pub text_cols: usize,
    pub gutter_width: u16,
}

fn digits(mut n: usize) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

/// Compute the text-area geometry. The gutter is line-number digits plus
/// one separating space, and hides itself when it would swallow the whole
/// width.
pub fn geometry(line_count: usize, rows: u16, cols: u16, show_line_numbers: bool) -> Geometry {
    let text_rows = usize::from(rows.saturating_sub(2));
    let mut gutter_width = if show_line_numbers {
        digits(line_count) as u16 + 1
    } else {
        0
    };
    if gutter_width >= cols {
        gutter_width = 0;
    }
    Geometry {
        text_rows,
        text_cols: usize::from(cols.saturating_sub(gutter_width)),
        gutter_width,
    }
}

/// Wide-char-safe truncation to at most `max_cells` display cells.
pub fn truncate_display(s: &str, max_cells: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = char_width(ch);
        if used + w > max_cells {
            break;
        }
        out.push(ch);
        used += w;
    }
    out
}

pub struct Renderer {
    palette: Palette,
    last_size: (u16, u16),
    show_line_numbers: bool,
}

impl Renderer {
    pub fn new(palette: Palette, show_line_numbers: bool) -> Self {
        Self {
            palette,
            last_size: (0, 0),
            show_line_numbers,
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Geometry for the surface's current size.
    pub fn geometry_for(&self, surface: &dyn Surface, state: &EditorState) -> Geometry {
        let (rows, cols) = surface.dimensions();
        geometry(
            state.buffer.line_count(),
            rows,
            cols,
            self.show_line_numbers,
        )
    }

    /// Compose and flip one frame.
    pub fn render(
        &mut self,
        surface: &mut dyn Surface,
        state: &EditorState,
        syntax: &mut SyntaxEngine,
    ) -> Result<()> {
        self.render_with(surface, state, syntax, &mut |_| {})
    }

    /// Compose a frame, let `overlay` draw on top (panels), then flip.
    /// Exactly one flip happens per call either way.
    pub fn render_with(
        &mut self,
        surface: &mut dyn Surface,
        state: &EditorState,
        syntax: &mut SyntaxEngine,
        overlay: &mut dyn FnMut(&mut dyn Surface),
    ) -> Result<()> {
        let (rows, cols) = surface.dimensions();
        let resized = self.last_size != (rows, cols);
        self.last_size = (rows, cols);

        if rows < 3 || cols < 4 {
            surface.erase();
            surface.put_cells(0, 0, "window too small", Attr::default());
            surface.flush()?;
            return Ok(());
        }

        let geom = geometry(state.buffer.line_count(), rows, cols, self.show_line_numbers);
        if resized || state.force_full_redraw {
            surface.erase();
        }

        self.draw_text_area(surface, state, syntax, &geom);
        self.draw_search_highlights(surface, state, &geom);
        self.draw_selection(surface, state, &geom);
        self.draw_bracket_match(surface, state, &geom);

        surface.hline(rows - 2, 0, cols, self.palette.separator());
        self.draw_status_bar(surface, state, rows, cols);
        overlay(surface);
        self.place_cursor(surface, state, &geom);
        surface.flush()?;
        Ok(())
    }

    fn draw_text_area(
        &self,
        surface: &mut dyn Surface,
        state: &EditorState,
        syntax: &mut SyntaxEngine,
        geom: &Geometry,
    ) {
        for screen_row in 0..geom.text_rows {
            let row16 = screen_row as u16;
            surface.clear_row(row16);
            let buf_row = state.scroll_top + screen_row;
            if buf_row >= state.buffer.line_count() {
                continue;
            }
            if geom.gutter_width > 0 {
                let number = format!(
                    "{:>width$} ",
                    buf_row + 1,
                    width = usize::from(geom.gutter_width) - 1
                );
                surface.put_cells(row16, 0, &number, self.palette.gutter());
            }
            let Some(line) = state.buffer.line(buf_row) else {
                continue;
            };
            let segments = syntax.tokenize(line);
            let mut x = 0usize; // logical display column
            'line: for segment in segments.iter() {
                let attr = self.palette.attr(segment.slot);
                let mut run = String::new();
                let mut run_start: Option<usize> = None;
                for ch in segment.text.chars() {
                    let w = char_width(ch);
                    if w == 0 {
                        if run_start.is_some() {
                            run.push(ch);
                        }
                        continue;
                    }
                    let next = x + w;
                    // Entirely or partially left of the window: skip the
                    // whole glyph so a wide char is never half-shown.
                    if x < state.scroll_left {
                        x = next;
                        continue;
                    }
                    let rel = x - state.scroll_left;
                    if rel + w > geom.text_cols {
                        if let Some(start) = run_start {
                            surface.put_cells(
                                row16,
                                geom.gutter_width + start as u16,
                                &run,
                                attr,
                            );
                        }
                        break 'line;
                    }
                    if run_start.is_none() {
                        run_start = Some(rel);
                    }
                    run.push(ch);
                    x = next;
                }
                if let Some(start) = run_start {
                    surface.put_cells(row16, geom.gutter_width + start as u16, &run, attr);
                }
            }
        }
    }

    /// Map a logical display-cell span on a buffer row to on-screen cells
    /// and apply an attribute patch.
    fn patch_span(
        &self,
        surface: &mut dyn Surface,
        state: &EditorState,
        geom: &Geometry,
        row: usize,
        from_x: usize,
        to_x: usize,
        patch: Attr,
    ) {
        if row < state.scroll_top || row >= state.scroll_top + geom.text_rows {
            return;
        }
        let from = from_x.max(state.scroll_left);
        let to = to_x.min(state.scroll_left + geom.text_cols);
        if from >= to {
            return;
        }
        surface.change_attrs(
            (row - state.scroll_top) as u16,
            geom.gutter_width + (from - state.scroll_left) as u16,
            (to - from) as u16,
            patch,
        );
    }

    fn draw_search_highlights(
        &self,
        surface: &mut dyn Surface,
        state: &EditorState,
        geom: &Geometry,
    ) {
        let patch = self.palette.search_patch();
        for hit in &state.search_matches {
            let Some(line) = state.buffer.line(hit.row) else {
                continue;
            };
            let from = prefix_width(line, hit.start_col);
            let to = prefix_width(line, hit.end_col);
            self.patch_span(surface, state, geom, hit.row, from, to, patch);
        }
    }

    fn draw_selection(&self, surface: &mut dyn Surface, state: &EditorState, geom: &Geometry) {
        let Some((start, end)) = state.selection.normalized() else {
            return;
        };
        if start == end {
            return;
        }
        let patch = self.palette.selection_patch();
        if start.row == end.row {
            let Some(line) = state.buffer.line(start.row) else {
                return;
            };
            let from = prefix_width(line, start.col);
            let to = prefix_width(line, end.col);
            self.patch_span(surface, state, geom, start.row, from, to, patch);
        } else {
            // Rectangular block as wide as the widest line in the range.
            let block_width = (start.row..=end.row)
                .filter_map(|row| state.buffer.line(row))
                .map(display_width)
                .max()
                .unwrap_or(0)
                .max(1);
            for row in start.row..=end.row {
                self.patch_span(surface, state, geom, row, 0, block_width, patch);
            }
        }
    }

    fn draw_bracket_match(&self, surface: &mut dyn Surface, state: &EditorState, geom: &Geometry) {
        let Some((pos, ch)) = bracket::bracket_at_caret(&state.buffer, state.caret) else {
            return;
        };
        let Some(partner) = bracket::find_matching(&state.buffer, pos, ch) else {
            return;
        };
        let patch = self.palette.bracket_patch();
        for p in [pos, partner] {
            if let Some(line) = state.buffer.line(p.row) {
                let from = prefix_width(line, p.col);
                let w = line.chars().nth(p.col).map(char_width).unwrap_or(1);
                self.patch_span(surface, state, geom, p.row, from, from + w, patch);
            }
        }
    }

    fn draw_status_bar(
        &self,
        surface: &mut dyn Surface,
        state: &EditorState,
        rows: u16,
        cols: u16,
    ) {
        let row = rows - 1;
        let message_is_error = state.status_message.to_lowercase().contains("error");
        let attr = if message_is_error {
            self.palette.status_error()
        } else {
            self.palette.status()
        };
        surface.clear_row(row);
        surface.put_cells(row, 0, &" ".repeat(usize::from(cols)), attr);

        let modified = if state.is_modified() { "*" } else { "" };
        let mode = match state.caret_mode {
            CaretMode::Insert => "INS",
            CaretMode::Replace => "REP",
        };
        let left = format!(
            "• {}{} | {} | {} | Ln {}/{} | Col {} | {}",
            state.display_name(),
            modified,
            state.language,
            state.encoding,
            state.caret.row + 1,
            state.buffer.line_count(),
            state.caret.col + 1,
            mode
        );
        let left = truncate_display(&left, usize::from(cols));
        surface.put_cells(row, 0, &left, attr);

        let mut right_edge = usize::from(cols);
        if let Some(git) = &state.git {
            let right = format!("{}, {}, {}", git.user, git.branch, git.commits);
            let right_w = display_width(&right);
            let left_w = display_width(&left);
            if left_w + right_w + 2 <= usize::from(cols) {
                let x = usize::from(cols) - right_w;
                surface.put_cells(row, x as u16, &right, attr);
                right_edge = x;
            }
        }

        if !state.status_message.is_empty() {
            let left_w = display_width(&left);
            let free_start = left_w + 2;
            if right_edge > free_start + 2 {
                let free = right_edge - free_start - 1;
                let message = truncate_display(&state.status_message, free);
                let msg_w = display_width(&message);
                let x = free_start + (free - msg_w) / 2;
                surface.put_cells(row, x as u16, &message, attr);
            }
        }
    }

    fn place_cursor(&self, surface: &mut dyn Surface, state: &EditorState, geom: &Geometry) {
        if state.focus != Focus::Editor {
            surface.set_cursor_visible(false);
            return;
        }
        let caret = state.buffer.clamp(state.caret);
        let caret_x = state
            .buffer
            .line(caret.row)
            .map_or(0, |l| prefix_width(l, caret.col));
        let visible_row =
            caret.row >= state.scroll_top && caret.row < state.scroll_top + geom.text_rows;
        let visible_col = caret_x >= state.scroll_left
            && caret_x < state.scroll_left + geom.text_cols.max(1);
        if visible_row && visible_col {
            surface.move_cursor(
                (caret.row - state.scroll_top) as u16,
                geom.gutter_width + (caret_x - state.scroll_left) as u16,
            );
            surface.set_cursor_visible(true);
        } else {
            surface.set_cursor_visible(false);
        }
    }
}

/// Caret position helper shared with the main loop when echoing prompts.
pub fn caret_screen_position(state: &EditorState, geom: &Geometry) -> Option<(u16, u16)> {
    let caret: Position = state.buffer.clamp(state.caret);
    let caret_x = state
        .buffer
        .line(caret.row)
        .map_or(0, |l| prefix_width(l, caret.col));
    if caret.row < state.scroll_top || caret.row >= state.scroll_top + geom.text_rows {
        return None;
    }
    if caret_x < state.scroll_left || caret_x >= state.scroll_left + geom.text_cols {
        return None;
    }
    Some((
        (caret.row - state.scroll_top) as u16,
        geom.gutter_width + (caret_x - state.scroll_left) as u16,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_and_geometry() {
        assert_eq!(digits(1), 1);
        assert_eq!(digits(9), 1);
        assert_eq!(digits(10), 2);
        assert_eq!(digits(999), 3);

        let g = geometry(120, 24, 80, true);
        assert_eq!(g.text_rows, 22);
        assert_eq!(g.gutter_width, 4); // 3 digits + 1 space
        assert_eq!(g.text_cols, 76);

        let hidden = geometry(10, 24, 2, true);
        assert_eq!(hidden.gutter_width, 0);
        assert_eq!(hidden.text_cols, 2);
    }

    #[test]
    fn truncate_display_respects_wide_glyphs() {
        assert_eq!(truncate_display("abcdef", 3), "abc");
        assert_eq!(truncate_display("a漢b", 2), "a");
        assert_eq!(truncate_display("a漢b", 3), "a漢");
        assert_eq!(truncate_display("漢漢", 10), "漢漢");
    }
}
