//! Terminal surface abstraction and crossterm backing.
//!
//! The renderer draws against the [`Surface`] trait: a cell grid with
//! attribute merging and exactly one flush per frame. Two implementations
//! exist: [`CrosstermSurface`] paints the grid to the real terminal on
//! flush, and [`MemorySurface`] keeps it in memory for tests.
//!
//! Raw mode and the alternate screen are managed by [`TerminalBackend`]
//! behind an RAII guard so the terminal is restored even on early return or
//! panic.

use std::io::{stdout, Write};

use anyhow::Result;
use crossterm::style::{Attribute, Color, Colors, Print, SetAttribute, SetColors};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
};

pub mod capabilities;
pub use capabilities::TerminalCaps;

use core_text::width::char_width;

// -------------------------------------------------------------------------
// Attributes
// -------------------------------------------------------------------------

/// A render attribute. `None` color fields mean "leave as-is" when merged
/// via [`Surface::change_attrs`], and "terminal default" when painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attr {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
    pub dim: bool,
    pub reverse: bool,
    pub underline: bool,
}

impl Attr {
    pub fn fg(color: Color) -> Self {
        Self {
            fg: Some(color),
            ..Default::default()
        }
    }

    pub fn bg(color: Color) -> Self {
        Self {
            bg: Some(color),
            ..Default::default()
        }
    }

    pub fn reverse() -> Self {
        Self {
            reverse: true,
            ..Default::default()
        }
    }

    pub fn with_bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn with_dim(mut self) -> Self {
        self.dim = true;
        self
    }

    pub fn with_reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Overlay `patch` on `self`: set colors carry over, flags accumulate.
    pub fn merged(self, patch: Attr) -> Attr {
        Attr {
            fg: patch.fg.or(self.fg),
            bg: patch.bg.or(self.bg),
            bold: self.bold || patch.bold,
            dim: self.dim || patch.dim,
            reverse: self.reverse || patch.reverse,
            underline: self.underline || patch.underline,
        }
    }
}

// -------------------------------------------------------------------------
// Surface
// -------------------------------------------------------------------------

/// Abstract terminal surface the renderer depends on.
pub trait Surface {
    /// `(rows, cols)`.
    fn dimensions(&self) -> (u16, u16);
    /// Erase everything (full redraw path).
    fn erase(&mut self);
    /// Clear one row to blanks with the default attribute.
    fn clear_row(&mut self, row: u16);
    /// Write text starting at `(row, col)`, truncating at the right edge
    /// without ever splitting a 2-cell glyph.
    fn put_cells(&mut self, row: u16, col: u16, text: &str, attr: Attr);
    /// Merge `patch` into the attributes of `width` cells at `(row, col)`.
    fn change_attrs(&mut self, row: u16, col: u16, width: u16, patch: Attr);
    /// Horizontal separator line.
    fn hline(&mut self, row: u16, col: u16, width: u16, attr: Attr);
    fn move_cursor(&mut self, row: u16, col: u16);
    fn set_cursor_visible(&mut self, visible: bool);
    /// Present the frame; exactly one flip per render call.
    fn flush(&mut self) -> Result<()>;
    /// Resize the backing grid (terminal resize events).
    fn resize(&mut self, rows: u16, cols: u16);
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cell {
    /// Head code point plus any zero-width combiners; empty marks the
    /// continuation cell of a wide glyph.
    symbol: String,
    attr: Attr,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            symbol: " ".to_string(),
            attr: Attr::default(),
        }
    }
}

/// Cell grid shared by both surface implementations.
#[derive(Debug, Clone)]
pub struct Grid {
    rows: u16,
    cols: u16,
    cells: Vec<Cell>,
    cursor: (u16, u16),
    cursor_visible: bool,
}

impl Grid {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Cell::default(); usize::from(rows) * usize::from(cols)],
            cursor: (0, 0),
            cursor_visible: true,
        }
    }

    fn index(&self, row: u16, col: u16) -> Option<usize> {
        if row < self.rows && col < self.cols {
            Some(usize::from(row) * usize::from(self.cols) + usize::from(col))
        } else {
            None
        }
    }

    fn erase(&mut self) {
        self.cells.fill(Cell::default());
    }

    fn clear_row(&mut self, row: u16) {
        for col in 0..self.cols {
            if let Some(i) = self.index(row, col) {
                self.cells[i] = Cell::default();
            }
        }
    }

    fn put_cells(&mut self, row: u16, col: u16, text: &str, attr: Attr) {
        let mut x = col;
        for ch in text.chars() {
            let w = char_width(ch);
            if w == 0 {
                // Combining mark: attach to the previous head cell.
                if x > col {
                    if let Some(i) = self.index(row, x - 1) {
                        if !self.cells[i].symbol.is_empty() {
                            self.cells[i].symbol.push(ch);
                        }
                    }
                }
                continue;
            }
            if u32::from(x) + w as u32 > u32::from(self.cols) {
                // A wide glyph that would straddle the edge becomes a blank
                // cell; a glyph past the edge ends the write.
                if x < self.cols {
                    if let Some(i) = self.index(row, x) {
                        self.cells[i] = Cell {
                            symbol: " ".to_string(),
                            attr,
                        };
                    }
                }
                break;
            }
            if let Some(i) = self.index(row, x) {
                self.cells[i] = Cell {
                    symbol: ch.to_string(),
                    attr,
                };
            }
            if w == 2 {
                if let Some(i) = self.index(row, x + 1) {
                    self.cells[i] = Cell {
                        symbol: String::new(),
                        attr,
                    };
                }
            }
            x += w as u16;
        }
    }

    fn change_attrs(&mut self, row: u16, col: u16, width: u16, patch: Attr) {
        for offset in 0..width {
            if let Some(i) = self.index(row, col + offset) {
                self.cells[i].attr = self.cells[i].attr.merged(patch);
            }
        }
    }

    fn resize(&mut self, rows: u16, cols: u16) {
        self.rows = rows;
        self.cols = cols;
        self.cells = vec![Cell::default(); usize::from(rows) * usize::from(cols)];
    }

    /// Visible text of one row (continuation cells skipped). Test hook.
    pub fn row_text(&self, row: u16) -> String {
        let mut out = String::new();
        for col in 0..self.cols {
            if let Some(i) = self.index(row, col) {
                out.push_str(&self.cells[i].symbol);
            }
        }
        out
    }

    /// Attribute of a single cell. Test hook.
    pub fn attr_at(&self, row: u16, col: u16) -> Option<Attr> {
        self.index(row, col).map(|i| self.cells[i].attr)
    }
}

// -------------------------------------------------------------------------
// In-memory surface (tests)
// -------------------------------------------------------------------------

/// Surface that renders into memory only.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    pub grid: Grid,
    pub flush_count: usize,
}

impl MemorySurface {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            grid: Grid::new(rows, cols),
            flush_count: 0,
        }
    }

    pub fn cursor(&self) -> (u16, u16) {
        self.grid.cursor
    }

    pub fn cursor_visible(&self) -> bool {
        self.grid.cursor_visible
    }
}

impl Surface for MemorySurface {
    fn dimensions(&self) -> (u16, u16) {
        (self.grid.rows, self.grid.cols)
    }
    fn erase(&mut self) {
        self.grid.erase();
    }
    fn clear_row(&mut self, row: u16) {
        self.grid.clear_row(row);
    }
    fn put_cells(&mut self, row: u16, col: u16, text: &str, attr: Attr) {
        self.grid.put_cells(row, col, text, attr);
    }
    fn change_attrs(&mut self, row: u16, col: u16, width: u16, patch: Attr) {
        self.grid.change_attrs(row, col, width, patch);
    }
    fn hline(&mut self, row: u16, col: u16, width: u16, attr: Attr) {
        let line: String = std::iter::repeat('─').take(usize::from(width)).collect();
        self.grid.put_cells(row, col, &line, attr);
    }
    fn move_cursor(&mut self, row: u16, col: u16) {
        self.grid.cursor = (row, col);
    }
    fn set_cursor_visible(&mut self, visible: bool) {
        self.grid.cursor_visible = visible;
    }
    fn flush(&mut self) -> Result<()> {
        self.flush_count += 1;
        Ok(())
    }
    fn resize(&mut self, rows: u16, cols: u16) {
        self.grid.resize(rows, cols);
    }
}

// -------------------------------------------------------------------------
// Crossterm surface
// -------------------------------------------------------------------------

/// Real terminal surface: grid mutations are queued in memory and painted
/// in one batch on flush.
pub struct CrosstermSurface {
    grid: Grid,
}

impl CrosstermSurface {
    pub fn new() -> Result<Self> {
        let (cols, rows) = crossterm::terminal::size()?;
        Ok(Self {
            grid: Grid::new(rows, cols),
        })
    }
}

impl Surface for CrosstermSurface {
    fn dimensions(&self) -> (u16, u16) {
        (self.grid.rows, self.grid.cols)
    }
    fn erase(&mut self) {
        self.grid.erase();
    }
    fn clear_row(&mut self, row: u16) {
        self.grid.clear_row(row);
    }
    fn put_cells(&mut self, row: u16, col: u16, text: &str, attr: Attr) {
        self.grid.put_cells(row, col, text, attr);
    }
    fn change_attrs(&mut self, row: u16, col: u16, width: u16, patch: Attr) {
        self.grid.change_attrs(row, col, width, patch);
    }
    fn hline(&mut self, row: u16, col: u16, width: u16, attr: Attr) {
        let line: String = std::iter::repeat('─').take(usize::from(width)).collect();
        self.grid.put_cells(row, col, &line, attr);
    }
    fn move_cursor(&mut self, row: u16, col: u16) {
        self.grid.cursor = (row, col);
    }
    fn set_cursor_visible(&mut self, visible: bool) {
        self.grid.cursor_visible = visible;
    }

    fn flush(&mut self) -> Result<()> {
        let mut out = stdout();
        queue!(out, Hide)?;
        for row in 0..self.grid.rows {
            queue!(out, MoveTo(0, row))?;
            let mut current: Option<Attr> = None;
            let mut run = String::new();
            for col in 0..self.grid.cols {
                let Some(i) = self.grid.index(row, col) else {
                    continue;
                };
                let cell = &self.grid.cells[i];
                if cell.symbol.is_empty() {
                    continue; // wide glyph continuation
                }
                if current != Some(cell.attr) {
                    if !run.is_empty() {
                        queue!(out, Print(std::mem::take(&mut run)))?;
                    }
                    apply_attr(&mut out, cell.attr)?;
                    current = Some(cell.attr);
                }
                run.push_str(&cell.symbol);
            }
            if !run.is_empty() {
                queue!(out, Print(run))?;
            }
        }
        queue!(out, SetAttribute(Attribute::Reset))?;
        let (row, col) = self.grid.cursor;
        queue!(out, MoveTo(col, row))?;
        if self.grid.cursor_visible {
            queue!(out, Show)?;
        }
        out.flush()?;
        Ok(())
    }

    fn resize(&mut self, rows: u16, cols: u16) {
        self.grid.resize(rows, cols);
    }
}

fn apply_attr(out: &mut impl Write, attr: Attr) -> Result<()> {
    queue!(out, SetAttribute(Attribute::Reset))?;
    queue!(
        out,
        SetColors(Colors {
            foreground: attr.fg,
            background: attr.bg,
        })
    )?;
    if attr.bold {
        queue!(out, SetAttribute(Attribute::Bold))?;
    }
    if attr.dim {
        queue!(out, SetAttribute(Attribute::Dim))?;
    }
    if attr.reverse {
        queue!(out, SetAttribute(Attribute::Reverse))?;
    }
    if attr.underline {
        queue!(out, SetAttribute(Attribute::Underlined))?;
    }
    Ok(())
}

// -------------------------------------------------------------------------
// Raw-mode lifecycle
// -------------------------------------------------------------------------

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
    fn set_title(&mut self, title: &str) -> Result<()>;
}

pub struct CrosstermBackend {
    entered: bool,
}

/// RAII guard ensuring terminal state restoration even if the caller
/// early-returns or panics.
pub struct TerminalGuard<'a> {
    backend: &'a mut CrosstermBackend,
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermBackend {
    pub fn new() -> Self {
        Self { entered: false }
    }

    /// Enter and return a guard that will leave on drop.
    pub fn enter_guard(&mut self) -> Result<TerminalGuard<'_>> {
        self.enter()?;
        Ok(TerminalGuard { backend: self })
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        if !self.entered {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide)?;
            self.entered = true;
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.entered {
            execute!(stdout(), LeaveAlternateScreen, Show)?;
            disable_raw_mode()?;
            self.entered = false;
        }
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        execute!(stdout(), SetTitle(title))?;
        Ok(())
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl<'a> Drop for TerminalGuard<'a> {
    fn drop(&mut self) {
        let _ = self.backend.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_cells_writes_and_reads_back() {
        let mut surface = MemorySurface::new(3, 10);
        surface.put_cells(1, 2, "hi", Attr::default());
        assert_eq!(surface.grid.row_text(1), "  hi      ");
    }

    #[test]
    fn wide_glyph_occupies_two_cells() {
        let mut surface = MemorySurface::new(1, 6);
        surface.put_cells(0, 0, "a漢b", Attr::default());
        // Continuation cell is invisible in row_text but consumes a column.
        assert_eq!(surface.grid.row_text(0), "a漢b  ");
        surface.put_cells(0, 4, "漢", Attr::default());
        assert_eq!(surface.grid.row_text(0), "a漢b漢");
    }

    #[test]
    fn wide_glyph_never_splits_at_edge() {
        let mut surface = MemorySurface::new(1, 3);
        surface.put_cells(0, 0, "a漢", Attr::default());
        assert_eq!(surface.grid.row_text(0), "a漢");
        // Width 3 leaves one trailing cell: the wide glyph cannot fit.
        let mut surface = MemorySurface::new(1, 2);
        surface.put_cells(0, 0, "a漢", Attr::default());
        assert_eq!(surface.grid.row_text(0), "a ");
    }

    #[test]
    fn combining_marks_join_previous_cell() {
        let mut surface = MemorySurface::new(1, 4);
        surface.put_cells(0, 0, "e\u{0301}x", Attr::default());
        assert_eq!(surface.grid.row_text(0), "e\u{0301}x  ");
    }

    #[test]
    fn change_attrs_merges() {
        let mut surface = MemorySurface::new(1, 4);
        surface.put_cells(0, 0, "word", Attr::fg(Color::Red));
        surface.change_attrs(0, 1, 2, Attr::bg(Color::Blue));
        let attr = surface.grid.attr_at(0, 1).unwrap();
        assert_eq!(attr.fg, Some(Color::Red));
        assert_eq!(attr.bg, Some(Color::Blue));
        let untouched = surface.grid.attr_at(0, 3).unwrap();
        assert_eq!(untouched.bg, None);
    }

    #[test]
    fn width_safety_cells_equal_sum_of_widths() {
        let text = "a漢e\u{0301}b";
        let mut surface = MemorySurface::new(1, 20);
        surface.put_cells(0, 0, text, Attr::default());
        let consumed: usize = text.chars().map(core_text::width::char_width).sum();
        // Cells beyond `consumed` are untouched blanks with default attrs.
        let rendered = surface.grid.row_text(0);
        assert_eq!(rendered.trim_end(), "a漢e\u{0301}b");
        assert_eq!(consumed, 5);
    }
}
