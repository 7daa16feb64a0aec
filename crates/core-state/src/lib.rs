//! Editor state: buffer, caret, selection, history, scroll, and the
//! metadata the renderer and status bar read.
//!
//! This crate stays presentation-free: it owns the data and the small state
//! machines (selection, history) but never touches the terminal. The
//! orchestrator mutates state through action functions (`core-actions`) and
//! hands an immutable reference to the renderer each frame.

use std::path::PathBuf;

use core_events::GitInfo;
use core_text::{Buffer, Position};

pub mod history;
pub mod selection;

pub use history::{Action, BlockEdit, History, HistoryOutcome, LineChange};
pub use selection::{SelectionModel, SelectionSpan};

/// Caret input mode shown as `INS`/`REP` in the status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaretMode {
    #[default]
    Insert,
    Replace,
}

/// Where key events are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Editor,
    Panel,
}

/// One search hit: `(row, start_col, end_col)` in code points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    pub row: usize,
    pub start_col: usize,
    pub end_col: usize,
}

#[derive(Debug)]
pub struct EditorState {
    pub buffer: Buffer,
    pub caret: Position,
    pub selection: SelectionModel,
    pub history: History,
    /// First visible buffer row.
    pub scroll_top: usize,
    /// Horizontal scroll in display cells.
    pub scroll_left: usize,
    pub caret_mode: CaretMode,
    pub focus: Focus,
    pub status_message: String,
    /// Always updated on copy/cut so paste works without a system clipboard.
    pub internal_clipboard: String,
    pub file_path: Option<PathBuf>,
    /// Encoding label shown in the status bar (e.g. "utf-8").
    pub encoding: String,
    /// Display name of the detected language.
    pub language: String,
    pub git: Option<GitInfo>,
    pub search_matches: Vec<SearchMatch>,
    pub search_index: Option<usize>,
    pub last_query: String,
    pub force_full_redraw: bool,
    pub running: bool,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(Buffer::new())
    }
}

impl EditorState {
    pub fn new(buffer: Buffer) -> Self {
        Self {
            buffer,
            caret: Position::origin(),
            selection: SelectionModel::new(),
            history: History::new(),
            scroll_top: 0,
            scroll_left: 0,
            caret_mode: CaretMode::default(),
            focus: Focus::default(),
            status_message: String::new(),
            internal_clipboard: String::new(),
            file_path: None,
            encoding: "utf-8".to_string(),
            language: "text".to_string(),
            git: None,
            search_matches: Vec::new(),
            search_index: None,
            last_query: String::new(),
            force_full_redraw: true,
            running: true,
        }
    }

    pub fn is_modified(&self) -> bool {
        self.buffer.is_modified()
    }

    /// One-line status message; the renderer truncates to the available
    /// width and paints messages containing "error" with the error attr.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    /// Base name for the status bar; falls back for unnamed buffers.
    pub fn display_name(&self) -> String {
        self.file_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string())
    }

    /// Text covered by the active selection; empty when the selection is
    /// empty or inactive.
    pub fn selected_text(&self) -> String {
        match self.selection.normalized() {
            Some((start, end)) if start != end => self.buffer.slice(start, end),
            _ => String::new(),
        }
    }

    /// Clamp the caret and keep the trailing-line invariant; call after any
    /// buffer mutation.
    pub fn normalize_after_edit(&mut self) {
        self.buffer.ensure_trailing_line();
        self.caret = self.buffer.clamp(self.caret);
    }

    /// Recompute the modified flag after undo/redo: the buffer is modified
    /// iff any undoable action remains.
    pub fn recompute_modified(&mut self) {
        self.buffer.set_modified(!self.history.is_empty());
    }

    /// Clamp scroll so the caret stays inside a `text_rows` x `text_cols`
    /// viewport. Returns true when either scroll offset moved.
    pub fn clamp_scroll(&mut self, text_rows: usize, text_cols: usize) -> bool {
        let before = (self.scroll_top, self.scroll_left);
        if text_rows > 0 {
            if self.caret.row < self.scroll_top {
                self.scroll_top = self.caret.row;
            } else if self.caret.row >= self.scroll_top + text_rows {
                self.scroll_top = self.caret.row + 1 - text_rows;
            }
        }
        if text_cols > 0 {
            let caret_x = self
                .buffer
                .line(self.caret.row)
                .map_or(0, |l| core_text::width::prefix_width(l, self.caret.col));
            if caret_x < self.scroll_left {
                self.scroll_left = caret_x;
            } else if caret_x >= self.scroll_left + text_cols {
                self.scroll_left = caret_x + 1 - text_cols;
            }
        }
        (self.scroll_top, self.scroll_left) != before
    }

    pub fn clear_search(&mut self) {
        self.search_matches.clear();
        self.search_index = None;
    }
}
