//! Two-pane-style file browser panel (single listing plus parent
//! navigation). Enter on a directory descends, on a file asks the editor
//! to open it.

use std::path::PathBuf;

use core_events::{KeyCode, KeyEvent};
use core_terminal::{Attr, Surface};
use tracing::warn;

use crate::{footer_attr, is_close_key, pane_bounds, title_attr, trim_cells, Panel, PanelKind, PanelRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    is_dir: bool,
}

pub struct FileBrowserPanel {
    cwd: PathBuf,
    entries: Vec<Entry>,
    selected: usize,
    scroll: usize,
    request: Option<PanelRequest>,
}

impl FileBrowserPanel {
    pub fn new(cwd: PathBuf) -> Self {
        let mut panel = Self {
            cwd,
            entries: Vec::new(),
            selected: 0,
            scroll: 0,
            request: None,
        };
        panel.reload();
        panel
    }

    fn reload(&mut self) {
        self.entries.clear();
        self.selected = 0;
        self.scroll = 0;
        if self.cwd.parent().is_some() {
            self.entries.push(Entry {
                name: "..".to_string(),
                is_dir: true,
            });
        }
        match std::fs::read_dir(&self.cwd) {
            Ok(read_dir) => {
                let mut listed: Vec<Entry> = read_dir
                    .filter_map(|e| e.ok())
                    .map(|e| Entry {
                        name: e.file_name().to_string_lossy().into_owned(),
                        is_dir: e.file_type().map(|t| t.is_dir()).unwrap_or(false),
                    })
                    .collect();
                // Directories first, each group alphabetical.
                listed.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
                self.entries.extend(listed);
            }
            Err(err) => {
                warn!(target: "panels.browser", dir = %self.cwd.display(), %err, "read_dir_failed");
            }
        }
    }

    fn activate_selected(&mut self) {
        let Some(entry) = self.entries.get(self.selected).cloned() else {
            return;
        };
        if entry.name == ".." {
            if let Some(parent) = self.cwd.parent() {
                self.cwd = parent.to_path_buf();
                self.reload();
            }
            return;
        }
        let path = self.cwd.join(&entry.name);
        if entry.is_dir {
            self.cwd = path;
            self.reload();
        } else {
            self.request = Some(PanelRequest::OpenFile(path));
        }
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.entries.get(self.selected).map(|e| e.name.as_str())
    }

    pub fn current_dir(&self) -> &std::path::Path {
        &self.cwd
    }
}

impl Panel for FileBrowserPanel {
    fn kind(&self) -> PanelKind {
        PanelKind::FileBrowser
    }

    fn draw(&mut self, surface: &mut dyn Surface) {
        let (y0, x0, rows, cols) = pane_bounds(surface);
        if rows < 3 || cols < 4 {
            return;
        }
        let body_rows = usize::from(rows - 2);
        if self.selected < self.scroll {
            self.scroll = self.selected;
        } else if self.selected >= self.scroll + body_rows {
            self.scroll = self.selected + 1 - body_rows;
        }

        let blank = " ".repeat(usize::from(cols));
        for row in 0..rows {
            surface.put_cells(y0 + row, x0, &blank, Attr::default());
        }
        let title = format!(" {} ", self.cwd.display());
        surface.put_cells(y0, x0, &blank, title_attr());
        surface.put_cells(y0, x0, &trim_cells(&title, cols), title_attr());

        for (offset, entry) in self
            .entries
            .iter()
            .skip(self.scroll)
            .take(body_rows)
            .enumerate()
        {
            let index = self.scroll + offset;
            let marker = if entry.is_dir { "/" } else { "" };
            let label = trim_cells(&format!("{}{}", entry.name, marker), cols.saturating_sub(1));
            let attr = if index == self.selected {
                Attr::reverse()
            } else {
                Attr::default()
            };
            surface.put_cells(y0 + 1 + offset as u16, x0 + 1, &label, attr);
        }

        let footer = trim_cells("Enter open · Esc close", cols);
        surface.put_cells(y0 + rows - 1, x0, &footer, footer_attr());
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if is_close_key(key) {
            self.request = Some(PanelRequest::Close);
            return true;
        }
        match key.code {
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                true
            }
            KeyCode::Down => {
                if self.selected + 1 < self.entries.len() {
                    self.selected += 1;
                }
                true
            }
            KeyCode::Home => {
                self.selected = 0;
                true
            }
            KeyCode::End => {
                self.selected = self.entries.len().saturating_sub(1);
                true
            }
            KeyCode::Enter => {
                self.activate_selected();
                true
            }
            _ => false,
        }
    }

    fn resize(&mut self, _rows: u16, _cols: u16) {
        self.scroll = 0;
    }

    fn take_request(&mut self) -> Option<PanelRequest> {
        self.request.take()
    }
}
