//! Scrollable text panel: AI responses, lint reports, Git summaries, help.

use core_events::{KeyCode, KeyEvent};
use core_terminal::{Attr, Surface};

use crate::{footer_attr, is_close_key, pane_bounds, title_attr, trim_cells, Panel, PanelKind, PanelRequest};

pub struct TextPanel {
    kind: PanelKind,
    title: String,
    lines: Vec<String>,
    scroll: usize,
    page: usize,
    request: Option<PanelRequest>,
}

impl TextPanel {
    pub fn new(kind: PanelKind, title: impl Into<String>, body: &str) -> Self {
        Self {
            kind,
            title: title.into(),
            lines: body.lines().map(str::to_string).collect(),
            scroll: 0,
            page: 10,
            request: None,
        }
    }

    pub fn from_lines(kind: PanelKind, title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            lines,
            scroll: 0,
            page: 10,
            request: None,
        }
    }

    fn max_scroll(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }

    pub fn scroll_position(&self) -> usize {
        self.scroll
    }
}

impl Panel for TextPanel {
    fn kind(&self) -> PanelKind {
        self.kind
    }

    fn draw(&mut self, surface: &mut dyn Surface) {
        let (y0, x0, rows, cols) = pane_bounds(surface);
        if rows < 3 || cols < 4 {
            return;
        }
        let body_rows = usize::from(rows - 2);
        self.page = body_rows.max(1);

        let blank = " ".repeat(usize::from(cols));
        for row in 0..rows {
            surface.put_cells(y0 + row, x0, &blank, Attr::default());
        }
        let title = trim_cells(&format!(" {} ", self.title), cols);
        surface.put_cells(y0, x0, &blank, title_attr());
        surface.put_cells(y0, x0, &title, title_attr());

        for (offset, line) in self
            .lines
            .iter()
            .skip(self.scroll)
            .take(body_rows)
            .enumerate()
        {
            let text = trim_cells(line, cols.saturating_sub(1));
            surface.put_cells(y0 + 1 + offset as u16, x0 + 1, &text, Attr::default());
        }

        let footer = trim_cells("↑/↓ scroll · Esc close", cols);
        surface.put_cells(y0 + rows - 1, x0, &footer, footer_attr());
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if is_close_key(key) {
            self.request = Some(PanelRequest::Close);
            return true;
        }
        match key.code {
            KeyCode::Up => {
                self.scroll = self.scroll.saturating_sub(1);
                true
            }
            KeyCode::Down => {
                self.scroll = (self.scroll + 1).min(self.max_scroll());
                true
            }
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_sub(self.page);
                true
            }
            KeyCode::PageDown => {
                self.scroll = (self.scroll + self.page).min(self.max_scroll());
                true
            }
            KeyCode::Home => {
                self.scroll = 0;
                true
            }
            KeyCode::End => {
                self.scroll = self.max_scroll();
                true
            }
            _ => false,
        }
    }

    fn resize(&mut self, rows: u16, _cols: u16) {
        self.page = usize::from(rows.saturating_sub(4)).max(1);
        self.scroll = self.scroll.min(self.max_scroll());
    }

    fn take_request(&mut self) -> Option<PanelRequest> {
        self.request.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_terminal::MemorySurface;

    fn panel_with_lines(n: usize) -> TextPanel {
        let lines: Vec<String> = (0..n).map(|i| format!("line {i}")).collect();
        TextPanel::from_lines(PanelKind::AiResponse, "AI Response", lines)
    }

    #[test]
    fn scrolling_is_bounded() {
        let mut panel = panel_with_lines(5);
        assert!(panel.handle_key(KeyEvent::plain(KeyCode::Up)));
        assert_eq!(panel.scroll_position(), 0);
        for _ in 0..10 {
            panel.handle_key(KeyEvent::plain(KeyCode::Down));
        }
        assert_eq!(panel.scroll_position(), 4);
        panel.handle_key(KeyEvent::plain(KeyCode::Home));
        assert_eq!(panel.scroll_position(), 0);
        panel.handle_key(KeyEvent::plain(KeyCode::End));
        assert_eq!(panel.scroll_position(), 4);
    }

    #[test]
    fn esc_requests_close() {
        let mut panel = panel_with_lines(1);
        assert!(panel.handle_key(KeyEvent::plain(KeyCode::Esc)));
        assert_eq!(panel.take_request(), Some(PanelRequest::Close));
        assert_eq!(panel.take_request(), None);
    }

    #[test]
    fn unhandled_keys_are_not_consumed() {
        let mut panel = panel_with_lines(1);
        assert!(!panel.handle_key(KeyEvent::plain(KeyCode::Char('q'))));
    }

    #[test]
    fn draw_renders_title_body_footer() {
        let mut surface = MemorySurface::new(12, 60);
        let mut panel = panel_with_lines(3);
        panel.draw(&mut surface);
        // Right-hand pane starts at x = 60 - 24 = 36.
        let title_row = surface.grid.row_text(0);
        assert!(title_row.contains("AI Response"), "{title_row:?}");
        let body = surface.grid.row_text(1);
        assert!(body.contains("line 0"));
        let footer = surface.grid.row_text(9);
        assert!(footer.contains("Esc close"));
    }
}
