//! Overlay panel subsystem.
//!
//! At most one panel is active at a time. Panels draw onto a right-hand
//! sub-region of the terminal surface; the editor underneath is neither
//! scrolled nor resized. `show` is toggle-or-replace: requesting the
//! active panel's kind closes it, requesting a different kind swaps it.
//!
//! Panels never reach into editor state. When one wants something from the
//! editor (open a file, close itself) it parks a [`PanelRequest`] the main
//! loop collects after key handling.

use core_events::{KeyCode, KeyEvent};
use core_terminal::{Attr, Surface};
use tracing::info;

mod browser;
mod text;

pub use browser::FileBrowserPanel;
pub use text::TextPanel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    AiResponse,
    FileBrowser,
    Git,
    LintReport,
    Help,
}

/// Something a panel asks the editor to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelRequest {
    Close,
    OpenFile(std::path::PathBuf),
}

pub trait Panel {
    fn kind(&self) -> PanelKind;
    fn open(&mut self) {}
    fn close(&mut self) {}
    fn draw(&mut self, surface: &mut dyn Surface);
    /// Returns true when the panel consumed the key.
    fn handle_key(&mut self, key: KeyEvent) -> bool;
    fn resize(&mut self, rows: u16, cols: u16);
    fn take_request(&mut self) -> Option<PanelRequest> {
        None
    }
}

/// Result of a `show` call, so the caller can route focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    Opened,
    Toggled,
}

#[derive(Default)]
pub struct PanelManager {
    active: Option<Box<dyn Panel>>,
}

impl PanelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_kind(&self) -> Option<PanelKind> {
        self.active.as_ref().map(|p| p.kind())
    }

    /// Toggle-or-replace: same kind closes, different kind replaces.
    pub fn show(&mut self, mut panel: Box<dyn Panel>) -> ShowOutcome {
        if self.active_kind() == Some(panel.kind()) {
            self.close_active();
            return ShowOutcome::Toggled;
        }
        if self.is_active() {
            self.close_active();
        }
        panel.open();
        info!(target: "panels", kind = ?panel.kind(), "panel_shown");
        self.active = Some(panel);
        ShowOutcome::Opened
    }

    pub fn close_active(&mut self) {
        if let Some(mut panel) = self.active.take() {
            panel.close();
            info!(target: "panels", kind = ?panel.kind(), "panel_closed");
        }
    }

    /// Deliver a key to the active panel. Returns true when consumed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match &mut self.active {
            Some(panel) => panel.handle_key(key),
            None => false,
        }
    }

    pub fn draw(&mut self, surface: &mut dyn Surface) {
        if let Some(panel) = &mut self.active {
            panel.draw(surface);
        }
    }

    pub fn resize(&mut self, rows: u16, cols: u16) {
        if let Some(panel) = &mut self.active {
            panel.resize(rows, cols);
        }
    }

    /// Collect any pending request; a `Close` request also tears the panel
    /// down here so the caller only has to restore focus.
    pub fn take_request(&mut self) -> Option<PanelRequest> {
        let request = self.active.as_mut().and_then(|p| p.take_request());
        if matches!(request, Some(PanelRequest::Close)) {
            self.close_active();
        }
        request
    }
}

/// Geometry shared by the built-in panels: a right-hand pane spanning the
/// text area rows.
pub(crate) fn pane_bounds(surface: &dyn Surface) -> (u16, u16, u16, u16) {
    let (rows, cols) = surface.dimensions();
    let pane_cols = (cols * 2 / 5).clamp(16.min(cols), cols);
    let x0 = cols - pane_cols;
    let pane_rows = rows.saturating_sub(2);
    (0, x0, pane_rows, pane_cols)
}

pub(crate) fn title_attr() -> Attr {
    Attr::reverse().with_bold()
}

pub(crate) fn footer_attr() -> Attr {
    Attr::default().with_dim()
}

pub(crate) fn is_close_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Esc)
}

/// Wide-char-safe truncation to at most `max` display cells.
pub(crate) fn trim_cells(s: &str, max: u16) -> String {
    let max = usize::from(max);
    let mut out = String::new();
    let mut used = 0usize;
    for ch in s.chars() {
        let w = core_text::width::char_width(ch);
        if used + w > max {
            break;
        }
        out.push(ch);
        used += w;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::KeyMods;

    struct DummyPanel {
        kind: PanelKind,
        opened: bool,
        closed: bool,
    }

    impl DummyPanel {
        fn boxed(kind: PanelKind) -> Box<Self> {
            Box::new(Self {
                kind,
                opened: false,
                closed: false,
            })
        }
    }

    impl Panel for DummyPanel {
        fn kind(&self) -> PanelKind {
            self.kind
        }
        fn open(&mut self) {
            self.opened = true;
        }
        fn close(&mut self) {
            self.closed = true;
        }
        fn draw(&mut self, _surface: &mut dyn Surface) {}
        fn handle_key(&mut self, key: KeyEvent) -> bool {
            key.code == KeyCode::Char('x')
        }
        fn resize(&mut self, _rows: u16, _cols: u16) {}
    }

    #[test]
    fn show_same_kind_toggles_closed() {
        let mut manager = PanelManager::new();
        assert_eq!(
            manager.show(DummyPanel::boxed(PanelKind::Git)),
            ShowOutcome::Opened
        );
        assert!(manager.is_active());
        assert_eq!(
            manager.show(DummyPanel::boxed(PanelKind::Git)),
            ShowOutcome::Toggled
        );
        assert!(!manager.is_active());
    }

    #[test]
    fn show_different_kind_replaces() {
        let mut manager = PanelManager::new();
        manager.show(DummyPanel::boxed(PanelKind::Git));
        assert_eq!(
            manager.show(DummyPanel::boxed(PanelKind::Help)),
            ShowOutcome::Opened
        );
        assert_eq!(manager.active_kind(), Some(PanelKind::Help));
    }

    #[test]
    fn keys_route_to_active_panel() {
        let mut manager = PanelManager::new();
        assert!(!manager.handle_key(KeyEvent::plain(KeyCode::Char('x'))));
        manager.show(DummyPanel::boxed(PanelKind::Git));
        assert!(manager.handle_key(KeyEvent::plain(KeyCode::Char('x'))));
        assert!(!manager.handle_key(KeyEvent::new(KeyCode::Char('y'), KeyMods::empty())));
    }
}
