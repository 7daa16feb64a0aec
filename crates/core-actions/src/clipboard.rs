//! Copy, cut, paste.
//!
//! The system clipboard is best-effort: the internal clipboard is always
//! updated on copy/cut, so paste keeps working when no system provider is
//! available (headless sessions, broken display servers).

use core_state::EditorState;
use tracing::warn;

/// Minimal system clipboard interface; the binary supplies an `arboard`
/// backed implementation.
pub trait ClipboardProvider {
    fn set_text(&mut self, text: &str) -> anyhow::Result<()>;
    fn get_text(&mut self) -> anyhow::Result<String>;
}

fn capture_selection(
    state: &mut EditorState,
    system: Option<&mut (dyn ClipboardProvider + 'static)>,
) -> Option<usize> {
    let text = state.selected_text();
    if text.is_empty() {
        state.set_status("Nothing to copy");
        return None;
    }
    let count = text.chars().count();
    state.internal_clipboard = text.clone();
    if let Some(clip) = system {
        if let Err(err) = clip.set_text(&text) {
            warn!(target: "actions.clipboard", %err, "system_clipboard_set_failed");
        }
    }
    Some(count)
}

pub fn copy(state: &mut EditorState, system: Option<&mut (dyn ClipboardProvider + 'static)>) -> bool {
    if let Some(count) = capture_selection(state, system) {
        state.set_status(format!("Copied {count} character(s)"));
    }
    true
}

pub fn cut(state: &mut EditorState, system: Option<&mut (dyn ClipboardProvider + 'static)>) -> bool {
    if let Some(count) = capture_selection(state, system) {
        crate::edit::delete_selection(state);
        state.set_status(format!("Cut {count} character(s)"));
    }
    true
}

/// Paste from the system clipboard when enabled and readable, else from
/// the internal clipboard. Subject to the selection-replace rule.
pub fn paste(state: &mut EditorState, system: Option<&mut (dyn ClipboardProvider + 'static)>) -> bool {
    let mut text = String::new();
    if let Some(clip) = system {
        match clip.get_text() {
            Ok(content) => text = content,
            Err(err) => {
                warn!(target: "actions.clipboard", %err, "system_clipboard_get_failed");
            }
        }
    }
    if text.is_empty() {
        text = state.internal_clipboard.clone();
    }
    if text.is_empty() {
        state.set_status("Clipboard is empty");
        return true;
    }
    let count = text.chars().count();
    crate::edit::insert_text(state, &text);
    state.set_status(format!("Pasted {count} character(s)"));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::{Buffer, Position};

    #[derive(Default)]
    struct FakeClipboard {
        content: String,
        broken: bool,
    }

    impl ClipboardProvider for FakeClipboard {
        fn set_text(&mut self, text: &str) -> anyhow::Result<()> {
            if self.broken {
                anyhow::bail!("no clipboard");
            }
            self.content = text.to_string();
            Ok(())
        }
        fn get_text(&mut self) -> anyhow::Result<String> {
            if self.broken {
                anyhow::bail!("no clipboard");
            }
            Ok(self.content.clone())
        }
    }

    fn state_with(lines: &[&str]) -> EditorState {
        EditorState::new(Buffer::from_content(&lines.join("\n")))
    }

    #[test]
    fn copy_without_selection_reports_status() {
        let mut state = state_with(&["abc"]);
        copy(&mut state, None);
        assert_eq!(state.status_message, "Nothing to copy");
        assert!(state.internal_clipboard.is_empty());
    }

    #[test]
    fn copy_updates_internal_and_system() {
        let mut state = state_with(&["hello"]);
        state
            .selection
            .set(Position::new(0, 0), Position::new(0, 4));
        let mut clip = FakeClipboard::default();
        copy(&mut state, Some(&mut clip));
        assert_eq!(state.internal_clipboard, "hell");
        assert_eq!(clip.content, "hell");
    }

    #[test]
    fn broken_system_clipboard_still_copies_internally() {
        let mut state = state_with(&["hello"]);
        state
            .selection
            .set(Position::new(0, 0), Position::new(0, 5));
        let mut clip = FakeClipboard {
            broken: true,
            ..Default::default()
        };
        copy(&mut state, Some(&mut clip));
        assert_eq!(state.internal_clipboard, "hello");
    }

    #[test]
    fn cut_removes_selection() {
        let mut state = state_with(&["hello world"]);
        state
            .selection
            .set(Position::new(0, 5), Position::new(0, 11));
        cut(&mut state, None);
        assert_eq!(state.buffer.line(0), Some("hello"));
        assert_eq!(state.internal_clipboard, " world");
    }

    #[test]
    fn paste_prefers_system_then_falls_back() {
        let mut state = state_with(&[""]);
        state.internal_clipboard = "internal".to_string();
        let mut clip = FakeClipboard {
            content: "system".to_string(),
            ..Default::default()
        };
        paste(&mut state, Some(&mut clip));
        assert_eq!(state.buffer.line(0), Some("system"));

        let mut state = state_with(&[""]);
        state.internal_clipboard = "internal".to_string();
        paste(&mut state, None);
        assert_eq!(state.buffer.line(0), Some("internal"));
    }

    #[test]
    fn paste_empty_clipboard_reports_status() {
        let mut state = state_with(&["x"]);
        paste(&mut state, None);
        assert_eq!(state.status_message, "Clipboard is empty");
    }

    #[test]
    fn paste_replaces_selection_as_one_step() {
        let mut state = state_with(&["abcdef"]);
        state.internal_clipboard = "XY".to_string();
        state
            .selection
            .set(Position::new(0, 1), Position::new(0, 5));
        paste(&mut state, None);
        assert_eq!(state.buffer.line(0), Some("aXYf"));
        crate::edit::undo(&mut state);
        assert_eq!(state.buffer.line(0), Some("abcdef"));
    }
}
