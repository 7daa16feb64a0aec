//! Terminal input decoding.
//!
//! The main loop calls [`read_key`] with a bounded timeout; it never blocks
//! longer than that, so queued background results keep flowing even with no
//! keyboard activity.
//!
//! Escape sequence decoding (arrows, function keys, `Alt-<char>` chords
//! delivered as ESC + printable) is performed by the crossterm event
//! parser; this module normalizes the parsed events into the editor's
//! [`KeyEvent`] model. A key crossterm reports that the editor has no
//! representation for resolves to `Esc` and is logged, so stray sequences
//! cancel pending operations instead of inserting garbage.

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind, KeyModifiers};
use tracing::debug;

use core_events::{InputEvent, KeyCode, KeyEvent, KeyMods};

/// Poll the terminal for up to `timeout_ms`. Returns `Timeout` when no
/// event arrived; resize events are surfaced distinctly so the caller can
/// resize before the next frame.
pub fn read_key(timeout_ms: u64) -> Result<InputEvent> {
    if !event::poll(Duration::from_millis(timeout_ms))? {
        return Ok(InputEvent::Timeout);
    }
    match event::read()? {
        Event::Key(key) if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) => {
            Ok(match translate(key.code, key.modifiers) {
                Some(key) => InputEvent::Key(key),
                None => InputEvent::Timeout,
            })
        }
        Event::Resize(cols, rows) => Ok(InputEvent::Resize(cols, rows)),
        _ => Ok(InputEvent::Timeout),
    }
}

/// Map a crossterm key code + modifiers onto the editor key model.
/// Returns `None` only for key-release artifacts; unknown keys become
/// `Esc`.
pub fn translate(code: event::KeyCode, modifiers: KeyModifiers) -> Option<KeyEvent> {
    let mods = translate_mods(modifiers);
    let code = match code {
        event::KeyCode::Char(c) => KeyCode::Char(c),
        event::KeyCode::Enter => KeyCode::Enter,
        event::KeyCode::Esc => KeyCode::Esc,
        event::KeyCode::Backspace => KeyCode::Backspace,
        event::KeyCode::Tab => KeyCode::Tab,
        // Shift+Tab arrives as BackTab; the dispatcher sees tab+shift.
        event::KeyCode::BackTab => {
            return Some(KeyEvent::new(KeyCode::Tab, mods | KeyMods::SHIFT));
        }
        event::KeyCode::Up => KeyCode::Up,
        event::KeyCode::Down => KeyCode::Down,
        event::KeyCode::Left => KeyCode::Left,
        event::KeyCode::Right => KeyCode::Right,
        event::KeyCode::Home => KeyCode::Home,
        event::KeyCode::End => KeyCode::End,
        event::KeyCode::PageUp => KeyCode::PageUp,
        event::KeyCode::PageDown => KeyCode::PageDown,
        event::KeyCode::Insert => KeyCode::Insert,
        event::KeyCode::Delete => KeyCode::Delete,
        event::KeyCode::F(n) => KeyCode::F(n),
        other => {
            debug!(target: "input", key = ?other, "unrecognized_key_resolved_to_esc");
            KeyCode::Esc
        }
    };
    Some(KeyEvent::new(code, mods))
}

fn translate_mods(modifiers: KeyModifiers) -> KeyMods {
    let mut mods = KeyMods::empty();
    if modifiers.contains(KeyModifiers::CONTROL) {
        mods |= KeyMods::CTRL;
    }
    if modifiers.contains(KeyModifiers::ALT) {
        mods |= KeyMods::ALT;
    }
    if modifiers.contains(KeyModifiers::SHIFT) {
        mods |= KeyMods::SHIFT;
    }
    mods
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_translation() {
        let key = translate(event::KeyCode::Char('x'), KeyModifiers::NONE).unwrap();
        assert_eq!(key, KeyEvent::plain(KeyCode::Char('x')));
        assert_eq!(key.printable(), Some('x'));
    }

    #[test]
    fn ctrl_and_alt_chords() {
        let key = translate(event::KeyCode::Char('s'), KeyModifiers::CONTROL).unwrap();
        assert_eq!(key, KeyEvent::ctrl('s'));
        let key = translate(event::KeyCode::Char('j'), KeyModifiers::ALT).unwrap();
        assert_eq!(key, KeyEvent::alt('j'));
        assert_eq!(key.printable(), None);
    }

    #[test]
    fn back_tab_is_shift_tab() {
        let key = translate(event::KeyCode::BackTab, KeyModifiers::NONE).unwrap();
        assert_eq!(key, KeyEvent::new(KeyCode::Tab, KeyMods::SHIFT));
    }

    #[test]
    fn unknown_key_resolves_to_esc() {
        let key = translate(event::KeyCode::CapsLock, KeyModifiers::NONE).unwrap();
        assert_eq!(key.code, KeyCode::Esc);
    }
}
