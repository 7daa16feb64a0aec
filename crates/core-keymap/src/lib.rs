//! Key binding table.
//!
//! Pure and deterministic: a binding table is compiled once at startup from
//! the built-in defaults overlaid with `[keybindings]` configuration, and
//! lookups are a plain map probe on the canonicalized key event. Dispatch
//! over the resulting [`EditorAction`] is exhaustive at the call site; no
//! action is ever resolved by name at runtime.
//!
//! Key specification grammar: `ctrl+s`, `alt-j`, `shift+up`, `f5`, `del`,
//! bare printable characters, or a raw integer for terminal codes the
//! grammar cannot name. `+` and `-` both separate modifier tokens. An
//! unknown modifier invalidates that single specification; the rest of the
//! list still applies.

use std::collections::HashMap;

use core_config::Config;
use core_events::{KeyCode, KeyEvent, KeyMods};
use smallvec::SmallVec;
use tracing::{debug, warn};

/// Every editor action a key can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MoveHome,
    MoveEnd,
    PageUp,
    PageDown,
    ExtendUp,
    ExtendDown,
    ExtendLeft,
    ExtendRight,
    ExtendHome,
    ExtendEnd,
    SelectAll,
    InsertNewline,
    InsertTab,
    Backspace,
    DeleteForward,
    Undo,
    Redo,
    Copy,
    Cut,
    Paste,
    ToggleComment,
    BlockIndent,
    BlockUnindent,
    Find,
    FindNext,
    ReplaceAll,
    GotoLine,
    SaveFile,
    SaveFileAs,
    OpenFile,
    NewFile,
    ToggleInsertMode,
    CancelOperation,
    Quit,
    ShowGitPanel,
    ShowFileBrowser,
    ShowLintPanel,
    ShowHelpPanel,
    AskAi,
    RunLint,
}

impl EditorAction {
    /// Configuration key under `[keybindings]`.
    pub fn config_name(&self) -> &'static str {
        match self {
            EditorAction::MoveUp => "move_up",
            EditorAction::MoveDown => "move_down",
            EditorAction::MoveLeft => "move_left",
            EditorAction::MoveRight => "move_right",
            EditorAction::MoveHome => "home",
            EditorAction::MoveEnd => "end",
            EditorAction::PageUp => "page_up",
            EditorAction::PageDown => "page_down",
            EditorAction::ExtendUp => "extend_selection_up",
            EditorAction::ExtendDown => "extend_selection_down",
            EditorAction::ExtendLeft => "extend_selection_left",
            EditorAction::ExtendRight => "extend_selection_right",
            EditorAction::ExtendHome => "select_to_home",
            EditorAction::ExtendEnd => "select_to_end",
            EditorAction::SelectAll => "select_all",
            EditorAction::InsertNewline => "new_line",
            EditorAction::InsertTab => "tab",
            EditorAction::Backspace => "delete_back",
            EditorAction::DeleteForward => "delete_forward",
            EditorAction::Undo => "undo",
            EditorAction::Redo => "redo",
            EditorAction::Copy => "copy",
            EditorAction::Cut => "cut",
            EditorAction::Paste => "paste",
            EditorAction::ToggleComment => "toggle_comment",
            EditorAction::BlockIndent => "indent_block",
            EditorAction::BlockUnindent => "unindent_block",
            EditorAction::Find => "find",
            EditorAction::FindNext => "find_next",
            EditorAction::ReplaceAll => "search_and_replace",
            EditorAction::GotoLine => "goto_line",
            EditorAction::SaveFile => "save_file",
            EditorAction::SaveFileAs => "save_as",
            EditorAction::OpenFile => "open_file",
            EditorAction::NewFile => "new_file",
            EditorAction::ToggleInsertMode => "toggle_insert_mode",
            EditorAction::CancelOperation => "cancel_operation",
            EditorAction::Quit => "quit",
            EditorAction::ShowGitPanel => "git_menu",
            EditorAction::ShowFileBrowser => "file_browser",
            EditorAction::ShowLintPanel => "show_lint_panel",
            EditorAction::ShowHelpPanel => "help",
            EditorAction::AskAi => "ai_chat",
            EditorAction::RunLint => "lint_run",
        }
    }

    pub fn all() -> &'static [EditorAction] {
        use EditorAction::*;
        &[
            MoveUp,
            MoveDown,
            MoveLeft,
            MoveRight,
            MoveHome,
            MoveEnd,
            PageUp,
            PageDown,
            ExtendUp,
            ExtendDown,
            ExtendLeft,
            ExtendRight,
            ExtendHome,
            ExtendEnd,
            SelectAll,
            InsertNewline,
            InsertTab,
            Backspace,
            DeleteForward,
            Undo,
            Redo,
            Copy,
            Cut,
            Paste,
            ToggleComment,
            BlockIndent,
            BlockUnindent,
            Find,
            FindNext,
            ReplaceAll,
            GotoLine,
            SaveFile,
            SaveFileAs,
            OpenFile,
            NewFile,
            ToggleInsertMode,
            CancelOperation,
            Quit,
            ShowGitPanel,
            ShowFileBrowser,
            ShowLintPanel,
            ShowHelpPanel,
            AskAi,
            RunLint,
        ]
    }

    /// Default key specifications per action.
    fn default_specs(&self) -> &'static [&'static str] {
        match self {
            EditorAction::MoveUp => &["up"],
            EditorAction::MoveDown => &["down"],
            EditorAction::MoveLeft => &["left"],
            EditorAction::MoveRight => &["right"],
            EditorAction::MoveHome => &["home"],
            EditorAction::MoveEnd => &["end"],
            EditorAction::PageUp => &["pageup"],
            EditorAction::PageDown => &["pagedown"],
            EditorAction::ExtendUp => &["shift+up"],
            EditorAction::ExtendDown => &["shift+down"],
            EditorAction::ExtendLeft => &["shift+left"],
            EditorAction::ExtendRight => &["shift+right"],
            EditorAction::ExtendHome => &["shift+home"],
            EditorAction::ExtendEnd => &["shift+end"],
            EditorAction::SelectAll => &["ctrl+a"],
            EditorAction::InsertNewline => &["enter"],
            EditorAction::InsertTab => &["tab"],
            EditorAction::Backspace => &["backspace"],
            EditorAction::DeleteForward => &["delete"],
            EditorAction::Undo => &["ctrl+z"],
            EditorAction::Redo => &["ctrl+y"],
            EditorAction::Copy => &["ctrl+c"],
            EditorAction::Cut => &["ctrl+x"],
            EditorAction::Paste => &["ctrl+v"],
            EditorAction::ToggleComment => &["ctrl+_"],
            EditorAction::BlockIndent => &["alt-right"],
            EditorAction::BlockUnindent => &["alt-left"],
            EditorAction::Find => &["ctrl+f"],
            EditorAction::FindNext => &["f3"],
            EditorAction::ReplaceAll => &["f6"],
            EditorAction::GotoLine => &["ctrl+g"],
            EditorAction::SaveFile => &["ctrl+s"],
            EditorAction::SaveFileAs => &["f5"],
            EditorAction::OpenFile => &["ctrl+o"],
            EditorAction::NewFile => &["f2"],
            EditorAction::ToggleInsertMode => &["insert"],
            EditorAction::CancelOperation => &["esc"],
            EditorAction::Quit => &["ctrl+q"],
            EditorAction::ShowGitPanel => &["f9"],
            EditorAction::ShowFileBrowser => &["f1"],
            EditorAction::ShowLintPanel => &["f8"],
            EditorAction::ShowHelpPanel => &["f12"],
            EditorAction::AskAi => &["alt-a"],
            EditorAction::RunLint => &["f7"],
        }
    }
}

/// Compiled binding table: canonical key event -> action.
#[derive(Debug, Default)]
pub struct Keymap {
    bindings: HashMap<KeyEvent, EditorAction>,
}

impl Keymap {
    /// Built-in defaults only.
    pub fn with_defaults() -> Self {
        let mut map = Self::default();
        for action in EditorAction::all() {
            for spec in action.default_specs() {
                match parse_keyspec(spec) {
                    Ok(key) => map.bind(key, *action),
                    Err(err) => warn!(target: "keymap", spec, %err, "default_spec_invalid"),
                }
            }
        }
        map
    }

    /// Defaults overlaid with the user's `[keybindings]` section. A user
    /// entry replaces the defaults for that action wholesale.
    pub fn from_config(config: &Config) -> Self {
        let mut map = Self::with_defaults();
        for action in EditorAction::all() {
            let Some(value) = config.file.keybindings.get(action.config_name()) else {
                continue;
            };
            map.bindings.retain(|_, a| *a != *action);
            let mut seen: SmallVec<[KeyEvent; 4]> = SmallVec::new();
            for spec in value.specs() {
                match parse_keyspec(&spec) {
                    Ok(key) => {
                        if seen.contains(&key) {
                            continue;
                        }
                        seen.push(key);
                        map.bind(key, *action);
                    }
                    Err(err) => {
                        warn!(target: "keymap", action = action.config_name(), spec = %spec, %err, "keyspec_skipped");
                    }
                }
            }
        }
        debug!(target: "keymap", bindings = map.bindings.len(), "keymap_compiled");
        map
    }

    fn bind(&mut self, key: KeyEvent, action: EditorAction) {
        if let Some(previous) = self.bindings.insert(canonicalize(key), action) {
            if previous != action {
                warn!(
                    target: "keymap",
                    key = %key,
                    from = previous.config_name(),
                    to = action.config_name(),
                    "binding_overridden"
                );
            }
        }
    }

    pub fn action_for(&self, key: KeyEvent) -> Option<EditorAction> {
        self.bindings.get(&canonicalize(key)).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// `(keyspec, action-name)` pairs sorted by action, for the help panel.
    pub fn describe(&self) -> Vec<(String, &'static str)> {
        let mut rows: Vec<(String, &'static str)> = self
            .bindings
            .iter()
            .map(|(key, action)| (key.to_string(), action.config_name()))
            .collect();
        rows.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(&b.0)));
        rows
    }
}

/// Terminals report shifted printables as the shifted character itself, so
/// SHIFT on a `Char` key is redundant and dropped for table lookups.
fn canonicalize(mut key: KeyEvent) -> KeyEvent {
    if matches!(key.code, KeyCode::Char(_)) {
        key.mods.remove(KeyMods::SHIFT);
    }
    key
}

/// Parse one key specification string into a canonical key event.
pub fn parse_keyspec(spec: &str) -> Result<KeyEvent, String> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err("empty key specification".to_string());
    }
    // Raw integer escape hatch for terminal-specific codes.
    if let Ok(raw) = spec.parse::<i64>() {
        return raw_code(raw).ok_or_else(|| format!("unsupported raw key code {raw}"));
    }

    let mut mods = KeyMods::empty();
    let tokens: Vec<&str> = spec
        .split(['+', '-'])
        .filter(|t| !t.is_empty())
        .collect();
    // A bare "+" or "-" key survives the split as an empty list.
    let tokens = if tokens.is_empty() { vec![spec] } else { tokens };
    let (last, modifiers) = tokens.split_last().expect("non-empty token list");
    for token in modifiers {
        match token.to_lowercase().as_str() {
            "ctrl" | "control" => mods |= KeyMods::CTRL,
            "alt" | "meta" => mods |= KeyMods::ALT,
            "shift" => mods |= KeyMods::SHIFT,
            other => return Err(format!("unknown modifier '{other}'")),
        }
    }
    let code = key_name_to_code(last)?;
    Ok(canonicalize(KeyEvent::new(code, mods)))
}

fn key_name_to_code(name: &str) -> Result<KeyCode, String> {
    let lower = name.to_lowercase();
    let code = match lower.as_str() {
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" | "pgup" => KeyCode::PageUp,
        "pagedown" | "pgdn" => KeyCode::PageDown,
        "insert" | "ins" => KeyCode::Insert,
        "delete" | "del" => KeyCode::Delete,
        "tab" => KeyCode::Tab,
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "backspace" => KeyCode::Backspace,
        "space" => KeyCode::Char(' '),
        _ => {
            if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                if (1..=12).contains(&n) {
                    return Ok(KeyCode::F(n));
                }
                return Err(format!("function key out of range: {name}"));
            }
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return Err(format!("unknown key name '{name}'")),
            }
        }
    };
    Ok(code)
}

/// Legacy terminal codes accepted as raw integers.
fn raw_code(raw: i64) -> Option<KeyEvent> {
    let key = match raw {
        9 => KeyEvent::plain(KeyCode::Tab),
        10 | 13 => KeyEvent::plain(KeyCode::Enter),
        27 => KeyEvent::plain(KeyCode::Esc),
        127 | 263 => KeyEvent::plain(KeyCode::Backspace),
        330 => KeyEvent::plain(KeyCode::Delete),
        331 => KeyEvent::plain(KeyCode::Insert),
        338 => KeyEvent::plain(KeyCode::PageDown),
        339 => KeyEvent::plain(KeyCode::PageUp),
        // Control characters 1..=26 map onto ctrl+letter.
        1..=26 => KeyEvent::ctrl((b'a' + (raw as u8) - 1) as char),
        _ => return None,
    };
    Some(key)
}
