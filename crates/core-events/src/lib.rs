//! Shared event and message types.
//!
//! Every channel that crosses a thread boundary carries a type declared
//! here, so producer crates (tasks, git, linter) and the consumer (the main
//! loop) agree on one vocabulary without depending on each other.
//!
//! Queue policy: background producers post to unbounded crossbeam channels;
//! the UI thread drains each queue once per loop iteration with `try_recv`
//! in a fixed order (async results, git, linter). Nothing on the UI thread
//! ever blocks on these queues.

use std::collections::HashMap;
use std::fmt;

pub use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

// -------------------------------------------------------------------------
// Key events
// -------------------------------------------------------------------------

/// A named special key. Printable input travels as `KeyCode::Char`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Enter,
    Esc,
    Backspace,
    Tab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    F(u8),
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct KeyMods: u8 {
        const CTRL  = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const SHIFT = 0b0000_0100;
    }
}

/// A decoded key press: code plus modifier mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub mods: KeyMods,
}

impl KeyEvent {
    pub fn new(code: KeyCode, mods: KeyMods) -> Self {
        Self { code, mods }
    }

    pub fn plain(code: KeyCode) -> Self {
        Self {
            code,
            mods: KeyMods::empty(),
        }
    }

    pub fn ctrl(ch: char) -> Self {
        Self {
            code: KeyCode::Char(ch),
            mods: KeyMods::CTRL,
        }
    }

    pub fn alt(ch: char) -> Self {
        Self {
            code: KeyCode::Char(ch),
            mods: KeyMods::ALT,
        }
    }

    /// The printable code point this event would insert, if any. Ctrl/Alt
    /// chords never insert.
    pub fn printable(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c)
                if !self.mods.contains(KeyMods::CTRL) && !self.mods.contains(KeyMods::ALT) =>
            {
                Some(c)
            }
            _ => None,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mods.contains(KeyMods::CTRL) {
            write!(f, "ctrl+")?;
        }
        if self.mods.contains(KeyMods::ALT) {
            write!(f, "alt+")?;
        }
        if self.mods.contains(KeyMods::SHIFT) {
            write!(f, "shift+")?;
        }
        match self.code {
            KeyCode::Char(c) => write!(f, "{c}"),
            KeyCode::F(n) => write!(f, "f{n}"),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

/// What a single poll of the terminal input produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Terminal resized to (cols, rows).
    Resize(u16, u16),
    /// The poll timed out with no input.
    Timeout,
}

// -------------------------------------------------------------------------
// Async task engine messages
// -------------------------------------------------------------------------

/// Everything an AI request needs besides the prompt; resolved from
/// configuration and environment by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiRequestConfig {
    pub api_key: String,
    pub model: String,
    pub system_message: Option<String>,
    /// Operation-level timeout in seconds.
    pub timeout_secs: u64,
}

/// Inbound messages for the async task worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRequest {
    AiChat {
        provider: String,
        prompt: String,
        config: AiRequestConfig,
    },
    Shutdown,
}

/// Classification of background task failures surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskErrorKind {
    Auth,
    Quota,
    RateLimit,
    BadRequest,
    Server,
    Network,
    Timeout,
    Unknown,
}

impl fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskErrorKind::Auth => "auth",
            TaskErrorKind::Quota => "quota",
            TaskErrorKind::RateLimit => "rate_limit",
            TaskErrorKind::BadRequest => "bad_request",
            TaskErrorKind::Server => "server",
            TaskErrorKind::Network => "network",
            TaskErrorKind::Timeout => "timeout",
            TaskErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Outbound results from the async task worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    AiReply { provider: String, text: String },
    TaskError { kind: TaskErrorKind, message: String },
}

// -------------------------------------------------------------------------
// Git adapter messages
// -------------------------------------------------------------------------

/// Summary shown in the status bar; `branch` carries a trailing `*` iff the
/// work tree has uncommitted changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitInfo {
    pub branch: String,
    pub user: String,
    pub commits: String,
}

/// Porcelain status of one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitFileStatus {
    Modified,
    Added,
    Deleted,
    Renamed,
    Untracked,
}

#[derive(Debug, Clone)]
pub enum GitEvent {
    Info(GitInfo),
    /// Path -> status map rebuilt from `git status --porcelain`; keys are
    /// stored repo-relative, lookups accept absolute paths too.
    FileStatuses(HashMap<String, GitFileStatus>),
    Error(String),
}

// -------------------------------------------------------------------------
// Linter adapter messages
// -------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LintSeverity {
    Info,
    Warning,
    Error,
}

/// One structured report per lint run.
#[derive(Debug, Clone)]
pub struct LintReport {
    pub severity: LintSeverity,
    pub body: String,
}
