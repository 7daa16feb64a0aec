//! File open/save/new with encoding detection.
//!
//! Opening sniffs the encoding from the raw bytes and falls back through
//! detected -> utf-8 -> latin-1 -> utf-8 with replacement, so a file always
//! opens. Line endings are normalized to `\n` in the buffer and written
//! back with the host's default newline.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use core_state::{Action, EditorState};
use core_text::{Buffer, Position};
use tracing::info;

#[cfg(windows)]
const HOST_NEWLINE: &str = "\r\n";
#[cfg(not(windows))]
const HOST_NEWLINE: &str = "\n";

/// Decode raw file bytes, returning the text and the encoding label shown
/// in the status bar.
pub fn decode_bytes(bytes: &[u8]) -> (String, String) {
    // Byte sniffing first; the detector is only trusted when it decodes
    // without errors.
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let guessed = detector.guess(None, true);
    let (decoded, used, had_errors) = guessed.decode(bytes);
    if !had_errors {
        return (decoded.into_owned(), used.name().to_lowercase());
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_string(), "utf-8".to_string());
    }
    let latin = encoding_rs::mem::decode_latin1(bytes);
    if !latin.is_empty() || bytes.is_empty() {
        return (latin.into_owned(), "latin-1".to_string());
    }
    (
        String::from_utf8_lossy(bytes).into_owned(),
        "utf-8".to_string(),
    )
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Reject empty names, embedded NULs, and Windows reserved device names.
pub fn validate_filename(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("empty filename");
    }
    if trimmed.contains('\0') {
        bail!("filename contains NUL");
    }
    let base = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .split('.')
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();
    const RESERVED: [&str; 4] = ["CON", "PRN", "AUX", "NUL"];
    if RESERVED.contains(&base.as_str()) {
        bail!("'{base}' is a reserved filename");
    }
    if let Some(num) = base.strip_prefix("COM").or_else(|| base.strip_prefix("LPT")) {
        if num.len() == 1 && num.chars().all(|c| c.is_ascii_digit()) && num != "0" {
            bail!("'{base}' is a reserved filename");
        }
    }
    Ok(())
}

/// Open `path` into the editor: decode, reset history/selection/scroll,
/// and record the open marker.
pub fn open_file(state: &mut EditorState, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("open {}", path.display()))?;
    let (raw_text, encoding) = decode_bytes(&bytes);
    let content = normalize_newlines(&raw_text);

    state.buffer = Buffer::from_content(&content);
    state.caret = Position::origin();
    state.scroll_top = 0;
    state.scroll_left = 0;
    state.selection.cancel();
    state.clear_search();
    state.history.clear();
    state.history.add_action(Action::OpenFile {
        path: Some(path.to_path_buf()),
        content,
        encoding: encoding.clone(),
    });
    state.encoding = encoding;
    state.file_path = Some(path.to_path_buf());
    state.buffer.set_modified(false);
    state.force_full_redraw = true;
    info!(
        target: "io",
        path = %path.display(),
        bytes = bytes.len(),
        lines = state.buffer.line_count(),
        encoding = %state.encoding,
        "file_opened"
    );
    state.set_status(format!(
        "Opened {} ({} lines, {})",
        state.display_name(),
        state.buffer.line_count(),
        state.encoding
    ));
    Ok(())
}

/// Write the buffer to its path using the host newline convention.
pub fn save_file(state: &mut EditorState) -> Result<()> {
    let Some(path) = state.file_path.clone() else {
        bail!("no filename");
    };
    save_to(state, &path)
}

pub fn save_file_as(state: &mut EditorState, path: PathBuf) -> Result<()> {
    validate_filename(&path.to_string_lossy())?;
    state.file_path = Some(path.clone());
    save_to(state, &path)
}

fn save_to(state: &mut EditorState, path: &Path) -> Result<()> {
    let content = state.buffer.join(HOST_NEWLINE);
    std::fs::write(path, content.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    state.buffer.set_modified(false);
    info!(target: "io", path = %path.display(), bytes = content.len(), "file_saved");
    state.set_status(format!("Saved {}", state.display_name()));
    Ok(())
}

/// Replace the buffer with a fresh unnamed one.
pub fn new_file(state: &mut EditorState, default_name: &str) -> bool {
    state.buffer = Buffer::new();
    state.caret = Position::origin();
    state.scroll_top = 0;
    state.scroll_left = 0;
    state.selection.cancel();
    state.clear_search();
    state.history.clear();
    state.history.add_action(Action::NewFile {
        name: default_name.to_string(),
    });
    state.file_path = None;
    state.encoding = "utf-8".to_string();
    state.buffer.set_modified(false);
    state.force_full_redraw = true;
    state.set_status("New file");
    true
}
