//! quill — terminal source code editor.
//!
//! The library surface exists so integration tests can drive the editor
//! core against an in-memory terminal; the binary in `main.rs` wires the
//! same [`editor::Editor`] to the real crossterm surface.

pub mod editor;

pub use editor::Editor;
