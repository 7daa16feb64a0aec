//! Editor actions: every state mutation a key binding can trigger.
//!
//! Actions are free functions over [`core_state::EditorState`] (plus the
//! collaborators each one needs), returning a `bool` state-changed flag the
//! main loop uses to gate redraws. History recording happens here, around
//! the buffer primitives; the buffer itself stays history-free.

pub mod block;
pub mod clipboard;
pub mod comment;
pub mod edit;
pub mod file;
pub mod motion;
pub mod search;

pub use clipboard::ClipboardProvider;
