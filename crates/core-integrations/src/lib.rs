//! External integrations consumed by the editor core: AI chat providers,
//! the Git adapter, and the linter adapter.
//!
//! Every adapter does its blocking work off the UI thread and posts one
//! structured result per run to a queue the main loop drains; none of them
//! ever touches editor state.

pub mod ai;
pub mod git;
pub mod linter;

pub use ai::{AiError, AiTaskExecutor};
pub use git::GitAdapter;
pub use linter::LinterAdapter;
