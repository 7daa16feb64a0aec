//! quill entrypoint: CLI parsing, logging, terminal lifecycle, and the
//! editor run loop.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Once;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

use core_actions::ClipboardProvider;
use core_terminal::{CrosstermBackend, CrosstermSurface, TerminalBackend, TerminalCaps};
use quill::Editor;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "quill", version, about = "Terminal source code editor")]
struct Args {
    /// Optional path to open at startup; omitted starts an empty buffer.
    pub path: Option<PathBuf>,
    /// Configuration file path (overrides discovery of `quill.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

/// Best-effort system clipboard backed by arboard.
struct SystemClipboard(arboard::Clipboard);

impl SystemClipboard {
    fn open() -> Option<Box<dyn ClipboardProvider>> {
        match arboard::Clipboard::new() {
            Ok(clipboard) => Some(Box::new(SystemClipboard(clipboard))),
            Err(err) => {
                info!(target: "runtime", %err, "system_clipboard_unavailable");
                None
            }
        }
    }
}

impl ClipboardProvider for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.0.set_text(text.to_string())?;
        Ok(())
    }

    fn get_text(&mut self) -> Result<String> {
        Ok(self.0.get_text()?)
    }
}

fn configure_logging() -> Option<WorkerGuard> {
    let file_appender = tracing_appender::rolling::never(".", "quill.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Some(guard),
        // A subscriber is already installed (tests); drop the guard.
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            error!(target: "runtime.panic", %panic_info, "panic");
            default_panic(panic_info);
        }));
    });
}

fn run(args: Args) -> Result<()> {
    let mut backend = CrosstermBackend::new();
    backend.set_title("quill")?;
    let _guard = backend.enter_guard()?;

    let caps = TerminalCaps::detect();
    let config = core_config::load_from(args.config)?;
    let surface = CrosstermSurface::new()?;
    let clipboard = SystemClipboard::open();

    info!(
        target: "runtime.startup",
        path = ?args.path,
        colors = caps.colors,
        "startup"
    );
    let mut editor = Editor::new(surface, caps, config, args.path, clipboard);
    editor.run()
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _log_guard = configure_logging();
    install_panic_hook();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // The terminal guard has restored the screen by now.
            error!(target: "runtime", %err, "fatal");
            eprintln!("quill: {err:#}");
            ExitCode::FAILURE
        }
    }
}
