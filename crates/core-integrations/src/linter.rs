//! Linter adapter.
//!
//! Runs the configured linter command against the current file on a
//! short-lived thread and posts exactly one structured report per run to
//! the linter queue. The concrete linter (and any long-lived LSP worker
//! behind it) is external; this adapter only owns scheduling, the timeout
//! bound, and the report shape.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use core_events::{LintReport, LintSeverity, Receiver, Sender};
use tracing::{debug, warn};

pub struct LinterAdapter {
    command: Option<String>,
    timeout: Duration,
    stopped: Arc<AtomicBool>,
    tx: Sender<LintReport>,
    rx: Receiver<LintReport>,
}

impl LinterAdapter {
    /// `command` is the user-configured linter executable (for example
    /// `"ruff check"`); `None` disables linting.
    pub fn new(command: Option<String>, timeout_seconds: u64) -> Self {
        let (tx, rx) = core_events::unbounded();
        Self {
            command,
            timeout: Duration::from_secs(timeout_seconds.max(1)),
            stopped: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    pub fn is_available(&self) -> bool {
        self.command.is_some() && !self.stopped.load(Ordering::Relaxed)
    }

    /// Schedule a lint of `path`. Returns false when no linter is
    /// configured or the adapter was shut down.
    pub fn run(&self, path: Option<PathBuf>) -> bool {
        let Some(command) = self.command.clone() else {
            return false;
        };
        if self.stopped.load(Ordering::Relaxed) {
            return false;
        }
        let Some(path) = path else {
            let _ = self.tx.send(LintReport {
                severity: LintSeverity::Info,
                body: "Save the file before linting".to_string(),
            });
            return true;
        };

        let tx = self.tx.clone();
        let timeout = self.timeout;
        let stopped = Arc::clone(&self.stopped);
        std::thread::Builder::new()
            .name("quill-lint".to_string())
            .spawn(move || {
                let report = run_lint_command(&command, &path, timeout);
                if !stopped.load(Ordering::Relaxed) {
                    let _ = tx.send(report);
                }
            })
            .ok();
        true
    }

    /// Drain completed reports, FIFO. Called once per main-loop iteration.
    pub fn drain(&self) -> Vec<LintReport> {
        let mut out = Vec::new();
        while let Ok(report) = self.rx.try_recv() {
            out.push(report);
        }
        out
    }

    /// Stop accepting runs and drop any in-flight results.
    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::Relaxed);
        debug!(target: "integrations.lint", "linter_shutdown");
    }
}

fn run_lint_command(command: &str, path: &std::path::Path, timeout: Duration) -> LintReport {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        return LintReport {
            severity: LintSeverity::Error,
            body: "Lint error: empty linter command".to_string(),
        };
    };
    let child = Command::new(program)
        .args(parts)
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(err) => {
            return LintReport {
                severity: LintSeverity::Error,
                body: format!("Lint error: failed to run '{program}': {err}"),
            };
        }
    };

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let output = match child.wait_with_output() {
                    Ok(output) => output,
                    Err(err) => {
                        return LintReport {
                            severity: LintSeverity::Error,
                            body: format!("Lint error: {err}"),
                        };
                    }
                };
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let mut body = String::new();
                body.push_str(stdout.trim_end());
                if !stderr.trim().is_empty() {
                    if !body.is_empty() {
                        body.push('\n');
                    }
                    body.push_str(stderr.trim_end());
                }
                return if status.success() && body.is_empty() {
                    LintReport {
                        severity: LintSeverity::Info,
                        body: "No issues found".to_string(),
                    }
                } else if status.success() {
                    LintReport {
                        severity: LintSeverity::Warning,
                        body,
                    }
                } else {
                    LintReport {
                        severity: LintSeverity::Error,
                        body,
                    }
                };
            }
            Ok(None) if Instant::now() >= deadline => {
                warn!(target: "integrations.lint", command, "lint_command_timeout");
                let _ = child.kill();
                let _ = child.wait();
                return LintReport {
                    severity: LintSeverity::Error,
                    body: format!("Lint error: '{command}' timed out"),
                };
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(20)),
            Err(err) => {
                return LintReport {
                    severity: LintSeverity::Error,
                    body: format!("Lint error: {err}"),
                };
            }
        }
    }
}
