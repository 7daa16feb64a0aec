//! Git adapter.
//!
//! Wraps the `git` command line behind the queue contract: `update_info`
//! schedules a refresh on a short-lived thread, which posts a `GitInfo`
//! summary and a porcelain file-status map to the git queue. Subprocess
//! runs are bounded by the configured shell timeout; a timed-out child is
//! killed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use core_events::{GitEvent, GitFileStatus, GitInfo, Receiver, Sender};
use tracing::{debug, warn};

pub struct GitAdapter {
    repo_dir: PathBuf,
    enabled: bool,
    timeout: Duration,
    tx: Sender<GitEvent>,
    rx: Receiver<GitEvent>,
    info: Option<GitInfo>,
    statuses: HashMap<String, GitFileStatus>,
}

impl GitAdapter {
    pub fn new(repo_dir: PathBuf, enabled: bool, timeout_seconds: u64) -> Self {
        let (tx, rx) = core_events::unbounded();
        Self {
            repo_dir,
            enabled,
            timeout: Duration::from_secs(timeout_seconds.max(1)),
            tx,
            rx,
            info: None,
            statuses: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Latest cached summary: `(branch_marker, user, commits)`. The branch
    /// carries a trailing `*` iff the work tree is dirty.
    pub fn info(&self) -> Option<&GitInfo> {
        self.info.as_ref()
    }

    /// Cached porcelain status; keys are repo-relative, lookups also accept
    /// absolute paths under the repo root.
    pub fn file_status(&self, path: &Path) -> Option<GitFileStatus> {
        let as_str = path.to_string_lossy();
        if let Some(status) = self.statuses.get(as_str.as_ref()) {
            return Some(*status);
        }
        let relative = path.strip_prefix(&self.repo_dir).ok()?;
        self.statuses
            .get(relative.to_string_lossy().as_ref())
            .copied()
    }

    /// Schedule a background refresh; results arrive on the git queue.
    pub fn update_info(&self) {
        if !self.enabled {
            return;
        }
        let tx = self.tx.clone();
        let dir = self.repo_dir.clone();
        let timeout = self.timeout;
        std::thread::Builder::new()
            .name("quill-git".to_string())
            .spawn(move || {
                match collect_info(&dir, timeout) {
                    Ok((info, statuses)) => {
                        let _ = tx.send(GitEvent::FileStatuses(statuses));
                        let _ = tx.send(GitEvent::Info(info));
                    }
                    Err(err) => {
                        debug!(target: "integrations.git", %err, "git_refresh_failed");
                        let _ = tx.send(GitEvent::Error(err.to_string()));
                    }
                };
            })
            .ok();
    }

    /// Drain queued events into the cache, returning true when anything
    /// arrived. Called once per main-loop iteration.
    pub fn drain(&mut self) -> Vec<GitEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            match &event {
                GitEvent::Info(info) => self.info = Some(info.clone()),
                GitEvent::FileStatuses(map) => self.statuses = map.clone(),
                GitEvent::Error(_) => {}
            }
            drained.push(event);
        }
        drained
    }

    /// Multi-line summary for the Git panel.
    pub fn panel_body(&self) -> String {
        match &self.info {
            Some(info) => {
                let mut body = format!(
                    "Branch:  {}\nUser:    {}\nCommits: {}\n",
                    info.branch, info.user, info.commits
                );
                if !self.statuses.is_empty() {
                    body.push_str("\nChanges:\n");
                    let mut entries: Vec<_> = self.statuses.iter().collect();
                    entries.sort_by(|a, b| a.0.cmp(b.0));
                    for (path, status) in entries {
                        body.push_str(&format!("  {} {}\n", status_code(*status), path));
                    }
                }
                body
            }
            None => "No Git information yet".to_string(),
        }
    }
}

fn status_code(status: GitFileStatus) -> &'static str {
    match status {
        GitFileStatus::Modified => "M",
        GitFileStatus::Added => "A",
        GitFileStatus::Deleted => "D",
        GitFileStatus::Renamed => "R",
        GitFileStatus::Untracked => "??",
    }
}

fn collect_info(
    dir: &Path,
    timeout: Duration,
) -> Result<(GitInfo, HashMap<String, GitFileStatus>)> {
    let porcelain = run_git(dir, &["status", "--porcelain"], timeout)?;
    let statuses = parse_porcelain(&porcelain);
    let dirty = !porcelain.trim().is_empty();

    let mut branch = run_git(dir, &["branch", "--show-current"], timeout)
        .unwrap_or_default()
        .trim()
        .to_string();
    if branch.is_empty() {
        branch = "detached".to_string();
    }
    if dirty {
        branch.push('*');
    }
    let user = run_git(dir, &["config", "user.name"], timeout)
        .unwrap_or_default()
        .trim()
        .to_string();
    let commits = run_git(dir, &["rev-list", "--count", "HEAD"], timeout)
        .unwrap_or_else(|_| "0".to_string())
        .trim()
        .to_string();

    Ok((
        GitInfo {
            branch,
            user,
            commits,
        },
        statuses,
    ))
}

/// Parse `git status --porcelain` output into a path -> status map.
pub fn parse_porcelain(output: &str) -> HashMap<String, GitFileStatus> {
    let mut map = HashMap::new();
    for line in output.lines() {
        if line.len() < 4 {
            continue;
        }
        let code = &line[..2];
        let path = line[3..].trim();
        // Renames list "old -> new"; the new path carries the status.
        let path = path.rsplit(" -> ").next().unwrap_or(path);
        let status = match code {
            "??" => GitFileStatus::Untracked,
            code if code.contains('R') => GitFileStatus::Renamed,
            code if code.contains('A') => GitFileStatus::Added,
            code if code.contains('D') => GitFileStatus::Deleted,
            code if code.contains('M') => GitFileStatus::Modified,
            _ => continue,
        };
        map.insert(path.to_string(), status);
    }
    map
}

/// Run one git command with a kill-on-timeout bound.
fn run_git(dir: &Path, args: &[&str], timeout: Duration) -> Result<String> {
    let mut child = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn()
        .context("spawn git")?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait()? {
            Some(status) => {
                let output = child.wait_with_output()?;
                if !status.success() {
                    bail!(
                        "git {} failed: {}",
                        args.join(" "),
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
            }
            None if Instant::now() >= deadline => {
                warn!(target: "integrations.git", args = ?args, "git_command_timeout");
                let _ = child.kill();
                let _ = child.wait();
                bail!("git {} timed out", args.join(" "));
            }
            None => std::thread::sleep(Duration::from_millis(20)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn porcelain_parsing_covers_status_codes() {
        let output = " M src/main.rs\nA  new.rs\n D gone.rs\nR  old.rs -> renamed.rs\n?? scratch.txt\n";
        let map = parse_porcelain(output);
        assert_eq!(map.get("src/main.rs"), Some(&GitFileStatus::Modified));
        assert_eq!(map.get("new.rs"), Some(&GitFileStatus::Added));
        assert_eq!(map.get("gone.rs"), Some(&GitFileStatus::Deleted));
        assert_eq!(map.get("renamed.rs"), Some(&GitFileStatus::Renamed));
        assert_eq!(map.get("scratch.txt"), Some(&GitFileStatus::Untracked));
    }

    #[test]
    fn file_status_accepts_absolute_and_relative_paths() {
        let mut adapter = GitAdapter::new(PathBuf::from("/repo"), true, 5);
        adapter
            .statuses
            .insert("src/lib.rs".to_string(), GitFileStatus::Modified);
        assert_eq!(
            adapter.file_status(Path::new("src/lib.rs")),
            Some(GitFileStatus::Modified)
        );
        assert_eq!(
            adapter.file_status(Path::new("/repo/src/lib.rs")),
            Some(GitFileStatus::Modified)
        );
        assert_eq!(adapter.file_status(Path::new("other.rs")), None);
    }

    #[test]
    fn disabled_adapter_schedules_nothing() {
        let mut adapter = GitAdapter::new(PathBuf::from("."), false, 5);
        adapter.update_info();
        std::thread::sleep(Duration::from_millis(50));
        assert!(adapter.drain().is_empty());
        assert!(adapter.info().is_none());
    }

    #[test]
    fn drain_caches_info_and_statuses() {
        let mut adapter = GitAdapter::new(PathBuf::from("."), true, 5);
        adapter
            .tx
            .send(GitEvent::Info(GitInfo {
                branch: "main*".to_string(),
                user: "dev".to_string(),
                commits: "42".to_string(),
            }))
            .unwrap();
        let events = adapter.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(adapter.info().unwrap().branch, "main*");
        assert!(adapter.panel_body().contains("Commits: 42"));
    }
}
