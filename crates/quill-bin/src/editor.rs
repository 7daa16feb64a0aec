//! Editor orchestrator: owns every subsystem and runs the main loop.
//!
//! Loop shape per iteration: drain background queues (async results, git,
//! linter) in a fixed order, read one key with a 100 ms bound, route it
//! (resize first, then active prompt, then focused panel, then the binding
//! table, then printable fallback insert), and redraw only when something
//! observable changed.
//!
//! All state mutation happens on this thread; background workers only talk
//! through queues.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, error, info};

use core_actions::{block, clipboard, comment, edit, file, motion, search, ClipboardProvider};
use core_config::Config;
use core_events::{
    GitEvent, InputEvent, KeyCode, KeyEvent, LintReport, LintSeverity, TaskRequest, TaskResult,
};
use core_integrations::{ai, AiTaskExecutor, GitAdapter, LinterAdapter};
use core_keymap::{EditorAction, Keymap};
use core_panels::{FileBrowserPanel, PanelKind, PanelManager, PanelRequest, ShowOutcome, TextPanel};
use core_render::{Palette, Renderer};
use core_state::{EditorState, Focus};
use core_syntax::SyntaxEngine;
use core_terminal::{Surface, TerminalCaps};
use core_text::Buffer;

/// Input poll bound; keeps background results flowing with no keyboard
/// activity.
pub const INPUT_TIMEOUT_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PromptKind {
    Find,
    GotoLine,
    OpenPath,
    SaveAs,
    ReplacePattern,
    ReplaceWith { pattern: String },
    AiPrompt,
    ConfirmExit,
}

#[derive(Debug, Clone)]
struct Prompt {
    kind: PromptKind,
    input: String,
}

impl Prompt {
    fn new(kind: PromptKind) -> Self {
        Self {
            kind,
            input: String::new(),
        }
    }

    fn label(&self) -> &'static str {
        match self.kind {
            PromptKind::Find => "Find",
            PromptKind::GotoLine => "Go to line",
            PromptKind::OpenPath => "Open file",
            PromptKind::SaveAs => "Save as",
            PromptKind::ReplacePattern => "Replace pattern",
            PromptKind::ReplaceWith { .. } => "Replace with",
            PromptKind::AiPrompt => "Ask AI",
            PromptKind::ConfirmExit => "Save changes before exit? (y/n/esc)",
        }
    }
}

pub struct Editor<S: Surface> {
    pub state: EditorState,
    surface: S,
    config: Config,
    syntax: SyntaxEngine,
    keymap: Keymap,
    renderer: Renderer,
    panels: PanelManager,
    tasks: core_tasks::AsyncEngine,
    git: GitAdapter,
    linter: LinterAdapter,
    clipboard: Option<Box<dyn ClipboardProvider>>,
    prompt: Option<Prompt>,
    last_lint: Option<LintReport>,
    last_autosave: Instant,
}

impl<S: Surface> Editor<S> {
    pub fn new(
        surface: S,
        caps: TerminalCaps,
        config: Config,
        path: Option<PathBuf>,
        system_clipboard: Option<Box<dyn ClipboardProvider>>,
    ) -> Self {
        let mut state = EditorState::new(Buffer::new());
        let mut syntax = SyntaxEngine::new();
        let keymap = Keymap::from_config(&config);
        let renderer = Renderer::new(
            Palette::for_caps(caps, &config),
            config.file.editor.show_line_numbers,
        );

        if let Some(path) = path {
            match file::open_file(&mut state, &path) {
                Ok(()) => {}
                Err(err) => {
                    error!(target: "runtime", %err, "startup_open_failed");
                    state.set_status(format!("Open error: {err}"));
                }
            }
        }
        detect_language(&mut state, &mut syntax, &config);

        let repo_dir = state
            .file_path
            .as_ref()
            .and_then(|p| p.parent().map(|d| d.to_path_buf()))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let shell_timeout = config.file.shell.timeout_seconds;
        let git = GitAdapter::new(repo_dir, config.file.git.enabled, shell_timeout);
        if git.is_enabled() {
            git.update_info();
        }
        let linter = LinterAdapter::new(config.file.linter.command.clone(), shell_timeout);
        let tasks = core_tasks::AsyncEngine::start(Arc::new(AiTaskExecutor));
        let clipboard = if config.file.editor.use_system_clipboard {
            system_clipboard
        } else {
            None
        };

        Self {
            state,
            surface,
            config,
            syntax,
            keymap,
            renderer,
            panels: PanelManager::new(),
            tasks,
            git,
            linter,
            clipboard,
            prompt: None,
            last_lint: None,
            last_autosave: Instant::now(),
        }
    }

    /// Run until quit; restores nothing (the terminal guard in `main`
    /// owns raw-mode lifecycle).
    pub fn run(&mut self) -> Result<()> {
        self.state.force_full_redraw = true;
        self.render_frame()?;
        while self.state.running {
            let mut changed = self.drain_background();
            changed |= self.autosave_tick();
            let event = core_input::read_key(INPUT_TIMEOUT_MS)?;
            changed |= self.handle_input(event);
            if changed || self.state.force_full_redraw {
                self.render_frame()?;
            }
        }
        self.shutdown();
        Ok(())
    }

    pub fn shutdown(&mut self) {
        info!(target: "runtime", "editor_shutdown");
        self.tasks.shutdown();
        self.linter.shutdown();
    }

    // ---------------------------------------------------------------------
    // Input routing
    // ---------------------------------------------------------------------

    /// Route one input event. Returns true when observable state changed.
    pub fn handle_input(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::Timeout => false,
            InputEvent::Resize(cols, rows) => {
                self.surface.resize(rows, cols);
                self.panels.resize(rows, cols);
                self.state.force_full_redraw = true;
                true
            }
            InputEvent::Key(key) => {
                if self.prompt.is_some() {
                    return self.handle_prompt_key(key);
                }
                if self.state.focus == Focus::Panel {
                    let consumed = self.panels.handle_key(key);
                    let mut changed = consumed;
                    changed |= self.apply_panel_request();
                    if consumed {
                        return changed;
                    }
                    return changed | self.dispatch_key(key);
                }
                self.dispatch_key(key)
            }
        }
    }

    fn dispatch_key(&mut self, key: KeyEvent) -> bool {
        if let Some(action) = self.keymap.action_for(key) {
            debug!(target: "runtime.dispatch", key = %key, action = action.config_name(), "action");
            return self.perform(action);
        }
        if let Some(ch) = key.printable() {
            return edit::insert_text(&mut self.state, &ch.to_string());
        }
        false
    }

    fn text_rows(&self) -> usize {
        self.renderer.geometry_for(&self.surface, &self.state).text_rows
    }

    fn perform(&mut self, action: EditorAction) -> bool {
        let state = &mut self.state;
        match action {
            EditorAction::MoveUp => motion::move_up(state),
            EditorAction::MoveDown => motion::move_down(state),
            EditorAction::MoveLeft => motion::move_left(state),
            EditorAction::MoveRight => motion::move_right(state),
            EditorAction::MoveHome => motion::move_home(state),
            EditorAction::MoveEnd => motion::move_end(state),
            EditorAction::PageUp => {
                let rows = self.text_rows();
                motion::page_up(&mut self.state, rows)
            }
            EditorAction::PageDown => {
                let rows = self.text_rows();
                motion::page_down(&mut self.state, rows)
            }
            EditorAction::ExtendUp => motion::extend_up(state),
            EditorAction::ExtendDown => motion::extend_down(state),
            EditorAction::ExtendLeft => motion::extend_left(state),
            EditorAction::ExtendRight => motion::extend_right(state),
            EditorAction::ExtendHome => motion::extend_home(state),
            EditorAction::ExtendEnd => motion::extend_end(state),
            EditorAction::SelectAll => motion::select_all(state),
            EditorAction::InsertNewline => edit::insert_newline(state),
            EditorAction::InsertTab => edit::smart_tab(state, &self.config.file.editor),
            EditorAction::Backspace => edit::backspace(state),
            EditorAction::DeleteForward => edit::delete_forward(state),
            EditorAction::Undo => edit::undo(state),
            EditorAction::Redo => edit::redo(state),
            EditorAction::Copy => clipboard::copy(state, self.clipboard.as_deref_mut()),
            EditorAction::Cut => clipboard::cut(state, self.clipboard.as_deref_mut()),
            EditorAction::Paste => clipboard::paste(state, self.clipboard.as_deref_mut()),
            EditorAction::ToggleComment => {
                let aliases = self.syntax.aliases().to_vec();
                comment::toggle_comment(&mut self.state, &self.config, &aliases)
            }
            EditorAction::BlockIndent => block::indent_block(state, &self.config.file.editor),
            EditorAction::BlockUnindent => block::unindent_block(state, &self.config.file.editor),
            EditorAction::Find => self.open_prompt(PromptKind::Find),
            EditorAction::FindNext => {
                let rows = self.text_rows();
                search::find_next(&mut self.state, rows)
            }
            EditorAction::ReplaceAll => self.open_prompt(PromptKind::ReplacePattern),
            EditorAction::GotoLine => self.open_prompt(PromptKind::GotoLine),
            EditorAction::SaveFile => self.save(),
            EditorAction::SaveFileAs => self.open_prompt(PromptKind::SaveAs),
            EditorAction::OpenFile => self.open_prompt(PromptKind::OpenPath),
            EditorAction::NewFile => {
                let name = self.config.file.editor.default_new_filename.clone();
                file::new_file(&mut self.state, &name);
                detect_language(&mut self.state, &mut self.syntax, &self.config);
                true
            }
            EditorAction::ToggleInsertMode => edit::toggle_caret_mode(state),
            EditorAction::CancelOperation => self.cancel_operation(),
            EditorAction::Quit => self.request_quit(),
            EditorAction::ShowGitPanel => self.show_git_panel(),
            EditorAction::ShowFileBrowser => self.show_file_browser(),
            EditorAction::ShowLintPanel => self.show_lint_panel(),
            EditorAction::ShowHelpPanel => self.show_help_panel(),
            EditorAction::AskAi => self.open_prompt(PromptKind::AiPrompt),
            EditorAction::RunLint => self.run_lint(),
        }
    }

    // ---------------------------------------------------------------------
    // Prompts (status-bar line input)
    // ---------------------------------------------------------------------

    fn open_prompt(&mut self, kind: PromptKind) -> bool {
        let prompt = Prompt::new(kind);
        self.state
            .set_status(format!("{}: ", prompt.label()));
        self.prompt = Some(prompt);
        true
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) -> bool {
        let Some(mut prompt) = self.prompt.take() else {
            return false;
        };
        if prompt.kind == PromptKind::ConfirmExit {
            return self.handle_exit_confirmation(key);
        }
        match key.code {
            KeyCode::Esc => {
                self.state.set_status("Cancelled");
                return true;
            }
            KeyCode::Enter => {
                let input = prompt.input.clone();
                return self.submit_prompt(prompt.kind, input);
            }
            KeyCode::Backspace => {
                prompt.input.pop();
            }
            _ => {
                if let Some(ch) = key.printable() {
                    prompt.input.push(ch);
                }
            }
        }
        self.state
            .set_status(format!("{}: {}", prompt.label(), prompt.input));
        self.prompt = Some(prompt);
        true
    }

    fn submit_prompt(&mut self, kind: PromptKind, input: String) -> bool {
        match kind {
            PromptKind::Find => {
                let rows = self.text_rows();
                search::find_all(&mut self.state, &input);
                if !self.state.search_matches.is_empty() {
                    search::find_next(&mut self.state, rows);
                }
                true
            }
            PromptKind::GotoLine => motion::goto_line(&mut self.state, &input),
            PromptKind::OpenPath => {
                match file::open_file(&mut self.state, &PathBuf::from(input.trim())) {
                    Ok(()) => {
                        detect_language(&mut self.state, &mut self.syntax, &self.config);
                        self.git.update_info();
                    }
                    Err(err) => self.state.set_status(format!("Open error: {err}")),
                }
                true
            }
            PromptKind::SaveAs => {
                match file::save_file_as(&mut self.state, PathBuf::from(input.trim())) {
                    Ok(()) => {
                        detect_language(&mut self.state, &mut self.syntax, &self.config);
                        self.git.update_info();
                    }
                    Err(err) => self.state.set_status(format!("Save error: {err}")),
                }
                true
            }
            PromptKind::ReplacePattern => {
                if input.is_empty() {
                    self.state.set_status("Cancelled");
                    return true;
                }
                self.open_prompt(PromptKind::ReplaceWith { pattern: input })
            }
            PromptKind::ReplaceWith { pattern } => {
                search::replace_all(&mut self.state, &pattern, &input)
            }
            PromptKind::AiPrompt => self.submit_ai_prompt(input),
            PromptKind::ConfirmExit => true,
        }
    }

    fn handle_exit_confirmation(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if self.state.file_path.is_none() {
                    self.state
                        .set_status("No filename; use Save As, then quit");
                } else {
                    self.save();
                    // Stay alive if the save failed; the status says why.
                    if !self.state.is_modified() {
                        self.state.running = false;
                    }
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') => {
                self.state.running = false;
            }
            _ => {
                self.state.set_status("Quit cancelled");
            }
        }
        true
    }

    // ---------------------------------------------------------------------
    // File / quit helpers
    // ---------------------------------------------------------------------

    fn save(&mut self) -> bool {
        if self.state.file_path.is_none() {
            return self.open_prompt(PromptKind::SaveAs);
        }
        match file::save_file(&mut self.state) {
            Ok(()) => {
                self.git.update_info();
            }
            Err(err) => self.state.set_status(format!("Save error: {err}")),
        }
        true
    }

    fn request_quit(&mut self) -> bool {
        if self.state.is_modified() {
            return self.open_prompt(PromptKind::ConfirmExit);
        }
        self.state.running = false;
        true
    }

    fn cancel_operation(&mut self) -> bool {
        if self.panels.is_active() {
            self.panels.close_active();
            self.state.focus = Focus::Editor;
            self.state.force_full_redraw = true;
            return true;
        }
        search::cancel_operation(&mut self.state);
        true
    }

    // ---------------------------------------------------------------------
    // Panels
    // ---------------------------------------------------------------------

    fn apply_show_outcome(&mut self, outcome: ShowOutcome) -> bool {
        match outcome {
            ShowOutcome::Opened => self.state.focus = Focus::Panel,
            ShowOutcome::Toggled => self.state.focus = Focus::Editor,
        }
        self.state.force_full_redraw = true;
        true
    }

    fn show_git_panel(&mut self) -> bool {
        if !self.git.is_enabled() {
            self.state.set_status("Git integration is disabled");
            return true;
        }
        self.git.update_info();
        let panel = TextPanel::new(PanelKind::Git, "Git", &self.git.panel_body());
        let outcome = self.panels.show(Box::new(panel));
        self.apply_show_outcome(outcome)
    }

    fn show_file_browser(&mut self) -> bool {
        let start_dir = self
            .state
            .file_path
            .as_ref()
            .and_then(|p| p.parent().map(|d| d.to_path_buf()))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let outcome = self.panels.show(Box::new(FileBrowserPanel::new(start_dir)));
        self.apply_show_outcome(outcome)
    }

    fn show_lint_panel(&mut self) -> bool {
        let body = match &self.last_lint {
            Some(report) => report.body.clone(),
            None => "No lint report yet".to_string(),
        };
        let panel = TextPanel::new(PanelKind::LintReport, "Lint report", &body);
        let outcome = self.panels.show(Box::new(panel));
        self.apply_show_outcome(outcome)
    }

    fn show_help_panel(&mut self) -> bool {
        let lines: Vec<String> = self
            .keymap
            .describe()
            .into_iter()
            .map(|(key, action)| format!("{key:<14} {action}"))
            .collect();
        let panel = TextPanel::from_lines(PanelKind::Help, "Help", lines);
        let outcome = self.panels.show(Box::new(panel));
        self.apply_show_outcome(outcome)
    }

    fn apply_panel_request(&mut self) -> bool {
        match self.panels.take_request() {
            Some(PanelRequest::Close) => {
                self.state.focus = Focus::Editor;
                self.state.force_full_redraw = true;
                true
            }
            Some(PanelRequest::OpenFile(path)) => {
                self.panels.close_active();
                self.state.focus = Focus::Editor;
                self.state.force_full_redraw = true;
                match file::open_file(&mut self.state, &path) {
                    Ok(()) => {
                        detect_language(&mut self.state, &mut self.syntax, &self.config);
                        self.git.update_info();
                    }
                    Err(err) => self.state.set_status(format!("Open error: {err}")),
                }
                true
            }
            None => false,
        }
    }

    // ---------------------------------------------------------------------
    // Integrations
    // ---------------------------------------------------------------------

    fn run_lint(&mut self) -> bool {
        if !self.linter.is_available() {
            self.state.set_status("Linter is not configured");
            return true;
        }
        if self.linter.run(self.state.file_path.clone()) {
            self.state.set_status("Lint scheduled");
        }
        true
    }

    fn submit_ai_prompt(&mut self, prompt: String) -> bool {
        if prompt.trim().is_empty() {
            self.state.set_status("Cancelled");
            return true;
        }
        let provider = self
            .config
            .file
            .ai
            .default_provider
            .clone()
            .unwrap_or_else(|| "openai".to_string());
        let Some(api_key) = ai::resolve_api_key(&provider, &self.config) else {
            self.state
                .set_status(format!("AI error: no API key for '{provider}'"));
            return true;
        };
        let model = self
            .config
            .file
            .ai
            .models
            .get(&provider)
            .cloned()
            .or_else(|| ai::default_model(&provider).map(str::to_string))
            .unwrap_or_default();
        let request = TaskRequest::AiChat {
            provider: provider.clone(),
            prompt,
            config: core_events::AiRequestConfig {
                api_key,
                model,
                system_message: Some(
                    "You are a concise programming assistant inside a text editor.".to_string(),
                ),
                timeout_secs: ai::DEFAULT_TIMEOUT_SECS,
            },
        };
        if self.tasks.submit(request) {
            self.state.set_status(format!("Asking {provider}..."));
        } else {
            self.state.set_status("AI error: task queue is full");
        }
        true
    }

    /// Drain all background queues in a fixed order: async results, git,
    /// linter. Returns true when anything arrived.
    pub fn drain_background(&mut self) -> bool {
        let mut changed = false;

        for result in self.tasks.drain_results() {
            changed = true;
            match result {
                TaskResult::AiReply { provider, text } => {
                    let title = format!("AI ({provider})");
                    let panel = TextPanel::new(PanelKind::AiResponse, title, &text);
                    let outcome = self.panels.show(Box::new(panel));
                    self.apply_show_outcome(outcome);
                    self.state.set_status("AI reply received");
                }
                TaskResult::TaskError { kind, message } => {
                    self.state.set_status(format!("AI error ({kind}): {message}"));
                }
            }
        }

        for event in self.git.drain() {
            changed = true;
            if let GitEvent::Error(err) = event {
                debug!(target: "runtime.git", %err, "git_event_error");
            }
        }
        if changed || self.state.git.as_ref() != self.git.info() {
            self.state.git = self.git.info().cloned();
        }

        for report in self.linter.drain() {
            changed = true;
            let first_line = report.body.lines().next().unwrap_or("").to_string();
            match report.severity {
                LintSeverity::Info => self.state.set_status(format!("Lint: {first_line}")),
                LintSeverity::Warning => {
                    self.state.set_status(format!("Lint warning: {first_line}"))
                }
                LintSeverity::Error => {
                    self.state.set_status(format!("Lint error: {first_line}"))
                }
            }
            let show_panel = report.severity >= LintSeverity::Warning;
            self.last_lint = Some(report);
            if show_panel && self.panels.active_kind() != Some(PanelKind::LintReport) {
                self.show_lint_panel();
            }
        }
        changed
    }

    fn autosave_tick(&mut self) -> bool {
        let interval = self.config.file.settings.auto_save_interval;
        if interval == 0 {
            return false;
        }
        if self.last_autosave.elapsed() < Duration::from_secs(interval) {
            return false;
        }
        self.last_autosave = Instant::now();
        if self.state.is_modified() && self.state.file_path.is_some() {
            match file::save_file(&mut self.state) {
                Ok(()) => self.state.set_status("Auto-saved"),
                Err(err) => self.state.set_status(format!("Auto-save error: {err}")),
            }
            return true;
        }
        false
    }

    // ---------------------------------------------------------------------
    // Rendering
    // ---------------------------------------------------------------------

    pub fn render_frame(&mut self) -> Result<()> {
        let geom = self.renderer.geometry_for(&self.surface, &self.state);
        self.state.clamp_scroll(geom.text_rows, geom.text_cols);
        self.state.language = self.syntax.language().to_string();

        let panels = &mut self.panels;
        let mut overlay = |surface: &mut dyn Surface| panels.draw(surface);
        self.renderer
            .render_with(&mut self.surface, &self.state, &mut self.syntax, &mut overlay)?;
        self.state.force_full_redraw = false;
        Ok(())
    }

    /// Test hook: the surface behind the editor.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn panels_active(&self) -> bool {
        self.panels.is_active()
    }

    pub fn active_panel_kind(&self) -> Option<PanelKind> {
        self.panels.active_kind()
    }
}

fn detect_language(state: &mut EditorState, syntax: &mut SyntaxEngine, config: &Config) {
    let filename = state
        .file_path
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned());
    let sample: String = state
        .buffer
        .lines()
        .take(200)
        .collect::<Vec<_>>()
        .join("\n");
    syntax.detect(filename.as_deref(), &sample, config);
    state.language = syntax.language().to_string();
    debug!(target: "runtime", language = %state.language, "language_detected");
}
