//! Configuration loading and parsing.
//!
//! `quill.toml` is looked up in the working directory first, then in the
//! platform config dir (`<config>/quill/quill.toml`). Unknown fields are
//! ignored and a file that fails to parse falls back to defaults with a
//! warning, so a bad config never prevents startup.

use std::collections::HashMap;
use std::{fs, path::PathBuf};

use anyhow::Result;
use serde::Deserialize;
use tracing::{info, warn};

/// Comment syntax for one language, as configured under `[comments.<lang>]`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CommentSyntax {
    #[serde(default)]
    pub line_prefix: Option<String>,
    /// Two-element array `[open, close]`.
    #[serde(default)]
    pub block_delims: Option<Vec<String>>,
    #[serde(default)]
    pub docstring_delim: Option<String>,
}

impl CommentSyntax {
    pub fn block_pair(&self) -> Option<(&str, &str)> {
        match self.block_delims.as_deref() {
            Some([open, close]) => Some((open.as_str(), close.as_str())),
            Some(other) if other.len() >= 2 => Some((other[0].as_str(), other[1].as_str())),
            _ => None,
        }
    }
}

/// One custom highlight rule: a regex and the semantic color it paints.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HighlightRule {
    pub pattern: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LanguageRules {
    #[serde(default)]
    pub patterns: Vec<HighlightRule>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EditorSection {
    #[serde(default = "defaults::use_system_clipboard")]
    pub use_system_clipboard: bool,
    #[serde(default = "defaults::tab_size")]
    pub tab_size: usize,
    #[serde(default = "defaults::use_spaces")]
    pub use_spaces: bool,
    #[serde(default = "defaults::show_line_numbers")]
    pub show_line_numbers: bool,
    #[serde(default = "defaults::default_new_filename")]
    pub default_new_filename: String,
}

impl Default for EditorSection {
    fn default() -> Self {
        Self {
            use_system_clipboard: defaults::use_system_clipboard(),
            tab_size: defaults::tab_size(),
            use_spaces: defaults::use_spaces(),
            show_line_numbers: defaults::show_line_numbers(),
            default_new_filename: defaults::default_new_filename(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SettingsSection {
    /// Auto-save period in seconds; 0 disables auto-save.
    #[serde(default)]
    pub auto_save_interval: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ShellSection {
    #[serde(default = "defaults::shell_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            timeout_seconds: defaults::shell_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AiSection {
    #[serde(default)]
    pub keys: HashMap<String, String>,
    #[serde(default)]
    pub models: HashMap<String, String>,
    #[serde(default)]
    pub default_provider: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LinterSection {
    /// Linter executable plus leading arguments; absent disables linting.
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GitSection {
    #[serde(default = "defaults::git_enabled")]
    pub enabled: bool,
}

impl Default for GitSection {
    fn default() -> Self {
        Self {
            enabled: defaults::git_enabled(),
        }
    }
}

/// Keybinding value: a single spec, a list, or a `"a|b|c"` alternation.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum KeySpecValue {
    One(String),
    Many(Vec<String>),
    /// Raw terminal key code for terminals whose sequences the string
    /// grammar does not cover.
    Raw(i64),
}

impl KeySpecValue {
    /// Flatten into individual spec strings; `|` alternation is split here.
    pub fn specs(&self) -> Vec<String> {
        match self {
            KeySpecValue::One(s) => s.split('|').map(|p| p.trim().to_string()).collect(),
            KeySpecValue::Many(v) => v
                .iter()
                .flat_map(|s| s.split('|'))
                .map(|p| p.trim().to_string())
                .collect(),
            KeySpecValue::Raw(n) => vec![n.to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub editor: EditorSection,
    #[serde(default)]
    pub settings: SettingsSection,
    #[serde(default)]
    pub shell: ShellSection,
    #[serde(default)]
    pub comments: HashMap<String, CommentSyntax>,
    #[serde(default)]
    pub syntax_highlighting: HashMap<String, LanguageRules>,
    /// `colors.<semantic_name> = "#rrggbb"`, plus `search_highlight_bg`.
    #[serde(default)]
    pub colors: HashMap<String, String>,
    #[serde(default)]
    pub keybindings: HashMap<String, KeySpecValue>,
    #[serde(default)]
    pub ai: AiSection,
    #[serde(default)]
    pub git: GitSection,
    #[serde(default)]
    pub linter: LinterSection,
}

mod defaults {
    pub fn use_system_clipboard() -> bool {
        true
    }
    pub fn tab_size() -> usize {
        4
    }
    pub fn use_spaces() -> bool {
        true
    }
    pub fn show_line_numbers() -> bool {
        true
    }
    pub fn default_new_filename() -> String {
        "untitled.txt".to_string()
    }
    pub fn shell_timeout() -> u64 {
        10
    }
    pub fn git_enabled() -> bool {
        true
    }
}

/// Loaded configuration: parsed file plus the built-in comment table merged
/// underneath user overrides.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub file: ConfigFile,
    comments: HashMap<String, CommentSyntax>,
}

/// Best-effort config path following platform conventions.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("quill.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("quill").join("quill.toml");
    }
    PathBuf::from("quill.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let file = match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                info!(target: "config", path = %path.display(), "config_loaded");
                file
            }
            Err(err) => {
                warn!(target: "config", path = %path.display(), %err, "config_parse_failed_using_defaults");
                ConfigFile::default()
            }
        },
        Err(_) => ConfigFile::default(),
    };
    Ok(Config::from_file(file))
}

impl Config {
    pub fn from_file(file: ConfigFile) -> Self {
        let mut comments = builtin_comment_table();
        for (lang, syntax) in &file.comments {
            comments.insert(lang.to_lowercase(), syntax.clone());
        }
        Self { file, comments }
    }

    /// Look up comment syntax by trying each candidate name (primary
    /// language name first, then aliases), all lowercased.
    pub fn comment_syntax<'a, I>(&self, names: I) -> Option<&CommentSyntax>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .find_map(|name| self.comments.get(&name.to_lowercase()))
    }

    pub fn highlight_rules(&self, names: &[String]) -> Option<&LanguageRules> {
        names
            .iter()
            .find_map(|name| self.file.syntax_highlighting.get(&name.to_lowercase()))
    }

    pub fn color_override(&self, semantic: &str) -> Option<&str> {
        self.file.colors.get(semantic).map(String::as_str)
    }
}

/// Comment syntax shipped with the editor; user `[comments.*]` entries
/// override per language.
fn builtin_comment_table() -> HashMap<String, CommentSyntax> {
    fn line(prefix: &str) -> CommentSyntax {
        CommentSyntax {
            line_prefix: Some(prefix.to_string()),
            ..Default::default()
        }
    }
    fn line_block(prefix: &str, open: &str, close: &str) -> CommentSyntax {
        CommentSyntax {
            line_prefix: Some(prefix.to_string()),
            block_delims: Some(vec![open.to_string(), close.to_string()]),
            ..Default::default()
        }
    }

    let mut map = HashMap::new();
    map.insert(
        "python".to_string(),
        CommentSyntax {
            line_prefix: Some("# ".to_string()),
            docstring_delim: Some("\"\"\"".to_string()),
            ..Default::default()
        },
    );
    map.insert("rust".to_string(), line_block("// ", "/*", "*/"));
    map.insert("c".to_string(), line_block("// ", "/*", "*/"));
    map.insert("c++".to_string(), line_block("// ", "/*", "*/"));
    map.insert("javascript".to_string(), line_block("// ", "/*", "*/"));
    map.insert("typescript".to_string(), line_block("// ", "/*", "*/"));
    map.insert("go".to_string(), line_block("// ", "/*", "*/"));
    map.insert("java".to_string(), line_block("// ", "/*", "*/"));
    map.insert(
        "css".to_string(),
        CommentSyntax {
            block_delims: Some(vec!["/*".to_string(), "*/".to_string()]),
            ..Default::default()
        },
    );
    map.insert(
        "html".to_string(),
        CommentSyntax {
            block_delims: Some(vec!["<!--".to_string(), "-->".to_string()]),
            ..Default::default()
        },
    );
    map.insert("bash".to_string(), line("# "));
    map.insert("shell".to_string(), line("# "));
    map.insert("toml".to_string(), line("# "));
    map.insert("yaml".to_string(), line("# "));
    map.insert("ruby".to_string(), line("# "));
    map.insert("lua".to_string(), line("-- "));
    map.insert("sql".to_string(), line("-- "));
    map.insert("haskell".to_string(), line("-- "));
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__missing_quill_config__.toml"))).unwrap();
        assert_eq!(cfg.file.editor.tab_size, 4);
        assert!(cfg.file.editor.use_spaces);
        assert!(cfg.file.git.enabled);
        assert_eq!(cfg.file.shell.timeout_seconds, 10);
    }

    #[test]
    fn parse_error_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[editor\nbroken").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.editor.tab_size, 4);
    }

    #[test]
    fn parses_editor_and_git_sections() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[editor]\ntab_size = 2\nuse_spaces = false\n[git]\nenabled = false\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.editor.tab_size, 2);
        assert!(!cfg.file.editor.use_spaces);
        assert!(!cfg.file.git.enabled);
    }

    #[test]
    fn user_comment_syntax_overrides_builtin() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[comments.python]\nline_prefix = \"## \"\n[comments.mylang]\nline_prefix = \"; \"\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let py = cfg.comment_syntax(["python"]).unwrap();
        assert_eq!(py.line_prefix.as_deref(), Some("## "));
        // Builtin docstring delimiter is replaced wholesale by the override.
        assert_eq!(py.docstring_delim, None);
        let custom = cfg.comment_syntax(["MyLang"]).unwrap();
        assert_eq!(custom.line_prefix.as_deref(), Some("; "));
    }

    #[test]
    fn comment_syntax_falls_through_aliases() {
        let cfg = Config::from_file(ConfigFile::default());
        let found = cfg.comment_syntax(["no-such-lang", "rust"]).unwrap();
        assert_eq!(found.line_prefix.as_deref(), Some("// "));
        assert_eq!(found.block_pair(), Some(("/*", "*/")));
    }

    #[test]
    fn keybinding_values_flatten() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            concat!(
                "[keybindings]\n",
                "save_file = \"ctrl+s\"\n",
                "undo = [\"ctrl+z\", \"f10\"]\n",
                "cancel = \"esc|ctrl+g\"\n",
                "quirk = 410\n",
            ),
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let kb = &cfg.file.keybindings;
        assert_eq!(kb["save_file"].specs(), vec!["ctrl+s"]);
        assert_eq!(kb["undo"].specs(), vec!["ctrl+z", "f10"]);
        assert_eq!(kb["cancel"].specs(), vec!["esc", "ctrl+g"]);
        assert_eq!(kb["quirk"].specs(), vec!["410"]);
    }

    #[test]
    fn parses_highlight_rules_and_colors() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            concat!(
                "[syntax_highlighting.python]\n",
                "patterns = [{ pattern = \"\\\\bself\\\\b\", color = \"keyword\" }]\n",
                "[colors]\n",
                "keyword = \"#ff8800\"\n",
                "search_highlight_bg = \"#303030\"\n",
            ),
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let rules = cfg.highlight_rules(&["python".to_string()]).unwrap();
        assert_eq!(rules.patterns.len(), 1);
        assert_eq!(rules.patterns[0].color, "keyword");
        assert_eq!(cfg.color_override("keyword"), Some("#ff8800"));
        assert_eq!(cfg.color_override("search_highlight_bg"), Some("#303030"));
    }
}
