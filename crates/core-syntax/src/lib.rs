//! Syntax highlighting pipeline: language detection, per-line tokenization,
//! and a bounded memo cache.
//!
//! Tokenization is a pure function of `(line_text, lexer_id,
//! has_custom_rules)` and is memoized in an LRU keyed by exactly that
//! tuple. Changing the lexer or the custom rule set empties the cache.
//!
//! Two tokenizers compose per language:
//! * regex-based: user `[syntax_highlighting.<lang>]` patterns paint a
//!   character-indexed color map, merged into segments;
//! * lexer-based: the syntect grammar for the language, with each scope
//!   mapped to a semantic color slot by walking scope ancestors until a
//!   mapping is found.
//!
//! When custom rules exist they take over the whole line; otherwise the
//! lexer runs.

use std::num::NonZeroUsize;
use std::sync::Arc;

use core_config::Config;
use lru::LruCache;
use regex::Regex;
use syntect::parsing::{ParseState, ScopeStack, SyntaxSet};
use tracing::{debug, warn};

mod slot;
pub use slot::ColorSlot;

/// Minimum tokenization cache capacity.
pub const TOKEN_CACHE_CAPACITY: usize = 20_000;

/// Content sample bounds used for lexer guessing.
const SAMPLE_MAX_LINES: usize = 200;
const SAMPLE_MAX_CHARS: usize = 10_000;

/// One colored run of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub slot: ColorSlot,
}

pub type SegmentList = Arc<Vec<Segment>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    line: String,
    lexer_id: usize,
    has_custom_rules: bool,
}

struct CompiledRule {
    regex: Regex,
    slot: ColorSlot,
}

pub struct SyntaxEngine {
    syntax_set: SyntaxSet,
    lexer_id: usize,
    language: String,
    aliases: Vec<String>,
    rules: Vec<CompiledRule>,
    cache: LruCache<CacheKey, SegmentList>,
}

impl Default for SyntaxEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxEngine {
    /// Engine with the plain-text lexer selected.
    pub fn new() -> Self {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let lexer_id = plain_text_id(&syntax_set);
        let language = syntax_set.syntaxes()[lexer_id].name.clone();
        let aliases = alias_names(&syntax_set, lexer_id);
        Self {
            syntax_set,
            lexer_id,
            language,
            aliases,
            rules: Vec::new(),
            cache: LruCache::new(
                NonZeroUsize::new(TOKEN_CACHE_CAPACITY).expect("capacity is non-zero"),
            ),
        }
    }

    /// Display name of the detected language.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Lowercased names usable as config lookup keys: primary name first,
    /// then file extensions.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Opaque identity of the current lexer (cache key component).
    pub fn lexer_id(&self) -> usize {
        self.lexer_id
    }

    pub fn has_custom_rules(&self) -> bool {
        !self.rules.is_empty()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Detect the language and load its custom rules.
    ///
    /// Order: filename extension/name, then a guess from a content sample
    /// (first ~200 lines capped at ~10,000 chars), then plain text. The
    /// tokenization cache is invalidated iff the lexer identity or the rule
    /// set changed.
    pub fn detect(&mut self, filename: Option<&str>, content: &str, config: &Config) {
        let new_id = filename
            .and_then(|name| self.lexer_for_filename(name))
            .or_else(|| self.lexer_for_sample(content))
            .unwrap_or_else(|| plain_text_id(&self.syntax_set));

        let new_aliases = alias_names(&self.syntax_set, new_id);
        let new_rules = compile_rules(config, &new_aliases);
        let rules_changed = new_rules.len() != self.rules.len()
            || new_rules
                .iter()
                .zip(&self.rules)
                .any(|(a, b)| a.regex.as_str() != b.regex.as_str() || a.slot != b.slot);

        if new_id != self.lexer_id || rules_changed {
            self.cache.clear();
            debug!(
                target: "syntax",
                from = %self.language,
                to = %self.syntax_set.syntaxes()[new_id].name,
                rules = new_rules.len(),
                "lexer_changed_cache_invalidated"
            );
        }
        self.lexer_id = new_id;
        self.language = self.syntax_set.syntaxes()[new_id].name.clone();
        self.aliases = new_aliases;
        self.rules = new_rules;
    }

    fn lexer_for_filename(&self, filename: &str) -> Option<usize> {
        let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
        if let Some(syntax) = self.syntax_set.find_syntax_by_extension(base) {
            return index_of(&self.syntax_set, syntax.name.as_str());
        }
        let ext = base.rsplit('.').next().filter(|e| *e != base)?;
        let syntax = self.syntax_set.find_syntax_by_extension(ext)?;
        index_of(&self.syntax_set, syntax.name.as_str())
    }

    fn lexer_for_sample(&self, content: &str) -> Option<usize> {
        let mut sample: String = content
            .lines()
            .take(SAMPLE_MAX_LINES)
            .collect::<Vec<_>>()
            .join("\n");
        if sample.len() > SAMPLE_MAX_CHARS {
            let cut = sample
                .char_indices()
                .take_while(|(i, _)| *i <= SAMPLE_MAX_CHARS)
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0);
            sample.truncate(cut);
        }
        let first_line = sample.lines().next().unwrap_or("");
        if let Some(syntax) = self.syntax_set.find_syntax_by_first_line(first_line) {
            return index_of(&self.syntax_set, syntax.name.as_str());
        }
        signature_guess(&sample).and_then(|name| {
            self.syntax_set
                .find_syntax_by_name(name)
                .and_then(|s| index_of(&self.syntax_set, s.name.as_str()))
        })
    }

    /// Tokenize one line into colored segments. Results are memoized; the
    /// returned list is shared, not cloned per call.
    pub fn tokenize(&mut self, line: &str) -> SegmentList {
        let key = CacheKey {
            line: line.to_string(),
            lexer_id: self.lexer_id,
            has_custom_rules: self.has_custom_rules(),
        };
        if let Some(hit) = self.cache.get(&key) {
            return Arc::clone(hit);
        }
        let segments = if self.has_custom_rules() {
            tokenize_with_rules(line, &self.rules)
        } else {
            self.tokenize_with_lexer(line)
        };
        let segments = Arc::new(segments);
        self.cache.put(key, Arc::clone(&segments));
        segments
    }

    fn tokenize_with_lexer(&self, line: &str) -> Vec<Segment> {
        if line.is_empty() {
            return Vec::new();
        }
        let syntax = &self.syntax_set.syntaxes()[self.lexer_id];
        let mut parse_state = ParseState::new(syntax);
        // The newline-aware grammars expect a terminated line.
        let with_newline = format!("{line}\n");
        let ops = match parse_state.parse_line(&with_newline, &self.syntax_set) {
            Ok(ops) => ops,
            Err(err) => {
                warn!(target: "syntax", %err, "parse_line_failed");
                return vec![Segment {
                    text: line.to_string(),
                    slot: ColorSlot::Default,
                }];
            }
        };

        let mut segments: Vec<Segment> = Vec::new();
        let mut stack = ScopeStack::new();
        let mut cursor = 0usize;
        for (offset, op) in ops {
            let offset = offset.min(line.len());
            if offset > cursor {
                push_segment(
                    &mut segments,
                    &line[cursor..offset],
                    slot::slot_for_scopes(stack.as_slice()),
                );
                cursor = offset;
            }
            if let Err(err) = stack.apply(&op) {
                warn!(target: "syntax", %err, "scope_apply_failed");
            }
        }
        if cursor < line.len() {
            push_segment(
                &mut segments,
                &line[cursor..],
                slot::slot_for_scopes(stack.as_slice()),
            );
        }
        segments
    }
}

fn push_segment(segments: &mut Vec<Segment>, text: &str, slot: ColorSlot) {
    if text.is_empty() {
        return;
    }
    // Adjacent equal attributes merge into one run.
    if let Some(last) = segments.last_mut() {
        if last.slot == slot {
            last.text.push_str(text);
            return;
        }
    }
    segments.push(Segment {
        text: text.to_string(),
        slot,
    });
}

/// Character-indexed color map path: each rule paints its matches in order,
/// later rules win on overlap; adjacent equal colors merge.
fn tokenize_with_rules(line: &str, rules: &[CompiledRule]) -> Vec<Segment> {
    if line.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = line.chars().collect();
    let mut colors = vec![ColorSlot::Default; chars.len()];
    // Byte offset -> char index, so regex byte spans can paint char cells.
    let mut char_of_byte = vec![0usize; line.len() + 1];
    for (ci, (bi, ch)) in line.char_indices().enumerate() {
        for b in bi..bi + ch.len_utf8() {
            char_of_byte[b] = ci;
        }
    }
    char_of_byte[line.len()] = chars.len();

    for rule in rules {
        for m in rule.regex.find_iter(line) {
            let start = char_of_byte[m.start()];
            let end = char_of_byte[m.end()];
            for color in &mut colors[start..end] {
                *color = rule.slot;
            }
        }
    }

    let mut segments: Vec<Segment> = Vec::new();
    for (ch, slot) in chars.iter().zip(colors.iter()) {
        let mut utf8 = [0u8; 4];
        push_segment(&mut segments, ch.encode_utf8(&mut utf8), *slot);
    }
    segments
}

fn compile_rules(config: &Config, aliases: &[String]) -> Vec<CompiledRule> {
    let Some(lang_rules) = config.highlight_rules(aliases) else {
        return Vec::new();
    };
    let mut compiled = Vec::with_capacity(lang_rules.patterns.len());
    for rule in &lang_rules.patterns {
        match Regex::new(&rule.pattern) {
            Ok(regex) => compiled.push(CompiledRule {
                regex,
                slot: ColorSlot::from_name(&rule.color),
            }),
            Err(err) => {
                warn!(target: "syntax", pattern = %rule.pattern, %err, "invalid_custom_rule_skipped");
            }
        }
    }
    compiled
}

fn plain_text_id(set: &SyntaxSet) -> usize {
    index_of(set, set.find_syntax_plain_text().name.as_str()).unwrap_or(0)
}

fn index_of(set: &SyntaxSet, name: &str) -> Option<usize> {
    set.syntaxes().iter().position(|s| s.name == name)
}

fn alias_names(set: &SyntaxSet, id: usize) -> Vec<String> {
    let syntax = &set.syntaxes()[id];
    let mut names = vec![syntax.name.to_lowercase()];
    for ext in &syntax.file_extensions {
        let lower = ext.to_lowercase();
        if !names.contains(&lower) {
            names.push(lower);
        }
    }
    names
}

/// Cheap content signatures for samples without a recognizable first line.
fn signature_guess(sample: &str) -> Option<&'static str> {
    if sample.contains("def ") && sample.contains(':') || sample.contains("import ") {
        return Some("Python");
    }
    if sample.contains("fn ") && (sample.contains("let ") || sample.contains("::")) {
        return Some("Rust");
    }
    if sample.contains("#include") {
        return Some("C");
    }
    if sample.contains("function ") && sample.contains('{') {
        return Some("JavaScript");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_config::ConfigFile;

    fn empty_config() -> Config {
        Config::from_file(ConfigFile::default())
    }

    fn config_with_rules(toml_src: &str) -> Config {
        Config::from_file(toml::from_str(toml_src).unwrap())
    }

    #[test]
    fn plain_text_is_default() {
        let engine = SyntaxEngine::new();
        assert_eq!(engine.language(), "Plain Text");
        assert!(!engine.has_custom_rules());
    }

    #[test]
    fn detect_by_extension() {
        let mut engine = SyntaxEngine::new();
        engine.detect(Some("main.rs"), "", &empty_config());
        assert_eq!(engine.language(), "Rust");
        assert!(engine.aliases().contains(&"rust".to_string()));
    }

    #[test]
    fn detect_by_content_sample() {
        let mut engine = SyntaxEngine::new();
        engine.detect(
            None,
            "#!/usr/bin/env python\nimport os\n\ndef main():\n    pass\n",
            &empty_config(),
        );
        assert_eq!(engine.language(), "Python");
    }

    #[test]
    fn unknown_content_falls_back_to_plain_text() {
        let mut engine = SyntaxEngine::new();
        engine.detect(None, "completely unremarkable prose", &empty_config());
        assert_eq!(engine.language(), "Plain Text");
    }

    #[test]
    fn lexer_tokens_cover_whole_line() {
        let mut engine = SyntaxEngine::new();
        engine.detect(Some("x.rs"), "", &empty_config());
        let line = "fn main() { let x = 1; }";
        let segments = engine.tokenize(line);
        let joined: String = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(joined, line);
        assert!(segments.iter().any(|s| s.slot == ColorSlot::Keyword));
    }

    #[test]
    fn cache_hits_share_segments() {
        let mut engine = SyntaxEngine::new();
        engine.detect(Some("x.rs"), "", &empty_config());
        let a = engine.tokenize("let y = 2;");
        let b = engine.tokenize("let y = 2;");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(engine.cache_len(), 1);
    }

    #[test]
    fn changing_lexer_empties_cache() {
        let mut engine = SyntaxEngine::new();
        engine.detect(Some("x.rs"), "", &empty_config());
        engine.tokenize("let y = 2;");
        assert_eq!(engine.cache_len(), 1);
        engine.detect(Some("x.py"), "", &empty_config());
        assert_eq!(engine.cache_len(), 0);
    }

    #[test]
    fn changing_rule_set_empties_cache() {
        let cfg_plain = empty_config();
        let cfg_rules = config_with_rules(
            "[syntax_highlighting.rust]\npatterns = [{ pattern = \"x\", color = \"keyword\" }]\n",
        );
        let mut engine = SyntaxEngine::new();
        engine.detect(Some("a.rs"), "", &cfg_plain);
        engine.tokenize("x + 1");
        assert_eq!(engine.cache_len(), 1);
        engine.detect(Some("a.rs"), "", &cfg_rules);
        assert_eq!(engine.cache_len(), 0);
        assert!(engine.has_custom_rules());
    }

    #[test]
    fn custom_rules_paint_matches_and_merge_runs() {
        let cfg = config_with_rules(
            "[syntax_highlighting.rust]\npatterns = [{ pattern = \"ab+\", color = \"string\" }]\n",
        );
        let mut engine = SyntaxEngine::new();
        engine.detect(Some("a.rs"), "", &cfg);
        let segments = engine.tokenize("xxabbyy");
        let shape: Vec<(&str, ColorSlot)> = segments
            .iter()
            .map(|s| (s.text.as_str(), s.slot))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("xx", ColorSlot::Default),
                ("abb", ColorSlot::String),
                ("yy", ColorSlot::Default),
            ]
        );
    }

    #[test]
    fn invalid_custom_rule_is_skipped() {
        let cfg = config_with_rules(
            "[syntax_highlighting.rust]\npatterns = [{ pattern = \"(unclosed\", color = \"keyword\" }, { pattern = \"ok\", color = \"number\" }]\n",
        );
        let mut engine = SyntaxEngine::new();
        engine.detect(Some("a.rs"), "", &cfg);
        let segments = engine.tokenize("ok then");
        assert_eq!(segments[0].slot, ColorSlot::Number);
    }

    #[test]
    fn empty_line_tokenizes_to_nothing() {
        let mut engine = SyntaxEngine::new();
        assert!(engine.tokenize("").is_empty());
    }
}
