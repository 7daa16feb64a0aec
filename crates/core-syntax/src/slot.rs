//! Semantic color slots.
//!
//! Tokenization produces slots, not concrete colors; the renderer resolves
//! a slot against the palette chosen for the terminal's capability tier.

use syntect::parsing::Scope;

/// Semantic color classes the palettes know how to paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSlot {
    #[default]
    Default,
    Keyword,
    String,
    Comment,
    Number,
    Function,
    Type,
    Constant,
    Operator,
    Decorator,
    Error,
}

impl ColorSlot {
    /// Parse a configured color name; unknown names fall back to `Default`.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "keyword" => ColorSlot::Keyword,
            "string" => ColorSlot::String,
            "comment" => ColorSlot::Comment,
            "number" => ColorSlot::Number,
            "function" => ColorSlot::Function,
            "type" => ColorSlot::Type,
            "constant" => ColorSlot::Constant,
            "operator" => ColorSlot::Operator,
            "decorator" => ColorSlot::Decorator,
            "error" => ColorSlot::Error,
            _ => ColorSlot::Default,
        }
    }

    /// Name used for `colors.<semantic_name>` configuration overrides.
    pub fn semantic_name(&self) -> &'static str {
        match self {
            ColorSlot::Default => "default",
            ColorSlot::Keyword => "keyword",
            ColorSlot::String => "string",
            ColorSlot::Comment => "comment",
            ColorSlot::Number => "number",
            ColorSlot::Function => "function",
            ColorSlot::Type => "type",
            ColorSlot::Constant => "constant",
            ColorSlot::Operator => "operator",
            ColorSlot::Decorator => "decorator",
            ColorSlot::Error => "error",
        }
    }
}

/// Resolve a scope stack to a slot by walking ancestors: the innermost
/// scope is tried first, each scope is generalized by stripping trailing
/// dotted segments until a mapping matches, and the search falls outward
/// through the stack before giving up with `Default`.
pub fn slot_for_scopes(scopes: &[Scope]) -> ColorSlot {
    for scope in scopes.iter().rev() {
        let name = scope.build_string();
        let mut prefix = name.as_str();
        loop {
            if let Some(slot) = slot_for_scope_name(prefix) {
                return slot;
            }
            match prefix.rfind('.') {
                Some(dot) => prefix = &prefix[..dot],
                None => break,
            }
        }
    }
    ColorSlot::Default
}

fn slot_for_scope_name(name: &str) -> Option<ColorSlot> {
    let slot = match name {
        "comment" => ColorSlot::Comment,
        "string" => ColorSlot::String,
        "constant.numeric" => ColorSlot::Number,
        "constant" => ColorSlot::Constant,
        "keyword.operator" => ColorSlot::Operator,
        "keyword" => ColorSlot::Keyword,
        "storage" => ColorSlot::Keyword,
        "entity.name.function" => ColorSlot::Function,
        "entity.name.type" | "entity.name.class" | "entity.name.struct" | "entity.name.enum" => {
            ColorSlot::Type
        }
        "support.function" => ColorSlot::Function,
        "support.type" | "support.class" => ColorSlot::Type,
        "variable.function" => ColorSlot::Function,
        "variable.annotation" | "meta.annotation" | "punctuation.definition.annotation" => {
            ColorSlot::Decorator
        }
        "invalid" => ColorSlot::Error,
        _ => return None,
    };
    Some(slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(s: &str) -> Scope {
        Scope::new(s).unwrap()
    }

    #[test]
    fn innermost_scope_wins() {
        let scopes = [scope("source.rust"), scope("comment.line.double-slash.rust")];
        assert_eq!(slot_for_scopes(&scopes), ColorSlot::Comment);
    }

    #[test]
    fn ancestor_walk_generalizes() {
        // No exact mapping for the full scope; strips to "keyword".
        let scopes = [scope("source.rust"), scope("keyword.control.rust")];
        assert_eq!(slot_for_scopes(&scopes), ColorSlot::Keyword);
        let scopes = [scope("source.rust"), scope("keyword.operator.arithmetic")];
        assert_eq!(slot_for_scopes(&scopes), ColorSlot::Operator);
    }

    #[test]
    fn unmapped_scopes_fall_back_to_default() {
        let scopes = [scope("source.rust"), scope("meta.block.rust")];
        assert_eq!(slot_for_scopes(&scopes), ColorSlot::Default);
    }

    #[test]
    fn color_names_round_trip() {
        for slot in [
            ColorSlot::Keyword,
            ColorSlot::String,
            ColorSlot::Comment,
            ColorSlot::Number,
            ColorSlot::Function,
            ColorSlot::Type,
            ColorSlot::Constant,
            ColorSlot::Operator,
            ColorSlot::Decorator,
            ColorSlot::Error,
        ] {
            assert_eq!(ColorSlot::from_name(slot.semantic_name()), slot);
        }
        assert_eq!(ColorSlot::from_name("no-such"), ColorSlot::Default);
    }
}
