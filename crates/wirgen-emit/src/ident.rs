//! Identifier sanitizing for generated names.

use rustc_hash::FxHashSet;

/// Rust keywords (strict and reserved, all editions).
const KEYWORDS: &[&str] = &[
    "Self", "abstract", "as", "async", "await", "become", "box", "break", "const", "continue",
    "crate", "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if",
    "impl", "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub",
    "ref", "return", "self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "union", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Whether `name` is a Rust keyword.
#[must_use]
pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Whether `name` is a plain (non-keyword) Rust identifier.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        && name != "_"
        && !is_keyword(name)
}

/// Whether `name` can name a module, possibly as a raw identifier
/// (`r#gen`). Only the path keywords cannot.
#[must_use]
pub fn is_module_name(name: &str) -> bool {
    is_identifier(name)
        || (is_keyword(name) && !matches!(name, "self" | "Self" | "super" | "crate"))
}

/// Replace characters that cannot appear in an identifier with `_` and
/// guard against a leading digit or an empty result. A lone `_` is not an
/// identifier, so it becomes `_x`.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if out == "_" {
        out.push('x');
    }
    out
}

/// Snake-case identifier: lowercase words joined by single underscores.
#[must_use]
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            out.push(c.to_ascii_lowercase());
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    let trimmed = out.trim_end_matches('_');
    sanitize(trimmed)
}

/// Camel-case identifier: `foo_bar` and `foo-bar` become `fooBar`.
#[must_use]
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if upper_next && !out.is_empty() {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    sanitize(&out)
}

/// Allocates unique identifiers, suffixing `_` on collision.
#[derive(Debug, Default)]
pub struct NameSet {
    taken: FxHashSet<String>,
}

impl NameSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` as already in use.
    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }

    /// Whether `name` is taken.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Claim `name`, or the first free variant with `_` appended.
    pub fn claim(&mut self, name: &str, reserved: impl Fn(&str) -> bool) -> String {
        let mut candidate = name.to_string();
        while is_keyword(&candidate) || reserved(&candidate) || self.taken.contains(&candidate) {
            candidate.push('_');
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}

/// Whether `name` has the shape of a generated per-item name (`f12`, `i3`).
#[must_use]
pub fn is_generated_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('f' | 'i'))
        && name.len() > 1
        && chars.all(|c| c.is_ascii_digit())
}
