//! Best-effort, language-aware extraction of imports and exports.
//!
//! Extraction is lexical: each language family contributes a small set of
//! conservative regexes through the [`LanguageExtractor`] trait. Nothing in this
//! module returns an error. Unrecognised constructs are skipped and unknown
//! languages produce an empty [`Extraction`].
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

mod languages;

pub use languages::{Css, EcmaScript, Go, Java, Python, Rust};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Rust,
    Go,
    Java,
    Css,
    Unknown,
}

impl Language {
    /// Infer the language from a file extension (case-insensitive).
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Self::TypeScript,
            "py" | "pyi" => Self::Python,
            "rs" => Self::Rust,
            "go" => Self::Go,
            "java" => Self::Java,
            "css" | "scss" | "less" => Self::Css,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
            Self::Css => "css",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An import specifier exactly as written (after language-specific normalisation
/// of relative forms, e.g. Python's `from ..pkg import x`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawImport {
    pub specifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub exports: Vec<String>,
    pub imports: Vec<RawImport>,
}

/// Per-language extraction capability.
///
/// Implementations must tolerate arbitrary text: partial files, binary noise,
/// unbalanced brackets. Returning fewer findings is always preferable to
/// panicking.
pub trait LanguageExtractor: Send + Sync {
    fn extract_imports(&self, path: &str, content: &str) -> Vec<RawImport>;
    fn extract_exports(&self, path: &str, content: &str) -> Vec<String>;
}

static ECMASCRIPT: EcmaScript = EcmaScript;
static PYTHON: Python = Python;
static RUST: Rust = Rust;
static GO: Go = Go;
static JAVA: Java = Java;
static CSS: Css = Css;

/// Registry lookup: the extractor responsible for `language`, if any.
#[must_use]
pub fn extractor_for(language: Language) -> Option<&'static dyn LanguageExtractor> {
    match language {
        Language::JavaScript | Language::TypeScript => Some(&ECMASCRIPT),
        Language::Python => Some(&PYTHON),
        Language::Rust => Some(&RUST),
        Language::Go => Some(&GO),
        Language::Java => Some(&JAVA),
        Language::Css => Some(&CSS),
        Language::Unknown => None,
    }
}

/// Extract imports and exports from one file. Pure and infallible.
#[must_use]
pub fn extract(path: &str, content: &str, language: Language) -> Extraction {
    let Some(extractor) = extractor_for(language) else {
        return Extraction::default();
    };
    Extraction {
        exports: ordered_unique(extractor.extract_exports(path, content)),
        imports: ordered_unique(extractor.extract_imports(path, content)),
    }
}

fn ordered_unique<T: Eq + std::hash::Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen: HashSet<T> = HashSet::with_capacity(items.len());
    items.into_iter().filter(|it| seen.insert(it.clone())).collect()
}

/// Replace comments with spaces, keeping newlines so `(?m)^` anchors still line up.
///
/// Quote-aware for `'` and `"` (reset at end of line) and for backticks when
/// `backtick_strings` is set. Unterminated comments simply run to the end of input.
pub(crate) fn strip_comments(
    content: &str,
    line: Option<&str>,
    block: Option<(&str, &str)>,
    backtick_strings: bool,
) -> String {
    let mut out = String::with_capacity(content.len());
    let mut quote: Option<char> = None;
    let mut rest = content;
    while let Some(c) = rest.chars().next() {
        if let Some(q) = quote {
            if c == '\\' {
                let mut it = rest.chars();
                out.push(c);
                it.next();
                if let Some(next) = it.next() {
                    out.push(next);
                    rest = &rest[c.len_utf8() + next.len_utf8()..];
                } else {
                    rest = &rest[c.len_utf8()..];
                }
                continue;
            }
            if c == q || (c == '\n' && q != '`') {
                quote = None;
            }
            out.push(c);
            rest = &rest[c.len_utf8()..];
            continue;
        }
        if line.is_some_and(|m| rest.starts_with(m)) {
            let end = rest.find('\n').unwrap_or(rest.len());
            out.push(' ');
            rest = &rest[end..];
            continue;
        }
        if let Some((open, close)) = block.filter(|(o, _)| rest.starts_with(*o)) {
            let body = &rest[open.len()..];
            let end = body.find(close).map_or(rest.len(), |i| open.len() + i + close.len());
            for ch in rest[..end].chars() {
                out.push(if ch == '\n' { '\n' } else { ' ' });
            }
            rest = &rest[end..];
            continue;
        }
        if c == '\'' || c == '"' || (backtick_strings && c == '`') {
            quote = Some(c);
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}
