use once_cell::sync::Lazy;
use regex::Regex;

use super::{strip_comments, LanguageExtractor, RawImport};

// Simple, conservative regexes to avoid catastrophic backtracking.
// The `regex` crate guarantees linear-time matching, so these are safe on hostile input.
fn re(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(r) => r,
        Err(e) => panic!("invalid built-in pattern {pattern:?}: {e}"),
    }
}

fn ident_ok(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn import(specifier: &str) -> RawImport {
    RawImport { specifier: specifier.trim().to_string() }
}

/// Collect (position, capture 1) pairs for every pattern, then sort by position so
/// imports keep source order regardless of which pattern found them.
fn positional(content: &str, patterns: &[&Regex]) -> Vec<RawImport> {
    let mut found: Vec<(usize, &str)> = Vec::new();
    for pattern in patterns {
        for cap in pattern.captures_iter(content) {
            if let Some(m) = cap.get(1) {
                if !m.as_str().trim().is_empty() {
                    found.push((m.start(), m.as_str()));
                }
            }
        }
    }
    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, s)| import(s)).collect()
}

// ---------------------------------------------------------------------------
// JavaScript / TypeScript
// ---------------------------------------------------------------------------

struct EcmaPatterns {
    import_from: Regex,
    import_bare: Regex,
    export_from: Regex,
    require_call: Regex,
    dynamic_import: Regex,
    export_decl: Regex,
    export_default: Regex,
    export_list: Regex,
    cjs_named: Regex,
    cjs_object: Regex,
    cjs_default: Regex,
}

static ECMA: Lazy<EcmaPatterns> = Lazy::new(|| EcmaPatterns {
    import_from: re(r#"\bimport\s+(?:type\s+)?[\w*\s{},$]*?\bfrom\s*['"]([^'"\n]+)['"]"#),
    import_bare: re(r#"(?m)^\s*import\s*['"]([^'"\n]+)['"]"#),
    export_from: re(
        r#"\bexport\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s*['"]([^'"\n]+)['"]"#,
    ),
    require_call: re(r#"\brequire\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#),
    dynamic_import: re(r#"\bimport\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#),
    export_decl: re(
        r"(?m)^\s*export\s+(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:function(?:\s*\*)?|class|const|let|var|interface|type|enum|namespace)\s+([A-Za-z_$][\w$]*)",
    ),
    export_default: re(r"(?m)^\s*export\s+default\b"),
    export_list: re(r"\bexport\s+(?:type\s+)?\{([^}]*)\}"),
    cjs_named: re(r"\b(?:module\.)?exports\.([A-Za-z_$][\w$]*)\s*="),
    cjs_object: re(r"\bmodule\.exports\s*=\s*\{([^}]*)\}"),
    cjs_default: re(r"\bmodule\.exports\s*=\s*[^{\s]"),
});

/// JavaScript and TypeScript (ES modules and CommonJS).
#[derive(Debug, Default, Clone, Copy)]
pub struct EcmaScript;

impl LanguageExtractor for EcmaScript {
    fn extract_imports(&self, _path: &str, content: &str) -> Vec<RawImport> {
        let code = strip_comments(content, Some("//"), Some(("/*", "*/")), true);
        let p = &*ECMA;
        positional(
            &code,
            &[&p.import_from, &p.import_bare, &p.export_from, &p.require_call, &p.dynamic_import],
        )
    }

    fn extract_exports(&self, _path: &str, content: &str) -> Vec<String> {
        let code = strip_comments(content, Some("//"), Some(("/*", "*/")), true);
        let p = &*ECMA;
        let mut found: Vec<(usize, String)> = Vec::new();
        for cap in p.export_decl.captures_iter(&code) {
            if let Some(m) = cap.get(1) {
                found.push((m.start(), m.as_str().to_string()));
            }
        }
        for m in p.export_default.find_iter(&code) {
            found.push((m.start(), "default".to_string()));
        }
        for cap in p.export_list.captures_iter(&code) {
            let Some(list) = cap.get(1) else { continue };
            for entry in list.as_str().split(',') {
                let entry = entry.trim().trim_start_matches("type ").trim();
                // `a as b` exposes `b`
                let exposed = entry.rsplit(" as ").next().unwrap_or(entry).trim();
                if ident_ok(exposed) {
                    found.push((list.start(), exposed.to_string()));
                }
            }
        }
        for cap in p.cjs_named.captures_iter(&code) {
            if let Some(m) = cap.get(1) {
                found.push((m.start(), m.as_str().to_string()));
            }
        }
        for cap in p.cjs_object.captures_iter(&code) {
            let Some(body) = cap.get(1) else { continue };
            for entry in body.as_str().split(',') {
                let key = entry.split(':').next().unwrap_or("").trim();
                if ident_ok(key) {
                    found.push((body.start(), key.to_string()));
                }
            }
        }
        for m in p.cjs_default.find_iter(&code) {
            found.push((m.start(), "default".to_string()));
        }
        found.sort_by_key(|(pos, _)| *pos);
        found.into_iter().map(|(_, name)| name).collect()
    }
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

struct PythonPatterns {
    import_stmt: Regex,
    from_stmt: Regex,
    all_decl: Regex,
    quoted_name: Regex,
    top_def: Regex,
}

static PYTHON_RE: Lazy<PythonPatterns> = Lazy::new(|| PythonPatterns {
    import_stmt: re(r"(?m)^[ \t]*import[ \t]+([\w.]+(?:[ \t]+as[ \t]+\w+)?(?:[ \t]*,[ \t]*[\w.]+(?:[ \t]+as[ \t]+\w+)?)*)"),
    from_stmt: re(r"(?m)^[ \t]*from[ \t]+(\.*)([\w.]*)[ \t]+import[ \t]+(?:\(([^)]*)\)|([^\n]*))"),
    all_decl: re(r"(?m)^__all__\s*(?::[^=]*)?=\s*[\[(]([^\])]*)[\])]"),
    quoted_name: re(r#"['"]([A-Za-z_]\w*)['"]"#),
    top_def: re(r"(?m)^(?:async[ \t]+)?(?:def|class)[ \t]+([A-Za-z_]\w*)"),
});

/// Turn the leading dots and dotted module of a relative `from` import into a path specifier.
fn python_relative(dots: usize, module: &str) -> String {
    let mut spec = if dots <= 1 { "./".to_string() } else { "../".repeat(dots - 1) };
    spec.push_str(&module.replace('.', "/"));
    spec
}

/// Python modules and packages.
#[derive(Debug, Default, Clone, Copy)]
pub struct Python;

impl LanguageExtractor for Python {
    fn extract_imports(&self, _path: &str, content: &str) -> Vec<RawImport> {
        let code = strip_comments(content, Some("#"), None, false);
        let p = &*PYTHON_RE;
        let mut found: Vec<(usize, String)> = Vec::new();
        for cap in p.import_stmt.captures_iter(&code) {
            let Some(list) = cap.get(1) else { continue };
            for entry in list.as_str().split(',') {
                if let Some(module) = entry.split_whitespace().next() {
                    found.push((list.start(), module.to_string()));
                }
            }
        }
        for cap in p.from_stmt.captures_iter(&code) {
            let pos = cap.get(0).map_or(0, |m| m.start());
            let dots = cap.get(1).map_or(0, |m| m.as_str().len());
            let module = cap.get(2).map_or("", |m| m.as_str()).trim_matches('.');
            if dots == 0 {
                if !module.is_empty() {
                    found.push((pos, module.to_string()));
                }
                continue;
            }
            if !module.is_empty() {
                found.push((pos, python_relative(dots, module)));
                continue;
            }
            // `from . import a, b` imports sibling modules a and b
            let names = cap.get(3).or_else(|| cap.get(4)).map_or("", |m| m.as_str());
            for entry in names.split(',') {
                let name = entry.split_whitespace().next().unwrap_or("");
                if ident_ok(name) {
                    found.push((pos, python_relative(dots, name)));
                }
            }
        }
        found.sort_by_key(|(pos, _)| *pos);
        found.into_iter().map(|(_, s)| RawImport { specifier: s }).collect()
    }

    fn extract_exports(&self, _path: &str, content: &str) -> Vec<String> {
        let code = strip_comments(content, Some("#"), None, false);
        let p = &*PYTHON_RE;
        if let Some(cap) = p.all_decl.captures(&code) {
            if let Some(body) = cap.get(1) {
                return p
                    .quoted_name
                    .captures_iter(body.as_str())
                    .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                    .collect();
            }
        }
        p.top_def
            .captures_iter(&code)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .filter(|name| !name.starts_with('_'))
            .map(str::to_string)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Rust
// ---------------------------------------------------------------------------

struct RustPatterns {
    mod_decl: Regex,
    pub_item: Regex,
}

static RUST_RE: Lazy<RustPatterns> = Lazy::new(|| RustPatterns {
    mod_decl: re(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+([A-Za-z_][A-Za-z0-9_]*)\s*;"),
    pub_item: re(
        r#"(?m)^\s*pub\s+(?:(?:async|const|unsafe|extern\s+"[^"]*")\s+)*(?:fn|struct|enum|trait|type|const|static|mod|union)\s+(?:mut\s+)?([A-Za-z_][A-Za-z0-9_]*)"#,
    ),
});

/// Rust: `mod x;` declarations are the file-level dependencies.
#[derive(Debug, Default, Clone, Copy)]
pub struct Rust;

impl LanguageExtractor for Rust {
    fn extract_imports(&self, path: &str, content: &str) -> Vec<RawImport> {
        let code = strip_comments(content, Some("//"), Some(("/*", "*/")), false);
        let file_name = path.rsplit('/').next().unwrap_or(path);
        // lib.rs, main.rs and mod.rs own their directory; any other file owns a same-named subdirectory
        let prefix = match file_name {
            "lib.rs" | "main.rs" | "mod.rs" => "./".to_string(),
            other => format!("./{}/", other.strip_suffix(".rs").unwrap_or(other)),
        };
        RUST_RE
            .mod_decl
            .captures_iter(&code)
            .filter_map(|c| c.get(1))
            .map(|m| RawImport { specifier: format!("{prefix}{}", m.as_str()) })
            .collect()
    }

    fn extract_exports(&self, _path: &str, content: &str) -> Vec<String> {
        let code = strip_comments(content, Some("//"), Some(("/*", "*/")), false);
        RUST_RE
            .pub_item
            .captures_iter(&code)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Go
// ---------------------------------------------------------------------------

struct GoPatterns {
    single: Regex,
    block: Regex,
    quoted: Regex,
    func: Regex,
    decl: Regex,
}

static GO_RE: Lazy<GoPatterns> = Lazy::new(|| GoPatterns {
    single: re(r#"(?m)^\s*import\s+(?:[\w.]+\s+)?"([^"\n]+)""#),
    block: re(r"(?s)\bimport\s*\(([^)]*)\)"),
    quoted: re(r#""([^"\n]+)""#),
    func: re(r"(?m)^func\s+(?:\([^)]*\)\s*)?([A-Z]\w*)"),
    decl: re(r"(?m)^(?:type|var|const)\s+([A-Z]\w*)"),
});

#[derive(Debug, Default, Clone, Copy)]
pub struct Go;

impl LanguageExtractor for Go {
    fn extract_imports(&self, _path: &str, content: &str) -> Vec<RawImport> {
        let code = strip_comments(content, Some("//"), Some(("/*", "*/")), true);
        let p = &*GO_RE;
        let mut found: Vec<(usize, &str)> = Vec::new();
        for cap in p.single.captures_iter(&code) {
            if let Some(m) = cap.get(1) {
                found.push((m.start(), m.as_str()));
            }
        }
        for cap in p.block.captures_iter(&code) {
            let Some(body) = cap.get(1) else { continue };
            for inner in p.quoted.captures_iter(body.as_str()) {
                if let Some(m) = inner.get(1) {
                    found.push((body.start() + m.start(), m.as_str()));
                }
            }
        }
        found.sort_by_key(|(pos, _)| *pos);
        found.into_iter().map(|(_, s)| import(s)).collect()
    }

    fn extract_exports(&self, _path: &str, content: &str) -> Vec<String> {
        let code = strip_comments(content, Some("//"), Some(("/*", "*/")), true);
        let p = &*GO_RE;
        let mut found: Vec<(usize, String)> = p
            .func
            .captures_iter(&code)
            .chain(p.decl.captures_iter(&code))
            .filter_map(|c| c.get(1).map(|m| (m.start(), m.as_str().to_string())))
            .collect();
        found.sort_by_key(|(pos, _)| *pos);
        found.into_iter().map(|(_, n)| n).collect()
    }
}

// ---------------------------------------------------------------------------
// Java
// ---------------------------------------------------------------------------

struct JavaPatterns {
    import_stmt: Regex,
    public_type: Regex,
}

static JAVA_RE: Lazy<JavaPatterns> = Lazy::new(|| JavaPatterns {
    import_stmt: re(r"(?m)^\s*import\s+(?:static\s+)?([\w.]+(?:\.\*)?)\s*;"),
    public_type: re(
        r"(?m)^\s*public\s+(?:(?:abstract|final|static|sealed|strictfp)\s+)*(?:class|interface|enum|record|@interface)\s+([A-Za-z_]\w*)",
    ),
});

#[derive(Debug, Default, Clone, Copy)]
pub struct Java;

impl LanguageExtractor for Java {
    fn extract_imports(&self, _path: &str, content: &str) -> Vec<RawImport> {
        let code = strip_comments(content, Some("//"), Some(("/*", "*/")), false);
        positional(&code, &[&JAVA_RE.import_stmt])
    }

    fn extract_exports(&self, _path: &str, content: &str) -> Vec<String> {
        let code = strip_comments(content, Some("//"), Some(("/*", "*/")), false);
        JAVA_RE
            .public_type
            .captures_iter(&code)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// CSS / SCSS / Less
// ---------------------------------------------------------------------------

static CSS_IMPORT: Lazy<Regex> =
    Lazy::new(|| re(r#"@import\s+(?:url\(\s*)?['"]?([^'"()\s;]+)['"]?\s*\)?"#));

#[derive(Debug, Default, Clone, Copy)]
pub struct Css;

impl LanguageExtractor for Css {
    fn extract_imports(&self, _path: &str, content: &str) -> Vec<RawImport> {
        let code = strip_comments(content, None, Some(("/*", "*/")), false);
        positional(&code, &[&CSS_IMPORT])
    }

    fn extract_exports(&self, _path: &str, _content: &str) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{extract, Language};

    fn specs(path: &str, src: &str) -> Vec<String> {
        extract(path, src, Language::from_path(path)).imports.into_iter().map(|i| i.specifier).collect()
    }

    fn exports(path: &str, src: &str) -> Vec<String> {
        extract(path, src, Language::from_path(path)).exports
    }

    #[test]
    fn ecmascript_import_forms() {
        let src = r#"
        import React from 'react';
        import { a, b as c } from "./util.js";
        import {
            x,
            y,
        } from './multi';
        import * as ns from '../ns';
        import type { T } from './types';
        import './side-effect.css';
        export { z } from './reexport';
        export * from './star';
        const fs = require('fs');
        const lazy = await import('./lazy');
        // import ignored from './commented';
        "#;
        assert_eq!(
            specs("src/app.ts", src),
            vec![
                "react",
                "./util.js",
                "./multi",
                "../ns",
                "./types",
                "./side-effect.css",
                "./reexport",
                "./star",
                "fs",
                "./lazy"
            ]
        );
    }

    #[test]
    fn ecmascript_export_forms() {
        let src = r"
        export function foo() {}
        export async function bar() {}
        export const BAZ = 1;
        export class Widget {}
        export interface Props {}
        export type Id = string;
        export enum Color { Red }
        export default Widget;
        const q = 1, r = 2;
        export { q, r as renamed };
        ";
        assert_eq!(
            exports("src/w.ts", src),
            vec!["foo", "bar", "BAZ", "Widget", "Props", "Id", "Color", "default", "q", "renamed"]
        );
    }

    #[test]
    fn commonjs_exports() {
        let src = "exports.one = 1;\nmodule.exports.two = 2;\n";
        assert_eq!(exports("lib/a.js", src), vec!["one", "two"]);
        let src = "module.exports = { alpha, beta: 2 };";
        assert_eq!(exports("lib/b.js", src), vec!["alpha", "beta"]);
        let src = "module.exports = factory;";
        assert_eq!(exports("lib/c.js", src), vec!["default"]);
    }

    #[test]
    fn python_imports_and_relative_forms() {
        let src = "import os, sys as system\nfrom typing import List\nfrom . import models, views\nfrom .utils import helper\nfrom ..core.base import Base\n# from .ignored import x\n";
        assert_eq!(
            specs("app/api.py", src),
            vec!["os", "sys", "typing", "./models", "./views", "./utils", "../core/base"]
        );
    }

    #[test]
    fn python_exports_prefer_all() {
        let src = "def public():\n    pass\n\ndef _private():\n    pass\n\nclass Model:\n    def method(self):\n        pass\n";
        assert_eq!(exports("m.py", src), vec!["public", "Model"]);
        let src = "__all__ = ['only_this']\ndef only_this(): pass\ndef other(): pass\n";
        assert_eq!(exports("m.py", src), vec!["only_this"]);
    }

    #[test]
    fn python_fixture_class_is_exported() {
        let src = "\"\"\"Sample\"\"\"\n\nclass DataProcessor:\n    def __init__(self):\n        self.data = []\n";
        assert_eq!(exports("valid-python.py", src), vec!["DataProcessor"]);
    }

    #[test]
    fn rust_mod_declarations_follow_module_files() {
        let src = "pub mod graph;\nmod parser;\n#[cfg(test)]\nmod tests { }\n";
        assert_eq!(specs("src/lib.rs", src), vec!["./graph", "./parser"]);
        assert_eq!(specs("src/graph.rs", "pub mod resolver;"), vec!["./graph/resolver"]);
        assert_eq!(specs("src/graph/mod.rs", "pub mod resolver;"), vec!["./resolver"]);
    }

    #[test]
    fn rust_public_items() {
        let src = "pub fn a() {}\nfn hidden() {}\npub(crate) struct Inner;\npub struct S;\npub const fn c() {}\npub static mut G: u8 = 0;\npub trait T {}\n";
        assert_eq!(exports("src/x.rs", src), vec!["a", "S", "c", "G", "T"]);
    }

    #[test]
    fn go_imports_and_exports() {
        let src = "package main\n\nimport \"fmt\"\nimport (\n    \"os\"\n    str \"strings\"\n)\n\nfunc Exported() {}\nfunc hidden() {}\nfunc (s *Server) Serve() {}\ntype Config struct{}\n";
        assert_eq!(specs("main.go", src), vec!["fmt", "os", "strings"]);
        assert_eq!(exports("main.go", src), vec!["Exported", "Serve", "Config"]);
    }

    #[test]
    fn java_imports_and_public_types() {
        let src = "import java.util.List;\nimport static org.junit.Assert.*;\npublic final class Service {}\nclass Hidden {}\n";
        assert_eq!(specs("Service.java", src), vec!["java.util.List", "org.junit.Assert.*"]);
        assert_eq!(exports("Service.java", src), vec!["Service"]);
    }

    #[test]
    fn css_imports() {
        let src = "@import './base.css';\n@import url(\"theme.css\");\n/* @import './no.css'; */";
        assert_eq!(specs("style.css", src), vec!["./base.css", "theme.css"]);
    }

    #[test]
    fn malformed_input_is_tolerated() {
        let src = "import { from '\nexport { ,, }\nrequire(\nimport(";
        let ex = extract("broken.js", src, Language::JavaScript);
        assert!(ex.imports.is_empty());
        assert!(ex.exports.is_empty());
    }
}
