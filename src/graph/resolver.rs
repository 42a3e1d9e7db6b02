use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Outcome of resolving one import specifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum Resolution {
    /// Points at another file of the same graph.
    Resolved(String),
    /// Not a local specifier (package, stdlib, URL).
    External,
    /// Looks local, but no submitted file matches it.
    Unresolved,
}

impl Resolution {
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Resolved(p) => Some(p.as_str()),
            Self::External | Self::Unresolved => None,
        }
    }
}

/// Probe configuration. Order matters everywhere: first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// (prefix, project-relative target directory); longest prefix is tried first.
    aliases: Vec<(String, String)>,
    pub extensions: Vec<String>,
    pub index_files: Vec<String>,
}

impl ResolverOptions {
    #[must_use]
    pub fn new(
        aliases: impl IntoIterator<Item = (String, String)>,
        extensions: Vec<String>,
        index_files: Vec<String>,
    ) -> Self {
        let mut aliases: Vec<(String, String)> = aliases.into_iter().collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        let extensions =
            extensions.into_iter().map(|e| e.trim_start_matches('.').to_string()).collect();
        Self { aliases, extensions, index_files }
    }

    #[must_use]
    pub fn aliases(&self) -> &[(String, String)] {
        &self.aliases
    }
}

impl Default for ResolverOptions {
    fn default() -> Self {
        let s = |v: &[&str]| v.iter().map(|x| (*x).to_string()).collect::<Vec<_>>();
        Self::new(
            [("@/".to_string(), "src/".to_string()), ("~/".to_string(), String::new())],
            s(&["ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "rs", "go", "java", "css", "scss"]),
            s(&["index", "__init__", "mod"]),
        )
    }
}

/// Normalise a project-relative path: forward slashes, no `.` segments, `..` collapsed.
/// Returns `None` when the path climbs above the project root.
#[must_use]
pub fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    Some(parts.join("/"))
}

fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}

fn join(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        rest.to_string()
    } else {
        format!("{dir}/{rest}")
    }
}

/// Ordered probe list for `specifier` imported from `from_path`.
///
/// `None` means the specifier is external. An empty list means it is local but
/// can never match (it escapes the project root).
#[must_use]
pub fn candidates(options: &ResolverOptions, specifier: &str, from_path: &str) -> Option<Vec<String>> {
    let spec = specifier.trim();
    let joined = if spec == "." || spec == ".." || spec.starts_with("./") || spec.starts_with("../") {
        join(parent_dir(from_path), spec)
    } else if let Some(rest) = spec.strip_prefix('/') {
        rest.to_string()
    } else if let Some((prefix, target)) =
        options.aliases.iter().find(|(prefix, _)| spec.starts_with(prefix.as_str()))
    {
        join(target.trim_end_matches('/'), &spec[prefix.len()..])
    } else {
        return None;
    };

    let Some(base) = normalize(&joined) else {
        return Some(Vec::new());
    };

    let mut out = Vec::with_capacity(1 + options.extensions.len() * (1 + options.index_files.len()));
    if !base.is_empty() {
        out.push(base.clone());
        for ext in &options.extensions {
            out.push(format!("{base}.{ext}"));
        }
    }
    for index in &options.index_files {
        for ext in &options.extensions {
            out.push(join(&base, &format!("{index}.{ext}")));
        }
    }
    Some(out)
}

/// Resolves specifiers against the set of paths known to one graph.
pub struct Resolver<'a> {
    options: &'a ResolverOptions,
    known: &'a HashSet<String>,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(options: &'a ResolverOptions, known: &'a HashSet<String>) -> Self {
        Self { options, known }
    }

    /// Exact path, then appended extensions, then directory index files.
    #[must_use]
    pub fn resolve(&self, specifier: &str, from_path: &str) -> Resolution {
        match candidates(self.options, specifier, from_path) {
            None => Resolution::External,
            Some(probes) => probes
                .into_iter()
                .find(|p| self.known.contains(p))
                .map_or(Resolution::Unresolved, Resolution::Resolved),
        }
    }
}
