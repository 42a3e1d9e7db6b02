use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};

use super::resolver::{normalize, Resolver, ResolverOptions};
use super::{FileNode, GraphMeta, ImportRef, ProjectGraph, Resolution};
use crate::errors::{GraphError, Result};
use crate::parser::{self, Language};

/// One file as submitted by a caller. Both fields are optional at this level so
/// that a missing value is reported as `INVALID_FILE` instead of a decode error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInput {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl FileInput {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self { path: Some(path.into()), content: Some(content.into()) }
    }
}

/// A validated file with a normalised project-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Normalise a submitted path: backslashes to slashes, leading `./` and `/`
/// dropped, `..` collapsed. Empty results and root escapes are rejected.
#[must_use]
pub fn normalize_input_path(raw: &str) -> Option<String> {
    normalize(raw.trim()).filter(|p| !p.is_empty())
}

/// Validate a batch before any parsing: presence, cap, then per-file shape.
///
/// # Errors
/// `FilesRequired` for a missing or empty list, `TooManyFiles` above `cap`,
/// `InvalidFile` for a missing path/content or a duplicate path.
pub fn validate_batch(files: Option<&[FileInput]>, cap: usize) -> Result<Vec<SourceFile>> {
    let files = match files {
        Some(f) if !f.is_empty() => f,
        _ => return Err(GraphError::FilesRequired),
    };
    if files.len() > cap {
        return Err(GraphError::TooManyFiles { count: files.len(), cap });
    }
    validate_entries(files)
}

pub(crate) fn validate_entries(files: &[FileInput]) -> Result<Vec<SourceFile>> {
    let mut seen: HashSet<String> = HashSet::with_capacity(files.len());
    let mut out = Vec::with_capacity(files.len());
    for (index, f) in files.iter().enumerate() {
        let raw = f.path.as_deref().ok_or_else(|| GraphError::invalid_file(index, "missing path"))?;
        let path = normalize_input_path(raw)
            .ok_or_else(|| GraphError::invalid_file(index, format!("invalid path {raw:?}")))?;
        let content =
            f.content.as_ref().ok_or_else(|| GraphError::invalid_file(index, "missing content"))?;
        if !seen.insert(path.clone()) {
            return Err(GraphError::invalid_file(index, format!("duplicate path {path}")));
        }
        out.push(SourceFile { path, content: content.clone() });
    }
    Ok(out)
}

/// Wall-clock budget shared by every phase of one analysis or refresh.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self { started: Instant::now(), budget }
    }

    /// # Errors
    /// `DeadlineExceeded` once the budget is spent.
    pub fn check(&self) -> Result<()> {
        if self.started.elapsed() > self.budget {
            Err(GraphError::DeadlineExceeded(self.budget))
        } else {
            Ok(())
        }
    }
}

/// Runs extraction and resolution for a batch of files.
pub struct GraphBuilder<'a> {
    options: &'a ResolverOptions,
    deadline: Deadline,
}

impl<'a> GraphBuilder<'a> {
    #[must_use]
    pub fn new(options: &'a ResolverOptions, deadline: Deadline) -> Self {
        Self { options, deadline }
    }

    #[must_use]
    pub fn options(&self) -> &ResolverOptions {
        self.options
    }

    #[must_use]
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Phase 1: per-file extraction in parallel. Imports come back `Unresolved`
    /// or `External` until [`Self::resolve_nodes`] runs.
    ///
    /// # Errors
    /// `DeadlineExceeded` if the budget runs out mid-batch.
    pub fn extract_all(&self, files: &[SourceFile]) -> Result<Vec<FileNode>> {
        files
            .par_iter()
            .map(|f| {
                self.deadline.check()?;
                Ok(extract_node(&f.path, &f.content))
            })
            .collect()
    }

    /// Phase 2: resolve every import of `nodes` against `known`. Must only run
    /// once `known` holds the final path set of the graph.
    ///
    /// # Errors
    /// `DeadlineExceeded` if the budget runs out mid-batch.
    pub fn resolve_nodes(&self, nodes: &mut [FileNode], known: &HashSet<String>) -> Result<()> {
        let resolver = Resolver::new(self.options, known);
        nodes.par_iter_mut().try_for_each(|node| {
            self.deadline.check()?;
            for imp in &mut node.imports {
                imp.resolution = resolver.resolve(&imp.specifier, &node.path);
            }
            Ok(())
        })
    }

    /// Full analysis: extract, barrier, resolve, assemble.
    ///
    /// # Errors
    /// `DeadlineExceeded` if either phase overruns.
    pub fn build(&self, meta: GraphMeta, files: &[SourceFile]) -> Result<ProjectGraph> {
        let mut nodes = self.extract_all(files)?;
        let known: HashSet<String> = nodes.iter().map(|n| n.path.clone()).collect();
        self.resolve_nodes(&mut nodes, &known)?;
        Ok(ProjectGraph::assemble(meta, nodes))
    }
}

/// Extract one file into a node whose imports are not yet resolved.
#[must_use]
pub fn extract_node(path: &str, content: &str) -> FileNode {
    let language = Language::from_path(path);
    let extraction = parser::extract(path, content, language);
    FileNode {
        path: path.to_string(),
        language,
        exports: extraction.exports,
        imports: extraction
            .imports
            .into_iter()
            .map(|raw| ImportRef { specifier: raw.specifier, resolution: Resolution::Unresolved })
            .collect(),
        size_bytes: content.len(),
    }
}
