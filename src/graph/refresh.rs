//! Incremental update of a stored graph.
//!
//! Only changed files are re-extracted. Imports of unchanged files keep their
//! previous resolution unless one of their probe candidates was added, changed
//! or removed in this refresh; those few are re-resolved. The result equals a
//! from-scratch analysis of the new file set.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::builder::{normalize_input_path, validate_entries, FileInput, GraphBuilder, SourceFile};
use super::resolver::{candidates, Resolver};
use super::{FileNode, ProjectGraph, Resolution};
use crate::errors::{GraphError, Result};

/// Changed files plus explicit removals. Deletion is only ever signalled through
/// `removed`; an empty `content` is an empty file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub files: Option<Vec<FileInput>>,
    #[serde(default)]
    pub removed: Vec<String>,
}

impl RefreshRequest {
    #[must_use]
    pub fn with_files(files: Vec<FileInput>) -> Self {
        Self { files: Some(files), removed: Vec::new() }
    }
}

/// Validated form of a [`RefreshRequest`].
#[derive(Debug, Clone, Default)]
pub struct RefreshBatch {
    pub changed: Vec<SourceFile>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    /// Imports of unchanged files whose resolution was recomputed.
    pub reresolved_imports: usize,
}

/// # Errors
/// `FilesRequired` when both lists are empty, `TooManyFiles` when more changed
/// files than `cap` are submitted, `InvalidFile` for malformed entries or a path
/// that is both changed and removed.
pub fn validate_refresh(request: &RefreshRequest, cap: usize) -> Result<RefreshBatch> {
    let files = request.files.as_deref().unwrap_or_default();
    if files.is_empty() && request.removed.is_empty() {
        return Err(GraphError::FilesRequired);
    }
    if files.len() > cap {
        return Err(GraphError::TooManyFiles { count: files.len(), cap });
    }
    let changed = validate_entries(files)?;
    let changed_paths: HashSet<&str> = changed.iter().map(|f| f.path.as_str()).collect();
    let mut removed = Vec::with_capacity(request.removed.len());
    for raw in &request.removed {
        let path = normalize_input_path(raw).unwrap_or_else(|| raw.trim().to_string());
        if let Some(index) = changed.iter().position(|f| f.path == path) {
            return Err(GraphError::invalid_file(index, format!("{path} is both changed and removed")));
        }
        if !changed_paths.contains(path.as_str()) && !removed.contains(&path) {
            removed.push(path);
        }
    }
    Ok(RefreshBatch { changed, removed })
}

/// Apply `batch` to `previous`, producing a new graph value under the same id.
///
/// `previous` is never mutated; callers swap the returned graph in.
///
/// # Errors
/// `TooManyFiles` when the resulting node count exceeds `cap`;
/// `DeadlineExceeded` from the builder.
pub fn apply_refresh(
    previous: &ProjectGraph,
    batch: &RefreshBatch,
    builder: &GraphBuilder<'_>,
    cap: usize,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<(ProjectGraph, RefreshReport)> {
    let old_paths = previous.known_paths();
    let changed_paths: HashSet<&str> = batch.changed.iter().map(|f| f.path.as_str()).collect();
    let removed: Vec<&str> =
        batch.removed.iter().map(String::as_str).filter(|p| old_paths.contains(*p)).collect();
    let removed_set: HashSet<&str> = removed.iter().copied().collect();

    let mut report = RefreshReport {
        removed: removed.iter().map(|p| (*p).to_string()).collect(),
        ..RefreshReport::default()
    };
    for f in &batch.changed {
        if old_paths.contains(&f.path) {
            report.updated.push(f.path.clone());
        } else {
            report.added.push(f.path.clone());
        }
    }

    let mut fresh = builder.extract_all(&batch.changed)?;

    let mut kept: Vec<FileNode> = previous
        .nodes()
        .iter()
        .filter(|n| !changed_paths.contains(n.path.as_str()) && !removed_set.contains(n.path.as_str()))
        .cloned()
        .collect();

    let node_count = kept.len() + fresh.len();
    if node_count > cap {
        return Err(GraphError::TooManyFiles { count: node_count, cap });
    }

    let known: HashSet<String> =
        kept.iter().map(|n| n.path.clone()).chain(fresh.iter().map(|n| n.path.clone())).collect();

    builder.resolve_nodes(&mut fresh, &known)?;

    // Paths whose presence or content changed: any unchanged import probing one of them may resolve differently now.
    let touched: HashSet<&str> = changed_paths.union(&removed_set).copied().collect();
    let resolver = Resolver::new(builder.options(), &known);
    for node in &mut kept {
        builder.deadline().check()?;
        for imp in &mut node.imports {
            if matches!(imp.resolution, Resolution::External) {
                continue;
            }
            let affected = candidates(builder.options(), &imp.specifier, &node.path)
                .is_some_and(|probes| probes.iter().any(|p| touched.contains(p.as_str())));
            if affected {
                imp.resolution = resolver.resolve(&imp.specifier, &node.path);
                report.reresolved_imports += 1;
            }
        }
    }

    let mut meta = previous.meta.clone();
    meta.analyzed_at = now;
    meta.expires_at = now + ttl;

    kept.extend(fresh);
    Ok((ProjectGraph::assemble(meta, kept), report))
}
