use serde::Serialize;
use std::collections::VecDeque;

use crate::graph::builder::normalize_input_path;
use crate::graph::{FileNode, ProjectGraph};
use crate::parser::Language;

/// Query trait implemented by all query types.
///
/// Given an immutable reference to a `ProjectGraph`, returns a result of type `R`.
pub trait Query<R> {
    fn run(&self, graph: &ProjectGraph) -> R;
}

/// Lists in the context sentence stop after this many entries.
const LIST_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextStats {
    pub dependent_count: usize,
    pub dependency_count: usize,
}

/// Everything known about one file, plus a prompt-ready summary sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContext {
    pub node: FileNode,
    pub language: Language,
    /// Files importing this one, path order.
    pub dependents: Vec<FileNode>,
    /// Project files this one imports, path order.
    pub dependencies: Vec<FileNode>,
    /// External specifiers, sorted and de-duplicated.
    pub external: Vec<String>,
    pub stats: ContextStats,
    pub context_string: String,
}

/// Query paths get the same normalisation as submitted file paths.
fn lookup_path(raw: &str) -> String {
    normalize_input_path(raw).unwrap_or_else(|| raw.trim().to_string())
}

/// Dependents and dependencies of one file.
pub struct FileContextQuery {
    pub path: String,
}

impl FileContextQuery {
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self { path: lookup_path(path) }
    }
}

impl Query<Option<FileContext>> for FileContextQuery {
    fn run(&self, graph: &ProjectGraph) -> Option<FileContext> {
        let idx = graph.index_of(&self.path)?;
        let node = graph.nodes()[idx].clone();
        let dependents: Vec<FileNode> =
            graph.dependents(idx).into_iter().map(|i| graph.nodes()[i].clone()).collect();
        let dependencies: Vec<FileNode> =
            graph.dependencies(idx).into_iter().map(|i| graph.nodes()[i].clone()).collect();
        let mut external: Vec<String> = node.external_specifiers().map(str::to_string).collect();
        external.sort();
        external.dedup();

        let context_string = render_context(&node, &dependents, &dependencies, &external);
        Some(FileContext {
            language: node.language,
            stats: ContextStats { dependent_count: dependents.len(), dependency_count: dependencies.len() },
            node,
            dependents,
            dependencies,
            external,
            context_string,
        })
    }
}

fn bounded_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let mut all: Vec<&str> = items.collect();
    all.sort_unstable();
    let extra = all.len().saturating_sub(LIST_LIMIT);
    all.truncate(LIST_LIMIT);
    let mut s = all.join(", ");
    if extra > 0 {
        s.push_str(&format!(" and {extra} more"));
    }
    s
}

/// Deterministic summary used verbatim as extra prompt context downstream.
fn render_context(
    node: &FileNode,
    dependents: &[FileNode],
    dependencies: &[FileNode],
    external: &[String],
) -> String {
    let exports = if node.exports.is_empty() {
        "nothing detected".to_string()
    } else {
        bounded_list(node.exports.iter().map(String::as_str))
    };
    let mut s = format!("File {} ({}). This module exports: {exports}.", node.path, node.language);

    s.push_str(&format!(" It is imported by {} file(s)", dependents.len()));
    if dependents.is_empty() {
        s.push('.');
    } else {
        s.push_str(&format!(": {}.", bounded_list(dependents.iter().map(|n| n.path.as_str()))));
    }

    s.push_str(&format!(" It depends on {} project file(s)", dependencies.len()));
    if dependencies.is_empty() {
        s.push('.');
    } else {
        s.push_str(&format!(": {}.", bounded_list(dependencies.iter().map(|n| n.path.as_str()))));
    }

    if !external.is_empty() {
        s.push_str(&format!(
            " External dependencies: {}.",
            bounded_list(external.iter().map(String::as_str))
        ));
    }
    s
}

/// Compute shortest import chain between two files (directed edges).
pub struct ShortestPathQuery {
    pub from: String,
    pub to: String,
}

impl ShortestPathQuery {
    #[must_use]
    pub fn new(from: &str, to: &str) -> Self {
        Self { from: lookup_path(from), to: lookup_path(to) }
    }
}

impl Query<Vec<String>> for ShortestPathQuery {
    fn run(&self, graph: &ProjectGraph) -> Vec<String> {
        let (Some(src), Some(dst)) = (graph.index_of(&self.from), graph.index_of(&self.to)) else {
            return Vec::new();
        };
        let (adj, _) = graph.adjacency();
        let n = graph.nodes().len();

        let mut prev: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut q = VecDeque::new();
        visited[src] = true;
        q.push_back(src);
        while let Some(u) = q.pop_front() {
            if u == dst {
                break;
            }
            for &v in &adj[u] {
                if !visited[v] {
                    visited[v] = true;
                    prev[v] = Some(u);
                    q.push_back(v);
                }
            }
        }
        if !visited[dst] {
            return Vec::new();
        }

        let mut chain = vec![dst];
        let mut cur = dst;
        while let Some(p) = prev[cur] {
            chain.push(p);
            cur = p;
        }
        chain.reverse();
        chain.into_iter().map(|i| graph.nodes()[i].path.clone()).collect()
    }
}

/// Metric for degree centrality used by `HubsQuery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CentralityMetric {
    In,
    Out,
    Total,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubRow {
    pub path: String,
    pub fan_in: usize,
    pub fan_out: usize,
}

/// Top-N files by degree centrality.
pub struct HubsQuery {
    pub metric: CentralityMetric,
    pub top: usize,
}

impl HubsQuery {
    #[must_use]
    pub fn new(metric: CentralityMetric, top: usize) -> Self {
        Self { metric, top }
    }

    fn key(&self, row: &HubRow) -> usize {
        match self.metric {
            CentralityMetric::In => row.fan_in,
            CentralityMetric::Out => row.fan_out,
            CentralityMetric::Total => row.fan_in + row.fan_out,
        }
    }
}

impl Query<Vec<HubRow>> for HubsQuery {
    fn run(&self, graph: &ProjectGraph) -> Vec<HubRow> {
        let mut rows: Vec<HubRow> = graph
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let d = graph.degree(i);
                HubRow { path: n.path.clone(), fan_in: d.fan_in, fan_out: d.fan_out }
            })
            .collect();
        // Metric desc, then path asc for stability
        rows.sort_by(|a, b| self.key(b).cmp(&self.key(a)).then_with(|| a.path.cmp(&b.path)));
        rows.truncate(self.top);
        rows
    }
}
