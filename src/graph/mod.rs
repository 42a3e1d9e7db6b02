//! Graph model for one analysed project snapshot.
//!
//! A [`ProjectGraph`] is an arena: file nodes are kept sorted by path and edges
//! are `(from, to)` index pairs into that vector. Edges and [`GraphStats`] are
//! always derived from the nodes' resolved imports by [`ProjectGraph::assemble`],
//! never edited directly, so a graph value can be shared behind an `Arc` and
//! replaced wholesale on refresh.
//!
//! Construction goes through [`builder::GraphBuilder`] (full analysis) or
//! [`refresh::apply_refresh`] (incremental update).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::parser::Language;

pub mod builder;
pub mod refresh;
pub mod resolver;

pub use resolver::Resolution;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct GraphId(pub String);

impl std::fmt::Display for GraphId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GraphId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRef {
    pub specifier: String,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub path: String,
    pub language: Language,
    pub exports: Vec<String>,
    pub imports: Vec<ImportRef>,
    pub size_bytes: usize,
}

impl FileNode {
    /// Specifiers that point outside the project.
    pub fn external_specifiers(&self) -> impl Iterator<Item = &str> {
        self.imports
            .iter()
            .filter(|i| matches!(i.resolution, Resolution::External))
            .map(|i| i.specifier.as_str())
    }
}

/// `from` imports `to`; both are indices into [`ProjectGraph::nodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degree {
    /// Number of files importing this one.
    pub fan_in: usize,
    /// Number of project files this one imports.
    pub fan_out: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubEntry {
    pub path: String,
    pub dependents: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    /// Parallel to `ProjectGraph::nodes`.
    pub degrees: Vec<Degree>,
    pub most_depended_on: Option<HubEntry>,
    pub external_import_count: usize,
    pub unresolved_import_count: usize,
    /// Most frequently imported external specifiers, at most ten, count descending.
    pub top_external: Vec<(String, usize)>,
    pub languages: BTreeMap<String, usize>,
    pub total_bytes: u64,
}

impl GraphStats {
    /// Pure function of the node and edge set.
    fn compute(nodes: &[FileNode], edges: &[Edge]) -> Self {
        let mut degrees = vec![Degree::default(); nodes.len()];
        for e in edges {
            degrees[e.from].fan_out += 1;
            degrees[e.to].fan_in += 1;
        }

        // Nodes are path-sorted, so the first maximum is also the smallest path among ties
        let most_depended_on = degrees
            .iter()
            .enumerate()
            .filter(|(_, d)| d.fan_in > 0)
            .fold(None::<(usize, usize)>, |best, (i, d)| match best {
                Some((_, n)) if n >= d.fan_in => best,
                _ => Some((i, d.fan_in)),
            })
            .map(|(i, n)| HubEntry { path: nodes[i].path.clone(), dependents: n });

        let mut languages: BTreeMap<String, usize> = BTreeMap::new();
        let mut external: HashMap<&str, usize> = HashMap::new();
        let mut external_import_count = 0;
        let mut unresolved_import_count = 0;
        let mut total_bytes = 0u64;
        for n in nodes {
            *languages.entry(n.language.as_str().to_string()).or_default() += 1;
            total_bytes += n.size_bytes as u64;
            for imp in &n.imports {
                match imp.resolution {
                    Resolution::External => {
                        external_import_count += 1;
                        *external.entry(imp.specifier.as_str()).or_default() += 1;
                    }
                    Resolution::Unresolved => unresolved_import_count += 1,
                    Resolution::Resolved(_) => {}
                }
            }
        }
        let mut top_external: Vec<(String, usize)> =
            external.into_iter().map(|(s, c)| (s.to_string(), c)).collect();
        top_external.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_external.truncate(10);

        Self {
            node_count: nodes.len(),
            edge_count: edges.len(),
            degrees,
            most_depended_on,
            external_import_count,
            unresolved_import_count,
            top_external,
            languages,
            total_bytes,
        }
    }
}

/// Identity, ownership and lifetime of a stored graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMeta {
    pub graph_id: GraphId,
    pub owner_id: String,
    pub persistent_project_id: Option<i64>,
    pub project_name: String,
    pub branch: Option<String>,
    pub project_path: Option<String>,
    /// Set once at analysis; refresh keeps it.
    pub created_at: DateTime<Utc>,
    pub analyzed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl GraphMeta {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Listing row: metadata plus headline counts, without nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub graph_id: GraphId,
    pub project_name: String,
    pub branch: Option<String>,
    pub persistent_project_id: Option<i64>,
    pub node_count: usize,
    pub edge_count: usize,
    pub analyzed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Canonical graph for its persistent project (always true without one).
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredGraph")]
pub struct ProjectGraph {
    pub meta: GraphMeta,
    nodes: Vec<FileNode>,
    edges: Vec<Edge>,
    stats: GraphStats,
}

/// Persisted form read back from disk. Edges and stats in the document are
/// ignored and derived again, so stale or out-of-range indices never load.
#[derive(Deserialize)]
struct StoredGraph {
    meta: GraphMeta,
    nodes: Vec<FileNode>,
}

impl From<StoredGraph> for ProjectGraph {
    fn from(stored: StoredGraph) -> Self {
        Self::assemble(stored.meta, stored.nodes)
    }
}

impl ProjectGraph {
    /// Build the arena from a complete node set: sort nodes, derive edges from
    /// resolved imports, compute stats.
    ///
    /// Duplicate paths keep the last node. Self-imports and imports resolved to a
    /// path that is not in `nodes` do not become edges.
    #[must_use]
    pub fn assemble(meta: GraphMeta, nodes: Vec<FileNode>) -> Self {
        let mut by_path: BTreeMap<String, FileNode> = BTreeMap::new();
        for n in nodes {
            by_path.insert(n.path.clone(), n);
        }
        let nodes: Vec<FileNode> = by_path.into_values().collect();
        let index: HashMap<&str, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.path.as_str(), i)).collect();

        let mut edges: Vec<Edge> = Vec::new();
        for (from, n) in nodes.iter().enumerate() {
            for imp in &n.imports {
                let Some(&to) = imp.resolution.target().and_then(|t| index.get(t)) else {
                    continue;
                };
                if to != from {
                    edges.push(Edge { from, to });
                }
            }
        }
        edges.sort_unstable();
        edges.dedup();

        let stats = GraphStats::compute(&nodes, &edges);
        Self { meta, nodes, edges, stats }
    }

    #[must_use]
    pub fn id(&self) -> &GraphId {
        &self.meta.graph_id
    }

    #[must_use]
    pub fn nodes(&self) -> &[FileNode] {
        &self.nodes
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[must_use]
    pub fn stats(&self) -> &GraphStats {
        &self.stats
    }

    #[must_use]
    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.nodes.binary_search_by(|n| n.path.as_str().cmp(path)).ok()
    }

    #[must_use]
    pub fn node(&self, path: &str) -> Option<&FileNode> {
        self.index_of(path).map(|i| &self.nodes[i])
    }

    #[must_use]
    pub fn degree(&self, idx: usize) -> Degree {
        self.stats.degrees.get(idx).copied().unwrap_or_default()
    }

    /// Edges as `(from_path, to_path)`.
    pub fn edge_paths(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.edges.iter().map(|e| (self.nodes[e.from].path.as_str(), self.nodes[e.to].path.as_str()))
    }

    /// Indices of files `idx` imports, in path order.
    #[must_use]
    pub fn dependencies(&self, idx: usize) -> Vec<usize> {
        self.edges.iter().filter(|e| e.from == idx).map(|e| e.to).collect()
    }

    /// Indices of files importing `idx`, in path order.
    #[must_use]
    pub fn dependents(&self, idx: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self.edges.iter().filter(|e| e.to == idx).map(|e| e.from).collect();
        out.sort_unstable();
        out
    }

    /// Outgoing and incoming adjacency lists for every node, built in one pass.
    #[must_use]
    pub fn adjacency(&self) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
        let mut out_adj = vec![Vec::new(); self.nodes.len()];
        let mut in_adj = vec![Vec::new(); self.nodes.len()];
        for e in &self.edges {
            out_adj[e.from].push(e.to);
            in_adj[e.to].push(e.from);
        }
        (out_adj, in_adj)
    }

    #[must_use]
    pub fn known_paths(&self) -> HashSet<String> {
        self.nodes.iter().map(|n| n.path.clone()).collect()
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.meta.is_expired(now)
    }

    #[must_use]
    pub fn summary(&self, is_current: bool) -> GraphSummary {
        GraphSummary {
            graph_id: self.meta.graph_id.clone(),
            project_name: self.meta.project_name.clone(),
            branch: self.meta.branch.clone(),
            persistent_project_id: self.meta.persistent_project_id,
            node_count: self.stats.node_count,
            edge_count: self.stats.edge_count,
            analyzed_at: self.meta.analyzed_at,
            expires_at: self.meta.expires_at,
            is_current,
        }
    }
}
