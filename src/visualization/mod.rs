//! Bounded diagram extraction.
//!
//! A diagram never shows more than `max_nodes` files. With a focus file the
//! selection grows outward from it, one hop of dependencies then one hop of
//! dependents per round; without one the highest fan-in files are shown.
//! Edges are kept only when both endpoints were selected.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::errors::{GraphError, Result};
use crate::graph::builder::normalize_input_path;
use crate::graph::ProjectGraph;
use crate::parser::Language;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramType {
    /// Mermaid `flowchart LR`.
    #[default]
    Flowchart,
    /// Graphviz digraph.
    Dot,
}

impl FromStr for DiagramType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "flowchart" | "mermaid" => Ok(Self::Flowchart),
            "dot" | "graphviz" => Ok(Self::Dot),
            other => Err(GraphError::DiagramFailed(format!("unknown diagram type {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramRequest {
    #[serde(default, rename = "type")]
    pub diagram_type: DiagramType,
    #[serde(default)]
    pub focus_file: Option<String>,
    #[serde(default)]
    pub max_nodes: Option<usize>,
    /// DOT only.
    #[serde(default)]
    pub theme: DotTheme,
    /// DOT only.
    #[serde(default)]
    pub rankdir: RankDir,
}

/// Node budget bounds taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagramLimits {
    pub default_nodes: usize,
    pub max_nodes: usize,
}

impl Default for DiagramLimits {
    fn default() -> Self {
        Self { default_nodes: 30, max_nodes: 200 }
    }
}

impl DiagramLimits {
    /// # Errors
    /// `DiagramFailed` for a zero budget.
    pub fn budget(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            Some(0) => Err(GraphError::DiagramFailed("maxNodes must be at least 1".into())),
            Some(n) => Ok(n.min(self.max_nodes)),
            None => Ok(self.default_nodes.min(self.max_nodes)),
        }
    }
}

/// Selected node indices plus the highlighted focus, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subgraph {
    /// Ascending, so output follows path order.
    pub nodes: Vec<usize>,
    pub focus: Option<usize>,
}

impl Subgraph {
    /// Retained edges as positions into `self.nodes`.
    fn edges(&self, graph: &ProjectGraph) -> Vec<(usize, usize)> {
        graph
            .edges()
            .iter()
            .filter_map(|e| {
                let from = self.nodes.binary_search(&e.from).ok()?;
                let to = self.nodes.binary_search(&e.to).ok()?;
                Some((from, to))
            })
            .collect()
    }
}

/// Fan-in descending, then path ascending.
fn rank(graph: &ProjectGraph, candidates: &mut [usize]) {
    candidates.sort_by(|&a, &b| {
        graph
            .degree(b)
            .fan_in
            .cmp(&graph.degree(a).fan_in)
            .then_with(|| graph.nodes()[a].path.cmp(&graph.nodes()[b].path))
    });
}

/// Pick at most `max_nodes` files.
///
/// # Errors
/// `DiagramFailed` when `focus` names a file that is not in the graph.
pub fn select(graph: &ProjectGraph, focus: Option<&str>, max_nodes: usize) -> Result<Subgraph> {
    let n = graph.nodes().len();
    let focus = match focus.map(str::trim).filter(|f| !f.is_empty()) {
        Some(path) => Some(
            normalize_input_path(path)
                .and_then(|p| graph.index_of(&p))
                .ok_or_else(|| GraphError::DiagramFailed(format!("focus file {path} is not in the graph")))?,
        ),
        None => None,
    };

    let mut chosen: Vec<usize> = Vec::with_capacity(max_nodes.min(n));
    if let Some(start) = focus {
        let (out_adj, in_adj) = graph.adjacency();
        let mut seen: HashSet<usize> = HashSet::from([start]);
        chosen.push(start);
        let mut frontier = vec![start];
        while !frontier.is_empty() && chosen.len() < max_nodes {
            let mut next = Vec::new();
            for adj in [&out_adj, &in_adj] {
                let mut hop: Vec<usize> =
                    frontier.iter().flat_map(|&u| adj[u].iter().copied()).filter(|v| !seen.contains(v)).collect();
                hop.sort_unstable();
                hop.dedup();
                rank(graph, &mut hop);
                for v in hop {
                    if chosen.len() >= max_nodes {
                        break;
                    }
                    seen.insert(v);
                    chosen.push(v);
                    next.push(v);
                }
            }
            frontier = next;
        }
    } else {
        let mut all: Vec<usize> = (0..n).collect();
        rank(graph, &mut all);
        all.truncate(max_nodes);
        chosen = all;
    }

    chosen.sort_unstable();
    Ok(Subgraph { nodes: chosen, focus })
}

/// Validate the request, select the subgraph and render it.
///
/// # Errors
/// `DiagramFailed` for a zero budget or an unknown focus file.
pub fn render(graph: &ProjectGraph, request: &DiagramRequest, limits: DiagramLimits) -> Result<String> {
    let budget = limits.budget(request.max_nodes)?;
    let sub = select(graph, request.focus_file.as_deref(), budget)?;
    Ok(match request.diagram_type {
        DiagramType::Flowchart => render_flowchart(graph, &sub),
        DiagramType::Dot => DotGenerator::new().generate(
            graph,
            &sub,
            DotOptions { theme: request.theme, rankdir: request.rankdir },
        ),
    })
}

fn mermaid_label(s: &str) -> String {
    s.replace('"', "#quot;")
}

#[must_use]
pub fn render_flowchart(graph: &ProjectGraph, sub: &Subgraph) -> String {
    let mut s = String::from("flowchart LR\n");
    for (pos, &idx) in sub.nodes.iter().enumerate() {
        let _ = writeln!(s, "    n{pos}[\"{}\"]", mermaid_label(&graph.nodes()[idx].path));
    }
    for (from, to) in sub.edges(graph) {
        let _ = writeln!(s, "    n{from} --> n{to}");
    }
    if let Some(pos) = sub.focus.and_then(|f| sub.nodes.binary_search(&f).ok()) {
        s.push_str("    classDef focus fill:#ffe08a,stroke:#b8860b,stroke-width:2px\n");
        let _ = writeln!(s, "    class n{pos} focus");
    }
    s
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DotTheme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankDir {
    #[default]
    LR,
    TB,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DotOptions {
    pub theme: DotTheme,
    pub rankdir: RankDir,
}

#[derive(Debug, Default)]
pub struct DotGenerator;

impl DotGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {}
    }

    #[must_use]
    pub fn generate(&self, graph: &ProjectGraph, sub: &Subgraph, opts: DotOptions) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "digraph {} {{", sanitize_id(&graph.meta.project_name));
        let rank = match opts.rankdir {
            RankDir::LR => "LR",
            RankDir::TB => "TB",
        };
        let _ = write!(
            s,
            "  rankdir={rank};\n  graph [fontname=Helvetica];\n  node [shape=box, fontsize=10, style=\"filled,rounded\"];\n  edge [fontname=Helvetica, fontsize=9];\n"
        );
        for (pos, &idx) in sub.nodes.iter().enumerate() {
            let node = &graph.nodes()[idx];
            let fill = fill_for_language(node.language, opts.theme);
            let pen = if sub.focus == Some(idx) { ", penwidth=2.5" } else { "" };
            let _ = writeln!(
                s,
                "  n{pos} [label=\"{}\", fillcolor=\"{fill}\", tooltip=\"{}\"{pen}];",
                escape_label(&node.path),
                node.language
            );
        }
        for (from, to) in sub.edges(graph) {
            let _ = writeln!(s, "  n{from} -> n{to};");
        }
        s.push_str("}\n");
        s
    }
}

fn sanitize_id(s: &str) -> String {
    let id: String = s
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => c,
            _ => '_',
        })
        .collect();
    if id.is_empty() || id.starts_with(|c: char| c.is_ascii_digit()) {
        format!("g_{id}")
    } else {
        id
    }
}

fn escape_label(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn fill_for_language(lang: Language, theme: DotTheme) -> &'static str {
    match (theme, lang) {
        (DotTheme::Light, Language::JavaScript) => "#fff7d6",
        (DotTheme::Light, Language::TypeScript) => "#e0f3ff",
        (DotTheme::Light, Language::Python) => "#e8ffe0",
        (DotTheme::Light, Language::Rust) => "#ffe9e0",
        (DotTheme::Light, Language::Go) => "#e0fffb",
        (DotTheme::Light, Language::Java) => "#f0e0ff",
        (DotTheme::Light, Language::Css) => "#ffe0f0",
        (DotTheme::Light, Language::Unknown) => "#f2f2f2",

        (DotTheme::Dark, Language::JavaScript) => "#6b5a00",
        (DotTheme::Dark, Language::TypeScript) => "#124559",
        (DotTheme::Dark, Language::Python) => "#0b6e4f",
        (DotTheme::Dark, Language::Rust) => "#7a3300",
        (DotTheme::Dark, Language::Go) => "#004f4f",
        (DotTheme::Dark, Language::Java) => "#3c2a5a",
        (DotTheme::Dark, Language::Css) => "#6a1e44",
        (DotTheme::Dark, Language::Unknown) => "#3a3a3a",
    }
}
