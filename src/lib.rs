//! project-graph: file-level dependency graphs for source trees.
//!
//! A batch of `(path, content)` files is analysed into a [`graph::ProjectGraph`]:
//! imports and exports are extracted per language, import specifiers are
//! resolved against the batch, and the resolved imports become directed edges.
//! Graphs are stored per owner with a time-to-live, can be refreshed
//! incrementally, and answer file-context and bounded-diagram queries.
//!
//! # Features
//! - Best-effort extraction for JavaScript/TypeScript, Python, Rust, Go, Java and CSS
//! - Deterministic resolution: exact path, then extensions, then index files
//! - Incremental refresh equal to a full re-analysis of the new file set
//! - Owner isolation and passive expiry in the store (memory or JSON directory)
//! - Mermaid flowchart and Graphviz DOT diagrams under a node budget
//!
//! # Quickstart (Library)
//! ```no_run
//! use project_graph::engine::{AnalyzeRequest, GraphEngine};
//! use project_graph::graph::builder::FileInput;
//! use project_graph::utils::config::EngineConfig;
//!
//! let engine = GraphEngine::in_memory(EngineConfig::default()).expect("engine");
//! let graph = engine
//!     .analyze(
//!         "alice",
//!         AnalyzeRequest {
//!             project_name: "demo".into(),
//!             files: Some(vec![
//!                 FileInput::new("a.js", "export function foo() {}"),
//!                 FileInput::new("b.js", "import { foo } from './a.js'"),
//!             ]),
//!             ..AnalyzeRequest::default()
//!         },
//!     )
//!     .expect("analyze");
//! let ctx = engine.file_context("alice", graph.id(), "a.js").expect("query");
//! println!("{}", ctx.map(|c| c.context_string).unwrap_or_default());
//! ```
//!
//! # Quickstart (CLI)
//! ```text
//! project-graph analyze --path . --project-id 7
//! project-graph context <graph-id> src/index.ts
//! project-graph diagram <graph-id> --focus src/index.ts --max-nodes 20
//! ```
pub mod app;
pub mod cli;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod parser;
pub mod query;
pub mod store;
pub mod utils;
pub mod visualization;
