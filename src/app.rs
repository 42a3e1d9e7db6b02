use clap::CommandFactory;
use clap_complete::generate;
use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::path::Path;

use crate::cli::{Cli, Commands, DiagramTypeArg, MetricArg, OutputFormat, RankDirArg, ThemeArg};
use crate::engine::{AnalyzeRequest, GraphEngine};
use crate::errors::{GraphError, Result};
use crate::graph::refresh::RefreshRequest;
use crate::graph::{GraphId, GraphSummary, ProjectGraph};
use crate::query::CentralityMetric;
use crate::utils::config::{load_config_at, load_config_near, EngineConfig};
use crate::utils::file_walker::{collect_sources, read_files};
use crate::utils::table;
use crate::visualization::{DiagramRequest, DiagramType, DotTheme, RankDir};

/// Run the CLI logic in-process.
///
/// Returns an exit code: 0 on success, 1 on an engine error, 2 on a usage error.
#[must_use]
pub fn run_cli(cli: Cli) -> i32 {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let bin_name = env!("CARGO_PKG_NAME");
        generate(shell, &mut cmd, bin_name, &mut io::stdout());
        return 0;
    }
    let engine = match open_engine(&cli) {
        Ok(e) => e,
        Err(e) => return report(&e),
    };
    match dispatch(&engine, cli) {
        Ok(code) => code,
        Err(e) => report(&e),
    }
}

fn report(e: &GraphError) -> i32 {
    eprintln!("error[{}]: {e}", e.code());
    1
}

fn open_engine(cli: &Cli) -> Result<GraphEngine> {
    let file = match &cli.config {
        Some(p) => Some(load_config_at(p)?),
        None => load_config_near(Path::new("."))?,
    };
    let mut config = EngineConfig::from_file(file.unwrap_or_default())?;
    if let Some(dir) = &cli.store {
        config.store_dir.clone_from(dir);
    }
    log::debug!("using store at {}", config.store_dir.display());
    GraphEngine::open_dir(config)
}

fn emit_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn summary_rows(rows: &[GraphSummary]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|s| {
            vec![
                s.graph_id.to_string(),
                s.project_name.clone(),
                s.branch.clone().unwrap_or_default(),
                s.persistent_project_id.map(|p| p.to_string()).unwrap_or_default(),
                s.node_count.to_string(),
                s.edge_count.to_string(),
                s.analyzed_at.format("%Y-%m-%d %H:%M").to_string(),
                s.expires_at.format("%Y-%m-%d %H:%M").to_string(),
                if s.is_current { "yes".into() } else { "no".into() },
            ]
        })
        .collect()
}

const SUMMARY_HEADERS: [&str; 9] =
    ["Graph", "Project", "Branch", "Project Id", "Files", "Edges", "Analyzed", "Expires", "Current"];

fn print_graph(engine: &GraphEngine, owner: &str, graph: &ProjectGraph, nodes: bool, format: OutputFormat) -> Result<()> {
    let is_current = engine.list(owner)?.iter().any(|s| s.graph_id == graph.meta.graph_id && s.is_current);
    let summary = graph.summary(is_current);
    if format == OutputFormat::Json {
        return if nodes {
            emit_json(graph)
        } else {
            emit_json(&serde_json::json!({ "summary": summary, "stats": graph.stats() }))
        };
    }

    println!("{}", table::render(&SUMMARY_HEADERS, &summary_rows(std::slice::from_ref(&summary))));
    let stats = graph.stats();
    if let Some(hub) = &stats.most_depended_on {
        println!("Most depended on: {} ({} dependents)", hub.path, hub.dependents);
    }
    let langs: Vec<String> = stats.languages.iter().map(|(l, n)| format!("{l}={n}")).collect();
    println!("Languages: {}", langs.join(", "));
    println!(
        "Imports: {} external, {} unresolved; {} bytes analyzed",
        stats.external_import_count, stats.unresolved_import_count, stats.total_bytes
    );
    if !stats.top_external.is_empty() {
        let ext: Vec<String> = stats.top_external.iter().map(|(s, n)| format!("{s} ({n})")).collect();
        println!("Top external: {}", ext.join(", "));
    }
    if nodes {
        let rows: Vec<Vec<String>> = graph
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let d = graph.degree(i);
                vec![
                    n.path.clone(),
                    n.language.to_string(),
                    d.fan_in.to_string(),
                    d.fan_out.to_string(),
                    n.exports.join(", "),
                ]
            })
            .collect();
        println!("{}", table::render(&["Path", "Language", "In", "Out", "Exports"], &rows));
    }
    Ok(())
}

fn project_name_for(path: &Path) -> String {
    path.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "project".to_string())
}

#[allow(clippy::too_many_lines)]
fn dispatch(engine: &GraphEngine, cli: Cli) -> Result<i32> {
    let owner = cli.owner.as_str();
    let format = cli.format;
    match cli.command {
        Commands::Completions { .. } => Ok(0),
        Commands::Analyze { path, name, branch, project_id, no_ignore } => {
            if !path.is_dir() {
                eprintln!("Not a directory: {}", path.display());
                return Ok(2);
            }
            let files = collect_sources(&path, no_ignore)?;
            let request = AnalyzeRequest {
                project_name: name.unwrap_or_else(|| project_name_for(&path)),
                files: Some(files),
                branch,
                project_path: Some(path.display().to_string()),
                persistent_project_id: project_id,
            };
            let graph = engine.analyze(owner, request)?;
            if format == OutputFormat::Json {
                emit_json(&graph.summary(true))?;
            } else if cli.quiet {
                println!("{}", graph.id());
            } else {
                println!(
                    "Graph {} created: {} files, {} edges",
                    graph.id(),
                    graph.stats().node_count,
                    graph.stats().edge_count
                );
            }
            Ok(0)
        }
        Commands::List => {
            let rows = engine.list(owner)?;
            if format == OutputFormat::Json {
                emit_json(&rows)?;
            } else {
                println!("{}", table::render(&SUMMARY_HEADERS, &summary_rows(&rows)));
            }
            Ok(0)
        }
        Commands::Show { id, nodes } => {
            let graph = engine.get(owner, &GraphId(id))?;
            print_graph(engine, owner, &graph, nodes, format)?;
            Ok(0)
        }
        Commands::Project { project_id } => {
            let graph = engine.get_by_project(owner, &project_id)?;
            print_graph(engine, owner, &graph, false, format)?;
            Ok(0)
        }
        Commands::Context { id, file } => {
            let ctx = engine
                .file_context(owner, &GraphId(id), &file)?
                .ok_or_else(|| GraphError::ContextNotFound(file.clone()))?;
            if format == OutputFormat::Json {
                emit_json(&ctx)?;
            } else {
                println!("{}", ctx.context_string);
                for (title, list) in [("Dependents", &ctx.dependents), ("Dependencies", &ctx.dependencies)] {
                    if list.is_empty() {
                        continue;
                    }
                    let rows: Vec<Vec<String>> = list
                        .iter()
                        .enumerate()
                        .map(|(i, n)| vec![format!("{}", i + 1), n.path.clone()])
                        .collect();
                    println!("{title}:\n{}", table::render(&["#", "Path"], &rows));
                }
            }
            Ok(0)
        }
        Commands::Diagram { id, diagram_type, focus, max_nodes, theme, rankdir, output } => {
            let request = DiagramRequest {
                diagram_type: match diagram_type {
                    DiagramTypeArg::Flowchart => DiagramType::Flowchart,
                    DiagramTypeArg::Dot => DiagramType::Dot,
                },
                focus_file: focus,
                max_nodes,
                theme: match theme {
                    ThemeArg::Light => DotTheme::Light,
                    ThemeArg::Dark => DotTheme::Dark,
                },
                rankdir: match rankdir {
                    RankDirArg::Lr => RankDir::LR,
                    RankDirArg::Tb => RankDir::TB,
                },
            };
            let diagram = engine.diagram(owner, &GraphId(id), &request)?.ok_or(GraphError::GraphNotFound)?;
            if let Some(out) = output {
                std::fs::write(&out, &diagram)?;
                if !cli.quiet {
                    println!("Diagram written to {}", out.display());
                }
            } else if format == OutputFormat::Json {
                emit_json(&serde_json::json!({ "type": request.diagram_type, "diagram": diagram }))?;
            } else {
                print!("{diagram}");
            }
            Ok(0)
        }
        Commands::Refresh { id, path, files, removed, no_ignore } => {
            let id = GraphId(id);
            let request = if files.is_empty() && removed.is_empty() {
                // Full resync: every file on disk is changed, every vanished node removed
                let previous = engine.get(owner, &id)?;
                let scanned = collect_sources(&path, no_ignore)?;
                let present: HashSet<&str> = scanned.iter().filter_map(|f| f.path.as_deref()).collect();
                let gone: Vec<String> = previous
                    .nodes()
                    .iter()
                    .filter(|n| !present.contains(n.path.as_str()))
                    .map(|n| n.path.clone())
                    .collect();
                RefreshRequest { files: Some(scanned), removed: gone }
            } else {
                let (found, gone) = read_files(&path, &files)?;
                let mut removed = removed;
                removed.extend(gone);
                RefreshRequest { files: Some(found), removed }
            };
            let outcome = engine.refresh(owner, &id, &request)?;
            if format == OutputFormat::Json {
                emit_json(&serde_json::json!({
                    "summary": outcome.graph.summary(true),
                    "report": outcome.report,
                }))?;
            } else if !cli.quiet {
                println!(
                    "Graph {id} refreshed: {} added, {} updated, {} removed; {} files, {} edges",
                    outcome.report.added.len(),
                    outcome.report.updated.len(),
                    outcome.report.removed.len(),
                    outcome.graph.stats().node_count,
                    outcome.graph.stats().edge_count
                );
            }
            Ok(0)
        }
        Commands::Delete { id } => {
            let id = GraphId(id);
            engine.delete(owner, &id)?;
            if format == OutputFormat::Json {
                emit_json(&serde_json::json!({ "deleted": id }))?;
            } else if !cli.quiet {
                println!("Deleted graph {id}");
            }
            Ok(0)
        }
        Commands::Hubs { id, metric, top } => {
            let metric = match metric {
                MetricArg::In => CentralityMetric::In,
                MetricArg::Out => CentralityMetric::Out,
                MetricArg::Total => CentralityMetric::Total,
            };
            let rows = engine.hubs(owner, &GraphId(id), metric, top)?;
            if format == OutputFormat::Json {
                emit_json(&rows)?;
            } else {
                let body: Vec<Vec<String>> = rows
                    .into_iter()
                    .map(|r| {
                        vec![r.path, r.fan_in.to_string(), r.fan_out.to_string(), (r.fan_in + r.fan_out).to_string()]
                    })
                    .collect();
                println!("{}", table::render(&["Path", "In", "Out", "Total"], &body));
            }
            Ok(0)
        }
        Commands::Path { id, from, to } => {
            let chain = engine.import_path(owner, &GraphId(id), &from, &to)?;
            if format == OutputFormat::Json {
                emit_json(&chain)?;
            } else if chain.is_empty() {
                println!("<no path>");
            } else {
                let rows: Vec<Vec<String>> =
                    chain.into_iter().enumerate().map(|(i, p)| vec![format!("{}", i + 1), p]).collect();
                println!("{}", table::render(&["Step", "Path"], &rows));
            }
            Ok(0)
        }
        Commands::Purge => {
            let n = engine.purge_expired()?;
            if format == OutputFormat::Json {
                emit_json(&serde_json::json!({ "purged": n }))?;
            } else if !cli.quiet {
                println!("Purged {n} graph(s)");
            }
            Ok(0)
        }
    }
}
