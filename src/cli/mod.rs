use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiagramTypeArg {
    Flowchart,
    Dot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeArg {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RankDirArg {
    #[value(name = "LR", alias = "lr")]
    Lr,
    #[value(name = "TB", alias = "tb")]
    Tb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    In,
    Out,
    Total,
}

#[derive(Debug, Parser)]
#[command(
    name = "project-graph",
    version,
    about = "Project dependency-graph engine",
    long_about = "Analyze a source tree into a file-level import graph, store it with a TTL, refresh it incrementally and query it. Directory discovery respects .gitignore and .ignore. Graphs are scoped to an owner id and kept as JSON under the store directory."
)]
pub struct Cli {
    /// Owner id every graph operation is scoped to
    #[arg(long, global = true, env = "PROJECT_GRAPH_OWNER", default_value = "local")]
    pub owner: String,
    /// Store directory (overrides store.dir from the config file)
    #[arg(long, global = true, env = "PROJECT_GRAPH_STORE")]
    pub store: Option<PathBuf>,
    /// Path to a TOML configuration file (default: ./project-graph.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Output format: text or json
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze a source directory into a new graph
    Analyze {
        /// Project root to scan
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
        /// Branch label stored with the graph
        #[arg(long)]
        branch: Option<String>,
        /// Persistent project id; the new graph becomes its current graph
        #[arg(long)]
        project_id: Option<i64>,
        /// Include files even if matched by .gitignore/.ignore
        #[arg(long, default_value_t = false)]
        no_ignore: bool,
    },
    /// List live graphs of the owner
    List,
    /// Show one graph's summary and statistics
    Show {
        id: String,
        /// Also list every file node
        #[arg(long, default_value_t = false)]
        nodes: bool,
    },
    /// Show the current graph of a persistent project
    Project { project_id: String },
    /// Dependency context of one file
    Context { id: String, file: String },
    /// Render a bounded diagram
    Diagram {
        id: String,
        #[arg(long = "type", value_enum, default_value_t = DiagramTypeArg::Flowchart)]
        diagram_type: DiagramTypeArg,
        /// Grow the diagram outward from this file
        #[arg(long)]
        focus: Option<String>,
        /// Node budget (default from config)
        #[arg(long)]
        max_nodes: Option<usize>,
        /// DOT color theme
        #[arg(long, value_enum, default_value_t = ThemeArg::Light)]
        theme: ThemeArg,
        /// DOT layout direction
        #[arg(long, value_enum, default_value_t = RankDirArg::Lr)]
        rankdir: RankDirArg,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Re-analyze changed files of an existing graph
    ///
    /// Without --file/--removed the whole directory is rescanned and files
    /// missing from it are removed from the graph.
    Refresh {
        id: String,
        /// Project root the graph was analyzed from
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Changed file, relative to --path (repeatable); a missing or non-UTF-8 file counts as removed
        #[arg(long = "file")]
        files: Vec<String>,
        /// Removed file (repeatable)
        #[arg(long)]
        removed: Vec<String>,
        #[arg(long, default_value_t = false)]
        no_ignore: bool,
    },
    /// Delete a graph
    Delete { id: String },
    /// List top-N hub files by degree centrality
    Hubs {
        id: String,
        #[arg(long, value_enum, default_value_t = MetricArg::In)]
        metric: MetricArg,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Shortest import chain between two files
    Path {
        id: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Remove expired and long-superseded graphs from the store
    Purge,
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
