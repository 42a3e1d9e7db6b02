pub mod table {
    fn sep(widths: &[usize]) -> String {
        let mut s = String::from("+");
        for w in widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    }

    /// Pads by char count, not bytes.
    fn line(cells: &[String], widths: &[usize]) -> String {
        let mut s = String::from("|");
        for (cell, &w) in cells.iter().zip(widths) {
            let len = cell.chars().count();
            s.push(' ');
            s.push_str(cell);
            s.push_str(&" ".repeat(w.saturating_sub(len)));
            s.push_str(" |");
        }
        s
    }

    /// Boxed table; rows shorter than `headers` get empty cells, extra cells are dropped.
    #[must_use]
    pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
        let cols = headers.len();
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (c, w) in widths.iter_mut().enumerate().take(cols) {
                *w = (*w).max(row.get(c).map_or(0, |s| s.chars().count()));
            }
        }

        let mut out = String::new();
        out.push_str(&sep(&widths));
        out.push('\n');
        let header_cells: Vec<String> = headers.iter().map(|s| (*s).to_string()).collect();
        out.push_str(&line(&header_cells, &widths));
        out.push('\n');
        out.push_str(&sep(&widths));
        out.push('\n');
        for row in rows {
            let cells: Vec<String> = (0..cols).map(|i| row.get(i).cloned().unwrap_or_default()).collect();
            out.push_str(&line(&cells, &widths));
            out.push('\n');
        }
        out.push_str(&sep(&widths));
        out
    }
}

pub mod config {
    //! `project-graph.toml`: an all-optional file schema resolved into a
    //! fully-defaulted [`EngineConfig`].
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use crate::errors::{GraphError, Result};
    use crate::graph::resolver::ResolverOptions;
    use crate::visualization::DiagramLimits;

    pub const CONFIG_FILE_NAME: &str = "project-graph.toml";
    pub const DEFAULT_STORE_DIR: &str = ".project-graph";

    #[derive(Debug, Clone, Deserialize, Default)]
    #[serde(deny_unknown_fields)]
    pub struct LimitsConfig {
        pub max_files: Option<usize>,
        pub analysis_timeout_secs: Option<u64>,
        pub default_diagram_nodes: Option<usize>,
        pub max_diagram_nodes: Option<usize>,
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    #[serde(deny_unknown_fields)]
    pub struct StoreConfig {
        pub ttl_hours: Option<i64>,
        pub superseded_grace_hours: Option<i64>,
        pub dir: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    #[serde(deny_unknown_fields)]
    pub struct ResolverConfig {
        pub aliases: Option<BTreeMap<String, String>>,
        pub extensions: Option<Vec<String>>,
        pub index_files: Option<Vec<String>>,
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    #[serde(deny_unknown_fields)]
    pub struct PoolConfig {
        pub workers: Option<usize>,
    }

    #[derive(Debug, Clone, Deserialize, Default)]
    #[serde(deny_unknown_fields)]
    pub struct FileConfig {
        pub limits: Option<LimitsConfig>,
        pub store: Option<StoreConfig>,
        pub resolver: Option<ResolverConfig>,
        pub pool: Option<PoolConfig>,
    }

    /// # Errors
    /// `Config` when the file cannot be read or is not valid TOML for the schema.
    pub fn load_config_at(path: &Path) -> Result<FileConfig> {
        let data = fs::read_to_string(path)
            .map_err(|e| GraphError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str::<FileConfig>(&data)
            .map_err(|e| GraphError::Config(format!("{}: {e}", path.display())))
    }

    /// Look for `project-graph.toml` in `dir`.
    ///
    /// # Errors
    /// Same as [`load_config_at`] when the file exists.
    pub fn load_config_near(dir: &Path) -> Result<Option<FileConfig>> {
        let p = dir.join(CONFIG_FILE_NAME);
        if p.is_file() {
            load_config_at(&p).map(Some)
        } else {
            Ok(None)
        }
    }

    #[derive(Debug, Clone)]
    pub struct EngineConfig {
        /// Per-request file cap, also the node cap after a refresh.
        pub max_files: usize,
        pub analysis_timeout: Duration,
        pub diagram: DiagramLimits,
        pub ttl: chrono::Duration,
        pub superseded_grace: chrono::Duration,
        pub store_dir: PathBuf,
        pub resolver: ResolverOptions,
        /// `None` lets rayon size the pool from available parallelism.
        pub workers: Option<usize>,
    }

    impl Default for EngineConfig {
        fn default() -> Self {
            Self {
                max_files: 500,
                analysis_timeout: Duration::from_secs(120),
                diagram: DiagramLimits::default(),
                ttl: chrono::Duration::hours(168),
                superseded_grace: chrono::Duration::hours(24),
                store_dir: PathBuf::from(DEFAULT_STORE_DIR),
                resolver: ResolverOptions::default(),
                workers: None,
            }
        }
    }

    fn positive<T: PartialOrd + Default + Copy>(name: &str, v: Option<T>, fallback: T) -> Result<T> {
        match v {
            Some(x) if x <= T::default() => Err(GraphError::Config(format!("{name} must be positive"))),
            Some(x) => Ok(x),
            None => Ok(fallback),
        }
    }

    impl EngineConfig {
        /// Overlay `file` on the defaults.
        ///
        /// # Errors
        /// `Config` for zero or negative limits, TTLs or worker counts.
        pub fn from_file(file: FileConfig) -> Result<Self> {
            let d = Self::default();
            let limits = file.limits.unwrap_or_default();
            let store = file.store.unwrap_or_default();
            let resolver = file.resolver.unwrap_or_default();
            let pool = file.pool.unwrap_or_default();

            let max_files = positive("limits.max_files", limits.max_files, d.max_files)?;
            let timeout = positive(
                "limits.analysis_timeout_secs",
                limits.analysis_timeout_secs,
                d.analysis_timeout.as_secs(),
            )?;
            let max_nodes =
                positive("limits.max_diagram_nodes", limits.max_diagram_nodes, d.diagram.max_nodes)?;
            let default_nodes = positive(
                "limits.default_diagram_nodes",
                limits.default_diagram_nodes,
                d.diagram.default_nodes,
            )?;
            let ttl = positive("store.ttl_hours", store.ttl_hours, d.ttl.num_hours())?;
            let grace = match store.superseded_grace_hours {
                Some(h) if h < 0 => {
                    return Err(GraphError::Config("store.superseded_grace_hours must not be negative".into()))
                }
                Some(h) => h,
                None => d.superseded_grace.num_hours(),
            };
            let workers = match pool.workers {
                Some(0) => return Err(GraphError::Config("pool.workers must be positive".into())),
                w => w,
            };

            let defaults = ResolverOptions::default();
            let resolver = ResolverOptions::new(
                resolver.aliases.map_or_else(|| defaults.aliases().to_vec(), |m| m.into_iter().collect()),
                resolver.extensions.unwrap_or_else(|| defaults.extensions.clone()),
                resolver.index_files.unwrap_or_else(|| defaults.index_files.clone()),
            );

            Ok(Self {
                max_files,
                analysis_timeout: Duration::from_secs(timeout),
                diagram: DiagramLimits { default_nodes: default_nodes.min(max_nodes), max_nodes },
                ttl: chrono::Duration::hours(ttl),
                superseded_grace: chrono::Duration::hours(grace),
                store_dir: store.dir.map_or(d.store_dir, PathBuf::from),
                resolver,
                workers,
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn empty_file_gives_defaults() {
            let cfg = EngineConfig::from_file(FileConfig::default()).unwrap();
            assert_eq!(cfg.max_files, 500);
            assert_eq!(cfg.ttl, chrono::Duration::days(7));
            assert_eq!(cfg.diagram.default_nodes, 30);
            assert_eq!(cfg.resolver, ResolverOptions::default());
        }

        #[test]
        fn toml_overrides_apply() {
            let file: FileConfig = toml::from_str(
                r##"
                [limits]
                max_files = 50
                default_diagram_nodes = 80
                max_diagram_nodes = 40
                [store]
                ttl_hours = 2
                dir = "/tmp/graphs"
                [resolver]
                extensions = ["ts", ".js"]
                [resolver.aliases]
                "#/" = "lib/"
                [pool]
                workers = 2
                "##,
            )
            .unwrap();
            let cfg = EngineConfig::from_file(file).unwrap();
            assert_eq!(cfg.max_files, 50);
            assert_eq!(cfg.diagram.default_nodes, 40);
            assert_eq!(cfg.ttl, chrono::Duration::hours(2));
            assert_eq!(cfg.store_dir, PathBuf::from("/tmp/graphs"));
            assert_eq!(cfg.resolver.extensions, vec!["ts", "js"]);
            assert_eq!(cfg.resolver.aliases(), &[("#/".to_string(), "lib/".to_string())]);
            assert_eq!(cfg.workers, Some(2));
        }

        #[test]
        fn zero_values_are_rejected() {
            for snippet in ["[limits]\nmax_files = 0", "[store]\nttl_hours = 0", "[pool]\nworkers = 0"] {
                let file: FileConfig = toml::from_str(snippet).unwrap();
                let err = EngineConfig::from_file(file).unwrap_err();
                assert_eq!(err.code(), "CONFIG_ERROR", "{snippet}");
            }
        }

        #[test]
        fn unknown_keys_are_rejected() {
            assert!(toml::from_str::<FileConfig>("[limits]\nmax_filez = 3").is_err());
        }
    }
}

pub mod file_walker {
    use std::path::Path;

    use crate::errors::Result;
    use crate::graph::builder::FileInput;
    use crate::parser::Language;

    /// Project-relative, forward-slash form of `path` under `root`.
    fn relative(root: &Path, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(root).ok()?;
        let parts: Vec<&str> = rel.components().map(|c| c.as_os_str().to_str()).collect::<Option<_>>()?;
        Some(parts.join("/"))
    }

    fn read_utf8(path: &Path) -> Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                log::debug!("skipping non-UTF-8 file {}", path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Discover source files of known languages under `root`, honouring
    /// `.gitignore`/`.ignore` unless `no_ignore` is set. Hidden entries are skipped.
    ///
    /// # Errors
    /// Read failures other than invalid UTF-8.
    pub fn collect_sources(root: &Path, no_ignore: bool) -> Result<Vec<FileInput>> {
        let mut walker = ignore::WalkBuilder::new(root);
        walker
            .follow_links(false)
            .git_ignore(!no_ignore)
            .git_global(false)
            .git_exclude(false)
            .ignore(!no_ignore)
            .require_git(false)
            .parents(true);
        let mut out = Vec::new();
        for entry in walker.build().flatten() {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Some(rel) = relative(root, path) else { continue };
            if Language::from_path(&rel) == Language::Unknown {
                continue;
            }
            if let Some(content) = read_utf8(path)? {
                out.push(FileInput::new(rel, content));
            }
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    /// Read the given project-relative files. Missing and non-UTF-8 files are
    /// reported back separately so callers can treat them as removals, the same
    /// way a full rescan drops them.
    ///
    /// # Errors
    /// Read failures other than a missing file or invalid UTF-8.
    pub fn read_files(root: &Path, paths: &[String]) -> Result<(Vec<FileInput>, Vec<String>)> {
        let mut found = Vec::new();
        let mut gone = Vec::new();
        for rel in paths {
            let full = root.join(rel);
            if !full.is_file() {
                gone.push(rel.clone());
                continue;
            }
            match read_utf8(&full)? {
                Some(content) => found.push(FileInput::new(rel.as_str(), content)),
                None => {
                    log::warn!("{rel} is not valid UTF-8; treating it as removed");
                    gone.push(rel.clone());
                }
            }
        }
        Ok((found, gone))
    }
}

#[cfg(test)]
mod tests {
    use super::file_walker::{collect_sources, read_files};
    use super::table::render;

    #[test]
    fn table_pads_to_widest_cell() {
        let t = render(&["Path", "In"], &[vec!["src/a.js".into(), "3".into()]]);
        let lines: Vec<&str> = t.lines().collect();
        assert_eq!(lines[0], "+----------+----+");
        assert_eq!(lines[1], "| Path     | In |");
        assert_eq!(lines[3], "| src/a.js | 3  |");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn table_fills_short_rows_and_counts_chars() {
        let t = render(&["Path", "In"], &[vec!["src/é.js".into()], vec!["a".into(), "1".into(), "x".into()]]);
        let lines: Vec<&str> = t.lines().collect();
        assert_eq!(lines[3], "| src/é.js |    |");
        assert_eq!(lines[4], "| a        | 1  |");
        assert!(lines.iter().all(|l| l.chars().count() == lines[0].chars().count()));
    }

    #[test]
    fn walker_respects_gitignore_and_languages() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("build")).unwrap();
        std::fs::write(root.join(".gitignore"), "build/\n").unwrap();
        std::fs::write(root.join("src/a.ts"), "export const a = 1;").unwrap();
        std::fs::write(root.join("README.md"), "# hi").unwrap();
        std::fs::write(root.join("build/out.js"), "x").unwrap();
        std::fs::write(root.join("bin.js"), [0xff_u8, 0xfe, 0x00]).unwrap();

        let files = collect_sources(root, false).unwrap();
        let paths: Vec<&str> = files.iter().filter_map(|f| f.path.as_deref()).collect();
        assert_eq!(paths, vec!["src/a.ts"]);

        let all = collect_sources(root, true).unwrap();
        assert!(all.iter().any(|f| f.path.as_deref() == Some("build/out.js")));
    }

    #[test]
    fn read_files_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "import os").unwrap();
        let (found, missing) = read_files(dir.path(), &["a.py".into(), "gone.py".into()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(missing, vec!["gone.py"]);
    }

    #[test]
    fn read_files_reports_non_utf8_as_gone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.js"), "export const x = 1;").unwrap();
        std::fs::write(dir.path().join("bin.js"), [0xff_u8, 0xfe, 0x00]).unwrap();
        let (found, gone) = read_files(dir.path(), &["bin.js".into(), "ok.js".into()]).unwrap();
        assert_eq!(found.iter().filter_map(|f| f.path.as_deref()).collect::<Vec<_>>(), vec!["ok.js"]);
        assert_eq!(gone, vec!["bin.js"]);
    }
}
