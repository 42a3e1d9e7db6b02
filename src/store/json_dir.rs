use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::GraphBackend;
use crate::errors::{GraphError, Result};
use crate::graph::{GraphId, ProjectGraph};

/// One pretty-printed JSON document per graph under a directory.
///
/// Files are replaced through a temp file in the same directory followed by a
/// rename, so a concurrent reader sees either the old or the new document.
#[derive(Debug, Clone)]
pub struct JsonDirBackend {
    dir: PathBuf,
}

impl JsonDirBackend {
    /// # Errors
    /// Fails when the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `None` for ids that are not safe file stems; such graphs cannot exist here.
    fn path_for(&self, id: &GraphId) -> Option<PathBuf> {
        let ok = !id.0.is_empty()
            && id.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        ok.then(|| self.dir.join(format!("{}.json", id.0)))
    }

    fn load(path: &Path) -> Result<ProjectGraph> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

impl GraphBackend for JsonDirBackend {
    fn read(&self, id: &GraphId) -> Result<Option<Arc<ProjectGraph>>> {
        let Some(path) = self.path_for(id) else {
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(Arc::new(Self::load(&path)?)))
    }

    fn write(&self, graph: Arc<ProjectGraph>) -> Result<()> {
        let path = self
            .path_for(graph.id())
            .ok_or_else(|| GraphError::Config(format!("graph id {} is not storable", graph.id())))?;
        let data = serde_json::to_vec_pretty(graph.as_ref())?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&data)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, id: &GraphId) -> Result<bool> {
        let Some(path) = self.path_for(id) else {
            return Ok(false);
        };
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn scan(&self) -> Result<Vec<Arc<ProjectGraph>>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::load(&path) {
                Ok(g) => out.push(Arc::new(g)),
                Err(e) => log::warn!("skipping unreadable graph file {}: {e}", path.display()),
            }
        }
        Ok(out)
    }
}
