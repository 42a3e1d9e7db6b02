use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::GraphBackend;
use crate::errors::Result;
use crate::graph::{GraphId, ProjectGraph};

/// Process-local backend. Writes swap the `Arc` under a short write lock.
#[derive(Default)]
pub struct MemoryBackend {
    graphs: RwLock<HashMap<GraphId, Arc<ProjectGraph>>>,
}

impl GraphBackend for MemoryBackend {
    fn read(&self, id: &GraphId) -> Result<Option<Arc<ProjectGraph>>> {
        let map = self.graphs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(id).cloned())
    }

    fn write(&self, graph: Arc<ProjectGraph>) -> Result<()> {
        let mut map = self.graphs.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(graph.id().clone(), graph);
        Ok(())
    }

    fn remove(&self, id: &GraphId) -> Result<bool> {
        let mut map = self.graphs.write().unwrap_or_else(PoisonError::into_inner);
        Ok(map.remove(id).is_some())
    }

    fn scan(&self) -> Result<Vec<Arc<ProjectGraph>>> {
        let map = self.graphs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.values().cloned().collect())
    }
}
