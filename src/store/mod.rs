//! Graph persistence with ownership isolation, passive expiry and a canonical
//! "current graph" pointer per persistent project.
//!
//! Storage technology sits behind [`GraphBackend`]; [`GraphStore`] applies the
//! access rules on top of any backend. Graphs are stored as `Arc<ProjectGraph>`
//! snapshots: a write replaces the pointer, readers keep whatever snapshot they
//! already hold.
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::errors::Result;
use crate::graph::{GraphId, GraphSummary, ProjectGraph};

mod json_dir;
mod memory;

pub use json_dir::JsonDirBackend;
pub use memory::MemoryBackend;

/// Keyed blob storage for graphs. No access rules are applied at this level.
pub trait GraphBackend: Send + Sync {
    fn read(&self, id: &GraphId) -> Result<Option<Arc<ProjectGraph>>>;
    /// Insert or atomically replace the graph stored under its id.
    fn write(&self, graph: Arc<ProjectGraph>) -> Result<()>;
    fn remove(&self, id: &GraphId) -> Result<bool>;
    fn scan(&self) -> Result<Vec<Arc<ProjectGraph>>>;
}

pub struct GraphStore {
    backend: Box<dyn GraphBackend>,
    superseded_grace: Duration,
}

impl GraphStore {
    pub fn new(backend: impl GraphBackend + 'static, superseded_grace: Duration) -> Self {
        Self { backend: Box::new(backend), superseded_grace }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::default(), Duration::hours(24))
    }

    /// Store a new or refreshed graph.
    ///
    /// A new graph with a persistent project id becomes that project's current
    /// graph because it has the newest `created_at`.
    ///
    /// # Errors
    /// Backend failures.
    pub fn put(&self, graph: Arc<ProjectGraph>) -> Result<()> {
        self.backend.write(graph)
    }

    /// Expired and foreign graphs are indistinguishable from missing ones.
    ///
    /// # Errors
    /// Backend failures.
    pub fn get(&self, id: &GraphId, owner: &str, now: DateTime<Utc>) -> Result<Option<Arc<ProjectGraph>>> {
        Ok(self
            .backend
            .read(id)?
            .filter(|g| g.meta.owner_id == owner && !g.is_expired(now)))
    }

    /// # Errors
    /// Backend failures.
    pub fn get_by_project(
        &self,
        project_id: i64,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Arc<ProjectGraph>>> {
        let live = self.live_for(owner, now)?;
        Ok(live
            .into_iter()
            .filter(|g| g.meta.persistent_project_id == Some(project_id))
            .max_by(|a, b| canonical_order(a, b)))
    }

    /// Remove a graph. Returns false when it is missing, foreign or expired
    /// (expired rows are still physically removed).
    ///
    /// # Errors
    /// Backend failures.
    pub fn delete(&self, id: &GraphId, owner: &str, now: DateTime<Utc>) -> Result<bool> {
        let Some(g) = self.backend.read(id)? else {
            return Ok(false);
        };
        if g.meta.owner_id != owner {
            return Ok(false);
        }
        let removed = self.backend.remove(id)?;
        Ok(removed && !g.is_expired(now))
    }

    /// Live graphs of `owner`, newest analysis first.
    ///
    /// # Errors
    /// Backend failures.
    pub fn list(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<GraphSummary>> {
        let live = self.live_for(owner, now)?;
        let mut rows: Vec<GraphSummary> = live
            .iter()
            .map(|g| {
                let is_current = match g.meta.persistent_project_id {
                    None => true,
                    Some(pid) => !live.iter().any(|other| {
                        other.meta.persistent_project_id == Some(pid)
                            && canonical_order(other, g) == std::cmp::Ordering::Greater
                    }),
                };
                g.summary(is_current)
            })
            .collect();
        rows.sort_by(|a, b| b.analyzed_at.cmp(&a.analyzed_at).then_with(|| a.graph_id.cmp(&b.graph_id)));
        Ok(rows)
    }

    /// Ids of expired graphs and of superseded graphs past their grace period.
    ///
    /// # Errors
    /// Backend failures.
    pub fn purgeable(&self, now: DateTime<Utc>) -> Result<Vec<GraphId>> {
        let all = self.backend.scan()?;
        let mut out = Vec::new();
        for g in &all {
            let superseded_since = g.meta.persistent_project_id.and_then(|pid| {
                all.iter()
                    .filter(|o| {
                        o.meta.owner_id == g.meta.owner_id
                            && o.meta.persistent_project_id == Some(pid)
                            && !o.is_expired(now)
                            && canonical_order(o, g) == std::cmp::Ordering::Greater
                    })
                    .map(|o| o.meta.created_at)
                    .min()
            });
            let stale = superseded_since.is_some_and(|t| now - t > self.superseded_grace);
            if g.is_expired(now) || stale {
                out.push(g.id().clone());
            }
        }
        Ok(out)
    }

    /// Unconditional removal, for purge. Returns false when nothing was there.
    ///
    /// # Errors
    /// Backend failures.
    pub fn remove(&self, id: &GraphId) -> Result<bool> {
        self.backend.remove(id)
    }

    fn live_for(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<Arc<ProjectGraph>>> {
        Ok(self
            .backend
            .scan()?
            .into_iter()
            .filter(|g| g.meta.owner_id == owner && !g.is_expired(now))
            .collect())
    }
}

/// Newest `created_at` wins; graph id breaks exact ties.
fn canonical_order(a: &ProjectGraph, b: &ProjectGraph) -> std::cmp::Ordering {
    a.meta.created_at.cmp(&b.meta.created_at).then_with(|| a.meta.graph_id.cmp(&b.meta.graph_id))
}
