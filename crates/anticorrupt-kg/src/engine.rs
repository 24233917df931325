//! Engine state: the current snapshot and the last validation report.
//!
//! `refresh()` runs load → validate → build and swaps in a new snapshot.
//! Only one refresh runs at a time; a second caller waits on the refresh
//! lock. Readers hold an `Arc` to whatever snapshot was current when they
//! asked, so a refresh never disturbs a query in flight. A report with any
//! error clears the snapshot and queries fail with `ValidationFailed`.

use crate::config::KbConfig;
use crate::graph::{GraphSnapshot, Node};
use crate::query::{EdgeFilter, Neighbor, Reached, RelationalPath};
use crate::search::{SearchHit, SearchOptions};
use crate::store::{LoadedRecords, RecordStore};
use crate::validator::{validate, ValidationReport};
use anticorrupt_core::{EntityKind, Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Default)]
struct EngineState {
    snapshot: Option<Arc<GraphSnapshot>>,
    report: Option<Arc<ValidationReport>>,
    generation: u64,
}

pub struct KnowledgeEngine {
    store: RecordStore,
    config: KbConfig,
    refresh_lock: Mutex<()>,
    state: RwLock<EngineState>,
}

impl KnowledgeEngine {
    pub fn new(store: RecordStore, config: KbConfig) -> Self {
        Self { store, config, refresh_lock: Mutex::new(()), state: RwLock::new(EngineState::default()) }
    }

    /// Engine over the store described by `config.data`.
    pub fn from_config(config: KbConfig) -> Self {
        Self::new(config.store(), config)
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn config(&self) -> &KbConfig {
        &self.config
    }

    /// Reload everything. Returns the new report whether or not it is clean.
    pub async fn refresh(&self) -> Result<Arc<ValidationReport>> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Same as [`refresh`](Self::refresh); named for CLI callers.
    pub async fn validate(&self) -> Result<Arc<ValidationReport>> {
        self.refresh().await
    }

    async fn refresh_locked(&self) -> Result<Arc<ValidationReport>> {
        let started = Instant::now();
        let loaded = self.load().await?;

        let (report, built) = tokio::task::spawn_blocking(move || {
            let validated = validate(&loaded);
            let built = validated.knowledge_base.map(GraphSnapshot::build);
            (validated.report, built)
        })
        .await
        .map_err(|e| Error::Internal(format!("refresh task failed: {}", e)))?;

        for warning in &report.warnings {
            warn!("{}", warning);
        }
        self.install(Arc::new(report), built, started).await
    }

    /// Swap in the outcome of one refresh. Anything but a built graph
    /// clears the snapshot.
    async fn install(
        &self,
        report: Arc<ValidationReport>,
        built: Option<Result<GraphSnapshot>>,
        started: Instant,
    ) -> Result<Arc<ValidationReport>> {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.report = Some(report.clone());
        match built {
            Some(Ok(snapshot)) => {
                info!(
                    "refresh #{}: {} node(s), {} edge(s) in {} ms",
                    state.generation,
                    snapshot.node_count(),
                    snapshot.edge_count(),
                    started.elapsed().as_millis()
                );
                state.snapshot = Some(Arc::new(snapshot));
                Ok(report)
            }
            Some(Err(e)) => {
                error!("refresh #{}: graph build failed: {}", state.generation, e);
                state.snapshot = None;
                Err(e)
            }
            None => {
                warn!(
                    "refresh #{}: {} validation error(s), no graph served",
                    state.generation,
                    report.error_count()
                );
                state.snapshot = None;
                Ok(report)
            }
        }
    }

    /// Read all kinds, one blocking task per kind.
    async fn load(&self) -> Result<LoadedRecords> {
        let mut tasks = JoinSet::new();
        for &kind in EntityKind::ALL {
            let store = self.store.clone();
            tasks.spawn_blocking(move || (kind, store.load_kind(kind)));
        }

        let mut loaded = LoadedRecords::default();
        while let Some(joined) = tasks.join_next().await {
            let (kind, load) = joined.map_err(|e| Error::Internal(format!("load task failed: {}", e)))?;
            loaded.insert(kind, load);
        }
        Ok(loaded)
    }

    /// The current snapshot, loading on first use.
    pub async fn snapshot(&self) -> Result<Arc<GraphSnapshot>> {
        if let Some(result) = self.installed().await {
            return result;
        }
        let _guard = self.refresh_lock.lock().await;
        // another caller may have loaded while we waited
        if let Some(result) = self.installed().await {
            return result;
        }
        self.refresh_locked().await?;
        self.installed()
            .await
            .unwrap_or_else(|| Err(Error::Internal("refresh left no report".into())))
    }

    /// `None` if nothing has been loaded yet.
    async fn installed(&self) -> Option<Result<Arc<GraphSnapshot>>> {
        let state = self.state.read().await;
        let report = state.report.as_ref()?;
        Some(match &state.snapshot {
            Some(snapshot) => Ok(snapshot.clone()),
            None if report.is_valid() => Err(Error::integrity("last refresh could not build the graph")),
            None => Err(Error::ValidationFailed { errors: report.error_count() }),
        })
    }

    /// The installed snapshot, without triggering a load.
    pub async fn current_snapshot(&self) -> Option<Arc<GraphSnapshot>> {
        self.state.read().await.snapshot.clone()
    }

    pub async fn last_report(&self) -> Option<Arc<ValidationReport>> {
        self.state.read().await.report.clone()
    }

    /// Number of completed refreshes.
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    // ---- convenience queries (owned results) ----

    pub async fn get_node(&self, id: &str, kind: Option<EntityKind>) -> Result<Node> {
        let snap = self.snapshot().await?;
        let key = snap.resolve(id, kind)?;
        snap.get_node(&key).cloned()
    }

    pub async fn neighbors(&self, id: &str, kind: Option<EntityKind>, filter: &EdgeFilter) -> Result<Vec<Neighbor>> {
        let snap = self.snapshot().await?;
        let key = snap.resolve(id, kind)?;
        snap.neighbors(&key, filter)
    }

    /// Neighbor expansion in both directions.
    pub async fn graph(&self, id: &str, kind: Option<EntityKind>) -> Result<Vec<Neighbor>> {
        self.neighbors(id, kind, &EdgeFilter::default()).await
    }

    /// Search with the configured defaults.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.search_with(query, &self.config.search_options()).await
    }

    pub async fn search_with(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let snap = self.snapshot().await?;
        Ok(snap.search_index().search(query, options))
    }

    /// Each endpoint is resolved like [`get_node`](Self::get_node); pass a kind
    /// when the id is shared across kinds.
    pub async fn shortest_path(
        &self,
        from: &str,
        from_kind: Option<EntityKind>,
        to: &str,
        to_kind: Option<EntityKind>,
        filter: &EdgeFilter,
    ) -> Result<Option<RelationalPath>> {
        let snap = self.snapshot().await?;
        let (from, to) = (snap.resolve(from, from_kind)?, snap.resolve(to, to_kind)?);
        snap.shortest_path(&from, &to, filter)
    }

    /// Depth defaults to `[query].default_depth` and is clamped to `[query].max_depth`.
    pub async fn traverse(
        &self,
        id: &str,
        kind: Option<EntityKind>,
        depth: Option<usize>,
        filter: &EdgeFilter,
    ) -> Result<Vec<Reached>> {
        let snap = self.snapshot().await?;
        let key = snap.resolve(id, kind)?;
        snap.traverse(&key, self.config.clamp_depth(depth), filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::KnowledgeBase;
    use anticorrupt_core::schema::validate_relationship;
    use anticorrupt_core::NodeKey;

    const STF: &str = "id: stf\nname_official: Supremo Tribunal Federal\nname_common: STF\nacronym: STF\n\
                       type: judicial\njurisdiction: federal\ndescription: Corte.\n";

    /// A relationship whose endpoints are not in the knowledge base.
    fn unbuildable() -> Error {
        let raw = serde_yaml::from_str(
            "id: r1\nsource_type: figure\nsource_id: ghost\ntarget_type: institution\ntarget_id: stf\n\
             relationship_type: member_of\ndescription: X.\nstrength: weak\n",
        )
        .unwrap();
        let mut kb = KnowledgeBase::default();
        kb.insert(validate_relationship(&raw).unwrap().into());
        GraphSnapshot::build(kb).unwrap_err()
    }

    #[tokio::test]
    async fn failed_build_clears_the_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("institutions")).unwrap();
        std::fs::write(tmp.path().join("institutions/stf.yaml"), STF).unwrap();
        let engine = KnowledgeEngine::new(RecordStore::new(tmp.path()), KbConfig::default());
        let held = engine.snapshot().await.unwrap();

        let report = Arc::new(ValidationReport { records_checked: 1, ..Default::default() });
        let err = engine.install(report.clone(), Some(Err(unbuildable())), Instant::now()).await.unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));

        assert!(engine.current_snapshot().await.is_none());
        assert!(Arc::ptr_eq(&engine.last_report().await.unwrap(), &report));
        assert_eq!(engine.generation().await, 2);
        assert!(matches!(engine.snapshot().await.unwrap_err(), Error::Integrity(_)));
        // readers that already hold the old graph keep it
        assert!(held.contains(&NodeKey::institution("stf")));

        engine.refresh().await.unwrap();
        assert!(engine.snapshot().await.is_ok());
    }
}
