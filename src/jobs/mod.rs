//! Background analysis jobs.
//!
//! A [`JobController`] owns the project store and the analysis cache. Each
//! project runs its pipeline on its own tokio task; every read goes through a
//! snapshot of the project record or an `Arc` of the cached result.

pub mod pause;
pub mod pipeline;
pub mod sampling;

pub use pipeline::Phase;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::insights::{self, Persona, PersonaReport};
use crate::scanner::{NoopSink, RepositoryScanner};
use crate::storage::{AnalysisCache, AnalysisResult, ProjectStore, SearchHit};
use crate::types::{
    ActivityLevel, AnalysisDepth, AnalysisOptions, ChunkType, CodeChunk, JobStatus, ProjectRecord,
    ProjectStatus, RepositoryMetadata,
};

/// Resolves an acquisition target to a local directory.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    async fn resolve(&self, target: &str) -> Result<PathBuf>;
}

/// Treats the target as a path on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDirectorySource;

#[async_trait]
impl RepositorySource for LocalDirectorySource {
    async fn resolve(&self, target: &str) -> Result<PathBuf> {
        let path = Path::new(target);
        if !path.is_dir() {
            return Err(AnalysisError::RootNotFound(path.to_path_buf()));
        }
        path.canonicalize().map_err(|e| AnalysisError::io(path, e))
    }
}

/// One page of chunks for a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPage {
    /// Matching chunks before the limit was applied.
    pub total: usize,
    pub chunks: Vec<CodeChunk>,
}

pub(crate) struct Inner {
    pub(crate) store: Arc<ProjectStore>,
    pub(crate) cache: Arc<AnalysisCache>,
    pub(crate) scanner: Arc<RepositoryScanner>,
    pub(crate) source: Arc<dyn RepositorySource>,
    pub(crate) config: Arc<AnalysisConfig>,
    rehydration: DashMap<String, Arc<Mutex<()>>>,
}

/// Creates, drives and answers queries about analysis projects.
#[derive(Clone)]
pub struct JobController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for JobController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobController")
            .field("projects", &self.inner.store.len())
            .field("cached", &self.inner.cache.len())
            .finish()
    }
}

/// Builder for [`JobController`].
#[derive(Default)]
pub struct JobControllerBuilder {
    config: Option<AnalysisConfig>,
    source: Option<Arc<dyn RepositorySource>>,
    store: Option<Arc<ProjectStore>>,
    cache: Option<Arc<AnalysisCache>>,
}

impl JobControllerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn source(mut self, source: Arc<dyn RepositorySource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn store(mut self, store: Arc<ProjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<AnalysisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<JobController> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(JobController {
            inner: Arc::new(Inner {
                store: self.store.unwrap_or_default(),
                cache: self.cache.unwrap_or_default(),
                scanner: Arc::new(RepositoryScanner::new(&config.scanning)),
                source: self.source.unwrap_or_else(|| Arc::new(LocalDirectorySource)),
                config: Arc::new(config),
                rehydration: DashMap::new(),
            }),
        })
    }
}

impl JobController {
    pub fn builder() -> JobControllerBuilder {
        JobControllerBuilder::new()
    }

    pub fn new(config: AnalysisConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<ProjectStore> {
        &self.inner.store
    }

    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.inner.cache
    }

    /// Registers a project and starts its pipeline in the background.
    ///
    /// Must be called from within a tokio runtime. Returns the new project id
    /// without waiting for the analysis.
    pub fn create_project(&self, name: &str, source: &str, options: Option<AnalysisOptions>) -> String {
        let options = options.unwrap_or_else(|| AnalysisOptions {
            depth: self.inner.config.job.default_depth,
            seed: None,
        });
        let project_id = uuid::Uuid::new_v4().to_string();

        let mut record = ProjectRecord::new(&project_id, name, source, options);
        record.begin_analysis();
        record.log(ActivityLevel::Info, format!("Project {} created", name), None);
        let handle = self.inner.store.insert(record);

        info!(project_id = %project_id, source = %source, "Starting analysis");
        tokio::spawn(pipeline::Pipeline::new(self.inner.clone(), project_id.clone(), handle).run());
        project_id
    }

    pub fn pause(&self, project_id: &str) -> Result<JobStatus> {
        let handle = self.inner.store.get(project_id)?;
        handle.update(|record| {
            require_analyzing(record, "pause")?;
            if !record.paused {
                record.paused = true;
                record.set_message("Analysis paused");
                record.log(ActivityLevel::Info, "Analysis paused", None);
            }
            // Flag and gate flip together under the record lock
            if !handle.is_deleted() {
                handle.gate.pause();
            }
            Ok::<_, AnalysisError>(())
        })?;
        info!(project_id = %project_id, "Analysis paused");
        self.status(project_id)
    }

    pub fn resume(&self, project_id: &str) -> Result<JobStatus> {
        let handle = self.inner.store.get(project_id)?;
        handle.update(|record| {
            require_analyzing(record, "resume")?;
            if record.paused {
                record.paused = false;
                record.set_message("Analysis resumed");
                record.log(ActivityLevel::Info, "Analysis resumed", None);
            }
            handle.gate.resume();
            Ok::<_, AnalysisError>(())
        })?;
        info!(project_id = %project_id, "Analysis resumed");
        self.status(project_id)
    }

    /// Merges analysis options into the record. A running pipeline picks them
    /// up if it has not reached preprocessing yet.
    pub fn configure(&self, project_id: &str, depth: Option<AnalysisDepth>, seed: Option<u64>) -> Result<JobStatus> {
        self.inner.store.update(project_id, |record| {
            if let Some(depth) = depth {
                record.options.depth = depth;
            }
            if seed.is_some() {
                record.options.seed = seed;
            }
            let message = format!("Analysis options updated: depth={}", record.options.depth);
            record.log(ActivityLevel::Info, message, None);
        })?;
        self.status(project_id)
    }

    pub fn status(&self, project_id: &str) -> Result<JobStatus> {
        let record = self.inner.store.snapshot(project_id)?;
        Ok(record.status_view(self.inner.config.job.activity_feed_limit))
    }

    pub fn list_projects(&self) -> Vec<ProjectRecord> {
        self.inner.store.list()
    }

    /// Waits until the project completes or fails.
    pub async fn wait_for_terminal(&self, project_id: &str) -> Result<JobStatus> {
        let handle = self.inner.store.get(project_id)?;
        handle.finished().await;
        if handle.is_deleted() {
            return Err(AnalysisError::ProjectNotFound(project_id.to_string()));
        }
        self.status(project_id)
    }

    /// The cached analysis, rebuilt from the acquisition target if it was evicted.
    pub async fn result(&self, project_id: &str) -> Result<Arc<AnalysisResult>> {
        let record = self.inner.store.snapshot(project_id)?;
        match record.status {
            ProjectStatus::Created | ProjectStatus::Analyzing => {
                return Err(AnalysisError::NotReady(project_id.to_string()))
            }
            ProjectStatus::Failed => {
                return Err(AnalysisError::AnalysisFailed {
                    project_id: project_id.to_string(),
                    message: record.error.unwrap_or_else(|| "unknown error".to_string()),
                })
            }
            ProjectStatus::Completed => {}
        }

        if let Some(result) = self.inner.cache.get(project_id) {
            return Ok(result);
        }
        self.rehydrate(&record).await
    }

    async fn rehydrate(&self, record: &ProjectRecord) -> Result<Arc<AnalysisResult>> {
        let project_id = record.project_id.as_str();
        let lock = self
            .inner
            .rehydration
            .entry(project_id.to_string())
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        // Another reader may have finished the rescan while we waited
        if let Some(result) = self.inner.cache.get(project_id) {
            return Ok(result);
        }

        warn!(project_id = %project_id, "Cache entry missing, rescanning repository");
        let root = self.inner.source.resolve(&record.source).await?;
        let scanner = self.inner.scanner.clone();
        let scan = tokio::task::spawn_blocking(move || scanner.scan(&root, &NoopSink))
            .await
            .map_err(|e| AnalysisError::Task(e.to_string()))??;

        let result = AnalysisResult::new(scan.metadata, scan.chunks, &self.inner.config.search);
        // A delete during the rescan wins; checked under the record lock like publish
        let handle = self.inner.store.get(project_id)?;
        let inserted = handle.update(|_| {
            if handle.is_deleted() {
                None
            } else {
                Some(self.inner.cache.insert(project_id, result))
            }
        });
        self.inner.rehydration.remove(project_id);
        let result = inserted.ok_or_else(|| AnalysisError::ProjectNotFound(project_id.to_string()))?;
        info!(project_id = %project_id, chunks = result.chunks().len(), "Rehydrated analysis");
        Ok(result)
    }

    pub async fn metadata(&self, project_id: &str) -> Result<RepositoryMetadata> {
        Ok(self.result(project_id).await?.metadata.clone())
    }

    pub async fn chunks(&self, project_id: &str, chunk_type: Option<ChunkType>, limit: Option<usize>) -> Result<ChunkPage> {
        let result = self.result(project_id).await?;
        let matching: Vec<&CodeChunk> = result
            .chunks()
            .iter()
            .filter(|chunk| chunk_type.map_or(true, |t| chunk.chunk_type == t))
            .collect();

        Ok(ChunkPage {
            total: matching.len(),
            chunks: matching
                .into_iter()
                .take(limit.unwrap_or(usize::MAX))
                .cloned()
                .collect(),
        })
    }

    pub async fn search(&self, project_id: &str, query: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let limit = limit.unwrap_or(self.inner.config.search.default_limit);
        Ok(self.result(project_id).await?.index.query(query, limit))
    }

    pub async fn persona_report(&self, project_id: &str, persona: Persona) -> Result<PersonaReport> {
        let result = self.result(project_id).await?;
        Ok(insights::analyze(persona, &result.metadata, result.chunks()))
    }

    /// Removes the record and its cached result. A running pipeline stops at
    /// its next checkpoint without publishing.
    pub fn delete_project(&self, project_id: &str) -> Result<()> {
        self.inner.store.remove(project_id)?;
        self.inner.cache.evict(project_id);
        self.inner.rehydration.remove(project_id);
        info!(project_id = %project_id, "Project deleted");
        Ok(())
    }
}

fn require_analyzing(record: &ProjectRecord, action: &'static str) -> Result<()> {
    if record.status != ProjectStatus::Analyzing {
        return Err(AnalysisError::InvalidState {
            project_id: record.project_id.clone(),
            status: record.status,
            action,
        });
    }
    Ok(())
}
