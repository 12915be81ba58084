use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::sampling::{essential_files, FileSampler};
use super::Inner;
use crate::analyzers::Classification;
use crate::error::{AnalysisError, Result};
use crate::scanner::{FileEntry, SourceRead};
use crate::storage::{AnalysisResult, ProjectHandle, SearchIndex};
use crate::types::{ActivityLevel, CodeChunk, RepositoryMetadata};

const PREPROCESS_START: f32 = 25.0;
const PREPROCESS_END: f32 = 55.0;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Acquire,
    Classify,
    Rank,
    Preprocess,
    Summarize,
    Index,
    Publish,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Acquire,
        Phase::Classify,
        Phase::Rank,
        Phase::Preprocess,
        Phase::Summarize,
        Phase::Index,
        Phase::Publish,
    ];

    /// Progress reported when the phase starts.
    pub fn progress(&self) -> f32 {
        match self {
            Phase::Acquire => 5.0,
            Phase::Classify => 15.0,
            Phase::Rank => 25.0,
            Phase::Preprocess => PREPROCESS_START,
            Phase::Summarize => 65.0,
            Phase::Index => 80.0,
            Phase::Publish => 95.0,
        }
    }

    pub fn status_message(&self) -> &'static str {
        match self {
            Phase::Acquire => "Acquiring repository...",
            Phase::Classify => "Classifying repository...",
            Phase::Rank => "Ranking important files...",
            Phase::Preprocess => "Extracting code chunks...",
            Phase::Summarize => "Summarizing repository...",
            Phase::Index => "Building search index...",
            Phase::Publish => "Publishing results...",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Acquire => "acquire",
            Phase::Classify => "classify",
            Phase::Rank => "rank",
            Phase::Preprocess => "preprocess",
            Phase::Summarize => "summarize",
            Phase::Index => "index",
            Phase::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// Intermediate products handed from one phase to the next.
#[derive(Default)]
struct PipelineState {
    root: Option<PathBuf>,
    files: Vec<FileEntry>,
    classification: Classification,
    important: Vec<String>,
    chunks: Vec<CodeChunk>,
    metadata: Option<RepositoryMetadata>,
    index: Option<SearchIndex>,
}

/// Drives one project from acquisition to a published result.
pub(crate) struct Pipeline {
    inner: Arc<Inner>,
    project_id: String,
    handle: Arc<ProjectHandle>,
    state: PipelineState,
}

impl Pipeline {
    pub(crate) fn new(inner: Arc<Inner>, project_id: String, handle: Arc<ProjectHandle>) -> Self {
        Self {
            inner,
            project_id,
            handle,
            state: PipelineState::default(),
        }
    }

    pub(crate) async fn run(mut self) {
        let outcome = self.run_phases().await;
        if self.handle.is_deleted() {
            debug!(project_id = %self.project_id, "Project deleted, dropping pipeline output");
            return;
        }

        if let Err(err) = outcome {
            error!(project_id = %self.project_id, error = %err, "Analysis failed");
            self.handle.update(|record| record.fail(err.to_string()));
        }
    }

    async fn run_phases(&mut self) -> Result<()> {
        for phase in Phase::ALL {
            self.checkpoint().await?;
            self.enter(phase);
            self.run_phase(phase).await?;
            self.phase_delay().await;
        }
        Ok(())
    }

    async fn run_phase(&mut self, phase: Phase) -> Result<()> {
        match phase {
            Phase::Acquire => self.acquire().await,
            Phase::Classify => self.classify().await,
            Phase::Rank => self.rank(),
            Phase::Preprocess => self.preprocess().await,
            Phase::Summarize => self.summarize(),
            Phase::Index => self.build_index(),
            Phase::Publish => self.publish(),
        }
    }

    fn enter(&self, phase: Phase) {
        debug!(project_id = %self.project_id, phase = %phase, "Entering phase");
        self.handle.update(|record| {
            record.advance(phase.progress());
            record.set_message(phase.status_message());
            record.log(ActivityLevel::Info, phase.status_message(), None);
        });
    }

    /// Parks while paused. Fails once the project has been deleted.
    async fn checkpoint(&self) -> Result<()> {
        if self.handle.gate.wait_until_resumed().await {
            debug!(project_id = %self.project_id, "Pipeline resumed");
        }
        if self.handle.is_deleted() {
            return Err(AnalysisError::ProjectNotFound(self.project_id.clone()));
        }
        Ok(())
    }

    async fn phase_delay(&self) {
        let delay = self.inner.config.job.phase_delay_ms;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    fn log(&self, level: ActivityLevel, message: String, file: Option<&str>) {
        self.handle.update(|record| record.log(level, message, file));
    }

    fn root(&self) -> Result<PathBuf> {
        self.state
            .root
            .clone()
            .ok_or_else(|| AnalysisError::Acquisition("repository root not resolved".to_string()))
    }

    async fn acquire(&mut self) -> Result<()> {
        let source = self.handle.snapshot().source;
        let root = self.inner.source.resolve(&source).await?;
        self.log(
            ActivityLevel::Info,
            format!("Repository ready at {}", root.display()),
            None,
        );
        self.state.root = Some(root);
        Ok(())
    }

    /// Walks and classifies on the blocking pool.
    async fn classify(&mut self) -> Result<()> {
        let root = self.root()?;
        let scanner = self.inner.scanner.clone();
        let (files, classification) = tokio::task::spawn_blocking(move || {
            let files = scanner.walk(&root)?;
            let classification = scanner.classify(&root, &files)?;
            Ok::<_, AnalysisError>((files, classification))
        })
        .await
        .map_err(|e| AnalysisError::Task(e.to_string()))??;

        let frameworks = if classification.frameworks.is_empty() {
            "none".to_string()
        } else {
            classification.frameworks.join(", ")
        };
        self.log(
            ActivityLevel::Info,
            format!(
                "Detected {} repository with {} files (frameworks: {})",
                classification.repo_type,
                files.len(),
                frameworks
            ),
            None,
        );

        self.state.files = files;
        self.state.classification = classification;
        Ok(())
    }

    fn rank(&mut self) -> Result<()> {
        let important = self
            .inner
            .scanner
            .rank(&self.state.classification, &self.state.files);
        self.log(
            ActivityLevel::Info,
            format!("Ranked {} important files", important.len()),
            None,
        );
        self.state.important = important;
        Ok(())
    }

    async fn preprocess(&mut self) -> Result<()> {
        let root = self.root()?;
        let options = self.handle.snapshot().options;
        let job = &self.inner.config.job;
        let mut sampler = FileSampler::for_depth(
            options.depth,
            options.seed.or(job.sampling_seed),
            job.quick_keep_probability,
        );
        let essential = essential_files(&self.state.classification);

        let limit = self.inner.scanner.extraction_limit(self.state.important.len());
        let targets: Vec<String> = self.state.important.iter().take(limit).cloned().collect();

        for (idx, path) in targets.iter().enumerate() {
            self.checkpoint().await?;

            if !sampler.keep(essential.contains(path)) {
                self.log(
                    ActivityLevel::Warn,
                    format!("Skipped {} (quick analysis sampling)", path),
                    Some(path.as_str()),
                );
            } else {
                match self.inner.scanner.read_source(&root, path) {
                    SourceRead::Text(content) => {
                        let chunks = self.inner.scanner.extract(path, &content);
                        self.log(
                            ActivityLevel::Info,
                            format!("Processed {} ({} chunks)", path, chunks.len()),
                            Some(path.as_str()),
                        );
                        self.state.chunks.extend(chunks);
                    }
                    SourceRead::Binary => {
                        warn!(project_id = %self.project_id, file = %path, "Skipping binary file");
                        self.log(ActivityLevel::Warn, format!("Skipped binary file {}", path), Some(path.as_str()));
                    }
                    SourceRead::Unreadable(reason) => {
                        warn!(project_id = %self.project_id, file = %path, error = %reason, "Skipping unreadable file");
                        self.log(
                            ActivityLevel::Warn,
                            format!("Could not read {}: {}", path, reason),
                            Some(path.as_str()),
                        );
                    }
                }
            }

            let progress = PREPROCESS_START + (PREPROCESS_END - PREPROCESS_START) * (idx + 1) as f32 / limit as f32;
            self.handle.update(|record| record.advance(progress));
            tokio::task::yield_now().await;
        }

        self.handle.update(|record| record.advance(PREPROCESS_END));
        Ok(())
    }

    fn summarize(&mut self) -> Result<()> {
        let metadata = self.inner.scanner.summarize(
            &self.state.classification,
            &self.state.files,
            std::mem::take(&mut self.state.important),
            self.state.chunks.len(),
        );
        self.handle.update(|record| {
            record.set_message(metadata.summary());
        });
        self.state.metadata = Some(metadata);
        Ok(())
    }

    fn build_index(&mut self) -> Result<()> {
        let chunks = std::mem::take(&mut self.state.chunks);
        let index = SearchIndex::build_with(chunks, &self.inner.config.search);
        self.log(
            ActivityLevel::Info,
            format!("Indexed {} chunks under {} keys", index.len(), index.key_count()),
            None,
        );
        self.state.index = Some(index);
        Ok(())
    }

    /// Publishes the cache entry and marks the project completed in one write section.
    fn publish(&mut self) -> Result<()> {
        let metadata = self
            .state
            .metadata
            .take()
            .ok_or_else(|| AnalysisError::Task("publish reached without metadata".to_string()))?;
        let index = self
            .state
            .index
            .take()
            .ok_or_else(|| AnalysisError::Task("publish reached without index".to_string()))?;

        let chunk_count = index.len();
        let result = AnalysisResult::from_index(metadata, index);
        let cache = &self.inner.cache;
        let project_id = &self.project_id;
        let handle = &self.handle;

        let published = handle.update(|record| {
            if handle.is_deleted() {
                return false;
            }
            cache.insert(project_id, result);
            record.complete(format!("Analysis complete: {} chunks extracted", chunk_count));
            true
        });

        if published {
            info!(project_id = %project_id, chunks = chunk_count, "Analysis completed");
        }
        Ok(())
    }
}
