//! Repository walking, classification, ranking and extraction.
//!
//! [`RepositoryScanner::scan`] runs every stage in order. The stages are also
//! exposed one by one so the job pipeline can put checkpoints between them.

pub mod discovery;
pub mod ranking;

pub use discovery::{FileEntry, SkipRules, SourceRead};

use std::path::Path;
use tracing::{debug, info};

use crate::analyzers::classifier::{self, Classification, Classifier};
use crate::analyzers::ChunkExtractor;
use crate::config::ScanningConfig;
use crate::error::Result;
use crate::types::{CodeChunk, RepositoryMetadata, DEFAULT_CONFIDENCE};

/// Receives scan progress as a percentage in `[0, 100]`.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f32, message: &str) -> Result<()>;
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn report(&self, _percent: f32, _message: &str) -> Result<()> {
        Ok(())
    }
}

impl<F> ProgressSink for F
where
    F: Fn(f32, &str) -> Result<()> + Send + Sync,
{
    fn report(&self, percent: f32, message: &str) -> Result<()> {
        self(percent, message)
    }
}

/// Metadata and chunks from one completed scan.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub metadata: RepositoryMetadata,
    pub chunks: Vec<CodeChunk>,
}

#[derive(Debug, Clone)]
pub struct RepositoryScanner {
    config: ScanningConfig,
    rules: SkipRules,
    classifier: Classifier,
    extractor: ChunkExtractor,
}

impl Default for RepositoryScanner {
    fn default() -> Self {
        Self::new(&ScanningConfig::default())
    }
}

impl RepositoryScanner {
    pub fn new(config: &ScanningConfig) -> Self {
        Self {
            config: config.clone(),
            rules: SkipRules::with_extra(config.extra_skip_patterns.iter().cloned()),
            classifier: Classifier::new(config),
            extractor: ChunkExtractor::from_config(config),
        }
    }

    pub fn config(&self) -> &ScanningConfig {
        &self.config
    }

    pub fn walk(&self, root: &Path) -> Result<Vec<FileEntry>> {
        discovery::walk(root, &self.rules)
    }

    pub fn classify(&self, root: &Path, files: &[FileEntry]) -> Result<Classification> {
        self.classifier.classify(root, files)
    }

    pub fn rank(&self, classification: &Classification, files: &[FileEntry]) -> Vec<String> {
        ranking::rank_important_files(classification, files, &self.config)
    }

    /// Number of ranked files that are chunk-extracted.
    pub fn extraction_limit(&self, ranked: usize) -> usize {
        ranked.min(self.config.max_extracted_files)
    }

    pub fn read_source(&self, root: &Path, relative_path: &str) -> SourceRead {
        discovery::read_source(&root.join(relative_path))
    }

    pub fn extract(&self, relative_path: &str, content: &str) -> Vec<CodeChunk> {
        self.extractor.extract(relative_path, content)
    }

    pub fn summarize(
        &self,
        classification: &Classification,
        files: &[FileEntry],
        important_files: Vec<String>,
        total_code_chunks: usize,
    ) -> RepositoryMetadata {
        RepositoryMetadata {
            repo_type: classification.repo_type.clone(),
            frameworks: classification.frameworks.clone(),
            entry_points: classification.entry_points.clone(),
            important_files_with_types: ranking::describe_important_files(&important_files, files),
            important_files,
            dependencies: classification.dependencies.clone(),
            config_files: classification.config_files.clone(),
            languages_detail: classification.languages.clone(),
            extension_counts: ranking::extension_counts(files),
            readme_text: classification.readme_text.clone(),
            total_files: files.len(),
            code_files: classification.code_files(),
            total_code_chunks,
            confidence_score: DEFAULT_CONFIDENCE,
        }
    }

    /// Walks, classifies, ranks and extracts `root` in one pass.
    pub fn scan(&self, root: &Path, sink: &dyn ProgressSink) -> Result<ScanResult> {
        notify(sink, 0.0, "Starting repository scan");
        let files = self.walk(root)?;

        let languages = classifier::count_languages(&files);
        let repo_type = classifier::determine_repo_type(&languages, &files);
        notify(sink, 10.0, &format!("Detected languages: {}", repo_type));

        let readme = classifier::find_readme(&files);
        let readme_text = readme.and_then(|entry| classifier::readme_summary(&entry.path));
        let frameworks = self
            .classifier
            .detect_frameworks(root, &files, readme_text.as_deref());
        notify(sink, 20.0, "Detected frameworks");

        let classification = Classification {
            entry_points: classifier::find_entry_points(&repo_type, &files)?,
            config_files: classifier::find_config_files(&files)?,
            dependencies: classifier::parse_dependencies(root, &repo_type),
            readme_path: readme.map(|entry| entry.relative_path.clone()),
            readme_text,
            frameworks,
            languages,
            repo_type,
        };
        let important = self.rank(&classification, &files);
        notify(sink, 30.0, &format!("Ranked {} important files", important.len()));
        notify(sink, 40.0, &format!("Parsed {} dependencies", classification.dependencies.len()));

        let limit = self.extraction_limit(important.len());
        let mut chunks = Vec::new();
        for (idx, relative_path) in important.iter().take(limit).enumerate() {
            match self.read_source(root, relative_path) {
                SourceRead::Text(content) => chunks.extend(self.extract(relative_path, &content)),
                SourceRead::Binary => debug!(file = %relative_path, "Skipping binary file"),
                SourceRead::Unreadable(reason) => {
                    debug!(file = %relative_path, error = %reason, "Skipping unreadable file")
                }
            }
            let percent = 40.0 + 50.0 * (idx + 1) as f32 / limit as f32;
            notify(sink, percent, &format!("Processed {}", relative_path));
        }

        notify(sink, 92.0, "Extracted README summary");
        let metadata = self.summarize(&classification, &files, important, chunks.len());
        notify(sink, 96.0, "Counted file extensions");

        info!(
            root = %root.display(),
            repo_type = %metadata.repo_type,
            files = metadata.total_files,
            chunks = metadata.total_code_chunks,
            "Repository scan complete"
        );
        notify(sink, 100.0, "Scan complete");
        Ok(ScanResult { metadata, chunks })
    }
}

fn notify(sink: &dyn ProgressSink, percent: f32, message: &str) {
    if let Err(err) = sink.report(percent, message) {
        debug!(percent, error = %err, "Progress sink rejected update");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::types::ChunkType;
    use parking_lot::Mutex;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn demo_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        let body: String = (2..=10).map(|i| format!("    x{} = {}\n", i, i)).collect();
        write(dir.path(), "main.py", format!("def run():\n{}", body).as_bytes());
        write(dir.path(), "README.md", b"A tiny demo app.\n\nMore text.");
        dir
    }

    #[test]
    fn test_scan_small_python_repository() {
        let dir = demo_repo();
        let result = RepositoryScanner::default().scan(dir.path(), &NoopSink).unwrap();
        let metadata = &result.metadata;

        assert_eq!(metadata.repo_type, "python");
        assert_eq!(metadata.entry_points, vec!["main.py"]);
        assert_eq!(metadata.important_files, vec!["README.md", "main.py"]);
        assert_eq!(metadata.readme_text.as_deref(), Some("A tiny demo app."));
        assert_eq!(metadata.total_files, 2);
        assert_eq!(metadata.code_files, 1);
        assert_eq!(metadata.total_code_chunks, result.chunks.len());
        assert_eq!(metadata.confidence_score, DEFAULT_CONFIDENCE);

        assert_eq!(result.chunks.len(), 1);
        let chunk = &result.chunks[0];
        assert_eq!(chunk.chunk_type, ChunkType::Function);
        assert_eq!(chunk.name, "run");
        assert_eq!((chunk.start_line, chunk.end_line), (1, 10));
    }

    #[test]
    fn test_progress_points_are_monotonic() {
        let dir = demo_repo();
        let seen = Mutex::new(Vec::new());
        let sink = |percent: f32, _message: &str| -> Result<()> {
            seen.lock().push(percent);
            Ok(())
        };

        RepositoryScanner::default().scan(dir.path(), &sink).unwrap();
        let seen = seen.into_inner();
        assert_eq!(seen.first(), Some(&0.0));
        assert_eq!(seen.last(), Some(&100.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.contains(&92.0));
    }

    #[test]
    fn test_sink_errors_are_ignored() {
        let dir = demo_repo();
        let sink = |_: f32, _: &str| -> Result<()> { Err(AnalysisError::Sink("closed".to_string())) };
        assert!(RepositoryScanner::default().scan(dir.path(), &sink).is_ok());
    }

    #[test]
    fn test_binary_files_are_not_extracted() {
        let dir = demo_repo();
        write(dir.path(), "blob.py", b"\0\0\0def hidden():\n");

        let result = RepositoryScanner::default().scan(dir.path(), &NoopSink).unwrap();
        assert!(result.metadata.important_files.contains(&"blob.py".to_string()));
        assert!(result.chunks.iter().all(|c| c.file_path != "blob.py"));
    }

    #[test]
    fn test_important_files_invariants() {
        let dir = TempDir::new().unwrap();
        for i in 0..70 {
            write(dir.path(), &format!("src/mod{}.py", i), format!("def f{}():\n    pass\n", i).as_bytes());
        }
        write(dir.path(), "docs/README.md", b"Nested readme.");

        let result = RepositoryScanner::default().scan(dir.path(), &NoopSink).unwrap();
        let important = &result.metadata.important_files;
        assert!(important.len() <= 50);
        assert_eq!(important[0], "docs/README.md");
        let unique: std::collections::HashSet<_> = important.iter().collect();
        assert_eq!(unique.len(), important.len());
        assert_eq!(
            result.metadata.code_files,
            result.metadata.languages_detail.values().sum::<usize>()
        );
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let result = RepositoryScanner::default().scan(Path::new("/no/such/root"), &NoopSink);
        assert!(matches!(result, Err(AnalysisError::RootNotFound(_))));
    }
}
