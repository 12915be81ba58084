use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use super::memory::SearchIndex;
use crate::config::SearchConfig;
use crate::types::{CodeChunk, RepositoryMetadata};

/// Everything a completed analysis produced.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub metadata: RepositoryMetadata,
    pub index: SearchIndex,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn new(metadata: RepositoryMetadata, chunks: Vec<CodeChunk>, config: &SearchConfig) -> Self {
        Self::from_index(metadata, SearchIndex::build_with(chunks, config))
    }

    pub fn from_index(metadata: RepositoryMetadata, index: SearchIndex) -> Self {
        Self {
            metadata,
            index,
            analyzed_at: Utc::now(),
        }
    }

    pub fn chunks(&self) -> &[CodeChunk] {
        self.index.chunks()
    }
}

/// Completed analyses keyed by project id.
///
/// Entries are never persisted; a missing entry for a completed project is
/// rebuilt by the job controller on demand.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: DashMap<String, Arc<AnalysisResult>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, project_id: &str) -> Option<Arc<AnalysisResult>> {
        self.entries.get(project_id).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, project_id: &str, result: AnalysisResult) -> Arc<AnalysisResult> {
        let result = Arc::new(result);
        self.entries.insert(project_id.to_string(), result.clone());
        result
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.entries.contains_key(project_id)
    }

    pub fn evict(&self, project_id: &str) -> Option<Arc<AnalysisResult>> {
        self.entries.remove(project_id).map(|(_, result)| result)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkType, DEFAULT_CONFIDENCE};
    use std::collections::BTreeMap;

    fn empty_metadata() -> RepositoryMetadata {
        RepositoryMetadata {
            repo_type: "python".to_string(),
            frameworks: Vec::new(),
            entry_points: Vec::new(),
            important_files: Vec::new(),
            important_files_with_types: Vec::new(),
            dependencies: BTreeMap::new(),
            config_files: Vec::new(),
            languages_detail: BTreeMap::new(),
            extension_counts: BTreeMap::new(),
            readme_text: None,
            total_files: 0,
            code_files: 0,
            total_code_chunks: 1,
            confidence_score: DEFAULT_CONFIDENCE,
        }
    }

    #[test]
    fn test_insert_get_evict() {
        let cache = AnalysisCache::new();
        let chunk = CodeChunk::new("a.py", ChunkType::Function, "run", 1, 3, "python");
        let stored = cache.insert(
            "p1",
            AnalysisResult::new(empty_metadata(), vec![chunk], &SearchConfig::default()),
        );

        assert!(cache.contains("p1"));
        let fetched = cache.get("p1").unwrap();
        assert!(Arc::ptr_eq(&stored, &fetched));
        assert_eq!(fetched.chunks().len(), 1);

        assert!(cache.evict("p1").is_some());
        assert!(cache.get("p1").is_none());
        assert!(cache.is_empty());
    }
}
