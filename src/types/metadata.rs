use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed confidence reported with every scan. It carries no measured meaning.
pub const DEFAULT_CONFIDENCE: f32 = 0.85;

/// Descriptor of an important file that exists on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportantFile {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub size_kb: f64,
}

/// Inventory produced by one completed scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub repo_type: String,
    pub frameworks: Vec<String>,
    pub entry_points: Vec<String>,
    pub important_files: Vec<String>,
    pub important_files_with_types: Vec<ImportantFile>,
    pub dependencies: BTreeMap<String, String>,
    pub config_files: Vec<String>,
    pub languages_detail: BTreeMap<String, usize>,
    pub extension_counts: BTreeMap<String, usize>,
    pub readme_text: Option<String>,
    pub total_files: usize,
    pub code_files: usize,
    pub total_code_chunks: usize,
    pub confidence_score: f32,
}

impl RepositoryMetadata {
    pub fn summary(&self) -> String {
        format!(
            "Type: {} | Frameworks: {} | Files: {} | Code files: {} | Chunks: {}",
            self.repo_type,
            if self.frameworks.is_empty() {
                "none".to_string()
            } else {
                self.frameworks.join(", ")
            },
            self.total_files,
            self.code_files,
            self.total_code_chunks
        )
    }

    pub fn has_readme(&self) -> bool {
        self.readme_text.is_some()
    }
}
