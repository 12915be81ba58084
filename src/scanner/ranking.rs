use std::collections::{BTreeMap, HashMap, HashSet};

use super::discovery::FileEntry;
use crate::analyzers::Classification;
use crate::config::ScanningConfig;
use crate::types::ImportantFile;

/// Orders the files worth extracting.
///
/// Entry points come first, then config files, then the largest source files.
/// The primary README is always placed at the front.
pub fn rank_important_files(
    classification: &Classification,
    files: &[FileEntry],
    config: &ScanningConfig,
) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut ranked: Vec<String> = Vec::new();

    for path in classification.entry_points.iter().chain(&classification.config_files) {
        if seen.insert(path.clone()) {
            ranked.push(path.clone());
        }
    }

    let mut sources: Vec<&FileEntry> = files.iter().filter(|entry| entry.is_source()).collect();
    sources.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.relative_path.cmp(&b.relative_path)));
    for entry in sources.into_iter().take(config.max_ranked_source_files) {
        if seen.insert(entry.relative_path.clone()) {
            ranked.push(entry.relative_path.clone());
        }
    }

    if let Some(readme) = &classification.readme_path {
        ranked.retain(|path| path != readme);
        ranked.insert(0, readme.clone());
    }

    ranked.truncate(config.max_important_files);
    ranked
}

/// Name, type and size for each ranked file still present in the walk.
pub fn describe_important_files(important: &[String], files: &[FileEntry]) -> Vec<ImportantFile> {
    let by_path: HashMap<&str, &FileEntry> = files
        .iter()
        .map(|entry| (entry.relative_path.as_str(), entry))
        .collect();

    important
        .iter()
        .filter_map(|path| by_path.get(path.as_str()))
        .map(|entry| ImportantFile {
            name: entry.file_name().to_string(),
            path: entry.relative_path.clone(),
            file_type: entry.extension().unwrap_or_else(|| "file".to_string()),
            size_kb: (entry.size as f64 / 1024.0 * 100.0).round() / 100.0,
        })
        .collect()
}

/// Counts of lowercased extensions; files without one count as `noext`.
pub fn extension_counts(files: &[FileEntry]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for entry in files {
        let ext = entry.extension().unwrap_or_else(|| "noext".to_string());
        *counts.entry(ext).or_insert(0) += 1;
    }
    counts
}
