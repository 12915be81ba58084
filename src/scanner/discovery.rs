use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::analyzers::Language;
use crate::error::{AnalysisError, Result};

/// Directory fragments that are never descended into.
pub const DEFAULT_SKIP_PATTERNS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "coverage",
    ".pytest_cache",
    ".egg-info",
    ".cache",
];

/// Bytes inspected when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 1024;

/// Substring rules applied to the directory part of a relative path.
#[derive(Debug, Clone)]
pub struct SkipRules {
    patterns: Vec<String>,
}

impl Default for SkipRules {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_SKIP_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl SkipRules {
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rules = Self::default();
        for pattern in extra {
            let pattern = pattern.into();
            if !pattern.is_empty() && !rules.patterns.contains(&pattern) {
                rules.patterns.push(pattern);
            }
        }
        rules
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// True when any rule occurs anywhere in `relative_dir`.
    pub fn skips_dir(&self, relative_dir: &str) -> bool {
        !relative_dir.is_empty() && self.patterns.iter().any(|p| relative_dir.contains(p.as_str()))
    }

    /// True when the directory part of `relative_path` matches a rule.
    pub fn skips_file(&self, relative_path: &str) -> bool {
        match relative_path.rsplit_once('/') {
            Some((dir, _)) => self.skips_dir(dir),
            None => false,
        }
    }
}

/// A regular file found under the scanned root.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    /// Root-relative path with `/` separators.
    pub relative_path: String,
    pub path: PathBuf,
    pub size: u64,
}

impl FileEntry {
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.relative_path)
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(self.file_name())
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    pub fn language(&self) -> Option<Language> {
        Language::from_path(&self.relative_path)
    }

    pub fn is_source(&self) -> bool {
        self.language().is_some()
    }

    pub fn depth(&self) -> usize {
        self.relative_path.split('/').count()
    }

    pub fn is_root_level(&self) -> bool {
        !self.relative_path.contains('/')
    }
}

/// Outcome of reading a candidate file for extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRead {
    Text(String),
    Binary,
    Unreadable(String),
}

/// Lists every non-skipped regular file under `root`, sorted by relative path.
pub fn walk(root: &Path, rules: &SkipRules) -> Result<Vec<FileEntry>> {
    if !root.is_dir() {
        return Err(AnalysisError::RootNotFound(root.to_path_buf()));
    }

    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() || entry.depth() == 0 {
                return true;
            }
            let relative = relative_path(root, entry.path());
            !rules.skips_dir(&relative)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk failed"));
                return Err(AnalysisError::io(root, source));
            }
            Err(err) => {
                debug!(error = %err, "Skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                debug!(path = %entry.path().display(), error = %err, "Skipping file without metadata");
                continue;
            }
        };

        entries.push(FileEntry {
            relative_path: relative_path(root, entry.path()),
            path: entry.into_path(),
            size,
        });
    }

    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    debug!(root = %root.display(), files = entries.len(), "Walked repository");
    Ok(entries)
}

/// Reads a file as text, refusing files with a NUL byte in the first 1KB.
pub fn read_source(path: &Path) -> SourceRead {
    let mut file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(err) => return SourceRead::Unreadable(err.to_string()),
    };

    let mut bytes = Vec::new();
    if let Err(err) = file.read_to_end(&mut bytes) {
        return SourceRead::Unreadable(err.to_string());
    }

    if is_binary(&bytes) {
        return SourceRead::Binary;
    }
    SourceRead::Text(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_LEN).any(|b| *b == 0)
}

/// Reads a file for inspection, ignoring I/O errors.
pub(crate) fn read_lossy(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "Skipping unreadable file");
            None
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
