//! Role-specific reports derived from a completed analysis.
//!
//! Reports only restate what the scan measured: no model calls, no canned advice
//! beyond a few threshold-driven recommendations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::types::{ChunkType, CodeChunk, ImportantFile, RepositoryMetadata};

const MAX_DETECTED: usize = 5;
const MAX_KEY_FILES: usize = 10;
const README_SNIPPET_CHARS: usize = 400;

const AUTH_PATTERNS: &[&str] = &["auth", "login", "user", "token", "session", "jwt", "oauth"];
const DATA_PATTERNS: &[&str] = &["database", "cache", "storage", "query", "model", "schema"];
const API_PATTERNS: &[&str] = &["api", "endpoint", "route", "handler", "controller"];
const INTEGRATION_PATTERNS: &[&str] = &["http", "request", "client", "api", "service", "webhook"];

const SDE_KEY_FILE_PATTERNS: &[&str] = &["main", "app", "init", "config", "setup", "requirement", "docker", "test"];
const PM_KEY_FILE_PATTERNS: &[&str] = &["config", "requirement", "setup", "readme", "license", "contributing", "docker"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Software engineer.
    Sde,
    /// Product manager.
    Pm,
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Persona::Sde => f.write_str("sde"),
            Persona::Pm => f.write_str("pm"),
        }
    }
}

impl FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sde" | "engineer" => Ok(Persona::Sde),
            "pm" | "product" => Ok(Persona::Pm),
            other => Err(format!("unknown persona: {} (expected sde or pm)", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "persona", rename_all = "lowercase")]
pub enum PersonaReport {
    Sde(SdeReport),
    Pm(PmReport),
}

impl PersonaReport {
    pub fn title(&self) -> &str {
        match self {
            PersonaReport::Sde(report) => &report.title,
            PersonaReport::Pm(report) => &report.title,
        }
    }

    pub fn overview(&self) -> &str {
        match self {
            PersonaReport::Sde(report) => &report.overview,
            PersonaReport::Pm(report) => &report.overview,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Architecture {
    pub repo_type: String,
    pub frameworks: Vec<String>,
    pub entry_points: Vec<String>,
    pub config_files: Vec<String>,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeMetrics {
    pub total_files: usize,
    pub code_files: usize,
    pub total_chunks: usize,
    pub avg_chunk_lines: f64,
    pub config_files: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdeReport {
    pub title: String,
    pub overview: String,
    pub architecture: Architecture,
    pub metrics: CodeMetrics,
    pub complexity_level: String,
    pub dependency_health: String,
    pub dependencies: BTreeMap<String, String>,
    pub recommendations: Vec<String>,
    pub key_files: Vec<ImportantFile>,
}

/// Feature areas keyed by the patterns found in chunk names and content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureAreas {
    pub authentication: Vec<String>,
    pub data_management: Vec<String>,
    pub api_endpoints: Vec<String>,
    pub external_integrations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmReport {
    pub title: String,
    pub overview: String,
    pub use_case: String,
    pub deployment: String,
    pub features: FeatureAreas,
    pub core_functions: Vec<String>,
    pub validation_functions: Vec<String>,
    pub feature_flags: Vec<String>,
    pub external_calls: Vec<String>,
    pub async_support: bool,
    pub caching_detected: bool,
    pub key_files: Vec<ImportantFile>,
    pub stakeholders: Vec<String>,
}

pub fn analyze(persona: Persona, metadata: &RepositoryMetadata, chunks: &[CodeChunk]) -> PersonaReport {
    match persona {
        Persona::Sde => PersonaReport::Sde(sde_report(metadata, chunks)),
        Persona::Pm => PersonaReport::Pm(pm_report(metadata, chunks)),
    }
}

pub fn sde_report(metadata: &RepositoryMetadata, chunks: &[CodeChunk]) -> SdeReport {
    let avg_chunk_lines = average_chunk_lines(chunks);
    let complexity_level = complexity_level(metadata.total_code_chunks).to_string();

    let languages = if metadata.languages_detail.is_empty() {
        "unknown".to_string()
    } else {
        metadata
            .languages_detail
            .iter()
            .map(|(language, count)| format!("{}({})", language, count))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let overview = format!(
        "{} project with {} files ({} code files) and {} extracted chunks.\n\
         Frameworks: {}. Languages: {}. Complexity: {}.\n\
         Entry points: {}. Config files: {}. Dependencies: {}. Average chunk size: {:.1} lines.",
        metadata.repo_type.to_uppercase(),
        metadata.total_files,
        metadata.code_files,
        metadata.total_code_chunks,
        join_or(&metadata.frameworks, "none detected"),
        languages,
        complexity_level,
        metadata.entry_points.len(),
        metadata.config_files.len(),
        metadata.dependencies.len(),
        avg_chunk_lines,
    );

    let mut recommendations = Vec::new();
    if metadata.total_code_chunks > 100 {
        recommendations.push("Consider breaking down large modules into smaller components".to_string());
    }
    if metadata.dependencies.len() > 20 {
        recommendations.push("Audit dependencies and remove unused ones".to_string());
    }
    if !metadata.has_readme() {
        recommendations.push("Add a README describing the project".to_string());
    }
    if !chunks.iter().any(|chunk| chunk.file_path.to_lowercase().contains("test")) {
        recommendations.push("No test files among the analyzed files; consider adding tests".to_string());
    }

    SdeReport {
        title: "Software Development Engineer Analysis".to_string(),
        overview,
        architecture: Architecture {
            repo_type: metadata.repo_type.clone(),
            frameworks: metadata.frameworks.clone(),
            entry_points: metadata.entry_points.iter().take(5).cloned().collect(),
            config_files: metadata.config_files.clone(),
            pattern: architecture_pattern(&metadata.frameworks).to_string(),
        },
        metrics: CodeMetrics {
            total_files: metadata.total_files,
            code_files: metadata.code_files,
            total_chunks: metadata.total_code_chunks,
            avg_chunk_lines,
            config_files: metadata.config_files.len(),
        },
        complexity_level,
        dependency_health: dependency_health(metadata.dependencies.len()).to_string(),
        dependencies: metadata.dependencies.clone(),
        recommendations,
        key_files: key_files(metadata, SDE_KEY_FILE_PATTERNS),
    }
}

pub fn pm_report(metadata: &RepositoryMetadata, chunks: &[CodeChunk]) -> PmReport {
    let use_case = use_case(&metadata.frameworks).to_string();
    let deployment = deployment_type(metadata).to_string();

    let readme = metadata.readme_text.as_deref().unwrap_or("").trim();
    let readme = if readme.is_empty() {
        "No README available.".to_string()
    } else if readme.chars().count() > README_SNIPPET_CHARS {
        format!("{}...", crate::types::truncate_chars(readme, README_SNIPPET_CHARS))
    } else {
        readme.to_string()
    };
    let overview = format!(
        "{} built with {}.\n\
         {} files, {} implementation files, {} key functions across {} entry points.\n\
         Deployment: {}. {} external dependencies.\n\n{}",
        use_case,
        join_or(&metadata.frameworks, "a custom implementation"),
        metadata.total_files,
        metadata.code_files,
        metadata.total_code_chunks,
        metadata.entry_points.len(),
        deployment,
        metadata.dependencies.len(),
        readme,
    );

    PmReport {
        title: "Product Manager Analysis".to_string(),
        overview,
        use_case,
        deployment,
        features: FeatureAreas {
            authentication: detect_patterns(chunks, AUTH_PATTERNS, true),
            data_management: detect_patterns(chunks, DATA_PATTERNS, true),
            api_endpoints: detect_patterns(chunks, API_PATTERNS, true),
            external_integrations: detect_patterns(chunks, INTEGRATION_PATTERNS, false),
        },
        core_functions: chunks
            .iter()
            .take(10)
            .filter(|chunk| chunk.chunk_type == ChunkType::Function)
            .map(|chunk| chunk.name.clone())
            .collect(),
        validation_functions: chunk_names(chunks, |chunk| {
            let name = chunk.name.to_lowercase();
            name.contains("valid") || name.contains("check")
        }),
        feature_flags: chunk_names(chunks, |chunk| {
            chunk.name.to_lowercase().contains("flag") || chunk.content.to_lowercase().contains("feature")
        }),
        external_calls: chunk_names(chunks, |chunk| {
            let content = chunk.content.to_lowercase();
            content.contains("http") || content.contains("request")
        }),
        async_support: chunks.iter().any(|chunk| {
            let content = chunk.content.to_lowercase();
            content.contains("async") || content.contains("await")
        }),
        caching_detected: chunks
            .iter()
            .any(|chunk| chunk.content.to_lowercase().contains("cache")),
        key_files: key_files(metadata, PM_KEY_FILE_PATTERNS),
        stakeholders: stakeholders(metadata),
    }
}

fn join_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

fn average_chunk_lines(chunks: &[CodeChunk]) -> f64 {
    if chunks.is_empty() {
        return 0.0;
    }
    let total: usize = chunks.iter().map(CodeChunk::line_count).sum();
    let avg = total as f64 / chunks.len() as f64;
    (avg * 100.0).round() / 100.0
}

fn complexity_level(total_chunks: usize) -> &'static str {
    match total_chunks {
        n if n > 100 => "High",
        n if n > 50 => "Medium",
        _ => "Low",
    }
}

fn dependency_health(count: usize) -> &'static str {
    match count {
        n if n < 10 => "Healthy - few dependencies to maintain",
        n if n < 25 => "Moderate - balanced dependency footprint",
        _ => "Complex - audit for unused dependencies",
    }
}

fn architecture_pattern(frameworks: &[String]) -> &'static str {
    let has = |name: &str| frameworks.iter().any(|f| f == name);
    if has("fastapi") || has("django") || has("flask") || has("express") || has("spring") {
        "REST API service"
    } else if has("react") || has("vue") || has("angular") {
        "Component-based SPA"
    } else {
        "Custom"
    }
}

fn use_case(frameworks: &[String]) -> &'static str {
    let has = |name: &str| frameworks.iter().any(|f| f == name);
    if has("react") || has("vue") || has("angular") {
        "Web application (frontend)"
    } else if has("fastapi") || has("django") || has("flask") {
        "REST API / backend service"
    } else if has("express") {
        "Node.js web service"
    } else {
        "General-purpose application"
    }
}

fn deployment_type(metadata: &RepositoryMetadata) -> &'static str {
    if metadata
        .config_files
        .iter()
        .any(|path| path.to_lowercase().contains("docker"))
    {
        "Containerized (Docker)"
    } else {
        "Traditional server/cloud"
    }
}

fn stakeholders(metadata: &RepositoryMetadata) -> Vec<String> {
    let mut stakeholders = vec![
        "Product Owner".to_string(),
        "Engineering Lead".to_string(),
        "DevOps Team".to_string(),
    ];
    if metadata.frameworks.iter().any(|f| f == "react" || f == "vue" || f == "angular") {
        stakeholders.push("Frontend Lead".to_string());
    }
    if matches!(metadata.repo_type.as_str(), "python" | "javascript" | "typescript" | "go" | "java") {
        stakeholders.push("Backend Lead".to_string());
    }
    stakeholders
}

/// Uppercased patterns found in chunk text, in pattern-discovery order.
fn detect_patterns(chunks: &[CodeChunk], patterns: &[&str], include_name: bool) -> Vec<String> {
    let mut detected: Vec<String> = Vec::new();
    for chunk in chunks {
        let mut text = chunk.content.to_lowercase();
        if include_name {
            text.push(' ');
            text.push_str(&chunk.name.to_lowercase());
        }
        for pattern in patterns {
            let label = pattern.to_uppercase();
            if text.contains(pattern) && !detected.contains(&label) {
                detected.push(label);
            }
        }
        if detected.len() >= MAX_DETECTED {
            break;
        }
    }
    detected.truncate(MAX_DETECTED);
    detected
}

fn chunk_names(chunks: &[CodeChunk], predicate: impl Fn(&CodeChunk) -> bool) -> Vec<String> {
    chunks
        .iter()
        .filter(|chunk| predicate(*chunk))
        .map(|chunk| chunk.name.clone())
        .take(MAX_DETECTED)
        .collect()
}

fn key_files(metadata: &RepositoryMetadata, patterns: &[&str]) -> Vec<ImportantFile> {
    metadata
        .important_files_with_types
        .iter()
        .filter(|file| {
            let name = file.name.to_lowercase();
            patterns.iter().any(|pattern| name.contains(pattern))
        })
        .take(MAX_KEY_FILES)
        .cloned()
        .collect()
}
