use globset::{GlobBuilder, GlobMatcher};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

use super::Language;
use crate::config::ScanningConfig;
use crate::error::Result;
use crate::scanner::discovery::{read_lossy, FileEntry};
use crate::types::truncate_chars;

const MAX_ENTRY_POINTS: usize = 5;
const MAX_CONFIG_FILES: usize = 10;
const MAX_DEPENDENCIES: usize = 20;
const README_SUMMARY_CHARS: usize = 1000;

pub const README_CANDIDATES: &[&str] = &["README.md", "README.rst", "README.txt", "README"];

const CONFIG_CANDIDATES: &[&str] = &[
    "requirements.txt",
    "package.json",
    "pyproject.toml",
    "setup.py",
    "Dockerfile",
    ".env",
    ".env.example",
    "config.yaml",
    "config.json",
    "pom.xml",
    "build.gradle",
    "go.mod",
    "Cargo.toml",
    "tsconfig.json",
];

const PYTHON_MANIFESTS: &[&str] = &["requirements.txt", "setup.py", "pyproject.toml"];

static PINNED_REQUIREMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z0-9_-]+)\s*==\s*([0-9.]+)").expect("Invalid regex"));

struct FrameworkRule {
    name: &'static str,
    /// Case-insensitive content markers.
    markers: &'static [&'static str],
    /// Manifest package names that imply the framework.
    packages: &'static [&'static str],
}

const FRAMEWORKS: &[FrameworkRule] = &[
    FrameworkRule {
        name: "fastapi",
        markers: &["from fastapi import", "import fastapi", "FastAPI()"],
        packages: &["fastapi"],
    },
    FrameworkRule {
        name: "django",
        markers: &["from django", "import django"],
        packages: &["django"],
    },
    FrameworkRule {
        name: "flask",
        markers: &["from flask import", "import flask", "Flask("],
        packages: &["flask"],
    },
    FrameworkRule {
        name: "react",
        markers: &["import React", "from 'react'", "from \"react\"", "React."],
        packages: &["react", "react-dom"],
    },
    FrameworkRule {
        name: "vue",
        markers: &["import Vue", "from 'vue'", "from \"vue\"", "Vue."],
        packages: &["vue"],
    },
    FrameworkRule {
        name: "angular",
        markers: &["@angular"],
        packages: &["@angular/core"],
    },
    FrameworkRule {
        name: "express",
        markers: &["const express", "import express", "require(\"express\")", "require('express')"],
        packages: &["express"],
    },
    FrameworkRule {
        name: "spring",
        markers: &["org.springframework", "@SpringBootApplication"],
        packages: &[],
    },
];

/// Canonical entry-point filenames per repository type.
fn entry_candidates(repo_type: &str) -> &'static [&'static str] {
    match repo_type {
        "python" => &[
            "main.py",
            "app.py",
            "setup.py",
            "requirements.txt",
            "pyproject.toml",
            "__main__.py",
            "manage.py",
            "wsgi.py",
        ],
        "javascript" => &[
            "index.js",
            "server.js",
            "app.js",
            "package.json",
            "webpack.config.js",
            ".babelrc",
            "tsconfig.json",
        ],
        "typescript" => &["index.ts", "main.ts", "server.ts", "app.ts", "package.json", "tsconfig.json"],
        "java" => &["Main.java", "Application.java", "pom.xml", "build.gradle"],
        "go" => &["main.go", "go.mod", "go.sum"],
        "rust" => &["main.rs", "lib.rs", "Cargo.toml"],
        _ => &[],
    }
}

/// Everything the classifier learns about a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub languages: BTreeMap<String, usize>,
    pub repo_type: String,
    pub frameworks: Vec<String>,
    pub entry_points: Vec<String>,
    pub config_files: Vec<String>,
    pub dependencies: BTreeMap<String, String>,
    /// Relative path of the primary README.
    pub readme_path: Option<String>,
    pub readme_text: Option<String>,
}

impl Classification {
    pub fn code_files(&self) -> usize {
        self.languages.values().sum()
    }
}

/// Inventories languages, frameworks, entry points, configs and dependencies.
#[derive(Debug, Clone)]
pub struct Classifier {
    max_framework_files: usize,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ScanningConfig::default())
    }
}

impl Classifier {
    pub fn new(config: &ScanningConfig) -> Self {
        Self {
            max_framework_files: config.max_framework_files,
        }
    }

    /// Runs every classification step over an already-walked file list.
    pub fn classify(&self, root: &Path, files: &[FileEntry]) -> Result<Classification> {
        let languages = count_languages(files);
        let repo_type = determine_repo_type(&languages, files);
        let readme = find_readme(files);
        let readme_text = readme.and_then(|entry| readme_summary(&entry.path));
        let frameworks = self.detect_frameworks(root, files, readme_text.as_deref());
        let entry_points = find_entry_points(&repo_type, files)?;
        let config_files = find_config_files(files)?;
        let dependencies = parse_dependencies(root, &repo_type);

        Ok(Classification {
            languages,
            repo_type,
            frameworks,
            entry_points,
            config_files,
            dependencies,
            readme_path: readme.map(|entry| entry.relative_path.clone()),
            readme_text,
        })
    }

    /// Marker search over the first source files, plus manifest packages and README mentions.
    pub fn detect_frameworks(&self, root: &Path, files: &[FileEntry], readme: Option<&str>) -> Vec<String> {
        let sources: Vec<&FileEntry> = files
            .iter()
            .filter(|entry| entry.is_source())
            .take(self.max_framework_files)
            .collect();

        let mut found: BTreeSet<&'static str> = sources
            .par_iter()
            .filter_map(|entry| read_lossy(&entry.path))
            .flat_map_iter(|content| {
                let lowered = content.to_lowercase();
                FRAMEWORKS
                    .iter()
                    .filter(|rule| {
                        rule.markers
                            .iter()
                            .any(|marker| lowered.contains(&marker.to_lowercase()))
                    })
                    .map(|rule| rule.name)
                    .collect::<Vec<_>>()
            })
            .collect();

        let packages = manifest_packages(root);
        for rule in FRAMEWORKS {
            if rule.packages.iter().any(|pkg| packages.contains(*pkg)) {
                found.insert(rule.name);
            }
        }

        if let Some(readme) = readme {
            let lowered = readme.to_lowercase();
            for rule in FRAMEWORKS {
                if lowered.contains(rule.name) {
                    found.insert(rule.name);
                }
            }
        }

        debug!(scanned = sources.len(), frameworks = ?found, "Detected frameworks");
        found.into_iter().map(str::to_string).collect()
    }
}

/// Per-language file counts. A shared extension counts for every language claiming it.
pub fn count_languages(files: &[FileEntry]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for entry in files {
        if let Some(ext) = entry.extension() {
            for language in Language::all_for_extension(&ext) {
                *counts.entry(language.key().to_string()).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Highest-count language, ties broken by registry order; manifests are the fallback.
pub fn determine_repo_type(languages: &BTreeMap<String, usize>, files: &[FileEntry]) -> String {
    let mut best: Option<(Language, usize)> = None;
    for language in Language::ALL {
        let count = languages.get(language.key()).copied().unwrap_or(0);
        if count > 0 && best.map_or(true, |(_, top)| count > top) {
            best = Some((language, count));
        }
    }
    if let Some((language, _)) = best {
        return language.key().to_string();
    }

    let has = |name: &str| files.iter().any(|entry| entry.file_name() == name);
    let inferred = if has("requirements.txt") || has("pyproject.toml") {
        "python"
    } else if has("package.json") {
        "javascript"
    } else if has("pom.xml") || has("build.gradle") {
        "java"
    } else if has("go.mod") {
        "go"
    } else if has("Cargo.toml") {
        "rust"
    } else {
        "unknown"
    };
    inferred.to_string()
}

/// The README closest to the root; ties go to candidate order, then path.
pub fn find_readme(files: &[FileEntry]) -> Option<&FileEntry> {
    files
        .iter()
        .filter_map(|entry| {
            README_CANDIDATES
                .iter()
                .position(|candidate| *candidate == entry.file_name())
                .map(|rank| (entry, rank))
        })
        .min_by(|(a, a_rank), (b, b_rank)| {
            a.depth()
                .cmp(&b.depth())
                .then(a_rank.cmp(b_rank))
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        })
        .map(|(entry, _)| entry)
}

/// First non-heading paragraph of a README, capped at 1000 characters.
pub fn readme_summary(path: &Path) -> Option<String> {
    let raw = read_lossy(path)?;
    summarize_readme(&raw)
}

pub fn summarize_readme(raw: &str) -> Option<String> {
    let mut paragraph: Vec<&str> = Vec::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            continue;
        }
        if trimmed.is_empty() {
            if !paragraph.is_empty() {
                break;
            }
            continue;
        }
        paragraph.push(trimmed);
    }

    if paragraph.is_empty() {
        return None;
    }
    let text = paragraph.join("\n");
    Some(truncate_chars(&text, README_SUMMARY_CHARS).to_string())
}

pub fn find_entry_points(repo_type: &str, files: &[FileEntry]) -> Result<Vec<String>> {
    match_candidates(entry_candidates(repo_type), files, MAX_ENTRY_POINTS)
}

pub fn find_config_files(files: &[FileEntry]) -> Result<Vec<String>> {
    match_candidates(CONFIG_CANDIDATES, files, MAX_CONFIG_FILES)
}

/// Files matching `**/<candidate>`, in candidate order then path order.
fn match_candidates(candidates: &[&str], files: &[FileEntry], cap: usize) -> Result<Vec<String>> {
    let matchers = candidates
        .iter()
        .map(|name| candidate_matcher(name))
        .collect::<Result<Vec<_>>>()?;

    let mut found: Vec<String> = Vec::new();
    for matcher in &matchers {
        for entry in files {
            if found.len() >= cap {
                return Ok(found);
            }
            if matcher.is_match(&entry.relative_path) && !found.contains(&entry.relative_path) {
                found.push(entry.relative_path.clone());
            }
        }
    }
    Ok(found)
}

fn candidate_matcher(name: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(&format!("**/{}", name))
        .literal_separator(true)
        .build()?;
    Ok(glob.compile_matcher())
}

/// Pinned Python requirements or root `package.json` dependencies, capped at 20.
pub fn parse_dependencies(root: &Path, repo_type: &str) -> BTreeMap<String, String> {
    match repo_type {
        "python" => python_requirements(root),
        "javascript" | "typescript" => package_json_section(root, "dependencies"),
        _ => BTreeMap::new(),
    }
}

fn python_requirements(root: &Path) -> BTreeMap<String, String> {
    let mut dependencies = BTreeMap::new();
    for manifest in PYTHON_MANIFESTS {
        let path = root.join(manifest);
        if !path.is_file() {
            continue;
        }
        let Some(content) = read_lossy(&path) else {
            continue;
        };
        for caps in PINNED_REQUIREMENT.captures_iter(&content) {
            if dependencies.len() >= MAX_DEPENDENCIES {
                return dependencies;
            }
            dependencies
                .entry(caps[1].to_string())
                .or_insert_with(|| caps[2].to_string());
        }
    }
    dependencies
}

fn package_json_section(root: &Path, section: &str) -> BTreeMap<String, String> {
    let Some(manifest) = read_package_json(root) else {
        return BTreeMap::new();
    };
    manifest
        .get(section)
        .and_then(|value| value.as_object())
        .map(|deps| {
            deps.iter()
                .take(MAX_DEPENDENCIES)
                .map(|(name, version)| {
                    let version = version
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| version.to_string());
                    (name.clone(), version)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn read_package_json(root: &Path) -> Option<serde_json::Value> {
    let path = root.join("package.json");
    if !path.is_file() {
        return None;
    }
    let content = read_lossy(&path)?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "Ignoring malformed package.json");
            None
        }
    }
}

/// Lowercased package names declared by root manifests, whatever the repo type.
fn manifest_packages(root: &Path) -> BTreeSet<String> {
    let mut packages: BTreeSet<String> = BTreeSet::new();
    if let Some(manifest) = read_package_json(root) {
        for section in ["dependencies", "devDependencies"] {
            if let Some(deps) = manifest.get(section).and_then(|v| v.as_object()) {
                packages.extend(deps.keys().map(|name| name.to_lowercase()));
            }
        }
    }
    packages.extend(python_requirements(root).into_keys().map(|name| name.to_lowercase()));
    packages
}
