use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AnalysisError, Result};
use crate::types::AnalysisDepth;

const ENV_PREFIX: &str = "REPOLENS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub scanning: ScanningConfig,
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    pub max_important_files: usize,
    pub max_extracted_files: usize,
    pub max_ranked_source_files: usize,
    pub max_framework_files: usize,
    pub max_chunks_per_file: usize,
    pub max_chunk_chars: usize,
    pub extra_skip_patterns: Vec<String>,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            max_important_files: 50,
            max_extracted_files: 20,
            max_ranked_source_files: 30,
            max_framework_files: 300,
            max_chunks_per_file: 50,
            max_chunk_chars: 2000,
            extra_skip_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub default_depth: AnalysisDepth,
    /// Probability that quick mode keeps a non-essential file.
    pub quick_keep_probability: f64,
    pub sampling_seed: Option<u64>,
    /// Pause inserted between pipeline phases.
    pub phase_delay_ms: u64,
    pub activity_feed_limit: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            default_depth: AnalysisDepth::Standard,
            quick_keep_probability: 0.5,
            sampling_seed: None,
            phase_delay_ms: 0,
            activity_feed_limit: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub preview_chars: usize,
    pub max_keywords_per_chunk: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            preview_chars: 200,
            max_keywords_per_chunk: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AnalysisConfig {
    /// Layers defaults, an optional TOML file and `REPOLENS__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_path = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        if let Some(file_path) = file_path {
            builder = builder.add_source(File::from(file_path).required(path.is_some()));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AnalysisConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "repolens", "repolens")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        let scanning = &self.scanning;
        if scanning.max_important_files == 0
            || scanning.max_extracted_files == 0
            || scanning.max_chunks_per_file == 0
            || scanning.max_chunk_chars == 0
        {
            return Err(AnalysisError::InvalidConfig(
                "scanning limits must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.job.quick_keep_probability) {
            return Err(AnalysisError::InvalidConfig(format!(
                "job.quick_keep_probability must be within [0, 1], got {}",
                self.job.quick_keep_probability
            )));
        }
        if self.job.activity_feed_limit == 0 {
            return Err(AnalysisError::InvalidConfig(
                "job.activity_feed_limit must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
