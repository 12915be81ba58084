use std::path::PathBuf;
use thiserror::Error;

use crate::types::project::ProjectStatus;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Repository root does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Cannot {action} project {project_id} while it is {status}")]
    InvalidState {
        project_id: String,
        status: ProjectStatus,
        action: &'static str,
    },

    #[error("Analysis for project {0} is not complete yet")]
    NotReady(String),

    #[error("Analysis for project {project_id} failed: {message}")]
    AnalysisFailed { project_id: String, message: String },

    #[error("Repository acquisition failed: {0}")]
    Acquisition(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Pattern error: {0}")]
    Pattern(#[from] globset::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Progress sink rejected update: {0}")]
    Sink(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl AnalysisError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors the caller can retry later without changing anything.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotReady(_))
    }
}
