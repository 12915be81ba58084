//! Repository analysis: classification, chunk extraction, keyword search and
//! pausable background analysis jobs.

pub mod analyzers;
pub mod cli;
pub mod cli_types;
pub mod config;
pub mod error;
pub mod insights;
pub mod jobs;
pub mod logging;
pub mod scanner;
pub mod storage;
pub mod tools;
pub mod types;

// Re-export commonly used types
pub use types::*;
pub use analyzers::{ChunkExtractor, Classification, Classifier, Language};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
pub use insights::{Persona, PersonaReport};
pub use jobs::{ChunkPage, JobController, JobControllerBuilder, LocalDirectorySource, RepositorySource};
pub use scanner::{ProgressSink, RepositoryScanner, ScanResult};
pub use storage::{AnalysisCache, AnalysisResult, ProjectStore, SearchHit, SearchIndex};
pub use tools::{AnalysisTools, ToolCall, ToolResult, ToolSchema};
pub use cli::CliApp;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
