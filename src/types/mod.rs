pub mod chunk;
pub mod metadata;
pub mod project;

pub use chunk::{truncate_chars, ChunkType, CodeChunk};
pub use metadata::{ImportantFile, RepositoryMetadata, DEFAULT_CONFIDENCE};
pub use project::{
    ActivityEntry, ActivityLevel, AnalysisDepth, AnalysisOptions, JobStatus, ProjectRecord,
    ProjectStatus,
};
