pub mod cache;
pub mod memory;
pub mod projects;

pub use cache::{AnalysisCache, AnalysisResult};
pub use memory::{QueryResult, SearchHit, SearchIndex};
pub use projects::{ProjectHandle, ProjectStore};
