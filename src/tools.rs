//! JSON tool surface over the [`JobController`].
//!
//! Each tool has a JSON schema for discovery and a typed input. Requests are
//! decoded into the closed [`ToolCall`] enum before they touch the controller.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::AnalysisError;
use crate::insights::Persona;
use crate::jobs::JobController;
use crate::types::{AnalysisDepth, ChunkType};

const DEFAULT_CHUNK_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: json!({}),
            error: Some(message),
        }
    }

    pub fn error_with_data(data: Value) -> Self {
        Self {
            success: false,
            data,
            error: None,
        }
    }
}

impl From<AnalysisError> for ToolResult {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::NotReady(project_id) => ToolResult {
                success: false,
                data: json!({ "project_id": project_id, "retryable": true }),
                error: Some(format!("Analysis for project {} is not complete yet", project_id)),
            },
            other => ToolResult::error(other.to_string()),
        }
    }
}

/// A decoded tool request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", content = "input", rename_all = "snake_case")]
pub enum ToolCall {
    GetRepositoryMetadata(ProjectInput),
    ListChunks(ListChunksInput),
    SearchCode(SearchCodeInput),
    GetJobStatus(ProjectInput),
    PauseAnalysis(ProjectInput),
    ResumeAnalysis(ProjectInput),
    ConfigureAnalysis(ConfigureInput),
    GetPersonaAnalysis(PersonaInput),
}

impl ToolCall {
    pub const NAMES: [&'static str; 8] = [
        "get_repository_metadata",
        "list_chunks",
        "search_code",
        "get_job_status",
        "pause_analysis",
        "resume_analysis",
        "configure_analysis",
        "get_persona_analysis",
    ];

    /// Decodes `input` as the arguments of `tool_name`.
    pub fn parse(tool_name: &str, input: Value) -> Result<Self, String> {
        if !Self::NAMES.contains(&tool_name) {
            return Err(format!("Unknown tool: {}", tool_name));
        }
        let input = if input.is_null() { json!({}) } else { input };
        serde_json::from_value(json!({ "name": tool_name, "input": input }))
            .map_err(|e| format!("Invalid {} input: {}", tool_name, e))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectInput {
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListChunksInput {
    pub project_id: String,
    pub chunk_type: Option<ChunkType>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchCodeInput {
    pub project_id: String,
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfigureInput {
    pub project_id: String,
    pub depth: Option<AnalysisDepth>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersonaInput {
    pub project_id: String,
    pub persona: Persona,
}

/// Analysis tools backed by a shared controller.
#[derive(Debug, Clone)]
pub struct AnalysisTools {
    controller: JobController,
}

impl AnalysisTools {
    pub fn new(controller: JobController) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &JobController {
        &self.controller
    }

    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        let project_id = json!({
            "type": "string",
            "description": "Identifier returned when the project was created"
        });
        let project_only = json!({
            "type": "object",
            "properties": { "project_id": project_id },
            "required": ["project_id"]
        });

        vec![
            ToolSchema {
                name: "get_repository_metadata".to_string(),
                description: "Get the repository classification: languages, frameworks, entry points, dependencies and important files".to_string(),
                input_schema: project_only.clone(),
            },
            ToolSchema {
                name: "list_chunks".to_string(),
                description: "List extracted code chunks, optionally filtered by chunk type".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "project_id": project_id,
                        "chunk_type": {
                            "type": "string",
                            "enum": ["file", "function", "class", "method"],
                            "description": "Only return chunks of this type"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of chunks to return",
                            "default": DEFAULT_CHUNK_LIMIT
                        }
                    },
                    "required": ["project_id"]
                }),
            },
            ToolSchema {
                name: "search_code".to_string(),
                description: "Keyword search over chunk names, types, paths and content".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "project_id": project_id,
                        "query": {
                            "type": "string",
                            "description": "Whitespace separated search terms"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of results to return",
                            "default": self.controller.config().search.default_limit
                        }
                    },
                    "required": ["project_id", "query"]
                }),
            },
            ToolSchema {
                name: "get_job_status".to_string(),
                description: "Get status, progress and the recent activity feed of an analysis".to_string(),
                input_schema: project_only.clone(),
            },
            ToolSchema {
                name: "pause_analysis".to_string(),
                description: "Pause a running analysis at its next checkpoint".to_string(),
                input_schema: project_only.clone(),
            },
            ToolSchema {
                name: "resume_analysis".to_string(),
                description: "Resume a paused analysis".to_string(),
                input_schema: project_only,
            },
            ToolSchema {
                name: "configure_analysis".to_string(),
                description: "Change the analysis depth or sampling seed of a project".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "project_id": project_id,
                        "depth": {
                            "type": "string",
                            "enum": ["quick", "standard", "deep"]
                        },
                        "seed": {
                            "type": "integer",
                            "description": "Seed for quick-mode file sampling"
                        }
                    },
                    "required": ["project_id"]
                }),
            },
            ToolSchema {
                name: "get_persona_analysis".to_string(),
                description: "Summarize the repository for a software engineer or a product manager".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "project_id": project_id,
                        "persona": {
                            "type": "string",
                            "enum": ["sde", "pm"]
                        }
                    },
                    "required": ["project_id", "persona"]
                }),
            },
        ]
    }

    /// Runs a tool by name. Failures are reported in the returned result.
    pub async fn execute_tool(&self, tool_name: &str, input: Value) -> ToolResult {
        match ToolCall::parse(tool_name, input) {
            Ok(call) => self.execute(call).await,
            Err(message) => {
                debug!(tool = tool_name, error = %message, "Rejected tool call");
                ToolResult::error(message)
            }
        }
    }

    pub async fn execute(&self, call: ToolCall) -> ToolResult {
        let outcome = match call {
            ToolCall::GetRepositoryMetadata(input) => self.repository_metadata(input).await,
            ToolCall::ListChunks(input) => self.list_chunks(input).await,
            ToolCall::SearchCode(input) => self.search_code(input).await,
            ToolCall::GetJobStatus(input) => to_value(self.controller.status(&input.project_id)),
            ToolCall::PauseAnalysis(input) => to_value(self.controller.pause(&input.project_id)),
            ToolCall::ResumeAnalysis(input) => to_value(self.controller.resume(&input.project_id)),
            ToolCall::ConfigureAnalysis(input) => {
                to_value(self.controller.configure(&input.project_id, input.depth, input.seed))
            }
            ToolCall::GetPersonaAnalysis(input) => {
                to_value(self.controller.persona_report(&input.project_id, input.persona).await)
            }
        };

        match outcome {
            Ok(data) => ToolResult::success(data),
            Err(err) => err.into(),
        }
    }

    async fn repository_metadata(&self, input: ProjectInput) -> crate::error::Result<Value> {
        let metadata = self.controller.metadata(&input.project_id).await?;
        Ok(json!({
            "project_id": input.project_id,
            "summary": metadata.summary(),
            "metadata": metadata,
        }))
    }

    async fn list_chunks(&self, input: ListChunksInput) -> crate::error::Result<Value> {
        let limit = input.limit.unwrap_or(DEFAULT_CHUNK_LIMIT);
        let page = self
            .controller
            .chunks(&input.project_id, input.chunk_type, Some(limit))
            .await?;
        Ok(json!({
            "project_id": input.project_id,
            "total": page.total,
            "count": page.chunks.len(),
            "chunks": page.chunks,
        }))
    }

    async fn search_code(&self, input: SearchCodeInput) -> crate::error::Result<Value> {
        let hits = self
            .controller
            .search(&input.project_id, &input.query, input.limit)
            .await?;
        Ok(json!({
            "project_id": input.project_id,
            "query": input.query,
            "count": hits.len(),
            "results": hits,
        }))
    }
}

fn to_value<T: Serialize>(result: crate::error::Result<T>) -> crate::error::Result<Value> {
    Ok(serde_json::to_value(result?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use std::fs;
    use tempfile::TempDir;

    fn create_tools() -> AnalysisTools {
        AnalysisTools::new(JobController::new(AnalysisConfig::default()).unwrap())
    }

    fn create_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "# Demo\nA tiny demo app.\n").unwrap();
        fs::write(
            dir.path().join("main.py"),
            "def authenticate_user(name):\n    return name\n\nclass Session:\n    def open(self):\n        pass\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_schemas_cover_every_tool() {
        let tools = create_tools();
        let names: Vec<String> = tools.get_tool_schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ToolCall::NAMES.to_vec());
    }

    #[test]
    fn test_parse_tool_call() {
        let call = ToolCall::parse(
            "search_code",
            json!({"project_id": "p1", "query": "auth", "limit": 3}),
        )
        .unwrap();
        assert_eq!(
            call,
            ToolCall::SearchCode(SearchCodeInput {
                project_id: "p1".into(),
                query: "auth".into(),
                limit: Some(3),
            })
        );

        let call = ToolCall::parse("list_chunks", json!({"project_id": "p1", "chunk_type": "function"})).unwrap();
        assert!(matches!(
            call,
            ToolCall::ListChunks(ListChunksInput { chunk_type: Some(ChunkType::Function), .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let tools = create_tools();
        let result = tools.execute_tool("unknown_tool", json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let tools = create_tools();
        let result = tools.execute_tool("search_code", json!({"project_id": "p1"})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Invalid search_code input"));

        let result = tools.execute_tool("get_job_status", Value::Null).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_missing_project() {
        let tools = create_tools();
        let result = tools.execute_tool("get_job_status", json!({"project_id": "nope"})).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap(), "Project not found: nope");
    }

    #[test]
    fn test_not_ready_is_marked_retryable() {
        let result: ToolResult = AnalysisError::NotReady("p1".to_string()).into();
        assert!(!result.success);
        assert_eq!(result.data["retryable"], true);
    }

    #[tokio::test]
    async fn test_tools_over_completed_project() {
        let repo = create_repo();
        let tools = create_tools();
        let controller = tools.controller().clone();
        let project_id = controller.create_project("demo", &repo.path().to_string_lossy(), None);
        controller.wait_for_terminal(&project_id).await.unwrap();

        let status = tools
            .execute_tool("get_job_status", json!({ "project_id": project_id }))
            .await;
        assert!(status.success);
        assert_eq!(status.data["status"], "completed");

        let metadata = tools
            .execute_tool("get_repository_metadata", json!({ "project_id": project_id }))
            .await;
        assert!(metadata.success);
        assert_eq!(metadata.data["metadata"]["repo_type"], "python");

        let chunks = tools
            .execute_tool(
                "list_chunks",
                json!({ "project_id": project_id, "chunk_type": "method" }),
            )
            .await;
        assert!(chunks.success);
        assert_eq!(chunks.data["chunks"][0]["name"], "open");

        let search = tools
            .execute_tool("search_code", json!({ "project_id": project_id, "query": "authenticate_user" }))
            .await;
        assert!(search.success);
        assert_eq!(search.data["results"][0]["name"], "authenticate_user");

        let persona = tools
            .execute_tool("get_persona_analysis", json!({ "project_id": project_id, "persona": "pm" }))
            .await;
        assert!(persona.success);
        assert_eq!(persona.data["persona"], "pm");

        let pause = tools
            .execute_tool("pause_analysis", json!({ "project_id": project_id }))
            .await;
        assert!(!pause.success);
        assert!(pause.error.unwrap().contains("while it is completed"));
    }
}
