// Integration test for the public API
use repolens::{
    AnalysisConfig, AnalysisError, AnalysisTools, ChunkType, JobController, JobControllerBuilder, Persona,
    PersonaReport, ProjectStatus, RepositoryScanner, Result, ScanResult, ToolResult, ToolSchema, VERSION,
};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn create_demo_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("README.md"), "# Demo\n\nA tiny demo app.\n").unwrap();
    fs::write(
        dir.path().join("main.py"),
        "def run():\n    print('start')\n    value = 1\n    value += 1\n    value += 2\n    value += 3\n    value += 4\n    value += 5\n    print(value)\n    return value\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_public_api_exports() {
    let _version: &str = VERSION;

    let builder: JobControllerBuilder = JobController::builder();
    let controller: Result<JobController> = builder.build();
    let tools = AnalysisTools::new(controller.unwrap());

    let _schemas: Vec<ToolSchema> = tools.get_tool_schemas();
    let _error = AnalysisError::NotReady("p1".to_string());
    let _result = ToolResult::success(json!({}));
}

#[test]
fn test_version_constant() {
    assert!(!VERSION.is_empty());
    assert!(VERSION.contains('.'));
}

#[test]
fn test_builder_rejects_invalid_config() {
    let mut config = AnalysisConfig::default();
    config.job.quick_keep_probability = 1.5;
    let result = JobController::builder().config(config).build();
    assert!(matches!(result, Err(AnalysisError::InvalidConfig(_))));
}

#[test]
fn test_scanner_demo_scenario() {
    let repo = create_demo_repo();
    let scanner = RepositoryScanner::default();
    let ScanResult { metadata, chunks } = scanner.scan(repo.path(), &repolens::scanner::NoopSink).unwrap();

    assert_eq!(metadata.repo_type, "python");
    assert_eq!(metadata.entry_points, vec!["main.py"]);
    assert_eq!(metadata.readme_text.as_deref(), Some("A tiny demo app."));
    assert_eq!(metadata.important_files[0], "README.md");
    assert_eq!(metadata.total_code_chunks, chunks.len());
    assert_eq!(metadata.code_files, metadata.languages_detail.values().sum::<usize>());

    assert_eq!(chunks.len(), 1);
    let run = &chunks[0];
    assert_eq!(run.chunk_type, ChunkType::Function);
    assert_eq!(run.name, "run");
    assert_eq!((run.start_line, run.end_line), (1, 10));
}

#[tokio::test]
async fn test_tool_definitions_structure() {
    let tools = AnalysisTools::new(JobController::builder().build().unwrap());
    let schemas = tools.get_tool_schemas();

    let names: Vec<&str> = schemas.iter().map(|t| t.name.as_str()).collect();
    for expected in [
        "get_repository_metadata",
        "list_chunks",
        "search_code",
        "get_job_status",
        "pause_analysis",
        "resume_analysis",
        "configure_analysis",
        "get_persona_analysis",
    ] {
        assert!(names.contains(&expected), "missing tool {}", expected);
    }

    for tool in &schemas {
        assert!(!tool.description.is_empty());
        assert!(tool.input_schema.is_object());
        assert_eq!(tool.input_schema["required"][0], "project_id");
    }
}

#[tokio::test]
async fn test_execute_tool_interface() {
    let repo = create_demo_repo();
    let controller = JobController::builder().build().unwrap();
    let tools = AnalysisTools::new(controller.clone());

    let result = tools.execute_tool("invalid_tool", json!({})).await;
    assert!(!result.success);
    assert!(result.error.is_some());

    let project_id = controller.create_project("demo", &repo.path().to_string_lossy(), None);
    let status = controller.wait_for_terminal(&project_id).await.unwrap();
    assert_eq!(status.status, ProjectStatus::Completed);

    let result = tools
        .execute_tool("list_chunks", json!({ "project_id": project_id, "limit": 5 }))
        .await;
    assert!(result.success);
    assert_eq!(result.data["total"], 1);
    assert_eq!(result.data["chunks"][0]["name"], "run");
}

#[tokio::test]
async fn test_persona_reports_from_controller() {
    let repo = create_demo_repo();
    let controller = JobController::builder().build().unwrap();
    let project_id = controller.create_project("demo", &repo.path().to_string_lossy(), None);
    controller.wait_for_terminal(&project_id).await.unwrap();

    let sde = controller.persona_report(&project_id, Persona::Sde).await.unwrap();
    assert!(matches!(sde, PersonaReport::Sde(_)));
    assert!(!sde.overview().is_empty());

    let pm = controller.persona_report(&project_id, Persona::Pm).await.unwrap();
    let value = serde_json::to_value(&pm).unwrap();
    assert_eq!(value["persona"], "pm");
}
