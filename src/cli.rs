use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::{
    cli_types::{AnalyzeArgs, ChunksArgs, PersonaArgs, ScanArgs, SearchArgs},
    config::AnalysisConfig,
    error::AnalysisError,
    insights::PersonaReport,
    jobs::JobController,
    scanner::RepositoryScanner,
    storage::SearchHit,
    types::{ActivityEntry, ActivityLevel, AnalysisOptions, CodeChunk, JobStatus, ProjectStatus, RepositoryMetadata},
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct CliApp {
    config: AnalysisConfig,
    controller: JobController,
    scanner: Arc<RepositoryScanner>,
    verbose: bool,
}

impl CliApp {
    pub fn new(config: AnalysisConfig, verbose: bool, colors_enabled: bool) -> Result<Self> {
        info!("Initializing repolens CLI");
        colored::control::set_override(colors_enabled);

        let controller = JobController::new(config.clone()).context("Failed to create job controller")?;
        let scanner = Arc::new(RepositoryScanner::new(&config.scanning));

        Ok(Self {
            config,
            controller,
            scanner,
            verbose,
        })
    }

    pub fn controller(&self) -> &JobController {
        &self.controller
    }

    /// Synchronous scan with a progress bar, no background job.
    pub async fn scan(&self, args: ScanArgs) -> Result<RepositoryMetadata> {
        let start_time = Instant::now();
        self.print_header("Repository Scan");

        let root = args
            .path
            .canonicalize()
            .with_context(|| format!("Failed to resolve path: {:?}", args.path))?;
        if self.verbose {
            self.print_info(&format!("Scanning directory: {}", root.display()));
        }

        let progress = create_progress_bar();
        let sink = {
            let progress = progress.clone();
            move |percent: f32, message: &str| {
                progress.set_position(percent as u64);
                progress.set_message(message.to_string());
                Ok::<(), AnalysisError>(())
            }
        };
        let scanner = self.scanner.clone();
        let scan_root = root.clone();
        let scan = tokio::task::spawn_blocking(move || scanner.scan(&scan_root, &sink))
            .await
            .context("Scan task panicked")?
            .with_context(|| format!("Failed to scan directory: {:?}", root))?;
        progress.finish_and_clear();

        if args.json {
            println!("{}", serde_json::to_string_pretty(&scan.metadata)?);
        } else {
            self.print_metadata(&scan.metadata);
        }
        self.print_success(&format!(
            "Scanned {} files in {:?}",
            scan.metadata.total_files,
            start_time.elapsed()
        ));
        Ok(scan.metadata)
    }

    /// Runs the full background job and renders its progress.
    pub async fn analyze(&self, args: AnalyzeArgs) -> Result<JobStatus> {
        self.print_header("Repository Analysis");

        let mut options = AnalysisOptions::default().with_depth(args.depth.unwrap_or(self.config.job.default_depth));
        if let Some(seed) = args.seed {
            options = options.with_seed(seed);
        }

        let (project_id, status) = self.run_job(&args.path, options).await?;
        if args.feed {
            self.print_feed(&status.activity_feed);
        }
        if status.status == ProjectStatus::Failed {
            anyhow::bail!(
                "Analysis failed: {}",
                status.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        let metadata = self.controller.metadata(&project_id).await?;
        self.print_metadata(&metadata);
        let warnings = status.warnings().count();
        if warnings > 0 {
            self.print_warning(&format!("{} files were skipped (run with --feed for details)", warnings));
        }

        if let Some(query) = args.query {
            let hits = self.controller.search(&project_id, &query, None).await?;
            self.print_search_results(&query, &hits);
        }
        Ok(status)
    }

    pub async fn search(&self, args: SearchArgs) -> Result<Vec<SearchHit>> {
        let project_id = self.completed_project(&args.path).await?;
        let hits = self.controller.search(&project_id, &args.query, args.limit).await?;
        self.print_search_results(&args.query, &hits);
        Ok(hits)
    }

    pub async fn chunks(&self, args: ChunksArgs) -> Result<Vec<CodeChunk>> {
        let project_id = self.completed_project(&args.path).await?;
        let page = self
            .controller
            .chunks(&project_id, args.chunk_type, Some(args.limit))
            .await?;

        self.print_header(&format!("Chunks ({} of {})", page.chunks.len(), page.total));
        for chunk in &page.chunks {
            println!(
                "  {:<8} {} {}",
                chunk.chunk_type.to_string().cyan(),
                chunk.name.bold(),
                format!("{}:{}-{}", chunk.file_path, chunk.start_line, chunk.end_line).dimmed()
            );
        }
        Ok(page.chunks)
    }

    pub async fn persona(&self, args: PersonaArgs) -> Result<PersonaReport> {
        let project_id = self.completed_project(&args.path).await?;
        let report = self.controller.persona_report(&project_id, args.persona).await?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            self.print_persona(&report);
        }
        Ok(report)
    }

    pub fn show_config(&self) -> Result<()> {
        self.print_header("Configuration");
        let toml = self.config.to_toml().context("Failed to serialize configuration")?;
        println!("{}", toml);
        if let Some(path) = AnalysisConfig::default_path() {
            self.print_info(&format!("Default config file: {}", path.display()));
        }
        Ok(())
    }

    async fn completed_project(&self, path: &Path) -> Result<String> {
        let options = AnalysisOptions::default().with_depth(self.config.job.default_depth);
        let (project_id, status) = self.run_job(path, options).await?;
        if status.status == ProjectStatus::Failed {
            anyhow::bail!(
                "Analysis failed: {}",
                status.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        Ok(project_id)
    }

    async fn run_job(&self, path: &Path, options: AnalysisOptions) -> Result<(String, JobStatus)> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let project_id = self
            .controller
            .create_project(&name, &path.to_string_lossy(), Some(options));

        let progress = create_progress_bar();
        let mut printed = 0;
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        let status = loop {
            ticker.tick().await;
            let status = self.controller.status(&project_id)?;
            progress.set_position(status.progress as u64);
            if let Some(message) = &status.status_message {
                progress.set_message(message.clone());
            }
            if self.verbose {
                for entry in status.activity_feed.iter().skip(printed) {
                    progress.println(format_entry(entry));
                }
                printed = printed.max(status.activity_feed.len());
            }
            if status.status.is_terminal() {
                break status;
            }
        };

        match status.status {
            ProjectStatus::Completed => progress.finish_with_message("Analysis complete"),
            _ => progress.abandon_with_message("Analysis failed"),
        }
        Ok((project_id, status))
    }

    fn print_metadata(&self, metadata: &RepositoryMetadata) {
        self.print_success(&metadata.summary());
        println!("  {} {}", "Type:".bold(), metadata.repo_type);
        if !metadata.frameworks.is_empty() {
            println!("  {} {}", "Frameworks:".bold(), metadata.frameworks.join(", "));
        }
        if !metadata.entry_points.is_empty() {
            println!("  {} {}", "Entry points:".bold(), metadata.entry_points.join(", "));
        }
        println!(
            "  {} {} total, {} code, {} chunks",
            "Files:".bold(),
            metadata.total_files,
            metadata.code_files,
            metadata.total_code_chunks
        );
        for (language, count) in &metadata.languages_detail {
            println!("    {}: {}", language, count);
        }
        if self.verbose {
            for (name, version) in &metadata.dependencies {
                println!("    {} {}", name.cyan(), version.dimmed());
            }
            for file in &metadata.important_files_with_types {
                println!("    {} ({}, {} KB)", file.path, file.file_type, file.size_kb);
            }
        }
        if let Some(readme) = &metadata.readme_text {
            let first = readme.lines().find(|line| !line.trim().is_empty()).unwrap_or_default();
            println!("  {} {}", "README:".bold(), first.trim().dimmed());
        }
    }

    fn print_search_results(&self, query: &str, hits: &[SearchHit]) {
        self.print_header(&format!("Search: {}", query));
        if hits.is_empty() {
            self.print_warning("No matches");
            return;
        }
        for hit in hits {
            println!(
                "  {} {} {}",
                format!("{:.2}", hit.score).green(),
                hit.name.bold(),
                format!("{}:{}", hit.file_path, hit.start_line).dimmed()
            );
            if self.verbose {
                for line in hit.content.lines().take(3) {
                    println!("      {}", line.dimmed());
                }
            }
        }
    }

    fn print_persona(&self, report: &PersonaReport) {
        self.print_header(report.title());
        println!("{}", report.overview());
        match report {
            PersonaReport::Sde(sde) => {
                println!("  {} {}", "Architecture:".bold(), sde.architecture.pattern);
                println!(
                    "  {} {} chunks, avg {} lines, complexity {}",
                    "Metrics:".bold(),
                    sde.metrics.total_chunks,
                    sde.metrics.avg_chunk_lines,
                    sde.complexity_level
                );
                println!("  {} {}", "Dependencies:".bold(), sde.dependency_health);
                for recommendation in &sde.recommendations {
                    println!("  - {}", recommendation);
                }
            }
            PersonaReport::Pm(pm) => {
                println!("  {} {}", "Use case:".bold(), pm.use_case);
                println!("  {} {}", "Stakeholders:".bold(), pm.stakeholders.join(", "));
            }
        }
    }

    fn print_feed(&self, feed: &[ActivityEntry]) {
        self.print_header("Activity");
        for entry in feed {
            println!("{}", format_entry(entry));
        }
    }

    fn print_header(&self, title: &str) {
        println!("\n{}", title.bold().underline());
    }

    fn print_success(&self, message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    fn print_info(&self, message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }

    fn print_warning(&self, message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }
}

fn create_progress_bar() -> ProgressBar {
    let progress = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

fn format_entry(entry: &ActivityEntry) -> String {
    let level = match entry.level {
        ActivityLevel::Info => "INFO".blue(),
        ActivityLevel::Warn => "WARN".yellow(),
        ActivityLevel::Error => "ERROR".red(),
    };
    format!(
        "  {} {:<5} {}",
        entry.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level,
        entry.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::Persona;
    use crate::types::ChunkType;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_app() -> CliApp {
        CliApp::new(AnalysisConfig::default(), false, false).unwrap()
    }

    fn create_test_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "# Demo\nA tiny demo app.\n").unwrap();
        fs::write(dir.path().join("requirements.txt"), "flask==2.0.1\n").unwrap();
        fs::write(
            dir.path().join("main.py"),
            "def authenticate_user(name):\n    return name\n\ndef run():\n    pass\n",
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_scan_directory() {
        let repo = create_test_repo();
        let app = create_test_app();
        let metadata = app
            .scan(ScanArgs {
                path: repo.path().to_path_buf(),
                json: false,
            })
            .await
            .unwrap();
        assert_eq!(metadata.repo_type, "python");
        assert_eq!(metadata.total_code_chunks, 2);
    }

    #[tokio::test]
    async fn test_scan_missing_directory() {
        let app = create_test_app();
        let result = app
            .scan(ScanArgs {
                path: PathBuf::from("/definitely/not/here"),
                json: true,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_analyze_command() {
        let repo = create_test_repo();
        let app = create_test_app();
        let status = app
            .analyze(AnalyzeArgs {
                path: repo.path().to_path_buf(),
                depth: None,
                seed: None,
                query: Some("run".to_string()),
                feed: true,
            })
            .await
            .unwrap();
        assert_eq!(status.status, ProjectStatus::Completed);
        assert_eq!(status.progress, 100.0);
    }

    #[tokio::test]
    async fn test_analyze_missing_directory_fails() {
        let app = create_test_app();
        let result = app
            .analyze(AnalyzeArgs {
                path: PathBuf::from("/definitely/not/here"),
                depth: None,
                seed: None,
                query: None,
                feed: false,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_search_and_chunks() {
        let repo = create_test_repo();
        let app = create_test_app();

        let hits = app
            .search(SearchArgs {
                path: repo.path().to_path_buf(),
                query: "authenticate_user".to_string(),
                limit: Some(5),
            })
            .await
            .unwrap();
        assert_eq!(hits[0].name, "authenticate_user");

        let chunks = app
            .chunks(ChunksArgs {
                path: repo.path().to_path_buf(),
                chunk_type: Some(ChunkType::Function),
                limit: 1,
            })
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_persona_command() {
        let repo = create_test_repo();
        let app = create_test_app();
        let report = app
            .persona(PersonaArgs {
                path: repo.path().to_path_buf(),
                persona: Persona::Sde,
                json: false,
            })
            .await
            .unwrap();
        assert!(matches!(report, PersonaReport::Sde(_)));
    }

    #[test]
    fn test_config_display() {
        let app = create_test_app();
        assert!(app.show_config().is_ok());
    }
}
