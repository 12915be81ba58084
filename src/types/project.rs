use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Created,
    Analyzing,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Failed)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectStatus::Created => "created",
            ProjectStatus::Analyzing => "analyzing",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub level: ActivityLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// How exhaustively the preprocessing phase walks the important files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    Quick,
    #[default]
    Standard,
    Deep,
}

impl AnalysisDepth {
    pub fn samples_files(&self) -> bool {
        matches!(self, AnalysisDepth::Quick)
    }
}

impl fmt::Display for AnalysisDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalysisDepth::Quick => "quick",
            AnalysisDepth::Standard => "standard",
            AnalysisDepth::Deep => "deep",
        };
        f.write_str(s)
    }
}

impl FromStr for AnalysisDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quick" => Ok(AnalysisDepth::Quick),
            "standard" => Ok(AnalysisDepth::Standard),
            "deep" => Ok(AnalysisDepth::Deep),
            other => Err(format!("unknown analysis depth: {}", other)),
        }
    }
}

/// User-adjustable analysis settings stored on the project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(default)]
    pub depth: AnalysisDepth,
    /// Fixes the quick-mode sampling sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl AnalysisOptions {
    pub fn with_depth(mut self, depth: AnalysisDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Job-facing subset of a project record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_id: String,
    pub name: String,
    /// Acquisition target handed to the repository source.
    pub source: String,
    pub options: AnalysisOptions,
    pub status: ProjectStatus,
    pub paused: bool,
    pub progress: f32,
    pub status_message: Option<String>,
    pub activity_feed: Vec<ActivityEntry>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn new(
        project_id: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<String>,
        options: AnalysisOptions,
    ) -> Self {
        let now = Utc::now();
        Self {
            project_id: project_id.into(),
            name: name.into(),
            source: source.into(),
            options,
            status: ProjectStatus::Created,
            paused: false,
            progress: 0.0,
            status_message: None,
            activity_feed: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn log(&mut self, level: ActivityLevel, message: impl Into<String>, file: Option<&str>) {
        self.activity_feed.push(ActivityEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            file: file.map(str::to_string),
        });
        self.touch();
    }

    /// Raises progress; lower values and updates after a terminal state are ignored.
    pub fn advance(&mut self, progress: f32) {
        if self.is_terminal() {
            return;
        }
        let clamped = progress.clamp(0.0, 100.0);
        if clamped > self.progress {
            self.progress = clamped;
        }
        self.touch();
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.touch();
    }

    pub fn begin_analysis(&mut self) {
        self.status = ProjectStatus::Analyzing;
        self.progress = 0.0;
        self.status_message = Some("Initializing analysis...".to_string());
        self.touch();
    }

    pub fn complete(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        let message = message.into();
        self.progress = 100.0;
        self.status = ProjectStatus::Completed;
        self.paused = false;
        self.status_message = Some(message.clone());
        self.log(ActivityLevel::Info, message, None);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        let error = error.into();
        self.progress = 100.0;
        self.status = ProjectStatus::Failed;
        self.paused = false;
        self.status_message = Some(format!("Error: {}", error));
        self.log(ActivityLevel::Error, format!("Analysis failed: {}", error), None);
        self.error = Some(error);
    }

    pub fn status_view(&self, feed_limit: usize) -> JobStatus {
        let skip = self.activity_feed.len().saturating_sub(feed_limit);
        JobStatus {
            project_id: self.project_id.clone(),
            status: self.status,
            paused: self.paused,
            progress: self.progress,
            status_message: self.status_message.clone(),
            activity_feed: self.activity_feed[skip..].to_vec(),
            error: self.error.clone(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Snapshot answered to status polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub project_id: String,
    pub status: ProjectStatus,
    pub paused: bool,
    pub progress: f32,
    pub status_message: Option<String>,
    pub activity_feed: Vec<ActivityEntry>,
    pub error: Option<String>,
}

impl JobStatus {
    pub fn warnings(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.activity_feed
            .iter()
            .filter(|entry| entry.level == ActivityLevel::Warn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ProjectRecord {
        let mut record = ProjectRecord::new("p1", "demo", "/tmp/demo", AnalysisOptions::default());
        record.begin_analysis();
        record
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut record = record();
        record.advance(30.0);
        record.advance(10.0);
        assert_eq!(record.progress, 30.0);
        record.advance(250.0);
        assert_eq!(record.progress, 100.0);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut record = record();
        record.fail("boom");
        assert_eq!(record.status, ProjectStatus::Failed);
        assert_eq!(record.progress, 100.0);
        assert_eq!(record.error.as_deref(), Some("boom"));

        record.complete("done");
        assert_eq!(record.status, ProjectStatus::Failed);
        record.advance(5.0);
        assert_eq!(record.progress, 100.0);
    }

    #[test]
    fn test_status_view_keeps_most_recent_entries() {
        let mut record = record();
        for i in 0..10 {
            record.log(ActivityLevel::Info, format!("step {}", i), None);
        }
        let view = record.status_view(3);
        assert_eq!(view.activity_feed.len(), 3);
        assert_eq!(view.activity_feed[0].message, "step 7");
        assert_eq!(view.activity_feed[2].message, "step 9");
    }

    #[test]
    fn test_depth_parsing() {
        assert_eq!("QUICK".parse::<AnalysisDepth>().unwrap(), AnalysisDepth::Quick);
        assert!("shallow".parse::<AnalysisDepth>().is_err());
        assert!(AnalysisDepth::Quick.samples_files());
        assert!(!AnalysisDepth::Deep.samples_files());
    }
}
