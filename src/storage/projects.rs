use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::error::{AnalysisError, Result};
use crate::jobs::pause::PauseGate;
use crate::types::ProjectRecord;

/// A registered project: its record plus the signals its pipeline listens to.
#[derive(Debug)]
pub struct ProjectHandle {
    record: RwLock<ProjectRecord>,
    pub gate: PauseGate,
    finished: Notify,
    deleted: AtomicBool,
}

impl ProjectHandle {
    fn new(record: ProjectRecord) -> Self {
        Self {
            record: RwLock::new(record),
            gate: PauseGate::new(),
            finished: Notify::new(),
            deleted: AtomicBool::new(false),
        }
    }

    /// Consistent copy of the record.
    pub fn snapshot(&self) -> ProjectRecord {
        self.record.read().clone()
    }

    /// Applies `f` under the write lock; wakes waiters if the record became terminal.
    pub fn update<R>(&self, f: impl FnOnce(&mut ProjectRecord) -> R) -> R {
        let (result, terminal) = {
            let mut record = self.record.write();
            let result = f(&mut record);
            (result, record.is_terminal())
        };
        if terminal {
            self.finished.notify_waiters();
        }
        result
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    fn mark_deleted(&self) {
        {
            // Serializes with a publish running under the write lock
            let _record = self.record.write();
            self.deleted.store(true, Ordering::Release);
        }
        self.gate.resume();
        self.finished.notify_waiters();
    }

    /// Resolves once the record is terminal or the project is deleted.
    pub async fn finished(&self) {
        loop {
            let notified = self.finished.notified();
            if self.is_deleted() || self.record.read().is_terminal() {
                return;
            }
            notified.await;
        }
    }
}

/// Project records keyed by id.
#[derive(Debug, Default)]
pub struct ProjectStore {
    projects: DashMap<String, Arc<ProjectHandle>>,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: ProjectRecord) -> Arc<ProjectHandle> {
        let id = record.project_id.clone();
        let handle = Arc::new(ProjectHandle::new(record));
        self.projects.insert(id, handle.clone());
        handle
    }

    pub fn get(&self, project_id: &str) -> Result<Arc<ProjectHandle>> {
        self.projects
            .get(project_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AnalysisError::ProjectNotFound(project_id.to_string()))
    }

    pub fn snapshot(&self, project_id: &str) -> Result<ProjectRecord> {
        Ok(self.get(project_id)?.snapshot())
    }

    pub fn update<R>(&self, project_id: &str, f: impl FnOnce(&mut ProjectRecord) -> R) -> Result<R> {
        Ok(self.get(project_id)?.update(f))
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.projects.contains_key(project_id)
    }

    /// Drops the project and releases a pipeline parked on its gate.
    pub fn remove(&self, project_id: &str) -> Result<Arc<ProjectHandle>> {
        let (_, handle) = self
            .projects
            .remove(project_id)
            .ok_or_else(|| AnalysisError::ProjectNotFound(project_id.to_string()))?;
        handle.mark_deleted();
        Ok(handle)
    }

    /// Snapshots of every project, oldest first.
    pub fn list(&self) -> Vec<ProjectRecord> {
        let mut records: Vec<ProjectRecord> = self
            .projects
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.project_id.cmp(&b.project_id)));
        records
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisOptions, ProjectStatus};
    use std::time::Duration;

    fn record(id: &str) -> ProjectRecord {
        ProjectRecord::new(id, "demo", "/tmp/demo", AnalysisOptions::default())
    }

    #[test]
    fn test_update_and_snapshot() {
        let store = ProjectStore::new();
        store.insert(record("p1"));

        store.update("p1", |r| r.begin_analysis()).unwrap();
        let snapshot = store.snapshot("p1").unwrap();
        assert_eq!(snapshot.status, ProjectStatus::Analyzing);

        assert!(matches!(
            store.snapshot("missing"),
            Err(AnalysisError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_remove_marks_handle_deleted() {
        let store = ProjectStore::new();
        let handle = store.insert(record("p1"));
        handle.gate.pause();

        store.remove("p1").unwrap();
        assert!(handle.is_deleted());
        assert!(!handle.gate.is_paused());
        assert!(!store.contains("p1"));
        assert!(store.remove("p1").is_err());
    }

    #[tokio::test]
    async fn test_finished_wakes_on_terminal_update() {
        let store = ProjectStore::new();
        let handle = store.insert(record("p1"));
        handle.update(|r| r.begin_analysis());

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.finished().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.update(|r| r.complete("done"));

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
