use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use thiserror::Error;

use crate::jobs::types::{JobRecord, JobStatus};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Job {0} already exists")]
    DuplicateJob(String),

    #[error("Job {0} not found")]
    NotFound(String),

    #[error("Job {id} is already {status:?} and cannot transition again")]
    InvalidTransition { id: String, status: JobStatus },
}

/// Process-wide map of job id to job record; the single source of truth
/// for status queries.
///
/// Held in memory only: jobs are lost on process restart. The map write
/// lock is taken only when inserting a new job; terminal transitions
/// take the map read lock plus the write lock of the one record they
/// own, so transitions on different jobs never contend and a reader
/// always sees a whole record.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Arc<RwLock<JobRecord>>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, record: JobRecord) -> Result<(), RegistryError> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&record.id) {
            return Err(RegistryError::DuplicateJob(record.id));
        }
        jobs.insert(record.id.clone(), Arc::new(RwLock::new(record)));
        Ok(())
    }

    /// Returns a snapshot of the record, or `None` for an unknown id.
    pub fn get(&self, id: &str) -> Option<JobRecord> {
        let entry = self.jobs.read().unwrap().get(id).cloned()?;
        let record = entry.read().unwrap().clone();
        Some(record)
    }

    pub fn mark_completed(&self, id: &str, artifact_path: PathBuf) -> Result<(), RegistryError> {
        self.transition(id, |record| {
            record.status = JobStatus::Completed;
            record.artifact_path = Some(artifact_path);
        })
    }

    pub fn mark_failed(&self, id: &str, detail: String) -> Result<(), RegistryError> {
        self.transition(id, |record| {
            record.status = JobStatus::Failed;
            record.error_detail = Some(detail);
        })
    }

    fn transition<F>(&self, id: &str, apply: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut JobRecord),
    {
        let entry = self
            .jobs
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let mut record = entry.write().unwrap();
        if record.status != JobStatus::Processing {
            return Err(RegistryError::InvalidTransition {
                id: id.to_string(),
                status: record.status,
            });
        }
        apply(&mut record);
        record.completed_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn record(id: &str) -> JobRecord {
        JobRecord::new(
            id.to_string(),
            "clip.mp4".to_string(),
            "a person".to_string(),
            PathBuf::from("/tmp").join(id),
        )
    }

    #[test]
    fn test_create_and_get() {
        let registry = JobRegistry::new();
        registry.create(record("job-1")).unwrap();

        let found = registry.get("job-1").unwrap();
        assert_eq!(found.id, "job-1");
        assert_eq!(found.status, JobStatus::Processing);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_job_rejected() {
        let registry = JobRegistry::new();
        registry.create(record("job-1")).unwrap();

        let err = registry.create(record("job-1")).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateJob(_)));
    }

    #[test]
    fn test_mark_completed_sets_terminal_fields() {
        let registry = JobRegistry::new();
        registry.create(record("job-1")).unwrap();

        registry
            .mark_completed("job-1", PathBuf::from("/results/job-1.mp4"))
            .unwrap();

        let found = registry.get("job-1").unwrap();
        assert_eq!(found.status, JobStatus::Completed);
        assert_eq!(found.artifact_path, Some(PathBuf::from("/results/job-1.mp4")));
        assert!(found.error_detail.is_none());
        assert!(found.completed_at.is_some());
    }

    #[test]
    fn test_mark_failed_sets_terminal_fields() {
        let registry = JobRegistry::new();
        registry.create(record("job-1")).unwrap();

        registry
            .mark_failed("job-1", "extraction produced no frames".to_string())
            .unwrap();

        let found = registry.get("job-1").unwrap();
        assert_eq!(found.status, JobStatus::Failed);
        assert_eq!(
            found.error_detail.as_deref(),
            Some("extraction produced no frames")
        );
        assert!(found.artifact_path.is_none());
        assert!(found.completed_at.is_some());
    }

    #[test]
    fn test_terminal_state_is_final() {
        let registry = JobRegistry::new();
        registry.create(record("job-1")).unwrap();
        registry
            .mark_completed("job-1", PathBuf::from("/results/job-1.mp4"))
            .unwrap();

        let err = registry
            .mark_failed("job-1", "too late".to_string())
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidTransition {
                status: JobStatus::Completed,
                ..
            }
        ));

        // The record is untouched by the rejected transition
        let found = registry.get("job-1").unwrap();
        assert_eq!(found.status, JobStatus::Completed);
        assert!(found.error_detail.is_none());
    }

    #[test]
    fn test_transition_on_unknown_job() {
        let registry = JobRegistry::new();
        let err = registry
            .mark_failed("missing", "whatever".to_string())
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let registry = Arc::new(JobRegistry::new());
        for i in 0..8 {
            registry.create(record(&format!("job-{i}"))).unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                let id = format!("job-{i}");
                registry
                    .mark_completed(&id, PathBuf::from(format!("/results/{id}.mp4")))
                    .unwrap();
            }));
        }
        for _ in 0..4 {
            let registry = registry.clone();
            handles.push(thread::spawn(move || {
                for i in 0..8 {
                    // A snapshot is either still processing or fully terminal,
                    // never half-updated.
                    if let Some(found) = registry.get(&format!("job-{i}")) {
                        match found.status {
                            JobStatus::Processing => {
                                assert!(found.artifact_path.is_none());
                                assert!(found.completed_at.is_none());
                            }
                            JobStatus::Completed => {
                                assert!(found.artifact_path.is_some());
                                assert!(found.completed_at.is_some());
                            }
                            JobStatus::Failed => unreachable!(),
                        }
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..8 {
            let found = registry.get(&format!("job-{i}")).unwrap();
            assert_eq!(found.status, JobStatus::Completed);
        }
    }
}
