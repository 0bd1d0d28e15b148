use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Lifecycle of a job. `Processing` is the only non-terminal state;
/// `Completed` and `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

/// One end-to-end segmentation request, tracked from upload to terminal
/// state. `artifact_path` is set exactly when the job completed,
/// `error_detail` exactly when it failed.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Original (sanitized) name of the uploaded video, used for the
    /// suggested download name.
    pub source_name: String,
    pub prompt: String,
    /// Directory owning the uploaded video and all intermediate frames.
    pub workspace: PathBuf,
    pub artifact_path: Option<PathBuf>,
    pub error_detail: Option<String>,
}

impl JobRecord {
    pub fn new(id: String, source_name: String, prompt: String, workspace: PathBuf) -> Self {
        Self {
            id,
            status: JobStatus::Processing,
            submitted_at: Utc::now(),
            completed_at: None,
            source_name,
            prompt,
            workspace,
            artifact_path: None,
            error_detail: None,
        }
    }
}
