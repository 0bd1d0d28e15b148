use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::jobs::registry::{JobRegistry, RegistryError};
use crate::jobs::types::JobRecord;
use crate::pipeline::executor::{run_pipeline, PipelineJob, PipelineStages};

/// Fallback prompt when the client does not send one.
const DEFAULT_PROMPT: &str = "a person";

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Failed to create workspace {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Accepts uploads, owns the per-job workspaces and dispatches the
/// pipeline. Submission never waits for the pipeline; callers only get
/// the job id back and poll the registry for everything else.
pub struct JobScheduler {
    registry: Arc<JobRegistry>,
    stages: Arc<PipelineStages>,
    upload_root: PathBuf,
    results_root: PathBuf,
    /// Bounds how many pipelines run at once; queued jobs stay in
    /// `processing` until a permit frees up.
    permits: Arc<Semaphore>,
}

impl JobScheduler {
    pub fn new(
        registry: Arc<JobRegistry>,
        stages: Arc<PipelineStages>,
        upload_root: PathBuf,
        results_root: PathBuf,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            registry,
            stages,
            upload_root,
            results_root,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    /// Validates the upload, persists it into a fresh workspace, records
    /// the job as `processing` and hands the pipeline off to a detached
    /// task. Returns the job id as soon as the task is dispatched.
    pub fn submit(
        &self,
        video: &[u8],
        original_name: &str,
        prompt: Option<String>,
    ) -> Result<String, SubmitError> {
        if original_name.is_empty() {
            return Err(SubmitError::InvalidInput("No video selected".to_string()));
        }
        if video.is_empty() {
            return Err(SubmitError::InvalidInput(
                "No video file provided".to_string(),
            ));
        }

        let prompt = prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string());

        let job_id = Uuid::new_v4().to_string();
        let workspace = self.upload_root.join(&job_id);
        fs::create_dir_all(&workspace).map_err(|source| SubmitError::Workspace {
            path: workspace.clone(),
            source,
        })?;

        let file_name = sanitize_file_name(original_name);
        let video_path = workspace.join(&file_name);
        fs::write(&video_path, video).map_err(|source| SubmitError::Workspace {
            path: video_path.clone(),
            source,
        })?;

        self.registry.create(JobRecord::new(
            job_id.clone(),
            file_name,
            prompt.clone(),
            workspace.clone(),
        ))?;

        let pipeline_job = PipelineJob {
            job_id: job_id.clone(),
            video_path,
            prompt,
            workspace,
            output_video: self.results_root.join(format!("{job_id}.mp4")),
        };
        self.dispatch(pipeline_job);

        tracing::info!("Job {} accepted", job_id);
        Ok(job_id)
    }

    fn dispatch(&self, job: PipelineJob) {
        let registry = self.registry.clone();
        let stages = self.stages.clone();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            // The semaphore is never closed, so acquisition only fails if
            // the runtime is tearing down.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };

            let job_id = job.job_id.clone();
            let outcome =
                tokio::task::spawn_blocking(move || run_pipeline(&stages, &job)).await;

            let transition = match outcome {
                Ok(Ok(artifact)) => {
                    tracing::info!("Job {} completed", job_id);
                    registry.mark_completed(&job_id, artifact)
                }
                Ok(Err(stage_err)) => {
                    tracing::error!("Job {} failed: {}", job_id, stage_err);
                    registry.mark_failed(&job_id, stage_err.to_string())
                }
                Err(join_err) => {
                    tracing::error!("Job {} pipeline panicked: {}", job_id, join_err);
                    registry.mark_failed(&job_id, "pipeline execution panicked".to_string())
                }
            };

            if let Err(err) = transition {
                tracing::error!("Job {} could not record terminal state: {}", job_id, err);
            }
        });
    }
}

/// Reduces an uploaded file name to its final path component and
/// neutralizes anything outside `[A-Za-z0-9._-]`, so the name can never
/// escape the workspace directory.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim_matches('.');

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "upload.mp4".to_string()
    } else {
        cleaned
    }
}
