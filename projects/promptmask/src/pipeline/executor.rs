use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Args;
use crate::pipeline::command::CommandStage;
use crate::pipeline::{
    Stage, StageArgs, StageError, ARG_INPUT_DIR, ARG_OUTPUT_DIR, ARG_OUTPUT_FOLDER,
    ARG_OUTPUT_VIDEO, ARG_TEXT_PROMPT, ARG_VIDEO_PATH,
};

/// The three ordered pipeline stages. Swappable as a unit so tests can
/// run in-process stages instead of external scripts.
pub struct PipelineStages {
    pub extract: Box<dyn Stage>,
    pub segment: Box<dyn Stage>,
    pub assemble: Box<dyn Stage>,
}

impl PipelineStages {
    pub fn new(extract: Box<dyn Stage>, segment: Box<dyn Stage>, assemble: Box<dyn Stage>) -> Self {
        Self {
            extract,
            segment,
            assemble,
        }
    }

    pub fn from_args(args: &Args) -> Self {
        Self::new(
            Box::new(CommandStage::extraction(
                args.python_bin.clone(),
                &args.scripts_dir,
            )),
            Box::new(CommandStage::segmentation(
                args.python_bin.clone(),
                &args.scripts_dir,
            )),
            Box::new(CommandStage::assembly(
                args.python_bin.clone(),
                &args.scripts_dir,
            )),
        )
    }
}

/// Everything the pipeline needs for one job. All paths live inside the
/// job's workspace except the artifact, which lands in the results root.
pub struct PipelineJob {
    pub job_id: String,
    pub video_path: PathBuf,
    pub prompt: String,
    pub workspace: PathBuf,
    pub output_video: PathBuf,
}

/// Runs extraction, segmentation and assembly strictly in order, each
/// stage consuming the previous stage's output directory. The first
/// failure wins and the remaining stages are skipped. Returns the
/// artifact path on success.
pub fn run_pipeline(stages: &PipelineStages, job: &PipelineJob) -> Result<PathBuf, StageError> {
    let frames_dir = job.workspace.join("frames");
    let segmented_dir = job.workspace.join("segmented");
    fs::create_dir_all(&frames_dir)?;
    fs::create_dir_all(&segmented_dir)?;

    let mut args = StageArgs::new();
    args.insert(ARG_VIDEO_PATH, job.video_path.to_string_lossy().into_owned());
    args.insert(ARG_OUTPUT_FOLDER, frames_dir.to_string_lossy().into_owned());
    stages.extract.execute(&args)?;

    let frame_count = count_images(&frames_dir)?;
    if frame_count == 0 {
        return Err(StageError::EmptyOutput {
            stage: stages.extract.id(),
            dir: frames_dir,
        });
    }
    tracing::info!("Job {}: extracted {} frames", job.job_id, frame_count);

    let mut args = StageArgs::new();
    args.insert(ARG_INPUT_DIR, frames_dir.to_string_lossy().into_owned());
    args.insert(ARG_OUTPUT_DIR, segmented_dir.to_string_lossy().into_owned());
    args.insert(ARG_TEXT_PROMPT, job.prompt.clone());
    stages.segment.execute(&args)?;

    let segmented_count = count_images(&segmented_dir)?;
    if segmented_count == 0 {
        return Err(StageError::EmptyOutput {
            stage: stages.segment.id(),
            dir: segmented_dir,
        });
    }
    if segmented_count < frame_count {
        // The segmentation script skips frames it cannot process; the
        // step only fails when nothing came out at all.
        tracing::warn!(
            "Job {}: segmented {} of {} frames",
            job.job_id,
            segmented_count,
            frame_count
        );
    }

    let mut args = StageArgs::new();
    args.insert(ARG_INPUT_DIR, segmented_dir.to_string_lossy().into_owned());
    args.insert(
        ARG_OUTPUT_VIDEO,
        job.output_video.to_string_lossy().into_owned(),
    );
    stages.assemble.execute(&args)?;

    if !job.output_video.exists() {
        return Err(StageError::EmptyOutput {
            stage: stages.assemble.id(),
            dir: job.output_video.clone(),
        });
    }

    tracing::info!("Job {}: artifact written to {:?}", job.job_id, job.output_video);
    Ok(job.output_video.clone())
}

fn count_images(dir: &Path) -> Result<usize, StageError> {
    let count = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| matches!(s.to_lowercase().as_str(), "jpg" | "jpeg" | "png"))
                .unwrap_or(false)
        })
        .count();
    Ok(count)
}


#[cfg(test)]
mod tests {
    use super::test_stages::*;
    use super::*;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    #[test]
    fn test_successful_pipeline_produces_artifact() {
        let dir = TempDir::new().unwrap();
        let stages = working_stages(10);
        let job = job_in(dir.path(), "job-1");

        let artifact = run_pipeline(&stages, &job).unwrap();
        assert_eq!(artifact, job.output_video);
        assert!(artifact.exists());

        // Frame handoff preserved the zero-padded names
        let segmented = job.workspace.join("segmented");
        assert!(segmented.join("segmented_frame_0000.jpg").exists());
        assert!(segmented.join("segmented_frame_0009.jpg").exists());
        assert_eq!(count_images(&segmented).unwrap(), 10);
    }

    #[test]
    fn test_zero_frames_fails_extraction_and_skips_rest() {
        let dir = TempDir::new().unwrap();
        // Segmentation would fail loudly if it ran; the empty-output
        // check must short-circuit before it.
        let stages = PipelineStages::new(
            Box::new(NoopStage {
                stage_id: "extraction",
            }),
            Box::new(FailStage {
                stage_id: "segmentation",
                detail: "should never run",
            }),
            Box::new(FakeAssembly::new()),
        );
        let job = job_in(dir.path(), "job-1");

        let err = run_pipeline(&stages, &job).unwrap_err();
        match err {
            StageError::EmptyOutput { stage, .. } => assert_eq!(stage, "extraction"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!job.output_video.exists());
    }

    #[test]
    fn test_failing_segmentation_short_circuits_assembly() {
        let dir = TempDir::new().unwrap();
        let assemble = FakeAssembly::new();
        let invoked = assemble.invoked.clone();
        let stages = PipelineStages::new(
            Box::new(FakeExtraction { frames: 3 }),
            Box::new(FailStage {
                stage_id: "segmentation",
                detail: "model exploded",
            }),
            Box::new(assemble),
        );
        let job = job_in(dir.path(), "job-1");

        let err = run_pipeline(&stages, &job).unwrap_err();
        match err {
            StageError::Execution { stage, detail } => {
                assert_eq!(stage, "segmentation");
                assert!(detail.contains("model exploded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!invoked.load(Ordering::Relaxed));
    }

    #[test]
    fn test_empty_segmentation_output_fails() {
        let dir = TempDir::new().unwrap();
        let stages = PipelineStages::new(
            Box::new(FakeExtraction { frames: 3 }),
            Box::new(NoopStage {
                stage_id: "segmentation",
            }),
            Box::new(FakeAssembly::new()),
        );
        let job = job_in(dir.path(), "job-1");

        let err = run_pipeline(&stages, &job).unwrap_err();
        match err {
            StageError::EmptyOutput { stage, .. } => assert_eq!(stage, "segmentation"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_assembly_without_artifact_fails() {
        let dir = TempDir::new().unwrap();
        let stages = PipelineStages::new(
            Box::new(FakeExtraction { frames: 3 }),
            Box::new(FakeSegmentation),
            Box::new(NoopStage {
                stage_id: "assembly",
            }),
        );
        let job = job_in(dir.path(), "job-1");

        let err = run_pipeline(&stages, &job).unwrap_err();
        match err {
            StageError::EmptyOutput { stage, .. } => assert_eq!(stage, "assembly"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_count_images_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("frame_0000.jpg"), b"x").unwrap();
        fs::write(dir.path().join("frame_0001.PNG"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub.jpg")).unwrap();

        assert_eq!(count_images(dir.path()).unwrap(), 2);
    }
}
