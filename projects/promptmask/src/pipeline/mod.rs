// Video processing pipeline: three external stages handing work off
// through directories inside the job workspace.

pub mod command;
pub mod executor;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

// Well-known argument keys shared by the executor and the stage
// implementations. Each stage declares the subset it consumes.
pub const ARG_VIDEO_PATH: &str = "video_path";
pub const ARG_OUTPUT_FOLDER: &str = "output_folder";
pub const ARG_INPUT_DIR: &str = "input_dir";
pub const ARG_OUTPUT_DIR: &str = "output_dir";
pub const ARG_TEXT_PROMPT: &str = "text_prompt";
pub const ARG_OUTPUT_VIDEO: &str = "output_video";

/// Named path/string arguments handed to a stage.
pub type StageArgs = BTreeMap<&'static str, String>;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} stage could not be launched: {source}")]
    Launch {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} stage failed: {detail}")]
    Execution { stage: &'static str, detail: String },

    #[error("{stage} stage produced no output in {dir}")]
    EmptyOutput { stage: &'static str, dir: PathBuf },

    #[error("workspace setup failed: {source}")]
    Workspace {
        #[from]
        source: std::io::Error,
    },
}

/// One pipeline step, executed as an opaque unit of work. A stage does
/// not interpret the pipeline's semantics; it consumes its named
/// arguments and reports success or a failure detail.
pub trait Stage: Send + Sync {
    fn id(&self) -> &'static str;
    fn execute(&self, args: &StageArgs) -> Result<(), StageError>;
}
