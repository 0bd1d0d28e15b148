use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::pipeline::{
    Stage, StageArgs, StageError, ARG_INPUT_DIR, ARG_OUTPUT_DIR, ARG_OUTPUT_FOLDER,
    ARG_OUTPUT_VIDEO, ARG_TEXT_PROMPT, ARG_VIDEO_PATH,
};

/// How many trailing stderr lines to keep as the failure detail.
const STDERR_TAIL_LINES: usize = 10;

/// A stage backed by an external script run through an interpreter.
/// Each named argument is passed as a `--flag value` pair.
pub struct CommandStage {
    id: &'static str,
    interpreter: PathBuf,
    script: PathBuf,
    /// Maps CLI flag name to the stage argument key holding its value.
    flags: &'static [(&'static str, &'static str)],
}

impl CommandStage {
    pub fn extraction(interpreter: PathBuf, scripts_dir: &std::path::Path) -> Self {
        Self {
            id: "extraction",
            interpreter,
            script: scripts_dir.join("segment.py"),
            flags: &[
                ("--video_path", ARG_VIDEO_PATH),
                ("--output_folder", ARG_OUTPUT_FOLDER),
            ],
        }
    }

    pub fn segmentation(interpreter: PathBuf, scripts_dir: &std::path::Path) -> Self {
        Self {
            id: "segmentation",
            interpreter,
            script: scripts_dir.join("mask.py"),
            flags: &[
                ("--input_dir", ARG_INPUT_DIR),
                ("--output_dir", ARG_OUTPUT_DIR),
                ("--text_prompt", ARG_TEXT_PROMPT),
            ],
        }
    }

    pub fn assembly(interpreter: PathBuf, scripts_dir: &std::path::Path) -> Self {
        Self {
            id: "assembly",
            interpreter,
            script: scripts_dir.join("joinMask.py"),
            flags: &[
                ("--input_dir", ARG_INPUT_DIR),
                ("--output_video", ARG_OUTPUT_VIDEO),
            ],
        }
    }
}

impl Stage for CommandStage {
    fn id(&self) -> &'static str {
        self.id
    }

    fn execute(&self, args: &StageArgs) -> Result<(), StageError> {
        let mut command = Command::new(&self.interpreter);
        command.arg(&self.script);
        for (flag, key) in self.flags {
            let value = args.get(key).ok_or_else(|| StageError::Execution {
                stage: self.id,
                detail: format!("missing argument '{key}'"),
            })?;
            command.arg(flag).arg(value);
        }

        tracing::info!("Running {} stage: {:?}", self.id, command);

        let output = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| StageError::Launch {
                stage: self.id,
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StageError::Execution {
                stage: self.id,
                detail: failure_detail(output.status.code(), &stderr),
            });
        }

        Ok(())
    }
}

fn failure_detail(exit_code: Option<i32>, stderr: &str) -> String {
    let code = exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());

    let lines: Vec<&str> = stderr.lines().collect();
    let tail_start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[tail_start..].join("\n");

    if tail.trim().is_empty() {
        format!("exited with status {code}")
    } else {
        format!("exited with status {code}: {tail}")
    }
}
