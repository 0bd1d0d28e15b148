use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind to
    #[arg(long, default_value_t = 5001)]
    pub port: u16,

    /// Root directory for per-job upload workspaces
    #[arg(long, env = "PROMPTMASK_UPLOAD_ROOT", default_value = "uploads")]
    pub upload_root: PathBuf,

    /// Root directory for finished output videos
    #[arg(long, env = "PROMPTMASK_RESULTS_ROOT", default_value = "results")]
    pub results_root: PathBuf,

    /// Directory holding the stage scripts (segment.py, mask.py, joinMask.py)
    #[arg(long, env = "PROMPTMASK_SCRIPTS_DIR", default_value = "scripts")]
    pub scripts_dir: PathBuf,

    /// Interpreter used to run the stage scripts
    #[arg(long, env = "PROMPTMASK_PYTHON_BIN", default_value = "python")]
    pub python_bin: PathBuf,

    /// Maximum number of pipelines running at the same time
    #[arg(long, env = "PROMPTMASK_MAX_CONCURRENT_JOBS", default_value_t = 4)]
    pub max_concurrent_jobs: usize,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
