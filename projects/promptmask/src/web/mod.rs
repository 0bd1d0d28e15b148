// HTTP surface: submission, status polling and artifact retrieval

pub mod api;
pub mod server;

use std::sync::Arc;

use crate::jobs::registry::JobRegistry;
use crate::jobs::scheduler::JobScheduler;

/// Shared handles injected into every handler.
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub scheduler: Arc<JobScheduler>,
}
