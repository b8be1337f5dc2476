use std::sync::Arc;

use ferrite_classify::{PredictionService, ServerConfig};

/// Everything a request handler needs. Built once in `main` and shared
/// read-only across request threads.
pub struct AppState {
    pub service: PredictionService,
    pub config: ServerConfig,
}

pub type SharedState = Arc<AppState>;
