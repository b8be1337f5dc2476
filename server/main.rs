/// ferrite-classify prediction server
///
/// Loads the trained network and its class mapping once at startup, then
/// serves ranked predictions to the web frontend over a synchronous
/// tiny_http server.
///
/// Run with:
///   MODEL_PATH=train/model.json LABELS_PATH=train/class_mapping.json \
///   cargo run --bin server --release
///
/// Endpoints:
///   GET  /health   liveness probe
///   POST /predict  multipart upload, field `image`

mod state;
mod routes;
mod handlers;
mod util;
#[cfg(test)]
mod test_support;

use std::process::ExitCode;
use std::sync::Arc;

use ferrite_classify::{logging, ModelStore, PredictionService, ServerConfig};
use tiny_http::Server;
use tracing::{error, info};

use state::AppState;

fn main() -> ExitCode {
    logging::init();

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let store = Arc::new(ModelStore::new(&config.model_path, &config.labels_path));

    // Refuse to serve traffic without a model.
    match store.ensure_loaded() {
        Ok(model) => info!(classes = model.labels().len(), "model ready"),
        Err(e) => {
            error!(
                error = %e,
                model = %config.model_path.display(),
                labels = %config.labels_path.display(),
                "failed to load model; check that both files exist"
            );
            return ExitCode::FAILURE;
        }
    }

    let addr = config.bind_addr();
    let server = match Server::http(&addr) {
        Ok(s) => s,
        Err(e) => {
            error!(addr = %addr, error = %e, "failed to bind HTTP server");
            return ExitCode::FAILURE;
        }
    };

    let service = PredictionService::new(store).with_timeout(config.inference_timeout);
    let shared_state = Arc::new(AppState { service, config });

    info!(addr = %addr, "server ready; frontend should call POST /predict");

    // One thread per request so a slow inference never blocks /health.
    for request in server.incoming_requests() {
        let state_clone = Arc::clone(&shared_state);
        std::thread::spawn(move || {
            routes::dispatch(request, state_clone);
        });
    }
    ExitCode::SUCCESS
}
