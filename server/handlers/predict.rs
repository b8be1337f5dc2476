use ferrite_classify::{PredictionResult, ServeError, ServeResult};
use tracing::{error, info, warn};

use crate::routes::{ApiRequest, ApiResponse};
use crate::state::AppState;
use crate::util::multipart::{extract_boundary, find_file, parse_parts};

/// Multipart field carrying the uploaded image.
pub const IMAGE_FIELD: &str = "image";

// ---------------------------------------------------------------------------
// POST /predict
// ---------------------------------------------------------------------------

pub fn handle(request: &ApiRequest, state: &AppState) -> ApiResponse {
    match run(request, state) {
        Ok(result) => {
            info!(class = %result.class_name, confidence = result.confidence, "prediction served");
            match serde_json::to_value(&result) {
                Ok(body) => ApiResponse::json(200, body),
                Err(e) => error_response(&ServeError::Prediction(e.to_string())),
            }
        }
        Err(e) => error_response(&e),
    }
}

fn run(request: &ApiRequest, state: &AppState) -> ServeResult<PredictionResult> {
    let image = extract_image(request)?;
    state.service.predict(image)
}

/// Pulls the `image` file out of the request body.
///
/// Anything that is not a multipart upload with an `image` file part is
/// treated as "no file"; a file part with an empty filename means the
/// user submitted the form without choosing a file.
fn extract_image(request: &ApiRequest) -> ServeResult<&[u8]> {
    let no_file = || ServeError::Validation("No image file provided".into());

    let boundary = request.content_type.as_deref()
        .and_then(extract_boundary)
        .ok_or_else(no_file)?;
    let parts = parse_parts(&request.body, &boundary);
    let part = find_file(&parts, IMAGE_FIELD).ok_or_else(no_file)?;

    if part.filename.as_deref().unwrap_or("").is_empty() {
        return Err(ServeError::Validation("No image file selected".into()));
    }
    Ok(part.data)
}

/// Maps an error to its JSON body and logs it at a level that matches
/// whose fault it was.
pub fn error_response(e: &ServeError) -> ApiResponse {
    if e.is_client_error() {
        warn!(error = %e, "rejected request");
    } else {
        error!(error = %e, "error during prediction");
    }
    ApiResponse::error(e.status_code(), e.client_message())
}
