use serde_json::json;

use crate::routes::ApiResponse;
use crate::state::AppState;

/// `GET /health`
pub fn handle(state: &AppState) -> ApiResponse {
    let message = if state.service.store().is_loaded() {
        "Tree classification API is running"
    } else {
        "Tree classification API is running (model not loaded yet)"
    };
    ApiResponse::json(200, json!({ "status": "ok", "message": message }))
}
