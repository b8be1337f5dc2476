use thiserror::Error;

/// Result alias used across the crate.
pub type ServeResult<T> = Result<T, ServeError>;

/// Every way a load or a prediction can fail.
///
/// Each variant maps to exactly one HTTP status via [`ServeError::status_code`];
/// handlers never pick a status themselves.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Bad or missing request input (the client's fault).
    #[error("{0}")]
    Validation(String),

    /// Upload exceeded the configured body limit.
    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// The uploaded bytes are not a decodable image.
    #[error("cannot decode image: {0}")]
    Decode(String),

    /// The classifier artifact or label mapping could not be loaded.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// Anything else that went wrong between preprocessing and ranking.
    #[error("{0}")]
    Prediction(String),

    /// Inference did not finish within the configured budget.
    #[error("inference timed out after {millis} ms")]
    InferenceTimeout { millis: u64 },
}

impl ServeError {
    /// HTTP status for this error kind.
    ///
    /// | kind             | status |
    /// |------------------|--------|
    /// | Validation       | 400    |
    /// | PayloadTooLarge  | 413    |
    /// | Decode           | 500    |
    /// | ModelLoad        | 500    |
    /// | Prediction       | 500    |
    /// | InferenceTimeout | 504    |
    pub fn status_code(&self) -> u16 {
        match self {
            ServeError::Validation(_) => 400,
            ServeError::PayloadTooLarge { .. } => 413,
            ServeError::Decode(_) => 500,
            ServeError::ModelLoad(_) => 500,
            ServeError::Prediction(_) => 500,
            ServeError::InferenceTimeout { .. } => 504,
        }
    }

    /// Message placed in the `{"error": ...}` response body.
    ///
    /// Client-fault errors are reported verbatim; server-side failures are
    /// prefixed so the frontend can tell a rejected upload from a failed run.
    pub fn client_message(&self) -> String {
        match self {
            ServeError::Validation(_) | ServeError::PayloadTooLarge { .. } => self.to_string(),
            _ => format!("Prediction failed: {}", self),
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<image::ImageError> for ServeError {
    fn from(e: image::ImageError) -> Self {
        ServeError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table_is_fixed() {
        assert_eq!(ServeError::Validation("x".into()).status_code(), 400);
        assert_eq!(ServeError::PayloadTooLarge { limit: 1 }.status_code(), 413);
        assert_eq!(ServeError::Decode("x".into()).status_code(), 500);
        assert_eq!(ServeError::ModelLoad("x".into()).status_code(), 500);
        assert_eq!(ServeError::Prediction("x".into()).status_code(), 500);
        assert_eq!(ServeError::InferenceTimeout { millis: 5 }.status_code(), 504);
    }

    #[test]
    fn validation_message_is_verbatim() {
        let e = ServeError::Validation("No image file provided".into());
        assert_eq!(e.client_message(), "No image file provided");
        assert!(e.is_client_error());
    }

    #[test]
    fn server_errors_are_prefixed() {
        let e = ServeError::Decode("unsupported format".into());
        assert_eq!(e.client_message(), "Prediction failed: cannot decode image: unsupported format");
        assert!(!e.is_client_error());
    }
}
