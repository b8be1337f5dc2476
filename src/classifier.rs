use crate::error::{ServeError, ServeResult};
use crate::network::Network;

/// Anything that maps one flattened, preprocessed image to a probability
/// vector over a fixed set of classes.
///
/// Implementations are shared read-only across request threads.
pub trait Classifier: Send + Sync {
    /// Flattened input width (`height * width * channels`).
    fn input_len(&self) -> usize;

    /// Number of classes in the output distribution.
    fn output_len(&self) -> usize;

    /// Runs inference on a single sample.
    fn classify(&self, input: &[f64]) -> ServeResult<Vec<f64>>;
}

impl Classifier for Network {
    fn input_len(&self) -> usize {
        Network::input_len(self)
    }

    fn output_len(&self) -> usize {
        Network::output_len(self)
    }

    fn classify(&self, input: &[f64]) -> ServeResult<Vec<f64>> {
        self.predict(input).ok_or_else(|| {
            ServeError::Prediction(format!(
                "input has {} values but the model expects {}",
                input.len(),
                Network::input_len(self)
            ))
        })
    }
}
