pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod error;
pub mod labels;
pub mod classifier;
pub mod preprocess;
pub mod loader;
pub mod predict;
pub mod config;
pub mod logging;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::{InputType, ModelMetadata, Network};
pub use error::{ServeError, ServeResult};
pub use labels::LabelMapping;
pub use classifier::Classifier;
pub use preprocess::{preprocess, ImageTensor, INPUT_LEN, INPUT_SIZE};
pub use loader::{LoadedModel, ModelStore};
pub use predict::{ClassScore, PredictionResult, PredictionService};
pub use config::ServerConfig;
