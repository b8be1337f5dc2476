use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::layers::dense::Layer;
use crate::error::{ServeError, ServeResult};
use crate::network::metadata::ModelMetadata;

/// A trained feed-forward network as stored in the classifier artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
}

impl Network {
    pub fn with_metadata(mut self, metadata: ModelMetadata) -> Network {
        self.metadata = Some(metadata);
        self
    }

    /// Width of the input vector the first layer expects.
    pub fn input_len(&self) -> usize {
        self.layers.first().map(|l| l.input_size()).unwrap_or(0)
    }

    /// Width of the output vector the last layer produces.
    pub fn output_len(&self) -> usize {
        self.layers.last().map(|l| l.size).unwrap_or(0)
    }

    /// Checks per-layer shapes and that each layer's fan-in equals the
    /// previous layer's size.
    pub fn validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("network has no layers".into());
        }
        for (i, layer) in self.layers.iter().enumerate() {
            layer.check_shape().map_err(|e| format!("layer {}: {}", i, e))?;
            if i > 0 {
                let prev = self.layers[i - 1].size;
                if layer.input_size() != prev {
                    return Err(format!(
                        "layer {} expects {} inputs but layer {} produces {}",
                        i, layer.input_size(), i - 1, prev
                    ));
                }
            }
        }
        Ok(())
    }

    /// Forward pass over all layers. Takes `&self`, so one network can be
    /// shared across threads.
    ///
    /// Returns `None` if `input` does not match `input_len()`.
    pub fn predict(&self, input: &[f64]) -> Option<Vec<f64>> {
        let mut layers = self.layers.iter();
        let mut current = layers.next()?.infer(input)?;
        for layer in layers {
            current = layer.infer(&current)?;
        }
        Some(current)
    }

    /// Serializes the network to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Deserializes and validates a network from a JSON file previously
    /// written by `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> ServeResult<Network> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| ServeError::ModelLoad(format!("cannot open {}: {}", path.display(), e)))?;
        let reader = std::io::BufReader::new(file);
        let network: Network = serde_json::from_reader(reader)
            .map_err(|e| ServeError::ModelLoad(format!("malformed model {}: {}", path.display(), e)))?;
        network.validate()
            .map_err(|e| ServeError::ModelLoad(format!("invalid model {}: {}", path.display(), e)))?;
        Ok(network)
    }
}
