use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// Fully connected layer: `a = activator(x · weights + biases)`.
///
/// `weights` is `input_size × size`, `biases` is `1 × size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer{
    pub size: usize,
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction
}

impl Layer {
    /// Builds a layer from explicit parameters; shapes are taken from the matrices.
    pub fn from_parts(weights: Matrix, biases: Matrix, activation: ActivationFunction) -> Layer {
        Layer {
            size: weights.cols,
            weights,
            biases,
            activator: activation
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    /// Checks that `size`, `weights` and `biases` describe the same layer.
    pub fn check_shape(&self) -> Result<(), String> {
        if !self.weights.is_well_formed() {
            return Err("weights matrix rows/cols disagree with its data".into());
        }
        if !self.biases.is_well_formed() {
            return Err("biases matrix rows/cols disagree with its data".into());
        }
        if self.weights.cols != self.size {
            return Err(format!("weights have {} columns but layer size is {}", self.weights.cols, self.size));
        }
        if self.biases.rows != 1 || self.biases.cols != self.size {
            return Err(format!(
                "biases are {}x{} but layer size is {}",
                self.biases.rows, self.biases.cols, self.size
            ));
        }
        Ok(())
    }

    /// Forward pass without touching any layer state.
    ///
    /// Returns `None` when `input.len()` does not match the layer's fan-in.
    pub fn infer(&self, input: &[f64]) -> Option<Vec<f64>> {
        let mut z = self.weights.row_mul(input)?;
        let biases = self.biases.data.first()?;
        for (v, b) in z.iter_mut().zip(biases.iter()) {
            *v += b;
        }
        Some(self.activator.apply(z))
    }
}
