use serde::{Serialize, Deserialize};
use std::f64::consts::{E, PI};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    ReLU,
    Identity,
    /// Softmax is a vector-valued activation; `apply()` normalizes the whole
    /// layer output at once instead of mapping element by element.
    Softmax,
    Tanh,
    LeakyReLU { alpha: f64 },
    Elu { alpha: f64 },
    Gelu,
    Swish,
}

impl ActivationFunction {
    /// Applies the activation to a full pre-activation vector `z = xW + b`.
    pub fn apply(&self, z: Vec<f64>) -> Vec<f64> {
        match self {
            ActivationFunction::Softmax => softmax(&z),
            _ => z.into_iter().map(|x| self.function(x)).collect(),
        }
    }

    /// Element-wise activation. `Softmax` passes values through unchanged
    /// here; use `apply()` for the normalized distribution.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
            ActivationFunction::Elu { alpha } => {
                if x > 0.0 { x } else { alpha * (E.powf(x) - 1.0) }
            }
            ActivationFunction::Gelu => {
                let c = (2.0_f64 / PI).sqrt();
                0.5 * x * (1.0 + (c * (x + 0.044715 * x.powi(3))).tanh())
            }
            ActivationFunction::Swish => x / (1.0 + E.powf(-x)),
        }
    }
}

/// Numerically stable softmax: subtracts the max logit before exponentiating.
pub fn softmax(z: &[f64]) -> Vec<f64> {
    if z.is_empty() {
        return Vec::new();
    }
    let max = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = z.iter().map(|x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one_and_keeps_order() {
        let p = softmax(&[1.0, 3.0, 2.0]);
        let sum: f64 = p.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(p[1] > p[2] && p[2] > p[0]);
    }

    #[test]
    fn softmax_survives_large_logits() {
        let p = softmax(&[1000.0, 1000.0]);
        assert!((p[0] - 0.5).abs() < 1e-12);
        assert!((p[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn softmax_of_single_class_is_one() {
        assert_eq!(softmax(&[-42.0]), vec![1.0]);
    }

    #[test]
    fn elementwise_activations() {
        assert_eq!(ActivationFunction::ReLU.apply(vec![-1.0, 2.0]), vec![0.0, 2.0]);
        assert_eq!(ActivationFunction::LeakyReLU { alpha: 0.1 }.function(-10.0), -1.0);
        assert!((ActivationFunction::Sigmoid.function(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn deserializes_tagged_variants() {
        let a: ActivationFunction = serde_json::from_str(r#"{"LeakyReLU":{"alpha":0.01}}"#).unwrap();
        assert_eq!(a, ActivationFunction::LeakyReLU { alpha: 0.01 });
        let s: ActivationFunction = serde_json::from_str(r#""Softmax""#).unwrap();
        assert_eq!(s, ActivationFunction::Softmax);
    }
}
