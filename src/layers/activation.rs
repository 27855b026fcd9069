//! Elementwise nonlinearities.

use candle_core::{Result, Tensor};
use candle_nn::Module;
use serde::{Deserialize, Serialize};

/// Nonlinearity applied inside embedding and interaction transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// No-op.
    Identity,

    /// Logistic sigmoid.
    Sigmoid,

    /// Sigmoid-weighted linear unit, `x * sigmoid(x)`.
    #[default]
    Silu,

    Relu,

    Tanh,

    /// Softplus shifted to pass through the origin, `ln(1 + e^x) - ln 2`.
    Softplus2,
}

impl Module for Activation {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::Identity => Ok(xs.clone()),
            Self::Sigmoid => candle_nn::ops::sigmoid(xs),
            Self::Silu => xs.silu(),
            Self::Relu => xs.relu(),
            Self::Tanh => xs.tanh(),
            Self::Softplus2 => {
                // relu(x) + ln(1 + e^-|x|) stays finite for large |x|.
                let tail = xs.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
                (xs.relu()? + tail)?.affine(1.0, -std::f64::consts::LN_2)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use candle_core::Device;

    fn apply(act: Activation, values: &[f32]) -> Vec<f32> {
        let x = Tensor::new(values, &Device::Cpu).unwrap();
        act.forward(&x).unwrap().to_vec1::<f32>().unwrap()
    }

    #[test]
    fn default_is_silu() {
        assert_eq!(Activation::default(), Activation::Silu);
    }

    #[test]
    fn known_values() {
        let xs = [-2.0, 0.0, 3.0];
        assert_eq!(apply(Activation::Identity, &xs), xs.to_vec());
        assert_eq!(apply(Activation::Relu, &xs), vec![0.0, 0.0, 3.0]);

        let sig = apply(Activation::Sigmoid, &xs);
        assert_abs_diff_eq!(sig[1], 0.5, epsilon = 1e-6);

        let silu = apply(Activation::Silu, &xs);
        assert_abs_diff_eq!(silu[2], 3.0 / (1.0 + (-3.0f32).exp()), epsilon = 1e-5);
    }

    #[test]
    fn softplus2_passes_through_origin_and_stays_finite() {
        let out = apply(Activation::Softplus2, &[0.0, 100.0, -100.0]);
        assert_abs_diff_eq!(out[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out[1], 100.0 - std::f32::consts::LN_2, epsilon = 1e-3);
        assert_abs_diff_eq!(out[2], -std::f32::consts::LN_2, epsilon = 1e-6);
    }

    #[test]
    fn deserializes_from_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            activation: Activation,
        }
        let w: Wrapper = toml::from_str("activation = \"softplus2\"").unwrap();
        assert_eq!(w.activation, Activation::Softplus2);
    }
}
