//! Feed-forward building blocks.

use candle_core::Tensor;
use candle_nn::{Linear, Module, VarBuilder, linear, linear_no_bias};

use super::activation::Activation;
use crate::error::Error;

/// A stack of linear layers with an activation between consecutive layers.
///
/// `dims` lists the input width followed by each layer's output width.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Linear>,
    dims: Vec<usize>,
    activation: Activation,
    activate_last: bool,
}

impl Mlp {
    /// Creates an MLP with biased layers.
    ///
    /// # Arguments
    ///
    /// * `dims` - Input width followed by the output width of every layer
    /// * `activation` - Nonlinearity between layers
    /// * `activate_last` - Whether to apply the nonlinearity after the final layer
    /// * `vb` - Parameter source; layers are stored under `layers.{i}`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `dims` has fewer than two entries
    /// or contains a zero.
    pub fn new(
        dims: &[usize],
        activation: Activation,
        activate_last: bool,
        vb: VarBuilder,
    ) -> Result<Self, Error> {
        Self::with_bias(dims, activation, activate_last, true, vb)
    }

    /// Like [`Mlp::new`] with control over the bias terms.
    pub fn with_bias(
        dims: &[usize],
        activation: Activation,
        activate_last: bool,
        use_bias: bool,
        vb: VarBuilder,
    ) -> Result<Self, Error> {
        if dims.len() < 2 || dims.contains(&0) {
            return Err(Error::InvalidConfig(format!(
                "MLP dims must list at least two non-zero widths, got {:?}",
                dims
            )));
        }
        let layers = dims
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let vb = vb.pp(format!("layers.{}", i));
                if use_bias {
                    linear(w[0], w[1], vb)
                } else {
                    linear_no_bias(w[0], w[1], vb)
                }
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self {
            layers,
            dims: dims.to_vec(),
            activation,
            activate_last,
        })
    }

    pub fn in_features(&self) -> usize {
        self.dims[0]
    }

    pub fn out_features(&self) -> usize {
        self.dims[self.dims.len() - 1]
    }
}

impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let rows = xs.dim(0)?;
        if rows == 0 {
            return Tensor::zeros((0, self.out_features()), xs.dtype(), xs.device());
        }
        let last = self.layers.len() - 1;
        let mut h = xs.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(&h)?;
            if i < last || self.activate_last {
                h = self.activation.forward(&h)?;
            }
        }
        Ok(h)
    }
}

/// An MLP whose output is elementwise gated by a parallel sigmoid branch:
/// `layers(x) * sigmoid(gates(x))`.
#[derive(Debug, Clone)]
pub struct GatedMlp {
    layers: Mlp,
    gates: Mlp,
}

impl GatedMlp {
    /// Creates a gated MLP.
    ///
    /// # Arguments
    ///
    /// * `in_features` - Input width
    /// * `dims` - Output width of every layer in each branch
    /// * `activation` - Nonlinearity inside both branches
    /// * `use_bias` - Whether the linear layers carry a bias
    /// * `vb` - Parameter source; branches live under `layers` and `gates`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for empty or zero widths.
    pub fn new(
        in_features: usize,
        dims: &[usize],
        activation: Activation,
        use_bias: bool,
        vb: VarBuilder,
    ) -> Result<Self, Error> {
        let mut all = Vec::with_capacity(dims.len() + 1);
        all.push(in_features);
        all.extend_from_slice(dims);
        let layers = Mlp::with_bias(&all, activation, true, use_bias, vb.pp("layers"))?;
        let gates = Mlp::with_bias(&all, activation, false, use_bias, vb.pp("gates"))?;
        Ok(Self { layers, gates })
    }

    pub fn out_features(&self) -> usize {
        self.layers.out_features()
    }
}

impl Module for GatedMlp {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let values = self.layers.forward(xs)?;
        let gates = candle_nn::ops::sigmoid(&self.gates.forward(xs)?)?;
        values * gates
    }
}
