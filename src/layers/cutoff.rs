//! Smooth cutoff envelopes.
//!
//! Every envelope is 1 at `r = 0`, decays to 0 at `r = cutoff` with zero
//! slope, and is exactly 0 beyond the cutoff.

use std::f64::consts::PI;

use candle_core::{Result, Tensor};
use serde::{Deserialize, Serialize};

/// Envelope applied to basis values near the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CutoffEnvelope {
    /// Polynomial envelope with vanishing derivatives up to order
    /// `exponent - 1` at the cutoff.
    Polynomial { exponent: u32 },

    /// `0.5 * (cos(pi r / cutoff) + 1)`.
    Cosine,
}

impl Default for CutoffEnvelope {
    fn default() -> Self {
        Self::Polynomial { exponent: 3 }
    }
}

impl CutoffEnvelope {
    /// Evaluates the envelope elementwise on `r`.
    pub fn apply(&self, r: &Tensor, cutoff: f64) -> Result<Tensor> {
        match *self {
            Self::Polynomial { exponent } => polynomial_cutoff(r, cutoff, exponent),
            Self::Cosine => cosine_cutoff(r, cutoff),
        }
    }
}

/// Polynomial envelope `1 + c1 x^p + c2 x^(p+1) + c3 x^(p+2)` with
/// `x = r / cutoff`, zero for `r > cutoff`.
///
/// For `p = 3` this is `1 - 10x^3 + 15x^4 - 6x^5`.
pub fn polynomial_cutoff(r: &Tensor, cutoff: f64, exponent: u32) -> Result<Tensor> {
    let p = exponent as f64;
    let c1 = -(p + 1.0) * (p + 2.0) / 2.0;
    let c2 = p * (p + 2.0);
    let c3 = -p * (p + 1.0) / 2.0;

    let x = r.affine(1.0 / cutoff, 0.0)?;
    let xp = x.powf(p)?;
    let poly = ((xp.affine(c1, 1.0)? + (&xp * &x)?.affine(c2, 0.0)?)?
        + (&xp * x.sqr()?)?.affine(c3, 0.0)?)?;
    mask_beyond(&x, &poly)
}

/// Cosine envelope `0.5 * (cos(pi r / cutoff) + 1)`, zero for `r > cutoff`.
pub fn cosine_cutoff(r: &Tensor, cutoff: f64) -> Result<Tensor> {
    let x = r.affine(1.0 / cutoff, 0.0)?;
    let value = x.affine(PI, 0.0)?.cos()?.affine(0.5, 0.5)?;
    mask_beyond(&x, &value)
}

fn mask_beyond(x: &Tensor, value: &Tensor) -> Result<Tensor> {
    let inside = x.le(1.0)?;
    inside.where_cond(value, &value.zeros_like()?)
}
