//! Radial expansion of bond distances into edge features.

use candle_core::Tensor;
use log::debug;
use serde::{Deserialize, Serialize};

use super::basis::{GaussianExpansion, SphericalBesselFunction};
use crate::error::Error;

/// Family of radial functions used to expand bond distances.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RadialBasis {
    /// Spherical Bessel functions, plain or smooth.
    #[default]
    SphericalBessel,

    /// Gaussians centered on an evenly spaced grid.
    Gaussian {
        initial: f64,
        #[serde(rename = "final")]
        final_: f64,
        num_centers: usize,
        /// Defaults to the inverse center spacing.
        #[serde(default)]
        width: Option<f64>,
    },
}

#[derive(Debug, Clone)]
enum Expansion {
    Bessel(SphericalBesselFunction),
    Gaussian(GaussianExpansion),
}

/// Expands `(E,)` bond distances into `(E, width)` radial features.
#[derive(Debug, Clone)]
pub struct BondExpansion {
    expansion: Expansion,
}

impl BondExpansion {
    /// Creates a bond expansion.
    ///
    /// With [`RadialBasis::SphericalBessel`], the plain variant has
    /// `max_n * max_l` columns and the smooth one `max_n`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] or [`Error::InvalidCutoff`] for
    /// invalid basis parameters.
    pub fn new(
        basis: RadialBasis,
        max_l: usize,
        max_n: usize,
        cutoff: f64,
        smooth: bool,
    ) -> Result<Self, Error> {
        let expansion = match basis {
            RadialBasis::SphericalBessel => {
                Expansion::Bessel(SphericalBesselFunction::new(max_l, max_n, cutoff, smooth)?)
            }
            RadialBasis::Gaussian {
                initial,
                final_,
                num_centers,
                width,
            } => Expansion::Gaussian(GaussianExpansion::new(initial, final_, num_centers, width)?),
        };
        Ok(Self { expansion })
    }

    pub fn width(&self) -> usize {
        match &self.expansion {
            Expansion::Bessel(sbf) => sbf.width(),
            Expansion::Gaussian(g) => g.num_centers(),
        }
    }

    pub fn forward(&self, bond_dist: &Tensor) -> Result<Tensor, Error> {
        let out = match &self.expansion {
            Expansion::Bessel(sbf) => sbf.forward(bond_dist)?,
            Expansion::Gaussian(g) => g.forward(bond_dist)?,
        };
        debug!("bond expansion: {:?}", out.dims());
        Ok(out)
    }
}
