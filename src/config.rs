//! Configuration of graph construction and basis featurization.
//!
//! [`GraphConfig`] collects every knob of the featurization pipeline: the
//! pair and three-body cutoffs, the radial and angular basis sizes, the
//! cutoff envelope, and the widths and nonlinearity of the learned layers.
//! It can be built in code or parsed from TOML:
//!
//! ```toml
//! cutoff = 5.0
//! threebody_cutoff = 4.0
//! max_n = 3
//! max_l = 3
//! use_phi = true
//!
//! [rbf_type]
//! kind = "Gaussian"
//! initial = 0.0
//! final = 5.0
//! num_centers = 100
//!
//! [cutoff_envelope]
//! kind = "cosine"
//! ```
//!
//! Missing keys take their [`Default`] values.

use serde::{Deserialize, Serialize};

use crate::error::{Error, check_cutoff_pair};
use crate::layers::activation::Activation;
use crate::layers::bond_expansion::RadialBasis;
use crate::layers::cutoff::CutoffEnvelope;
use crate::layers::embedding::StateEmbedding;
use crate::layers::three_body::TripleWeighting;

/// Settings for building graphs and evaluating the three-body basis.
///
/// # Examples
///
/// ```
/// use atomgraph::GraphConfig;
///
/// let config = GraphConfig {
///     use_phi: true,
///     ..Default::default()
/// };
/// assert_eq!(config.three_body_width(), 27);
/// config.validate()?;
/// # Ok::<(), atomgraph::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Pair cutoff radius in Å.
    pub cutoff: f64,

    /// Cutoff for bonds taking part in triples. Must not exceed `cutoff`.
    pub threebody_cutoff: f64,

    /// Radial basis order.
    pub max_n: usize,

    /// Angular basis degree (exclusive).
    pub max_l: usize,

    /// Use the smooth spherical Bessel variant.
    pub use_smooth: bool,

    /// Include the azimuthal angle in the angular basis.
    pub use_phi: bool,

    /// Nonlinearity of the embedding and interaction transforms.
    pub activation: Activation,

    /// Radial expansion of bond distances.
    pub rbf_type: RadialBasis,

    pub num_node_feats: usize,

    pub num_edge_feats: usize,

    /// Envelope applied to bonds at the three-body cutoff.
    pub cutoff_envelope: CutoffEnvelope,

    pub state_embedding: StateEmbedding,

    pub triple_weighting: TripleWeighting,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            cutoff: 5.0,
            threebody_cutoff: 4.0,
            max_n: 3,
            max_l: 3,
            use_smooth: false,
            use_phi: false,
            activation: Activation::Silu,
            rbf_type: RadialBasis::SphericalBessel,
            num_node_feats: 64,
            num_edge_feats: 64,
            cutoff_envelope: CutoffEnvelope::Polynomial { exponent: 3 },
            state_embedding: StateEmbedding::None,
            triple_weighting: TripleWeighting::SharedAtom,
        }
    }
}

impl GraphConfig {
    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] for malformed TOML, otherwise any
    /// error of [`GraphConfig::validate`].
    pub fn from_toml_str(toml: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, Error> {
        toml::to_string(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Checks the cutoffs and basis sizes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCutoff`] for a non-positive cutoff or a
    /// three-body cutoff above the pair cutoff, and
    /// [`Error::InvalidConfig`] for zero basis orders, feature widths or
    /// envelope exponent.
    pub fn validate(&self) -> Result<(), Error> {
        check_cutoff_pair(self.cutoff, self.threebody_cutoff)?;
        if self.max_n == 0 || self.max_l == 0 {
            return Err(Error::InvalidConfig(format!(
                "max_n and max_l must be positive (max_n = {}, max_l = {})",
                self.max_n, self.max_l
            )));
        }
        if self.num_node_feats == 0 || self.num_edge_feats == 0 {
            return Err(Error::InvalidConfig(
                "feature widths must be positive".to_string(),
            ));
        }
        if let CutoffEnvelope::Polynomial { exponent: 0 } = self.cutoff_envelope {
            return Err(Error::InvalidConfig(
                "polynomial envelope exponent must be positive".to_string(),
            ));
        }
        if let RadialBasis::Gaussian {
            initial,
            final_,
            num_centers,
            ..
        } = self.rbf_type
        {
            if num_centers == 0 || !(final_ > initial) {
                return Err(Error::InvalidConfig(format!(
                    "gaussian basis needs centers on a non-empty range \
                     (initial = {initial}, final = {final_}, num_centers = {num_centers})"
                )));
            }
        }
        Ok(())
    }

    /// Width of the radial bond features: `max_n * max_l` for the plain
    /// spherical Bessel basis, `max_n` for the smooth one, or the number
    /// of Gaussian centers.
    pub fn bond_width(&self) -> usize {
        match self.rbf_type {
            RadialBasis::SphericalBessel if self.use_smooth => self.max_n,
            RadialBasis::SphericalBessel => self.max_n * self.max_l,
            RadialBasis::Gaussian { num_centers, .. } => num_centers,
        }
    }

    /// Width of the three-body basis, `max_n * max_l` or
    /// `max_n * max_l^2` with the azimuthal angle.
    pub fn three_body_width(&self) -> usize {
        let angular = if self.use_phi { self.max_l } else { 1 };
        self.max_n * self.max_l * angular
    }
}
