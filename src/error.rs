//! Error types for graph construction and basis featurization.
//!
//! All fallible operations in the crate return [`Error`]. Failures are
//! categorized by source: vocabulary lookup, cutoff validation, malformed
//! structures or configuration, tensor shape disagreements, and errors
//! surfaced by the tensor engine or the TOML parser.
//!
//! Degenerate geometry (near-zero bonds, near-parallel reference axes) is
//! deliberately absent here. It is recovered locally and reported through
//! [`DegenerateGeometry`](crate::DegenerateGeometry) records instead.

use thiserror::Error;

/// Errors that can occur while building graphs or evaluating layers.
#[derive(Debug, Error)]
pub enum Error {
    /// A species symbol is not part of the element vocabulary.
    ///
    /// The vocabulary is fixed per modeling session; every structure fed to
    /// a converter must only contain symbols it knows.
    #[error("unknown element '{symbol}': not present in the element vocabulary")]
    UnknownElement {
        /// The offending species symbol.
        symbol: String,
    },

    /// A cutoff radius is non-positive, non-finite, or the three-body
    /// cutoff exceeds the pair cutoff.
    #[error("invalid cutoff: {detail} (cutoff = {cutoff}, three-body cutoff = {threebody_cutoff:?})")]
    InvalidCutoff {
        /// The pair cutoff radius.
        cutoff: f64,
        /// The three-body cutoff radius, if one was involved.
        threebody_cutoff: Option<f64>,
        /// Description of the violated constraint.
        detail: String,
    },

    /// The input structure is malformed.
    #[error("invalid structure: {0}")]
    InvalidStructure(String),

    /// A configuration value is outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two inputs that must agree in shape do not.
    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Name of the mismatched input.
        what: &'static str,
        /// Expected extent.
        expected: usize,
        /// Actual extent.
        actual: usize,
    },

    /// Failed to parse a TOML configuration.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The tensor engine rejected an operation.
    #[error("tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl Error {
    /// Creates an [`UnknownElement`](Error::UnknownElement) error.
    pub fn unknown_element(symbol: impl Into<String>) -> Self {
        Self::UnknownElement {
            symbol: symbol.into(),
        }
    }

    /// Creates an [`InvalidCutoff`](Error::InvalidCutoff) error.
    ///
    /// # Arguments
    ///
    /// * `cutoff` - The pair cutoff radius
    /// * `threebody_cutoff` - The three-body cutoff, when relevant
    /// * `detail` - Description of the violated constraint
    pub fn invalid_cutoff(
        cutoff: f64,
        threebody_cutoff: Option<f64>,
        detail: impl Into<String>,
    ) -> Self {
        Self::InvalidCutoff {
            cutoff,
            threebody_cutoff,
            detail: detail.into(),
        }
    }

    /// Creates a [`ShapeMismatch`](Error::ShapeMismatch) error.
    pub fn shape_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what,
            expected,
            actual,
        }
    }
}

/// Validates a single cutoff radius.
///
/// # Errors
///
/// Returns [`Error::InvalidCutoff`] if `cutoff` is not a finite positive number.
pub fn check_cutoff(cutoff: f64) -> Result<(), Error> {
    if !cutoff.is_finite() || cutoff <= 0.0 {
        return Err(Error::invalid_cutoff(
            cutoff,
            None,
            "cutoff must be a finite positive number",
        ));
    }
    Ok(())
}

/// Validates a pair cutoff together with its three-body cutoff.
///
/// # Errors
///
/// Returns [`Error::InvalidCutoff`] if either radius is not a finite positive
/// number or if `threebody_cutoff > cutoff`.
pub fn check_cutoff_pair(cutoff: f64, threebody_cutoff: f64) -> Result<(), Error> {
    check_cutoff(cutoff)?;
    if !threebody_cutoff.is_finite() || threebody_cutoff <= 0.0 {
        return Err(Error::invalid_cutoff(
            cutoff,
            Some(threebody_cutoff),
            "three-body cutoff must be a finite positive number",
        ));
    }
    if threebody_cutoff > cutoff {
        return Err(Error::invalid_cutoff(
            cutoff,
            Some(threebody_cutoff),
            "three-body cutoff must not exceed the pair cutoff",
        ));
    }
    Ok(())
}
