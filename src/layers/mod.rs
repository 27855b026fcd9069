//! Tensor layers: basis expansions, cutoff envelopes, embeddings and the
//! three-body interaction block.
//!
//! Fixed transforms ([`basis`], [`cutoff`], [`bond_expansion`]) work in the
//! dtype of their input, normally `F64` geometry. Learned transforms take
//! their parameters from a [`candle_nn::VarBuilder`] and run in
//! [`FLOAT_DTYPE`](crate::FLOAT_DTYPE).

pub mod activation;
pub mod basis;
pub mod bond_expansion;
pub mod cutoff;
pub mod embedding;
pub mod mlp;
pub mod three_body;

pub use activation::Activation;
pub use basis::{
    GaussianExpansion, SphericalBesselFunction, SphericalHarmonicsFunction, combine_sbf_shf,
    rbf_j0, spherical_bessel_roots, spherical_bessel_smooth,
};
pub use bond_expansion::{BondExpansion, RadialBasis};
pub use cutoff::{CutoffEnvelope, cosine_cutoff, polynomial_cutoff};
pub use embedding::{Embedded, EmbeddingBlock, StateEmbedding};
pub use mlp::{GatedMlp, Mlp};
pub use three_body::{SphericalBesselWithHarmonics, ThreeBodyInteractions, TripleWeighting};
