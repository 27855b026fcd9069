//! Three-body graph featurization of crystals and molecules for
//! materials-property models.
//!
//! The crate turns atomic structures into directed atom-pair graphs,
//! derives the bond-angle line graph used for three-body terms, and expands
//! distances and angles into radial and angular bases that learned
//! interaction layers consume.
//!
//! # Features
//!
//! - **Graph construction**: Cell-list neighbor search with periodic images
//!   for crystals, plain pair search for molecules
//! - **Line graphs**: Ordered bond pairs around every atom within a tighter
//!   three-body cutoff, with bond angles and optional azimuthal angles
//! - **Basis functions**: Spherical Bessel (plain and smooth), Gaussian and
//!   sine radial bases, real spherical harmonics, and polynomial or cosine
//!   cutoff envelopes
//! - **Layers**: Species/edge/state embeddings and the three-body bond
//!   update, built on `candle`
//!
//! # Quick Start
//!
//! The [`featurize()`] function runs the whole pipeline for one structure.
//! Its output feeds straight into the learned layers:
//!
//! ```
//! use atomgraph::{ElementVocabulary, GraphConfig, Lattice, Structure, featurize};
//! use atomgraph::{EmbeddingBlock, FLOAT_DTYPE, ThreeBodyInteractions};
//! use candle_core::Device;
//! use candle_nn::{VarBuilder, VarMap};
//!
//! // Body-centered cubic MoS cell, a = 4 Å
//! let structure = Structure::periodic_fractional(
//!     Lattice::cubic(4.0),
//!     ["Mo", "S"],
//!     [[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
//! )?;
//! let vocabulary = ElementVocabulary::from_structures([&structure])?;
//! let config = GraphConfig {
//!     num_node_feats: 16,
//!     num_edge_feats: 16,
//!     ..Default::default()
//! };
//!
//! let featurized = featurize(&structure, &vocabulary, &config, &Device::Cpu)?;
//! assert_eq!(featurized.graph.num_edges(), 28);
//! assert_eq!(featurized.num_triples(), 364);
//! assert_eq!(featurized.three_basis.dims(), &[364, 9]);
//!
//! let varmap = VarMap::new();
//! let vb = VarBuilder::from_varmap(&varmap, FLOAT_DTYPE, &Device::Cpu);
//! let embedding = EmbeddingBlock::from_config(&config, vocabulary.len(), vb.pp("embedding"))?;
//! let three_body = ThreeBodyInteractions::from_config(&config, vb.pp("three_body"))?;
//!
//! let node_types = featurized.graph.node_types_tensor(&Device::Cpu)?;
//! let embedded = embedding.forward(&node_types, &featurized.bond_basis, None)?;
//! let edge_feat = three_body.forward(
//!     &featurized.graph,
//!     &featurized.line_graph,
//!     &featurized.three_basis,
//!     &featurized.three_cutoff,
//!     &embedded.node_feat,
//!     &embedded.edge_feat,
//! )?;
//! assert_eq!(edge_feat.dims(), &[28, 16]);
//! # Ok::<(), atomgraph::Error>(())
//! ```
//!
//! # Module Organization
//!
//! - [`model`] - Structures, lattices, element vocabularies and atom graphs
//! - [`graph`] - Neighbor search, conversion, pair geometry, line graphs, angles
//! - [`layers`] - Basis functions, cutoff envelopes, embeddings, three-body layer
//! - [`config`] - TOML-loadable [`GraphConfig`]
//! - [`featurize`](mod@featurize) - The end-to-end [`Featurizer`]
//!
//! # Threading
//!
//! Everything is synchronous. A graph and its feature tensors are meant to
//! be driven by one pipeline at a time; sharing one instance between
//! concurrent forward passes is the caller's responsibility.

use candle_core::DType;

pub mod config;
pub mod error;
pub mod featurize;
pub mod graph;
pub mod layers;
pub mod model;

/// Dtype of learned features and layer parameters. Geometry stays `F64`.
pub const FLOAT_DTYPE: DType = DType::F32;

pub use config::GraphConfig;
pub use error::Error;
pub use featurize::{FeaturizedGraph, Featurizer, featurize};

pub use model::graph::AtomicGraph;
pub use model::structure::{Lattice, Site, Structure};
pub use model::vocabulary::{DEFAULT_ELEMENT_TYPES, ElementVocabulary};

pub use graph::{
    DEFAULT_STATE_DIM, DegeneracyKind, DegenerateGeometry, LineGraph, PairGeometry,
    StructureGraphConverter, TripleAngles, compute_pair_vector_and_distance,
    compute_theta_and_phi,
};

pub use layers::{
    Activation, BondExpansion, CutoffEnvelope, Embedded, EmbeddingBlock, GatedMlp,
    GaussianExpansion, Mlp, RadialBasis, SphericalBesselFunction, SphericalBesselWithHarmonics,
    SphericalHarmonicsFunction, StateEmbedding, ThreeBodyInteractions, TripleWeighting,
};
