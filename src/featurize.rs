//! End-to-end featurization of a structure.
//!
//! Runs the full pipeline: structure to graph, pair geometry, line graph,
//! angles, radial bond expansion, three-body basis and the three-body
//! cutoff envelope. Every intermediate is kept on the result so that
//! interaction layers can consume whichever pieces they need.

use candle_core::{Device, Tensor};
use log::debug;

use crate::FLOAT_DTYPE;
use crate::config::GraphConfig;
use crate::error::Error;
use crate::graph::angles::{TripleAngles, compute_theta_and_phi};
use crate::graph::converter::StructureGraphConverter;
use crate::graph::geometry::{PairGeometry, compute_pair_vector_and_distance};
use crate::graph::line_graph::LineGraph;
use crate::layers::bond_expansion::BondExpansion;
use crate::layers::three_body::SphericalBesselWithHarmonics;
use crate::model::graph::AtomicGraph;
use crate::model::structure::Structure;
use crate::model::vocabulary::ElementVocabulary;

/// A structure together with all geometric features derived from it.
#[derive(Debug, Clone)]
pub struct FeaturizedGraph {
    pub graph: AtomicGraph,
    /// Global state attributes.
    pub state_attr: Vec<f32>,
    pub geometry: PairGeometry,
    pub line_graph: LineGraph,
    pub angles: TripleAngles,
    /// `(E, bond width)` radial features, [`FLOAT_DTYPE`].
    pub bond_basis: Tensor,
    /// `(T, three-body width)` basis per triple, [`FLOAT_DTYPE`].
    pub three_basis: Tensor,
    /// `(E,)` envelope of each bond at the three-body cutoff, [`FLOAT_DTYPE`].
    pub three_cutoff: Tensor,
}

impl FeaturizedGraph {
    #[inline]
    pub fn num_triples(&self) -> usize {
        self.line_graph.num_edges()
    }

    /// State attributes as a `(1, D)` tensor.
    pub fn state_tensor(&self, device: &Device) -> Result<Tensor, Error> {
        Ok(Tensor::from_slice(
            &self.state_attr,
            (1, self.state_attr.len()),
            device,
        )?)
    }
}

/// Reusable pipeline holding the converter and the fixed basis layers for
/// one [`GraphConfig`].
#[derive(Debug, Clone)]
pub struct Featurizer {
    config: GraphConfig,
    converter: StructureGraphConverter,
    bond_expansion: BondExpansion,
    three_body_basis: SphericalBesselWithHarmonics,
}

impl Featurizer {
    /// # Errors
    ///
    /// Returns the errors of [`GraphConfig::validate`], or
    /// [`Error::InvalidConfig`] if the basis layers cannot be built.
    pub fn new(vocabulary: ElementVocabulary, config: GraphConfig) -> Result<Self, Error> {
        config.validate()?;
        let converter = StructureGraphConverter::new(vocabulary, config.cutoff)?;
        let bond_expansion = BondExpansion::new(
            config.rbf_type,
            config.max_l,
            config.max_n,
            config.cutoff,
            config.use_smooth,
        )?;
        let three_body_basis = SphericalBesselWithHarmonics::new(
            config.max_n,
            config.max_l,
            config.cutoff,
            config.use_smooth,
            config.use_phi,
        )?;
        Ok(Self {
            config,
            converter,
            bond_expansion,
            three_body_basis,
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn converter(&self) -> &StructureGraphConverter {
        &self.converter
    }

    /// Width of [`FeaturizedGraph::bond_basis`].
    pub fn bond_width(&self) -> usize {
        self.bond_expansion.width()
    }

    /// Width of [`FeaturizedGraph::three_basis`].
    pub fn three_body_width(&self) -> usize {
        self.three_body_basis.width()
    }

    /// Featurizes one structure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownElement`] for species missing from the
    /// vocabulary, or [`Error::Tensor`] on tensor failures.
    pub fn featurize(&self, structure: &Structure, device: &Device) -> Result<FeaturizedGraph, Error> {
        let (graph, state_attr) = self.converter.convert(structure)?;
        let geometry = compute_pair_vector_and_distance(&graph, device)?;
        let line_graph = LineGraph::build(&graph, &geometry, self.config.threebody_cutoff)?;
        let angles = compute_theta_and_phi(&geometry, &line_graph, self.config.use_phi)?;

        let bond_basis = self
            .bond_expansion
            .forward(&geometry.bond_dist)?
            .to_dtype(FLOAT_DTYPE)?;
        let three_basis = self.three_body_basis.forward(&angles)?.to_dtype(FLOAT_DTYPE)?;
        let three_cutoff = self
            .config
            .cutoff_envelope
            .apply(&geometry.bond_dist, self.config.threebody_cutoff)?
            .to_dtype(FLOAT_DTYPE)?;

        debug!(
            "featurized {} atoms: {} bonds, {} triples",
            graph.num_nodes(),
            graph.num_edges(),
            line_graph.num_edges()
        );

        Ok(FeaturizedGraph {
            graph,
            state_attr,
            geometry,
            line_graph,
            angles,
            bond_basis,
            three_basis,
            three_cutoff,
        })
    }
}

/// Featurizes a single structure with a one-off [`Featurizer`].
///
/// # Errors
///
/// Same conditions as [`Featurizer::new`] and [`Featurizer::featurize`].
pub fn featurize(
    structure: &Structure,
    vocabulary: &ElementVocabulary,
    config: &GraphConfig,
    device: &Device,
) -> Result<FeaturizedGraph, Error> {
    Featurizer::new(vocabulary.clone(), config.clone())?.featurize(structure, device)
}
