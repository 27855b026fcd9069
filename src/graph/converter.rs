//! Conversion of atomic structures into [`AtomicGraph`]s.

use log::{debug, trace};

use super::neighbors::find_neighbor_pairs;
use crate::error::{Error, check_cutoff};
use crate::model::graph::AtomicGraph;
use crate::model::structure::{Lattice, Structure};
use crate::model::vocabulary::ElementVocabulary;

/// Length of the state vector attached to structures that carry none.
pub const DEFAULT_STATE_DIM: usize = 2;

/// Builds atom-pair graphs from structures using a fixed element vocabulary
/// and cutoff radius.
///
/// The vocabulary is owned by the converter so that every graph it produces
/// uses the same species indices.
#[derive(Debug, Clone)]
pub struct StructureGraphConverter {
    vocabulary: ElementVocabulary,
    cutoff: f64,
}

impl StructureGraphConverter {
    /// Creates a converter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCutoff`] if `cutoff` is not a finite positive
    /// number.
    pub fn new(vocabulary: ElementVocabulary, cutoff: f64) -> Result<Self, Error> {
        check_cutoff(cutoff)?;
        Ok(Self { vocabulary, cutoff })
    }

    pub fn vocabulary(&self) -> &ElementVocabulary {
        &self.vocabulary
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Converts any structure, dispatching on whether it has a lattice.
    ///
    /// # Returns
    ///
    /// The graph and the state attribute vector. The state is the
    /// structure's own when present, otherwise [`DEFAULT_STATE_DIM`] zeros.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownElement`] if a species is missing from the
    /// vocabulary.
    pub fn convert(&self, structure: &Structure) -> Result<(AtomicGraph, Vec<f32>), Error> {
        if structure.is_periodic() {
            self.graph_from_structure(structure)
        } else {
            self.graph_from_molecule(structure)
        }
    }

    /// Converts a periodic structure, including bonds to periodic images.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStructure`] if the structure has no lattice,
    /// or [`Error::UnknownElement`] for a species missing from the
    /// vocabulary.
    pub fn graph_from_structure(
        &self,
        structure: &Structure,
    ) -> Result<(AtomicGraph, Vec<f32>), Error> {
        let lattice = structure.lattice.ok_or_else(|| {
            Error::InvalidStructure("periodic conversion requires a lattice".to_string())
        })?;
        self.build(structure, Some(lattice))
    }

    /// Converts a finite molecule. Only pairs within the same image qualify;
    /// a lattice on the structure, if any, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownElement`] for a species missing from the
    /// vocabulary.
    pub fn graph_from_molecule(
        &self,
        structure: &Structure,
    ) -> Result<(AtomicGraph, Vec<f32>), Error> {
        self.build(structure, None)
    }

    fn build(
        &self,
        structure: &Structure,
        lattice: Option<Lattice>,
    ) -> Result<(AtomicGraph, Vec<f32>), Error> {
        let node_types = structure
            .sites
            .iter()
            .map(|site| self.vocabulary.index_of(&site.species).map(|i| i as u32))
            .collect::<Result<Vec<_>, _>>()?;

        let positions = structure.positions();
        let pairs = find_neighbor_pairs(&positions, lattice.as_ref(), self.cutoff);
        trace!(
            "neighbor search over {} sites found {} pairs",
            positions.len(),
            pairs.len()
        );

        let mut src = Vec::with_capacity(pairs.len());
        let mut dst = Vec::with_capacity(pairs.len());
        let mut images = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            src.push(pair.center as u32);
            dst.push(pair.neighbor as u32);
            images.push(pair.image);
        }

        let graph = AtomicGraph {
            node_types,
            positions,
            src,
            dst,
            images,
            lattice,
            cutoff: self.cutoff,
            num_species: self.vocabulary.len(),
        };
        debug!(
            "built {} graph with {} nodes and {} edges (cutoff {})",
            if graph.is_periodic() { "periodic" } else { "molecular" },
            graph.num_nodes(),
            graph.num_edges(),
            self.cutoff
        );

        let state = structure
            .state
            .clone()
            .unwrap_or_else(|| vec![0.0; DEFAULT_STATE_DIM]);
        Ok((graph, state))
    }
}
