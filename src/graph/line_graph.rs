//! Bond graphs for three-body terms.
//!
//! A [`LineGraph`] has one node per bond of an [`AtomicGraph`] that lies
//! within the three-body cutoff, and one edge per ordered pair of distinct
//! such bonds leaving the same atom. Each line-graph edge is a bond-angle
//! triple `(j, i, k)` centered on atom `i`.

use candle_core::{Device, Tensor};
use log::debug;

use super::geometry::PairGeometry;
use crate::error::{Error, check_cutoff_pair};
use crate::model::graph::AtomicGraph;

/// The line graph of an [`AtomicGraph`] restricted to a three-body cutoff.
///
/// Bonds are referred to by their position in the base graph's edge arrays.
/// The base graph's edge order must therefore stay fixed for as long as the
/// line graph is in use; re-indexing the base graph invalidates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineGraph {
    /// Base-graph edge index of each line-graph node.
    pub bond_ids: Vec<u32>,
    /// Line-graph node of the first bond of each triple.
    pub src: Vec<u32>,
    /// Line-graph node of the second bond of each triple.
    pub dst: Vec<u32>,
    /// Atom shared by both bonds of each triple.
    pub center_atoms: Vec<u32>,
    /// Far atom of the second bond of each triple.
    pub neighbor_atoms: Vec<u32>,
    /// Number of edges in the base graph.
    pub num_base_edges: usize,
}

impl LineGraph {
    /// Builds the line graph of `graph` for bonds no longer than
    /// `threebody_cutoff`.
    ///
    /// Atoms with fewer than two bonds inside the cutoff contribute no
    /// triples; an atom with `n` such bonds contributes `n * (n - 1)`. A
    /// cutoff that excludes every bond yields an empty line graph.
    ///
    /// # Arguments
    ///
    /// * `graph` - The base atom graph
    /// * `geometry` - Bond distances of `graph`, in edge order
    /// * `threebody_cutoff` - Inclusive bond-length limit, at most the graph cutoff
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCutoff`] if `threebody_cutoff` is invalid or
    /// exceeds the graph cutoff, or [`Error::ShapeMismatch`] if `geometry`
    /// was computed for a different number of edges.
    pub fn build(
        graph: &AtomicGraph,
        geometry: &PairGeometry,
        threebody_cutoff: f64,
    ) -> Result<Self, Error> {
        check_cutoff_pair(graph.cutoff, threebody_cutoff)?;
        let num_edges = graph.num_edges();
        if geometry.num_edges() != num_edges {
            return Err(Error::shape_mismatch(
                "bond distances",
                num_edges,
                geometry.num_edges(),
            ));
        }

        let distances = geometry.bond_dist.to_vec1::<f64>()?;

        // Line-graph nodes grouped by the atom they leave.
        let mut bond_ids = Vec::new();
        let mut by_atom: Vec<Vec<u32>> = vec![Vec::new(); graph.num_nodes()];
        for (edge, &d) in distances.iter().enumerate() {
            if d <= threebody_cutoff {
                let node = bond_ids.len() as u32;
                bond_ids.push(edge as u32);
                by_atom[graph.src[edge] as usize].push(node);
            }
        }

        let num_triples: usize = by_atom.iter().map(|b| b.len() * b.len().saturating_sub(1)).sum();
        let mut src = Vec::with_capacity(num_triples);
        let mut dst = Vec::with_capacity(num_triples);
        let mut center_atoms = Vec::with_capacity(num_triples);
        let mut neighbor_atoms = Vec::with_capacity(num_triples);
        for (atom, nodes) in by_atom.iter().enumerate() {
            for &a in nodes {
                for &b in nodes {
                    if a == b {
                        continue;
                    }
                    src.push(a);
                    dst.push(b);
                    center_atoms.push(atom as u32);
                    neighbor_atoms.push(graph.dst[bond_ids[b as usize] as usize]);
                }
            }
        }

        debug!(
            "line graph: {} of {} bonds within {}, {} triples",
            bond_ids.len(),
            num_edges,
            threebody_cutoff,
            src.len()
        );

        Ok(Self {
            bond_ids,
            src,
            dst,
            center_atoms,
            neighbor_atoms,
            num_base_edges: num_edges,
        })
    }

    /// Number of line-graph nodes (bonds within the three-body cutoff).
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.bond_ids.len()
    }

    /// Number of line-graph edges (ordered triples).
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.src.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    /// Base-graph edge indices of the first and second bond of every triple.
    pub fn triple_bond_ids(&self) -> (Vec<u32>, Vec<u32>) {
        let first = self.src.iter().map(|&n| self.bond_ids[n as usize]).collect();
        let second = self.dst.iter().map(|&n| self.bond_ids[n as usize]).collect();
        (first, second)
    }

    /// Number of triples whose first bond is each base-graph edge.
    pub fn triples_per_edge(&self) -> Vec<u32> {
        let mut counts = vec![0u32; self.num_base_edges];
        for &n in &self.src {
            counts[self.bond_ids[n as usize] as usize] += 1;
        }
        counts
    }

    /// [`triple_bond_ids`](Self::triple_bond_ids) as a pair of `U32`
    /// tensors of shape `(T,)`.
    pub fn triple_bond_tensors(&self, device: &Device) -> Result<(Tensor, Tensor), Error> {
        let (first, second) = self.triple_bond_ids();
        let t = first.len();
        Ok((
            Tensor::from_vec(first, t, device)?,
            Tensor::from_vec(second, t, device)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::geometry::compute_pair_vector_and_distance;

    /// Water-like star: atom 0 bonded to atoms 1 and 2, plus a long bond to 3.
    fn star() -> AtomicGraph {
        AtomicGraph {
            node_types: vec![0, 1, 1, 1],
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 3.5],
            ],
            src: vec![0, 0, 0, 1, 2, 3],
            dst: vec![1, 2, 3, 0, 0, 0],
            images: vec![[0; 3]; 6],
            lattice: None,
            cutoff: 4.0,
            num_species: 2,
        }
    }

    fn build(g: &AtomicGraph, cutoff: f64) -> Result<LineGraph, Error> {
        let geom = compute_pair_vector_and_distance(g, &Device::Cpu).unwrap();
        LineGraph::build(g, &geom, cutoff)
    }

    #[test]
    fn ordered_pairs_per_center() {
        let lg = build(&star(), 2.0).unwrap();
        assert_eq!(lg.num_nodes(), 4);
        assert_eq!(lg.bond_ids, vec![0, 1, 3, 4]);
        // Only atom 0 has two short bonds: (0,1) and (1,0).
        assert_eq!(lg.num_edges(), 2);
        assert_eq!(lg.src, vec![0, 1]);
        assert_eq!(lg.dst, vec![1, 0]);
        assert_eq!(lg.center_atoms, vec![0, 0]);
        assert_eq!(lg.neighbor_atoms, vec![2, 1]);
        assert_eq!(lg.triple_bond_ids(), (vec![0, 1], vec![1, 0]));
        assert_eq!(lg.triples_per_edge(), vec![1, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn larger_cutoff_includes_long_bond() {
        let lg = build(&star(), 4.0).unwrap();
        assert_eq!(lg.num_nodes(), 6);
        assert_eq!(lg.num_edges(), 6);
        assert!(lg.src.iter().zip(&lg.dst).all(|(a, b)| a != b));
    }

    #[test]
    fn cutoff_excluding_everything_is_empty() {
        let lg = build(&star(), 0.5).unwrap();
        assert!(lg.is_empty());
        assert_eq!(lg.num_nodes(), 0);
        assert_eq!(lg.triples_per_edge(), vec![0; 6]);
    }

    #[test]
    fn threebody_cutoff_above_graph_cutoff_fails() {
        let err = build(&star(), 4.5).unwrap_err();
        assert!(matches!(err, Error::InvalidCutoff { .. }));
    }

    #[test]
    fn mismatched_geometry_fails() {
        let g = star();
        let geom = compute_pair_vector_and_distance(&g, &Device::Cpu).unwrap();
        let mut other = g.clone();
        other.src.pop();
        other.dst.pop();
        other.images.pop();
        let err = LineGraph::build(&other, &geom, 2.0).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 5, actual: 6, .. }));
    }
}
