//! Batched bond vectors and distances.

use std::fmt;

use candle_core::{D, DType, Device, Tensor};
use log::warn;

use crate::error::Error;
use crate::model::graph::AtomicGraph;

/// Lengths below this value are treated as zero when normalizing vectors.
pub const DISTANCE_EPSILON: f64 = 1e-8;

/// The kind of degenerate configuration encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegeneracyKind {
    /// A bond whose length is below [`DISTANCE_EPSILON`].
    ZeroLengthBond,
    /// A bond nearly parallel to the fixed reference axis of the azimuthal
    /// frame, which forced the fallback axis.
    ParallelReferenceAxis,
}

/// A recoverable numerical degeneracy.
///
/// These are reported rather than raised: computation continues with an
/// epsilon-clamped denominator or the fallback axis, and the record tells
/// the caller which item was affected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegenerateGeometry {
    pub kind: DegeneracyKind,
    /// Edge index for bonds, line-graph edge index for angles.
    pub index: usize,
    /// The offending length or alignment.
    pub magnitude: f64,
}

impl fmt::Display for DegenerateGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DegeneracyKind::ZeroLengthBond => {
                write!(f, "bond {} has near-zero length {:e}", self.index, self.magnitude)
            }
            DegeneracyKind::ParallelReferenceAxis => write!(
                f,
                "triple {} is parallel to the reference axis (|cos| = {})",
                self.index, self.magnitude
            ),
        }
    }
}

/// Bond vectors and distances for every edge of a graph.
#[derive(Debug, Clone)]
pub struct PairGeometry {
    /// `(E, 3)` `F64` vectors from source to (shifted) destination.
    pub bond_vec: Tensor,
    /// `(E,)` `F64` Euclidean lengths of `bond_vec`.
    pub bond_dist: Tensor,
    pub degenerate: Vec<DegenerateGeometry>,
}

impl PairGeometry {
    pub fn num_edges(&self) -> usize {
        self.bond_dist.dims1().unwrap_or(0)
    }

    /// Bond vectors divided by their length, with the length clamped to
    /// [`DISTANCE_EPSILON`] so zero-length bonds map to zero vectors.
    pub fn unit_vectors(&self) -> Result<Tensor, Error> {
        let denom = self.bond_dist.maximum(DISTANCE_EPSILON)?.unsqueeze(1)?;
        Ok(self.bond_vec.broadcast_div(&denom)?)
    }
}

/// Computes `bond_vec = pos[dst] + shift - pos[src]` and its norm for every
/// edge in one batched pass.
///
/// Near-zero distances are kept, logged and recorded in
/// [`PairGeometry::degenerate`].
///
/// # Errors
///
/// Returns [`Error::Tensor`] if a tensor operation fails.
pub fn compute_pair_vector_and_distance(
    graph: &AtomicGraph,
    device: &Device,
) -> Result<PairGeometry, Error> {
    let num_edges = graph.num_edges();
    if num_edges == 0 {
        return Ok(PairGeometry {
            bond_vec: Tensor::zeros((0, 3), DType::F64, device)?,
            bond_dist: Tensor::zeros(0, DType::F64, device)?,
            degenerate: Vec::new(),
        });
    }

    let positions = graph.positions_tensor(device)?;
    let (src, dst) = graph.edge_tensors(device)?;
    let shifts: Vec<f64> = graph.image_shifts().into_iter().flatten().collect();
    let shifts = Tensor::from_vec(shifts, (num_edges, 3), device)?;

    let bond_vec = ((positions.index_select(&dst, 0)? + shifts)? - positions.index_select(&src, 0)?)?;
    let bond_dist = bond_vec.sqr()?.sum(D::Minus1)?.sqrt()?;

    let degenerate: Vec<DegenerateGeometry> = bond_dist
        .to_vec1::<f64>()?
        .into_iter()
        .enumerate()
        .filter(|&(_, d)| d < DISTANCE_EPSILON)
        .map(|(index, magnitude)| DegenerateGeometry {
            kind: DegeneracyKind::ZeroLengthBond,
            index,
            magnitude,
        })
        .collect();
    for record in &degenerate {
        warn!("{}", record);
    }

    Ok(PairGeometry {
        bond_vec,
        bond_dist,
        degenerate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::structure::Lattice;
    use approx::assert_relative_eq;

    fn chain() -> AtomicGraph {
        AtomicGraph {
            node_types: vec![0, 0],
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0]],
            src: vec![0, 1, 0],
            dst: vec![1, 0, 1],
            images: vec![[0, 0, 0], [0, 0, 0], [-1, 0, 0]],
            lattice: Some(Lattice::cubic(3.0)),
            cutoff: 3.0,
            num_species: 1,
        }
    }

    #[test]
    fn vectors_include_image_shift() {
        let geom = compute_pair_vector_and_distance(&chain(), &Device::Cpu).unwrap();
        let vec = geom.bond_vec.to_vec2::<f64>().unwrap();
        assert_eq!(vec[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(vec[1], vec![-1.0, 0.0, 0.0]);
        assert_eq!(vec[2], vec![-2.0, 0.0, 0.0]);
        let dist = geom.bond_dist.to_vec1::<f64>().unwrap();
        assert_relative_eq!(dist[2], 2.0);
        assert!(geom.degenerate.is_empty());
        assert_eq!(geom.num_edges(), 3);
    }

    #[test]
    fn zero_length_bond_is_reported_not_nan() {
        let mut g = chain();
        g.positions[1] = [0.0; 3];
        g.lattice = None;
        let geom = compute_pair_vector_and_distance(&g, &Device::Cpu).unwrap();
        assert_eq!(geom.degenerate.len(), 3);
        assert_eq!(geom.degenerate[0].kind, DegeneracyKind::ZeroLengthBond);

        let unit = geom.unit_vectors().unwrap().to_vec2::<f64>().unwrap();
        assert!(unit.iter().flatten().all(|x| x.is_finite()));
    }

    #[test]
    fn empty_graph_gives_empty_tensors() {
        let mut g = chain();
        g.src.clear();
        g.dst.clear();
        g.images.clear();
        let geom = compute_pair_vector_and_distance(&g, &Device::Cpu).unwrap();
        assert_eq!(geom.bond_vec.dims(), &[0, 3]);
        assert_eq!(geom.num_edges(), 0);
    }
}
