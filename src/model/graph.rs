use candle_core::{Device, Tensor};

use super::structure::Lattice;
use crate::error::Error;

/// A directed atom-pair graph built from an atomic structure.
///
/// Nodes are atoms, edges are ordered pairs `(src, dst)` within the graph
/// cutoff. A symmetric interaction appears twice, once in each direction,
/// with opposite image shifts. `images[e]` is the periodic image of `dst`
/// that `src` bonds to (all zeros for molecules).
///
/// The topology is frozen after construction: line graphs refer to edges by
/// position, so reordering the edge arrays invalidates every line graph built
/// from this graph.
#[derive(Debug, Clone)]
pub struct AtomicGraph {
    pub node_types: Vec<u32>,
    pub positions: Vec<[f64; 3]>,
    pub src: Vec<u32>,
    pub dst: Vec<u32>,
    pub images: Vec<[i32; 3]>,
    pub lattice: Option<Lattice>,
    pub cutoff: f64,
    pub num_species: usize,
}

impl AtomicGraph {
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.node_types.len()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.src.len()
    }

    #[inline]
    pub fn is_periodic(&self) -> bool {
        self.lattice.is_some()
    }

    /// Number of edges leaving each node.
    pub fn out_degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.num_nodes()];
        for &s in &self.src {
            degrees[s as usize] += 1;
        }
        degrees
    }

    /// Cartesian translation applied to `dst` for every edge, in edge order.
    pub fn image_shifts(&self) -> Vec<[f64; 3]> {
        match &self.lattice {
            Some(lattice) => self.images.iter().map(|&i| lattice.image_shift(i)).collect(),
            None => vec![[0.0; 3]; self.num_edges()],
        }
    }

    /// Species indices as a `U32` tensor of shape `(N,)`.
    pub fn node_types_tensor(&self, device: &Device) -> Result<Tensor, Error> {
        Ok(Tensor::from_slice(&self.node_types, self.num_nodes(), device)?)
    }

    /// One-hot species attributes of shape `(N, num_species)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStructure`] if a node type is not below
    /// `num_species`.
    pub fn node_attr(&self, device: &Device) -> Result<Tensor, Error> {
        let n = self.num_nodes();
        let mut data = vec![0f32; n * self.num_species];
        for (i, &t) in self.node_types.iter().enumerate() {
            let t = t as usize;
            if t >= self.num_species {
                return Err(Error::InvalidStructure(format!(
                    "node {i} has species index {t}, but the graph has {} species",
                    self.num_species
                )));
            }
            data[i * self.num_species + t] = 1.0;
        }
        Ok(Tensor::from_vec(data, (n, self.num_species), device)?)
    }

    /// Edge endpoints as a pair of `U32` tensors of shape `(E,)`.
    pub fn edge_tensors(&self, device: &Device) -> Result<(Tensor, Tensor), Error> {
        let e = self.num_edges();
        Ok((
            Tensor::from_slice(&self.src, e, device)?,
            Tensor::from_slice(&self.dst, e, device)?,
        ))
    }

    /// Node positions as an `F64` tensor of shape `(N, 3)`.
    pub fn positions_tensor(&self, device: &Device) -> Result<Tensor, Error> {
        let flat: Vec<f64> = self.positions.iter().flatten().copied().collect();
        Ok(Tensor::from_vec(flat, (self.num_nodes(), 3), device)?)
    }
}
