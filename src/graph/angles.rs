//! Bond angles and azimuthal angles of line-graph triples.
//!
//! For a triple with bonds `A = i -> j` and `B = i -> k`, the bond angle is
//! `theta = acos(A . B / (|A| |B|))`. The azimuthal angle `phi` is the angle
//! of `B` around `A`, measured in a local frame whose z axis is `A` and whose
//! x axis is the projection of a fixed reference axis onto the plane normal
//! to `A`. The reference is the global z axis, or the global x axis when `A`
//! is within `PARALLEL_TOLERANCE` of it.

use std::f64::consts::TAU;

use candle_core::{D, Tensor};
use log::{debug, warn};

use super::geometry::{DISTANCE_EPSILON, DegeneracyKind, DegenerateGeometry, PairGeometry};
use super::line_graph::LineGraph;
use crate::error::Error;

/// Alignment (|cos|) above which the fallback reference axis is used.
pub const PARALLEL_TOLERANCE: f64 = 1e-6;

/// Angular data of every triple of a line graph, in triple order.
#[derive(Debug, Clone)]
pub struct TripleAngles {
    /// `(T,)` `F64` cosine of the bond angle, clamped to `[-1, 1]`.
    pub cos_theta: Tensor,
    /// `(T,)` `F64` bond angle in `[0, pi]`.
    pub theta: Tensor,
    /// `(T,)` `F64` azimuthal angle in `[0, 2 pi)`, when requested.
    pub phi: Option<Tensor>,
    /// `(T,)` `F64` length of the second bond of each triple.
    pub triple_bond_lengths: Tensor,
    pub degenerate: Vec<DegenerateGeometry>,
}

impl TripleAngles {
    pub fn num_triples(&self) -> usize {
        self.cos_theta.dims1().unwrap_or(0)
    }
}

/// Computes bond angles (and optionally azimuthal angles) for all triples.
///
/// # Arguments
///
/// * `geometry` - Bond vectors of the base graph
/// * `line_graph` - Triples built from the same base graph
/// * `with_phi` - Whether to compute the azimuthal angle
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the line graph was built for a
/// different number of base edges, or [`Error::Tensor`] on tensor failures.
pub fn compute_theta_and_phi(
    geometry: &PairGeometry,
    line_graph: &LineGraph,
    with_phi: bool,
) -> Result<TripleAngles, Error> {
    if geometry.num_edges() != line_graph.num_base_edges {
        return Err(Error::shape_mismatch(
            "line graph base edges",
            geometry.num_edges(),
            line_graph.num_base_edges,
        ));
    }

    let device = geometry.bond_vec.device();
    let (first, second) = line_graph.triple_bond_tensors(device)?;
    let num_triples = line_graph.num_edges();

    if num_triples == 0 {
        let empty = Tensor::zeros(0, geometry.bond_dist.dtype(), device)?;
        return Ok(TripleAngles {
            cos_theta: empty.clone(),
            theta: empty.clone(),
            phi: with_phi.then(|| empty.clone()),
            triple_bond_lengths: empty,
            degenerate: Vec::new(),
        });
    }

    let vec_a = geometry.bond_vec.index_select(&first, 0)?;
    let vec_b = geometry.bond_vec.index_select(&second, 0)?;
    let len_a = geometry.bond_dist.index_select(&first, 0)?;
    let len_b = geometry.bond_dist.index_select(&second, 0)?;

    let dots = (&vec_a * &vec_b)?.sum(D::Minus1)?;
    let denom = (len_a.maximum(DISTANCE_EPSILON)? * len_b.maximum(DISTANCE_EPSILON)?)?;
    let cos_theta = (dots / denom)?.clamp(-1.0, 1.0)?;

    // candle has no acos, so this one step runs on the host.
    let theta: Vec<f64> = cos_theta.to_vec1::<f64>()?.iter().map(|c| c.acos()).collect();
    let theta = Tensor::from_vec(theta, num_triples, device)?;

    let (phi, degenerate) = if with_phi {
        let (phi, fallback) = azimuths(&vec_a, &len_a, &vec_b)?;
        (Some(phi), fallback)
    } else {
        (None, Vec::new())
    };

    if !degenerate.is_empty() {
        debug!(
            "{} of {} triples used the fallback azimuthal reference axis",
            degenerate.len(),
            num_triples
        );
    }
    let zero_bonds = line_graph
        .triple_bond_ids()
        .0
        .iter()
        .filter(|&&e| geometry.degenerate.iter().any(|d| d.index == e as usize))
        .count();
    if zero_bonds > 0 {
        warn!("{} triples involve near-zero-length bonds", zero_bonds);
    }

    Ok(TripleAngles {
        cos_theta,
        theta,
        phi,
        triple_bond_lengths: len_b,
        degenerate,
    })
}

/// Azimuth of each second bond around its first bond, in `[0, 2 pi)`.
///
/// The local frame is built for the whole `(T, 3)` batch; only the final
/// `atan2` runs per triple. Also returns the triples that needed the
/// fallback reference axis.
fn azimuths(
    vec_a: &Tensor,
    len_a: &Tensor,
    vec_b: &Tensor,
) -> Result<(Tensor, Vec<DegenerateGeometry>), Error> {
    let (num_triples, _) = vec_a.dims2()?;
    let device = vec_a.device();

    let ez = vec_a.broadcast_div(&len_a.maximum(DISTANCE_EPSILON)?.unsqueeze(1)?)?;
    let alignment = ez.narrow(1, 2, 1)?.abs()?;
    let parallel = alignment
        .gt(1.0 - PARALLEL_TOLERANCE)?
        .broadcast_as((num_triples, 3))?;
    let axis = |v: [f64; 3]| Tensor::new(&v, device)?.broadcast_as((num_triples, 3));
    let reference = parallel.where_cond(&axis([1.0, 0.0, 0.0])?, &axis([0.0, 0.0, 1.0])?)?;

    let along = (&reference * &ez)?.sum_keepdim(1)?;
    let ex = (reference - ez.broadcast_mul(&along)?)?;
    let ex = ex.broadcast_div(&ex.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(DISTANCE_EPSILON)?)?;
    let ey = cross_rows(&ez, &ex)?;

    let x = (vec_b * &ex)?.sum(D::Minus1)?.to_vec1::<f64>()?;
    let y = (vec_b * &ey)?.sum(D::Minus1)?.to_vec1::<f64>()?;
    let len_a = len_a.to_vec1::<f64>()?;
    let alignment = alignment.squeeze(1)?.to_vec1::<f64>()?;

    let mut degenerate = Vec::new();
    let phi: Vec<f64> = (0..num_triples)
        .map(|t| {
            if len_a[t] < DISTANCE_EPSILON {
                return 0.0;
            }
            if alignment[t] > 1.0 - PARALLEL_TOLERANCE {
                degenerate.push(DegenerateGeometry {
                    kind: DegeneracyKind::ParallelReferenceAxis,
                    index: t,
                    magnitude: alignment[t],
                });
            }
            if x[t].hypot(y[t]) < DISTANCE_EPSILON {
                return 0.0;
            }
            let phi = y[t].atan2(x[t]).rem_euclid(TAU);
            // rem_euclid can round up to exactly TAU for tiny negative angles.
            if phi >= TAU { 0.0 } else { phi }
        })
        .collect();

    Ok((Tensor::from_vec(phi, num_triples, device)?, degenerate))
}

/// Row-wise cross product of two `(T, 3)` tensors.
fn cross_rows(a: &Tensor, b: &Tensor) -> candle_core::Result<Tensor> {
    let col = |t: &Tensor, k: usize| t.narrow(1, k, 1);
    let (a0, a1, a2) = (col(a, 0)?, col(a, 1)?, col(a, 2)?);
    let (b0, b1, b2) = (col(b, 0)?, col(b, 1)?, col(b, 2)?);
    Tensor::cat(
        &[
            ((&a1 * &b2)? - (&a2 * &b1)?)?,
            ((&a2 * &b0)? - (&a0 * &b2)?)?,
            ((&a0 * &b1)? - (&a1 * &b0)?)?,
        ],
        1,
    )
}
