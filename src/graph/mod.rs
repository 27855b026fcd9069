//! Graph construction pipeline.
//!
//! Structures are converted into atom-pair graphs ([`converter`]) using a
//! cell-list neighbor search ([`neighbors`]). Bond vectors and distances are
//! then computed in one batched pass ([`geometry`]), bonds within the
//! three-body cutoff are paired into a line graph ([`line_graph`]), and the
//! bond angles of those pairs are measured ([`angles`]).

pub mod angles;
pub mod converter;
pub mod geometry;
pub mod line_graph;
pub mod neighbors;

pub use angles::{TripleAngles, compute_theta_and_phi};
pub use converter::{DEFAULT_STATE_DIM, StructureGraphConverter};
pub use geometry::{DegeneracyKind, DegenerateGeometry, PairGeometry, compute_pair_vector_and_distance};
pub use line_graph::LineGraph;
