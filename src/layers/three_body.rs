//! Three-body basis and bond updates.
//!
//! For every triple `(j, i, k)` of the line graph, the combined radial and
//! angular basis is weighted by a learned per-atom vector and by the cutoff
//! envelopes of both bonds, then summed onto the first bond of the triple.
//! Since the line graph holds both orderings of each pair of bonds, each
//! physical triple contributes to both of its bonds. The summed basis goes
//! through a gated MLP and is added to the existing edge features.

use candle_core::Tensor;
use candle_nn::{Module, VarBuilder};
use log::debug;
use serde::{Deserialize, Serialize};

use super::activation::Activation;
use super::basis::{SphericalBesselFunction, SphericalHarmonicsFunction, combine_sbf_shf};
use super::mlp::{GatedMlp, Mlp};
use crate::config::GraphConfig;
use crate::error::Error;
use crate::graph::angles::TripleAngles;
use crate::graph::line_graph::LineGraph;
use crate::model::graph::AtomicGraph;

/// Radial basis of the second bond times the angular basis of each triple.
///
/// The width is `max_n * max_l` without azimuth and `max_n * max_l^2`
/// with it, for both the plain and smooth radial variants.
#[derive(Debug, Clone)]
pub struct SphericalBesselWithHarmonics {
    max_n: usize,
    max_l: usize,
    use_phi: bool,
    sbf: SphericalBesselFunction,
    shf: SphericalHarmonicsFunction,
}

impl SphericalBesselWithHarmonics {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `max_n` or `max_l` is zero, or
    /// [`Error::InvalidCutoff`] for an invalid cutoff.
    pub fn new(
        max_n: usize,
        max_l: usize,
        cutoff: f64,
        use_smooth: bool,
        use_phi: bool,
    ) -> Result<Self, Error> {
        let sbf = if use_smooth {
            SphericalBesselFunction::new(max_l, max_n * max_l, cutoff, true)?
        } else {
            SphericalBesselFunction::new(max_l, max_n, cutoff, false)?
        };
        Ok(Self {
            max_n,
            max_l,
            use_phi,
            sbf,
            shf: SphericalHarmonicsFunction::new(max_l, use_phi),
        })
    }

    pub fn width(&self) -> usize {
        let angular = if self.use_phi { self.max_l } else { 1 };
        self.max_n * self.max_l * angular
    }

    /// Evaluates the basis for every triple, giving `(T, width)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if azimuthal harmonics are enabled
    /// but `angles` carries no `phi`.
    pub fn forward(&self, angles: &TripleAngles) -> Result<Tensor, Error> {
        let sbf = self.sbf.forward(&angles.triple_bond_lengths)?;
        let shf = self.shf.forward(&angles.cos_theta, angles.phi.as_ref())?;
        let basis = combine_sbf_shf(&sbf, &shf, self.max_n, self.max_l, self.use_phi)?;
        debug!("three-body basis: {:?}", basis.dims());
        Ok(basis)
    }
}

/// Which atom's learned weights scale the basis of a triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripleWeighting {
    /// The atom shared by both bonds.
    #[default]
    SharedAtom,

    /// The far atom of the second bond.
    NeighborAtom,
}

/// Updates edge features with three-body information.
#[derive(Debug, Clone)]
pub struct ThreeBodyInteractions {
    update_network_atom: Mlp,
    update_network_bond: GatedMlp,
    weighting: TripleWeighting,
    degree: usize,
}

impl ThreeBodyInteractions {
    /// Creates the layer.
    ///
    /// # Arguments
    ///
    /// * `num_node_feats` - Width of node features
    /// * `degree` - Width of the three-body basis
    /// * `num_edge_feats` - Width of edge features
    /// * `weighting` - Atom whose weights scale each triple
    /// * `activation` - Nonlinearity of the bond update network
    /// * `vb` - Parameter source
    ///
    /// The atom network always ends in a sigmoid so that triple weights
    /// stay in `(0, 1)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for zero widths.
    pub fn new(
        num_node_feats: usize,
        degree: usize,
        num_edge_feats: usize,
        weighting: TripleWeighting,
        activation: Activation,
        vb: VarBuilder,
    ) -> Result<Self, Error> {
        let update_network_atom = Mlp::new(
            &[num_node_feats, degree],
            Activation::Sigmoid,
            true,
            vb.pp("update_network_atom"),
        )?;
        let update_network_bond = GatedMlp::new(
            degree,
            &[num_edge_feats],
            activation,
            false,
            vb.pp("update_network_bond"),
        )?;
        Ok(Self {
            update_network_atom,
            update_network_bond,
            weighting,
            degree,
        })
    }

    /// Creates the layer with the widths, weighting and activation of
    /// `config`. The basis width is [`GraphConfig::three_body_width`].
    ///
    /// # Errors
    ///
    /// Returns the errors of [`GraphConfig::validate`].
    pub fn from_config(config: &GraphConfig, vb: VarBuilder) -> Result<Self, Error> {
        config.validate()?;
        Self::new(
            config.num_node_feats,
            config.three_body_width(),
            config.num_edge_feats,
            config.triple_weighting,
            config.activation,
            vb,
        )
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Returns the updated `(E, num_edge_feats)` edge features.
    ///
    /// Edges that are not the first bond of any triple keep their features
    /// unchanged; an empty line graph returns `edge_feat` as is.
    ///
    /// # Arguments
    ///
    /// * `graph` - The base graph
    /// * `line_graph` - Triples of `graph`
    /// * `three_basis` - `(T, degree)` basis per triple
    /// * `three_cutoff` - `(E,)` cutoff envelope per base edge
    /// * `node_feat` - `(N, num_node_feats)` node features
    /// * `edge_feat` - `(E, num_edge_feats)` edge features
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the inputs disagree on the number
    /// of nodes, edges, triples or basis columns.
    pub fn forward(
        &self,
        graph: &AtomicGraph,
        line_graph: &LineGraph,
        three_basis: &Tensor,
        three_cutoff: &Tensor,
        node_feat: &Tensor,
        edge_feat: &Tensor,
    ) -> Result<Tensor, Error> {
        let num_edges = graph.num_edges();
        check_rows("line graph base edges", num_edges, line_graph.num_base_edges)?;
        check_rows("edge features", num_edges, edge_feat.dim(0)?)?;
        check_rows("three-body cutoff", num_edges, three_cutoff.dim(0)?)?;
        check_rows("node features", graph.num_nodes(), node_feat.dim(0)?)?;
        let (num_triples, degree) = three_basis.dims2()?;
        check_rows("three-body basis rows", line_graph.num_edges(), num_triples)?;
        check_rows("three-body basis width", self.degree, degree)?;

        if line_graph.is_empty() {
            return Ok(edge_feat.clone());
        }

        let dtype = edge_feat.dtype();
        let device = edge_feat.device();

        let atoms = self.update_network_atom.forward(node_feat)?;
        let weighting_atoms = match self.weighting {
            TripleWeighting::SharedAtom => &line_graph.center_atoms,
            TripleWeighting::NeighborAtom => &line_graph.neighbor_atoms,
        };
        let weighting_atoms = Tensor::from_slice(weighting_atoms, num_triples, device)?;
        let weights = atoms.index_select(&weighting_atoms, 0)?;

        let (first, second) = line_graph.triple_bond_tensors(device)?;
        let three_cutoff = three_cutoff.to_dtype(dtype)?;
        let envelope = (three_cutoff.index_select(&first, 0)? * three_cutoff.index_select(&second, 0)?)?;

        let basis = (three_basis.to_dtype(dtype)? * weights)?.broadcast_mul(&envelope.unsqueeze(1)?)?;
        let new_bonds = Tensor::zeros((num_edges, degree), dtype, device)?.index_add(&first, &basis, 0)?;

        let mask: Vec<f32> = line_graph
            .triples_per_edge()
            .into_iter()
            .map(|n| if n > 0 { 1.0 } else { 0.0 })
            .collect();
        let mask = Tensor::from_vec(mask, (num_edges, 1), device)?.to_dtype(dtype)?;

        let update = self.update_network_bond.forward(&new_bonds)?.broadcast_mul(&mask)?;
        Ok((edge_feat + update)?)
    }
}

fn check_rows(what: &'static str, expected: usize, actual: usize) -> Result<(), Error> {
    if expected != actual {
        return Err(Error::shape_mismatch(what, expected, actual));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::angles::compute_theta_and_phi;
    use crate::graph::geometry::compute_pair_vector_and_distance;
    use crate::FLOAT_DTYPE;
    use crate::layers::cutoff::polynomial_cutoff;
    use candle_core::Device;
    use candle_nn::VarMap;

    /// Atom 0 bonded to 1 and 2, atom 3 isolated within the three-body cutoff.
    fn bent() -> AtomicGraph {
        AtomicGraph {
            node_types: vec![0, 1, 1, 1],
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.2, 0.0],
                [0.0, 0.0, 4.5],
            ],
            src: vec![0, 0, 1, 2, 0, 3],
            dst: vec![1, 2, 0, 0, 3, 0],
            images: vec![[0; 3]; 6],
            lattice: None,
            cutoff: 5.0,
            num_species: 2,
        }
    }

    struct Prepared {
        graph: AtomicGraph,
        line_graph: LineGraph,
        basis: Tensor,
        cutoff: Tensor,
    }

    fn prepare(use_phi: bool) -> Prepared {
        let graph = bent();
        let geom = compute_pair_vector_and_distance(&graph, &Device::Cpu).unwrap();
        let line_graph = LineGraph::build(&graph, &geom, 2.0).unwrap();
        let angles = compute_theta_and_phi(&geom, &line_graph, use_phi).unwrap();
        let sbf_shf = SphericalBesselWithHarmonics::new(3, 3, 5.0, false, use_phi).unwrap();
        let basis = sbf_shf.forward(&angles).unwrap();
        let cutoff = polynomial_cutoff(&geom.bond_dist, 2.0, 3).unwrap();
        Prepared {
            graph,
            line_graph,
            basis,
            cutoff,
        }
    }

    fn layer(degree: usize, weighting: TripleWeighting) -> ThreeBodyInteractions {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, FLOAT_DTYPE, &Device::Cpu);
        ThreeBodyInteractions::new(8, degree, 16, weighting, Activation::Silu, vb).unwrap()
    }

    #[test]
    fn basis_widths() {
        let cases = [
            ((3, 3, false, false), 9),
            ((3, 2, false, true), 12),
            ((3, 3, true, false), 9),
            ((3, 3, true, true), 27),
        ];
        for ((max_n, max_l, smooth, phi), width) in cases {
            let sbf_shf = SphericalBesselWithHarmonics::new(max_n, max_l, 5.0, smooth, phi).unwrap();
            assert_eq!(sbf_shf.width(), width);
        }
        assert_eq!(prepare(false).basis.dims(), &[2, 9]);
        assert_eq!(prepare(true).basis.dims(), &[2, 27]);
    }

    #[test]
    fn only_bonds_with_triples_change() {
        let p = prepare(false);
        let node_feat = Tensor::randn(0f32, 1.0, (4, 8), &Device::Cpu).unwrap();
        let edge_feat = Tensor::randn(0f32, 1.0, (6, 16), &Device::Cpu).unwrap();

        let three_body = layer(9, TripleWeighting::SharedAtom);
        let updated = three_body
            .forward(&p.graph, &p.line_graph, &p.basis, &p.cutoff, &node_feat, &edge_feat)
            .unwrap();
        assert_eq!(updated.dims(), &[6, 16]);

        let before = edge_feat.to_vec2::<f32>().unwrap();
        let after = updated.to_vec2::<f32>().unwrap();
        // Bonds 0 -> 1 and 0 -> 2 form the only triples.
        assert_ne!(before[0], after[0]);
        assert_ne!(before[1], after[1]);
        for e in 2..6 {
            assert_eq!(before[e], after[e]);
        }
    }

    #[test]
    fn neighbor_weighting_runs() {
        let p = prepare(true);
        let node_feat = Tensor::ones((4, 8), FLOAT_DTYPE, &Device::Cpu).unwrap();
        let edge_feat = Tensor::zeros((6, 16), FLOAT_DTYPE, &Device::Cpu).unwrap();
        let three_body = layer(27, TripleWeighting::NeighborAtom);
        let updated = three_body
            .forward(&p.graph, &p.line_graph, &p.basis, &p.cutoff, &node_feat, &edge_feat)
            .unwrap();
        assert_eq!(updated.dims(), &[6, 16]);
    }

    #[test]
    fn empty_line_graph_is_identity() {
        let graph = bent();
        let geom = compute_pair_vector_and_distance(&graph, &Device::Cpu).unwrap();
        let line_graph = LineGraph::build(&graph, &geom, 0.5).unwrap();
        let angles = compute_theta_and_phi(&geom, &line_graph, false).unwrap();
        let basis = SphericalBesselWithHarmonics::new(3, 3, 5.0, false, false)
            .unwrap()
            .forward(&angles)
            .unwrap();
        assert_eq!(basis.dims(), &[0, 9]);

        let cutoff = polynomial_cutoff(&geom.bond_dist, 0.5, 3).unwrap();
        let node_feat = Tensor::ones((4, 8), FLOAT_DTYPE, &Device::Cpu).unwrap();
        let edge_feat = Tensor::randn(0f32, 1.0, (6, 16), &Device::Cpu).unwrap();
        let updated = layer(9, TripleWeighting::SharedAtom)
            .forward(&graph, &line_graph, &basis, &cutoff, &node_feat, &edge_feat)
            .unwrap();
        assert_eq!(
            updated.to_vec2::<f32>().unwrap(),
            edge_feat.to_vec2::<f32>().unwrap()
        );
    }

    #[test]
    fn mismatched_edge_features_fail() {
        let p = prepare(false);
        let node_feat = Tensor::ones((4, 8), FLOAT_DTYPE, &Device::Cpu).unwrap();
        let edge_feat = Tensor::zeros((5, 16), FLOAT_DTYPE, &Device::Cpu).unwrap();
        let err = layer(9, TripleWeighting::SharedAtom)
            .forward(&p.graph, &p.line_graph, &p.basis, &p.cutoff, &node_feat, &edge_feat)
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { what: "edge features", .. }));
    }

    #[test]
    fn from_config_uses_configured_widths() {
        let config = GraphConfig {
            num_node_feats: 8,
            num_edge_feats: 12,
            use_phi: true,
            activation: Activation::Softplus2,
            triple_weighting: TripleWeighting::NeighborAtom,
            ..Default::default()
        };
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, FLOAT_DTYPE, &Device::Cpu);
        let three_body = ThreeBodyInteractions::from_config(&config, vb).unwrap();
        assert_eq!(three_body.degree(), 27);
        assert_eq!(three_body.weighting, TripleWeighting::NeighborAtom);

        let p = prepare(true);
        let node_feat = Tensor::ones((4, 8), FLOAT_DTYPE, &Device::Cpu).unwrap();
        let edge_feat = Tensor::zeros((6, 12), FLOAT_DTYPE, &Device::Cpu).unwrap();
        let updated = three_body
            .forward(&p.graph, &p.line_graph, &p.basis, &p.cutoff, &node_feat, &edge_feat)
            .unwrap();
        assert_eq!(updated.dims(), &[6, 12]);
    }

    #[test]
    fn activation_reaches_bond_update() {
        let p = prepare(false);
        let node_feat = Tensor::ones((4, 8), FLOAT_DTYPE, &Device::Cpu).unwrap();
        let edge_feat = Tensor::zeros((6, 16), FLOAT_DTYPE, &Device::Cpu).unwrap();

        // Same parameters, different activation.
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, FLOAT_DTYPE, &Device::Cpu);
        let build = |activation: Activation, vb: VarBuilder| {
            ThreeBodyInteractions::new(8, 9, 16, TripleWeighting::SharedAtom, activation, vb)
                .unwrap()
        };
        let silu = build(Activation::Silu, vb.clone());
        let relu = build(Activation::Relu, vb);
        let a = silu
            .forward(&p.graph, &p.line_graph, &p.basis, &p.cutoff, &node_feat, &edge_feat)
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        let b = relu
            .forward(&p.graph, &p.line_graph, &p.basis, &p.cutoff, &node_feat, &edge_feat)
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        assert_ne!(a[0], b[0]);
    }

    #[test]
    fn from_config_rejects_invalid_config() {
        let config = GraphConfig {
            num_edge_feats: 0,
            ..Default::default()
        };
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, FLOAT_DTYPE, &Device::Cpu);
        let err = ThreeBodyInteractions::from_config(&config, vb).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn weighting_deserializes() {
        #[derive(Deserialize)]
        struct Wrapper {
            weighting: TripleWeighting,
        }
        let w: Wrapper = toml::from_str("weighting = \"neighbor_atom\"").unwrap();
        assert_eq!(w.weighting, TripleWeighting::NeighborAtom);
    }
}
