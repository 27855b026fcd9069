use approx::assert_abs_diff_eq;
use atomgraph::layers::polynomial_cutoff;
use atomgraph::{
    Activation, BondExpansion, ElementVocabulary, EmbeddingBlock, FLOAT_DTYPE, Lattice, LineGraph,
    RadialBasis, SphericalBesselWithHarmonics, StateEmbedding, Structure, StructureGraphConverter,
    ThreeBodyInteractions, TripleWeighting, compute_pair_vector_and_distance,
    compute_theta_and_phi,
};
use candle_core::{Device, Tensor};
use candle_nn::{VarBuilder, VarMap};

const NUM_NODE_FEATS: usize = 16;
const NUM_EDGE_FEATS: usize = 16;

fn mos_cell() -> Structure {
    Structure::periodic_fractional(
        Lattice::cubic(4.0),
        ["Mo", "S"],
        [[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]],
    )
    .unwrap()
}

fn carbon_monoxide() -> Structure {
    Structure::molecule(["C", "O"], [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]).unwrap()
}

fn layers(vb: &VarBuilder, degree: usize, num_species: usize) -> (EmbeddingBlock, ThreeBodyInteractions) {
    let embedding = EmbeddingBlock::new(
        num_species,
        NUM_NODE_FEATS,
        9,
        Some(NUM_EDGE_FEATS),
        StateEmbedding::None,
        Activation::Silu,
        vb.pp("embedding"),
    )
    .unwrap();
    let three_body = ThreeBodyInteractions::new(
        NUM_NODE_FEATS,
        degree,
        NUM_EDGE_FEATS,
        TripleWeighting::SharedAtom,
        Activation::Silu,
        vb.pp("three_body"),
    )
    .unwrap();
    (embedding, three_body)
}

#[test]
fn periodic_cell_graph_and_line_graph() {
    let structure = mos_cell();
    let vocabulary = ElementVocabulary::from_structures([&structure]).unwrap();
    assert_eq!(vocabulary.symbols(), &["S".to_string(), "Mo".to_string()]);

    let converter = StructureGraphConverter::new(vocabulary, 5.0).unwrap();
    let (graph, state) = converter.graph_from_structure(&structure).unwrap();
    assert_eq!(graph.node_types, vec![1, 0]);
    assert_eq!(state, vec![0.0, 0.0]);
    // 8 Mo-S neighbors at 3.46 Å and 6 like neighbors at 4 Å per atom.
    assert_eq!(graph.num_edges(), 28);
    assert_eq!(graph.out_degrees(), vec![14, 14]);

    let geometry = compute_pair_vector_and_distance(&graph, &Device::Cpu).unwrap();
    assert!(geometry.degenerate.is_empty());
    for d in geometry.bond_dist.to_vec1::<f64>().unwrap() {
        assert!(d <= 5.0 + 1e-8);
        let mixed = (d - 12f64.sqrt()).abs() < 1e-9;
        let like = (d - 4.0).abs() < 1e-9;
        assert!(mixed || like, "unexpected bond length {d}");
    }

    let line_graph = LineGraph::build(&graph, &geometry, 4.0).unwrap();
    assert_eq!(line_graph.num_nodes(), 28);
    assert_eq!(line_graph.num_edges(), 364);
    for t in 0..line_graph.num_edges() {
        let (a, b) = (line_graph.src[t], line_graph.dst[t]);
        assert_ne!(a, b);
        // Both bonds of a triple leave its center atom.
        let first = line_graph.bond_ids[a as usize] as usize;
        let second = line_graph.bond_ids[b as usize] as usize;
        let center = line_graph.center_atoms[t];
        assert_eq!(graph.src[first], center);
        assert_eq!(graph.src[second], center);
        assert_eq!(graph.dst[second], line_graph.neighbor_atoms[t]);
    }
}

#[test]
fn periodic_cell_three_body_basis_widths() {
    let structure = mos_cell();
    let vocabulary = ElementVocabulary::from_structures([&structure]).unwrap();
    let converter = StructureGraphConverter::new(vocabulary, 5.0).unwrap();
    let (graph, _) = converter.convert(&structure).unwrap();
    let geometry = compute_pair_vector_and_distance(&graph, &Device::Cpu).unwrap();
    let line_graph = LineGraph::build(&graph, &geometry, 4.0).unwrap();

    let cases = [
        (3, 3, false, false, 9),
        (3, 2, false, true, 12),
        (3, 3, true, false, 9),
        (3, 3, true, true, 27),
    ];
    for (max_n, max_l, use_smooth, use_phi, width) in cases {
        let angles = compute_theta_and_phi(&geometry, &line_graph, use_phi).unwrap();
        let basis = SphericalBesselWithHarmonics::new(max_n, max_l, 5.0, use_smooth, use_phi)
            .unwrap()
            .forward(&angles)
            .unwrap();
        assert_eq!(basis.dims(), &[364, width]);
        for row in basis.to_vec2::<f64>().unwrap() {
            assert!(row.iter().all(|v| v.is_finite()));
        }
        if let Some(phi) = &angles.phi {
            for p in phi.to_vec1::<f64>().unwrap() {
                assert!((0.0..2.0 * std::f64::consts::PI).contains(&p));
            }
        }
    }
}

#[test]
fn periodic_cell_three_body_interactions() {
    let device = Device::Cpu;
    let structure = mos_cell();
    let vocabulary = ElementVocabulary::from_structures([&structure]).unwrap();
    let converter = StructureGraphConverter::new(vocabulary.clone(), 5.0).unwrap();
    let (graph, _) = converter.convert(&structure).unwrap();
    let geometry = compute_pair_vector_and_distance(&graph, &device).unwrap();
    let line_graph = LineGraph::build(&graph, &geometry, 4.0).unwrap();
    let angles = compute_theta_and_phi(&geometry, &line_graph, false).unwrap();

    let bond_expansion = BondExpansion::new(RadialBasis::SphericalBessel, 3, 3, 5.0, false).unwrap();
    let bond_basis = bond_expansion
        .forward(&geometry.bond_dist)
        .unwrap()
        .to_dtype(FLOAT_DTYPE)
        .unwrap();
    assert_eq!(bond_basis.dims(), &[28, 9]);

    let three_basis = SphericalBesselWithHarmonics::new(3, 3, 5.0, false, false)
        .unwrap()
        .forward(&angles)
        .unwrap();
    let three_cutoff = polynomial_cutoff(&geometry.bond_dist, 4.0, 3).unwrap();

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, FLOAT_DTYPE, &device);
    let (embedding, three_body) = layers(&vb, 9, vocabulary.len());

    let node_types = graph.node_types_tensor(&device).unwrap();
    let embedded = embedding.forward(&node_types, &bond_basis, None).unwrap();
    let updated = three_body
        .forward(
            &graph,
            &line_graph,
            &three_basis,
            &three_cutoff,
            &embedded.node_feat,
            &embedded.edge_feat,
        )
        .unwrap();
    assert_eq!(updated.dims(), &[28, 16]);

    // Bonds exactly at the three-body cutoff have a zero envelope, so every
    // triple they lead contributes nothing and their features pass through.
    let before = embedded.edge_feat.to_vec2::<f32>().unwrap();
    let after = updated.to_vec2::<f32>().unwrap();
    let dist = geometry.bond_dist.to_vec1::<f64>().unwrap();
    let mut changed = 0;
    for (e, d) in dist.iter().enumerate() {
        if (d - 4.0).abs() < 1e-9 {
            for (x, y) in before[e].iter().zip(&after[e]) {
                assert_abs_diff_eq!(*x, *y, epsilon = 1e-6);
            }
        } else if before[e] != after[e] {
            changed += 1;
        }
    }
    assert_eq!(changed, 16);
}

#[test]
fn molecule_without_triples_keeps_edge_features() {
    let device = Device::Cpu;
    let structure = carbon_monoxide();
    let vocabulary = ElementVocabulary::from_structures([&structure]).unwrap();
    let converter = StructureGraphConverter::new(vocabulary.clone(), 4.0).unwrap();
    let (graph, state) = converter.graph_from_molecule(&structure).unwrap();
    assert_eq!(graph.num_edges(), 2);
    assert_eq!(state, vec![0.0, 0.0]);

    let geometry = compute_pair_vector_and_distance(&graph, &device).unwrap();
    for d in geometry.bond_dist.to_vec1::<f64>().unwrap() {
        assert_abs_diff_eq!(d, 1.0, epsilon = 1e-12);
    }

    let line_graph = LineGraph::build(&graph, &geometry, 4.0).unwrap();
    assert_eq!(line_graph.num_nodes(), 2);
    assert!(line_graph.is_empty());

    let angles = compute_theta_and_phi(&geometry, &line_graph, true).unwrap();
    assert_eq!(angles.num_triples(), 0);
    let three_basis = SphericalBesselWithHarmonics::new(3, 3, 4.0, false, false)
        .unwrap()
        .forward(&angles)
        .unwrap();
    assert_eq!(three_basis.dims(), &[0, 9]);

    let bond_basis = BondExpansion::new(RadialBasis::SphericalBessel, 3, 3, 4.0, false)
        .unwrap()
        .forward(&geometry.bond_dist)
        .unwrap()
        .to_dtype(FLOAT_DTYPE)
        .unwrap();
    let three_cutoff = polynomial_cutoff(&geometry.bond_dist, 4.0, 3).unwrap();

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, FLOAT_DTYPE, &device);
    let (embedding, three_body) = layers(&vb, 9, vocabulary.len());
    let node_types = graph.node_types_tensor(&device).unwrap();
    let embedded = embedding.forward(&node_types, &bond_basis, None).unwrap();

    let updated = three_body
        .forward(
            &graph,
            &line_graph,
            &three_basis,
            &three_cutoff,
            &embedded.node_feat,
            &embedded.edge_feat,
        )
        .unwrap();
    assert_eq!(
        updated.to_vec2::<f32>().unwrap(),
        embedded.edge_feat.to_vec2::<f32>().unwrap()
    );
}

#[test]
fn unknown_species_is_rejected() {
    let vocabulary = ElementVocabulary::new(["C"]).unwrap();
    let converter = StructureGraphConverter::new(vocabulary, 4.0).unwrap();
    let err = converter.convert(&carbon_monoxide()).unwrap_err();
    assert!(matches!(err, atomgraph::Error::UnknownElement { ref symbol } if symbol == "O"));
}

#[test]
fn state_vector_is_carried_through() {
    let structure = carbon_monoxide().with_state(vec![1.0, 2.0]);
    let vocabulary = ElementVocabulary::from_structures([&structure]).unwrap();
    let converter = StructureGraphConverter::new(vocabulary, 4.0).unwrap();
    let (_, state) = converter.convert(&structure).unwrap();
    let state = Tensor::new(state.as_slice(), &Device::Cpu).unwrap();
    assert_eq!(state.to_vec1::<f32>().unwrap(), vec![1.0, 2.0]);
}
