use butterfly_graph::analytics::components::{
    assert_valid, connected_components, ConnectedComponentsPlan, ConnectedComponentsStatistics,
};
use butterfly_graph::topology::{GraphTopology, TopologyBuilder};
use butterfly_graph::{PropertyGraph, Runtime};
use rand::{Rng, SeedableRng};

fn rt() -> Runtime {
    Runtime::with_threads(4).unwrap()
}

fn all_plans() -> Vec<ConnectedComponentsPlan> {
    vec![
        ConnectedComponentsPlan::serial(),
        ConnectedComponentsPlan::label_prop(),
        ConnectedComponentsPlan::synchronous(),
        ConnectedComponentsPlan::asynchronous(),
        ConnectedComponentsPlan::edge_tiled_asynchronous(4),
        ConnectedComponentsPlan::afforest(2, 64),
    ]
}

/// Reduce a labeling to its canonical form: classes numbered by first
/// appearance. Two labelings induce the same partition iff their canonical
/// forms are equal.
fn canonicalize(labels: &[u64]) -> Vec<u64> {
    let mut mapping = std::collections::HashMap::new();
    labels
        .iter()
        .map(|&l| {
            let next = mapping.len() as u64;
            *mapping.entry(l).or_insert(next)
        })
        .collect()
}

#[test]
fn empty_graph_yields_empty_labeling() {
    let rt = rt();
    let pg = PropertyGraph::new(GraphTopology::new(vec![], vec![]).unwrap());
    for plan in all_plans() {
        let labels = connected_components(&rt, &pg.default_view(), &plan).unwrap();
        assert!(labels.is_empty());
    }
}

#[test]
fn single_node_is_its_own_component() {
    let rt = rt();
    let pg = PropertyGraph::new(GraphTopology::new(vec![0], vec![]).unwrap());
    for plan in all_plans() {
        let labels = connected_components(&rt, &pg.default_view(), &plan).unwrap();
        assert_eq!(labels, vec![0]);
    }
}

#[test]
fn two_node_symmetric_pair_shares_a_label() {
    let rt = rt();
    let pg = PropertyGraph::new(GraphTopology::new(vec![1, 2], vec![1, 0]).unwrap());
    for plan in all_plans() {
        let labels = connected_components(&rt, &pg.default_view(), &plan).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0], labels[1]);
        assert_valid(&rt, &pg.default_view(), &labels).unwrap();
    }
}

#[test]
fn path_of_five_is_one_component() {
    let rt = rt();
    let mut b = TopologyBuilder::symmetric();
    b.add_nodes(5);
    for n in 0..4 {
        b.add_edge(n, n + 1);
    }
    let pg = PropertyGraph::new(b.convert_to_csr());
    for plan in all_plans() {
        let labels = connected_components(&rt, &pg.default_view(), &plan).unwrap();
        assert!(labels.iter().all(|&l| l == labels[0]));
        assert_valid(&rt, &pg.default_view(), &labels).unwrap();
    }
}

#[test]
fn two_triangles_statistics() {
    let rt = rt();
    let mut b = TopologyBuilder::symmetric();
    b.add_nodes(6);
    for &(u, v) in &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)] {
        b.add_edge(u, v);
    }
    let pg = PropertyGraph::new(b.convert_to_csr());

    for plan in all_plans() {
        let labels = connected_components(&rt, &pg.default_view(), &plan).unwrap();
        assert_valid(&rt, &pg.default_view(), &labels).unwrap();

        let stats = ConnectedComponentsStatistics::compute(&rt, &labels);
        assert_eq!(stats.total_components, 2);
        assert_eq!(stats.total_non_trivial_components, 2);
        assert_eq!(stats.largest_component_size, 3);
        assert!((stats.largest_component_ratio - 0.5).abs() < 1e-9);

        // Triangle membership.
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }
}

#[test]
fn variants_agree_on_a_random_graph() {
    let rt = rt();
    let mut rng = rand::rngs::StdRng::seed_from_u64(1234);
    let n = 300;
    let mut b = TopologyBuilder::symmetric();
    b.add_nodes(n);
    for _ in 0..350 {
        let u = rng.random_range(0..n as u32);
        let v = rng.random_range(0..n as u32);
        if u != v {
            b.add_edge(u, v);
        }
    }
    let pg = PropertyGraph::new(b.convert_to_csr());
    let view = pg.default_view();

    let reference = canonicalize(&connected_components(&rt, &view, &ConnectedComponentsPlan::serial()).unwrap());
    for plan in all_plans() {
        let labels = connected_components(&rt, &view, &plan).unwrap();
        assert_valid(&rt, &view, &labels).unwrap();
        // Representatives may differ between strategies; the partition into
        // components may not.
        assert_eq!(canonicalize(&labels), reference, "plan {plan:?}");
    }
}

#[test]
fn labels_are_root_node_ids() {
    let rt = rt();
    let mut b = TopologyBuilder::symmetric();
    b.add_nodes(4);
    b.add_edge(2, 3);
    let pg = PropertyGraph::new(b.convert_to_csr());
    let labels =
        connected_components(&rt, &pg.default_view(), &ConnectedComponentsPlan::serial()).unwrap();
    // Lower-id roots win merges, so labels are the minimum node id of each
    // component under the serial strategy.
    assert_eq!(labels, vec![0, 1, 2, 2]);
}

#[test]
fn assert_valid_rejects_bad_labels() {
    let rt = rt();
    let pg = PropertyGraph::new(GraphTopology::new(vec![1, 2], vec![1, 0]).unwrap());
    let bogus = vec![0u64, 7u64];
    assert!(assert_valid(&rt, &pg.default_view(), &bogus).is_err());
    let view = pg.default_view();
    let short = vec![0u64];
    assert!(assert_valid(&rt, &view, &short).is_err());
}
