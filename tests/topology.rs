use butterfly_graph::properties::ColumnStore;
use butterfly_graph::topology::cache::RdgTopology;
use butterfly_graph::topology::views::{BiDirectionalView, View};
use butterfly_graph::topology::{
    uniform_random_topology, EdgeSortKind, GraphTopology, TopologyBuilder, TransposeKind,
};
use butterfly_graph::{PropertyGraph, Runtime};
use std::sync::Arc;

fn rt() -> Runtime {
    Runtime::with_threads(4).unwrap()
}

#[test]
fn construction_validates_invariants() {
    // Decreasing offsets.
    assert!(GraphTopology::new(vec![2, 1], vec![0, 1]).is_err());
    // Last offset must equal the edge count.
    assert!(GraphTopology::new(vec![1, 3], vec![0, 0]).is_err());
    // Destination out of range.
    assert!(GraphTopology::new(vec![1], vec![1]).is_err());
    // Valid CSR.
    assert!(GraphTopology::new(vec![1, 2], vec![1, 0]).is_ok());
}

#[test]
fn empty_graph_topology_round_trip() {
    let rt = rt();
    let mut pg = PropertyGraph::new(GraphTopology::new(vec![], vec![]).unwrap());
    let transposed = pg.transposed_view(&rt).unwrap();
    assert_eq!(transposed.num_nodes(), 0);
    assert_eq!(transposed.num_edges(), 0);
}

#[test]
fn single_node_no_edges() {
    let rt = rt();
    let mut pg = PropertyGraph::new(GraphTopology::new(vec![0], vec![]).unwrap());
    let view = pg.default_view();
    assert_eq!(view.num_nodes(), 1);
    assert_eq!(view.out_degree(0), 0);
    assert!(view.out_edges(0).next().is_none());
    let bidir = pg.bidirectional_view(&rt).unwrap();
    assert_eq!(bidir.in_degree(0), 0);
}

#[test]
fn two_node_symmetric_transpose_is_identical() {
    let rt = rt();
    let base = GraphTopology::new(vec![1, 2], vec![1, 0]).unwrap();
    let snapshot = base.copy();
    let mut pg = PropertyGraph::new(base);
    let transposed = pg.transposed_view(&rt).unwrap();
    assert!(transposed.topology().equals(&snapshot));
}

#[test]
fn transpose_round_trip_preserves_sorted_topology() {
    let rt = rt();
    let base = uniform_random_topology(128, 4, 42);
    let mut pg = PropertyGraph::new(base);
    let sorted = pg.edges_sorted_by_dest_view(&rt).unwrap();

    // Two transposes compose back to the original, edge for edge, once both
    // are destination-sorted.
    use butterfly_graph::topology::shuffle::EdgeShuffleTopology;
    let once = EdgeShuffleTopology::make_transpose_copy(&rt, pg.topology());
    assert!(once.is_transposed());
    let mut twice = EdgeShuffleTopology::make_transpose_copy(&rt, once.csr());
    twice.sort_edges_by_dest_id(&rt);
    assert!(twice.csr().equals(pg.topology()));
    assert_eq!(twice.num_edges(), sorted.num_edges());
}

#[test]
fn view_cache_reuses_topologies() {
    let rt = rt();
    let mut b = TopologyBuilder::symmetric();
    b.add_nodes(6);
    b.add_edge(0, 1);
    b.add_edge(2, 3);
    b.add_edge(4, 5);
    let mut pg = PropertyGraph::new(b.convert_to_csr());

    assert_eq!(pg.view_cache().num_cached(), 0);
    pg.transposed_view(&rt).unwrap();
    assert_eq!(pg.view_cache().num_cached(), 1);
    // Second request with compatible tags hits the cache.
    pg.transposed_view(&rt).unwrap();
    assert_eq!(pg.view_cache().num_cached(), 1);
    // The bidirectional view wants (Yes, Any): also a hit.
    pg.bidirectional_view(&rt).unwrap();
    assert_eq!(pg.view_cache().num_cached(), 1);
    // A sorted view is a different tag set.
    pg.edges_sorted_by_dest_view(&rt).unwrap();
    assert_eq!(pg.view_cache().num_cached(), 2);

    pg.drop_all_topologies();
    assert_eq!(pg.view_cache().num_cached(), 0);
}

#[test]
fn reseat_promotes_sorted_topology_to_default() {
    let rt = rt();
    let base = uniform_random_topology(32, 3, 9);
    let mut pg = PropertyGraph::new(base);
    assert_eq!(pg.topology().edge_sort_state(), EdgeSortKind::Any);
    pg.edges_sorted_by_dest_view(&rt).unwrap();
    // The destination-sorted topology replaced the default.
    assert_eq!(
        pg.topology().edge_sort_state(),
        EdgeSortKind::SortedByDestId
    );
}

#[test]
fn undirected_view_unions_both_directions() {
    let rt = rt();
    // Directed: 0 -> 1, 2 -> 1
    let mut b = TopologyBuilder::asymmetric();
    b.add_nodes(3);
    b.add_edge(0, 1);
    b.add_edge(2, 1);
    let mut pg = PropertyGraph::new(b.convert_to_csr());
    let undirected = pg.undirected_view(&rt).unwrap();

    assert_eq!(undirected.undirected_degree(1), 2);
    assert_eq!(undirected.undirected_degree(0), 1);
    let mut neighbors: Vec<u32> = undirected
        .undirected_edges(1)
        .map(|e| undirected.undirected_edge_neighbor(e))
        .collect();
    neighbors.sort_unstable();
    assert_eq!(neighbors, vec![0, 2]);

    // In-edge ids live past num_edges + 1 and map back to base property
    // indices.
    let in_edge = undirected.undirected_edges(1).last().unwrap();
    assert!(in_edge > undirected.num_edges());
    let prop = undirected.edge_property_index_from_undirected(in_edge);
    assert!(prop < undirected.num_edges());
}

#[test]
fn sorted_view_finds_parallel_edges() {
    let rt = rt();
    let mut b = TopologyBuilder::asymmetric().with_multi_edges();
    b.add_nodes(4);
    b.add_edge(0, 3);
    b.add_edge(0, 1);
    b.add_edge(0, 3);
    b.add_edge(1, 2);
    let mut pg = PropertyGraph::new(b.convert_to_csr());
    let sorted = pg.edges_sorted_by_dest_view(&rt).unwrap();

    assert_eq!(sorted.find_all_edges(0, 3).count(), 2);
    assert!(sorted.has_edge(1, 2));
    assert!(!sorted.has_edge(2, 1));
    assert!(sorted.find_edge(0, 2).is_none());
}

#[test]
fn nodes_sorted_by_degree_view() {
    let rt = rt();
    let mut b = TopologyBuilder::asymmetric();
    b.add_nodes(5);
    b.add_edge(3, 0);
    b.add_edge(3, 1);
    b.add_edge(3, 2);
    b.add_edge(3, 4);
    b.add_edge(1, 0);
    let mut pg = PropertyGraph::new(b.convert_to_csr());
    let view = pg.nodes_sorted_by_degree_view(&rt).unwrap();

    // New node 0 is the old hub node 3.
    assert_eq!(view.node_property_index(0), 3);
    let degrees: Vec<usize> = view.nodes().map(|n| view.out_degree(n)).collect();
    let mut sorted_degrees = degrees.clone();
    sorted_degrees.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(degrees, sorted_degrees);
}

#[test]
fn edge_type_aware_view_queries() {
    let rt = rt();
    // 0 -> 1 (type 5), 0 -> 2 (type 9), 1 -> 2 (type 5)
    let mut b = TopologyBuilder::asymmetric();
    b.add_nodes(3);
    b.add_edge(0, 1);
    b.add_edge(0, 2);
    b.add_edge(1, 2);
    let store = Arc::new(ColumnStore::from_edge_types(vec![5, 9, 5]));
    let mut pg = PropertyGraph::with_edge_types(b.convert_to_csr(), store);
    let view = pg.edge_type_aware_bidir_view(&rt).unwrap();

    assert_eq!(view.distinct_edge_types(), &[5, 9]);
    assert_eq!(view.out_degree_with_type(0, 5), 1);
    assert_eq!(view.out_degree_with_type(0, 9), 1);
    assert_eq!(view.in_degree_with_type(2, 5), 1);
    assert!(view.has_edge_with_type(0, 1, 5));
    assert!(!view.has_edge_with_type(0, 1, 9));
    assert!(view.has_edge(1, 2));
    assert!(!view.has_edge(2, 0));
}

#[test]
fn edge_type_aware_view_requires_type_column() {
    let rt = rt();
    let mut pg = PropertyGraph::new(GraphTopology::new(vec![1, 1], vec![1]).unwrap());
    assert!(pg.edge_type_aware_bidir_view(&rt).is_err());
}

#[test]
fn rdg_snapshots_round_trip_through_serde() -> anyhow::Result<()> {
    let rt = rt();
    let base = uniform_random_topology(24, 3, 5);
    let mut pg = PropertyGraph::new(base);
    pg.transposed_view(&rt)?;
    pg.edges_sorted_by_dest_view(&rt)?;

    let snapshots = pg.to_rdg_topologies();
    assert_eq!(snapshots.len(), 2);
    // Serializing is a pure read: doing it twice yields the same bytes.
    let json_a = serde_json::to_string(&snapshots)?;
    let json_b = serde_json::to_string(&pg.to_rdg_topologies())?;
    assert_eq!(json_a, json_b);

    let restored: Vec<RdgTopology> = serde_json::from_str(&json_a)?;
    for (snapshot, original) in restored.iter().zip(snapshots.iter()) {
        let topo = snapshot.to_edge_shuffle();
        assert_eq!(topo.transpose_state(), original.transpose_state);
        assert_eq!(topo.edge_sort_state(), original.edge_sort_state);
        assert_eq!(topo.adj_data(), original.adj_indices.as_slice());
        assert_eq!(topo.dest_data(), original.dests.as_slice());
    }

    // One snapshot is the transpose, one is the sorted original.
    assert!(snapshots
        .iter()
        .any(|s| s.transpose_state == TransposeKind::Yes));
    assert!(snapshots
        .iter()
        .any(|s| s.edge_sort_state == EdgeSortKind::SortedByDestId));
    Ok(())
}
