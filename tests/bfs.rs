use anyhow::Result;
use butterfly_graph::analytics::bfs::{bfs_assert_valid, bfs_node_parent, BfsStatistics, UNREACHED};
use butterfly_graph::error::Error;
use butterfly_graph::topology::TopologyBuilder;
use butterfly_graph::{PropertyGraph, Runtime};

fn rt() -> Runtime {
    Runtime::with_threads(4).unwrap()
}

fn path_of_five() -> PropertyGraph {
    let mut b = TopologyBuilder::symmetric();
    b.add_nodes(5);
    for n in 0..4 {
        b.add_edge(n, n + 1);
    }
    PropertyGraph::new(b.convert_to_csr())
}

#[test]
fn path_parents_follow_the_chain() -> Result<()> {
    let rt = rt();
    let mut pg = path_of_five();
    let parents = bfs_node_parent(&rt, &pg.default_view(), 0)?;
    assert_eq!(parents, vec![0, 0, 1, 2, 3]);

    let bidir = pg.bidirectional_view(&rt)?;
    bfs_assert_valid(&rt, &bidir, 0, &parents)?;
    assert_eq!(BfsStatistics::compute(&rt, &parents).n_reached_nodes, 5);
    Ok(())
}

#[test]
fn unreached_nodes_keep_the_sentinel() -> Result<()> {
    // The validator only warns about unreachable nodes; run with
    // RUST_LOG=warn to see it.
    let _ = env_logger::builder().is_test(true).try_init();

    let rt = rt();
    let mut b = TopologyBuilder::symmetric();
    b.add_nodes(4);
    b.add_edge(0, 1);
    // Nodes 2 and 3 are isolated from the source.
    b.add_edge(2, 3);
    let mut pg = PropertyGraph::new(b.convert_to_csr());

    let parents = bfs_node_parent(&rt, &pg.default_view(), 0)?;
    assert_eq!(parents[0], 0);
    assert_eq!(parents[1], 0);
    assert_eq!(parents[2], UNREACHED);
    assert_eq!(parents[3], UNREACHED);
    assert_eq!(BfsStatistics::compute(&rt, &parents).n_reached_nodes, 2);

    // Unvisited nodes warn but do not fail validation.
    let bidir = pg.bidirectional_view(&rt)?;
    bfs_assert_valid(&rt, &bidir, 0, &parents)?;
    Ok(())
}

#[test]
fn out_of_range_source_is_rejected() {
    let rt = rt();
    let pg = path_of_five();
    assert!(matches!(
        bfs_node_parent(&rt, &pg.default_view(), 99),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn validation_rejects_forged_parents() {
    let rt = rt();
    let mut pg = path_of_five();
    let mut parents = bfs_node_parent(&rt, &pg.default_view(), 0).unwrap();
    // Claim node 4 is reached directly from the source: not an in-neighbor.
    parents[4] = 0;
    let bidir = pg.bidirectional_view(&rt).unwrap();
    assert!(matches!(
        bfs_assert_valid(&rt, &bidir, 0, &parents),
        Err(Error::AssertionFailed(_))
    ));
}
