use std::io::Cursor;
use std::io::Write;

use butterfly_graph::bipart::{
    create_k_partitions, read_hmetis_file, write_partitions, BipartConfig, MatchingPolicy,
};
use butterfly_graph::bipart::hypergraph::read_hmetis_with_runtime;
use butterfly_graph::Runtime;

fn rt() -> Runtime {
    Runtime::with_threads(4).unwrap()
}

const BALANCE_TOL: f64 = 52.5 / 47.5 - 1.0;

fn partition_sizes(partitions: &[u32], k: u32) -> Vec<usize> {
    let mut sizes = vec![0usize; k as usize];
    for &p in partitions {
        assert!(p < k, "partition id {p} out of range [0, {k})");
        sizes[p as usize] += 1;
    }
    sizes
}

#[test]
fn two_hyperedges_bisect_cleanly() {
    let rt = rt();
    let graph = read_hmetis_with_runtime(&rt, Cursor::new("2 4\n1 2\n3 4\n"), false).unwrap();
    let config = BipartConfig {
        num_partitions: 2,
        matching_policy: MatchingPolicy::HigherDegree,
        ..Default::default()
    };
    let result = create_k_partitions(&rt, graph, &config).unwrap();

    assert_eq!(result.partitions.len(), 4);
    // Hyperedges {0,1} and {2,3} land in different partitions; no cut.
    assert_eq!(result.partitions[0], result.partitions[1]);
    assert_eq!(result.partitions[2], result.partitions[3]);
    assert_ne!(result.partitions[0], result.partitions[2]);
    assert_eq!(result.edge_cut, 0);

    let sizes = partition_sizes(&result.partitions, 2);
    assert_eq!(sizes, vec![2, 2]);
}

#[test]
fn four_way_recursion_keeps_pairs_together() {
    let rt = rt();
    let input = "4 8\n1 2\n3 4\n5 6\n7 8\n";
    let graph = read_hmetis_with_runtime(&rt, Cursor::new(input), false).unwrap();
    let config = BipartConfig {
        num_partitions: 4,
        matching_policy: MatchingPolicy::HigherDegree,
        ..Default::default()
    };
    let result = create_k_partitions(&rt, graph, &config).unwrap();

    assert_eq!(result.partitions.len(), 8);
    for pair in result.partitions.chunks(2) {
        assert_eq!(pair[0], pair[1], "hyperedge split across partitions");
    }
    assert_eq!(result.edge_cut, 0);

    let sizes = partition_sizes(&result.partitions, 4);
    assert!(sizes.iter().all(|&s| s == 2), "unbalanced sizes {sizes:?}");
}

#[test]
fn partitions_stay_balanced_on_a_chain_hypergraph() {
    let rt = rt();
    // 31 hyperedges chaining 32 nodes: {i, i+1}.
    let mut input = String::from("31 32\n");
    for i in 1..32 {
        input.push_str(&format!("{} {}\n", i, i + 1));
    }
    for policy in [
        MatchingPolicy::HigherDegree,
        MatchingPolicy::LowerDegree,
        MatchingPolicy::HigherWeight,
        MatchingPolicy::LowerWeight,
        MatchingPolicy::Random,
    ] {
        let graph = read_hmetis_with_runtime(&rt, Cursor::new(input.as_str()), false).unwrap();
        let config = BipartConfig {
            num_partitions: 2,
            matching_policy: policy,
            ..Default::default()
        };
        let result = create_k_partitions(&rt, graph, &config).unwrap();
        let sizes = partition_sizes(&result.partitions, 2);
        assert!(sizes.iter().all(|&s| s > 0), "{policy:?}: empty partition");

        let max = *sizes.iter().max().unwrap() as f64;
        let min = *sizes.iter().min().unwrap() as f64;
        let limit = (1.0 + BALANCE_TOL) / (1.0 - BALANCE_TOL);
        assert!(
            max / min <= limit + 1e-9,
            "{policy:?}: imbalance {max}/{min} exceeds {limit}"
        );
        // A chain bisection cuts at least one hyperedge.
        assert!(result.edge_cut >= 1);
    }
}

#[test]
fn three_way_split_produces_three_parts() {
    let rt = rt();
    let input = "3 6\n1 2\n3 4\n5 6\n";
    let graph = read_hmetis_with_runtime(&rt, Cursor::new(input), false).unwrap();
    let config = BipartConfig {
        num_partitions: 3,
        matching_policy: MatchingPolicy::HigherDegree,
        ..Default::default()
    };
    let result = create_k_partitions(&rt, graph, &config).unwrap();
    let sizes = partition_sizes(&result.partitions, 3);
    assert!(sizes.iter().all(|&s| s > 0), "empty partition in {sizes:?}");
}

#[test]
fn single_partition_is_trivial() {
    let rt = rt();
    let graph = read_hmetis_with_runtime(&rt, Cursor::new("1 3\n1 2 3\n"), false).unwrap();
    let config = BipartConfig {
        num_partitions: 1,
        ..Default::default()
    };
    let result = create_k_partitions(&rt, graph, &config).unwrap();
    assert_eq!(result.partitions, vec![0, 0, 0]);
    assert_eq!(result.edge_cut, 0);
}

#[test]
fn zero_partitions_is_an_error() {
    let rt = rt();
    let graph = read_hmetis_with_runtime(&rt, Cursor::new("1 2\n1 2\n"), false).unwrap();
    let config = BipartConfig {
        num_partitions: 0,
        ..Default::default()
    };
    assert!(create_k_partitions(&rt, graph, &config).is_err());
}

#[test]
fn hmetis_file_and_partition_output_round_trip() -> anyhow::Result<()> {
    let rt = rt();
    let dir = tempfile::tempdir()?;
    let input_path = dir.path().join("tiny.hgr");
    std::fs::write(&input_path, "2 4\n1 2\n3 4\n")?;

    let graph = read_hmetis_file(&rt, &input_path, false)?;
    assert_eq!(graph.num_hedges(), 2);
    let result = create_k_partitions(&rt, graph, &BipartConfig::default())?;

    let mut out = Vec::new();
    write_partitions(&mut out, &result.partitions)?;
    let text = String::from_utf8(out)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    // "<1-based node id> <partition>" lines.
    assert!(lines[0].starts_with("1 "));
    assert!(lines[3].starts_with("4 "));

    let output_path = dir.path().join("tiny.part");
    let mut file = std::fs::File::create(&output_path)?;
    file.write_all(text.as_bytes())?;
    assert!(output_path.exists());
    Ok(())
}
