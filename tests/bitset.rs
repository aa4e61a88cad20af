use butterfly_graph::{DynamicBitset, Runtime};

fn rt() -> Runtime {
    Runtime::with_threads(4).unwrap()
}

fn bitset_from_predicate(n: usize, pred: impl Fn(usize) -> bool) -> DynamicBitset {
    let bs = DynamicBitset::with_size(n);
    for i in 0..n {
        if pred(i) {
            bs.set(i);
        }
    }
    bs
}

#[test]
fn count_matches_test_scan() {
    let rt = rt();
    let n = 5000;
    let bs = bitset_from_predicate(n, |i| i % 3 == 0 || i % 113 == 7);
    let by_scan = (0..n).filter(|&i| bs.test(i)).count();
    assert_eq!(bs.count(&rt), by_scan);
    assert_eq!(bs.serial_count(), by_scan);
}

#[test]
fn not_complements_the_count() {
    let rt = rt();
    let n = 1003; // not a multiple of 64, so the last word has a tail
    let mut bs = bitset_from_predicate(n, |i| i % 5 == 0);
    let before = bs.count(&rt);
    bs.bitwise_not(&rt);
    assert_eq!(before + bs.count(&rt), n);
    // Double complement restores the original set.
    bs.bitwise_not(&rt);
    assert_eq!(bs.count(&rt), before);
    for i in 0..n {
        assert_eq!(bs.test(i), i % 5 == 0);
    }
}

#[test]
fn bitwise_ops_follow_set_algebra() {
    let rt = rt();
    let n = 777;
    let mut a = bitset_from_predicate(n, |i| i % 2 == 0);
    let b = bitset_from_predicate(n, |i| i % 3 == 0);

    let mut union = bitset_from_predicate(n, |i| i % 2 == 0);
    union.bitwise_or(&rt, &b);
    for i in 0..n {
        assert_eq!(union.test(i), i % 2 == 0 || i % 3 == 0);
    }

    a.bitwise_and(&rt, &b);
    for i in 0..n {
        assert_eq!(a.test(i), i % 6 == 0);
    }

    let mut xor = bitset_from_predicate(n, |i| i % 2 == 0);
    xor.bitwise_xor(&rt, &b);
    for i in 0..n {
        assert_eq!(xor.test(i), (i % 2 == 0) != (i % 3 == 0));
    }
}

#[test]
fn offsets_enumerate_exactly_the_set_bits() {
    let rt = rt();
    let n = 10_000;
    let bs = bitset_from_predicate(n, |i| i % 17 == 3);
    let offsets: Vec<u64> = bs.offsets(&rt);

    assert_eq!(offsets.len(), bs.count(&rt));
    assert!(offsets.windows(2).all(|w| w[0] < w[1]), "not ascending");
    for &i in &offsets {
        assert!(bs.test(i as usize));
    }
    let expected: Vec<u64> = (0..n as u64).filter(|i| i % 17 == 3).collect();
    assert_eq!(offsets, expected);
}

#[test]
fn append_offsets_extends_in_order() {
    let rt = rt();
    let bs = bitset_from_predicate(100, |i| i >= 90);
    let mut out: Vec<u32> = vec![7];
    bs.append_offsets(&rt, &mut out);
    assert_eq!(out[0], 7);
    assert_eq!(&out[1..], (90u32..100).collect::<Vec<_>>().as_slice());
}

#[test]
fn parallel_set_reset_keeps_each_bit_consistent() {
    let rt = rt();
    let n = 1 << 14;
    let bs = DynamicBitset::with_size(n);
    // Even bits are set twice, odd bits set then cleared.
    rt.do_all(0..n, |i| {
        bs.set(i);
        if i % 2 == 1 {
            bs.reset_bit(i);
        }
    });
    for i in 0..n {
        assert_eq!(bs.test(i), i % 2 == 0, "bit {i}");
    }
    assert_eq!(bs.count(&rt), n / 2);
}
