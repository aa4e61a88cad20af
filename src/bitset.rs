//! Concurrent dynamically-sized bitset.
//!
//! Bit `i` lives in 64-bit word `i / 64` at position `i % 64`. Per-bit
//! `set`/`reset_bit`/`test` are safe under arbitrary concurrency (relaxed
//! CAS loops); everything that touches whole words (`resize`, `reset`,
//! `reset_range`, the bitwise ops) requires single-writer discipline and
//! must not race with per-bit updates. Bits beyond `num_bits` inside the
//! last word are zero and stay zero through every non-bitwise operation.

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::runtime::{block_range, Runtime};

const BITS_PER_WORD: usize = 64;

#[derive(Default)]
pub struct DynamicBitset {
    words: Vec<AtomicU64>,
    num_bits: usize,
}

/// Index types the offset extraction can emit.
pub trait OffsetIndex: Default + Copy + Send {
    fn from_bit_index(i: usize) -> Self;
}

impl OffsetIndex for u32 {
    fn from_bit_index(i: usize) -> Self {
        i as u32
    }
}

impl OffsetIndex for u64 {
    fn from_bit_index(i: usize) -> Self {
        i as u64
    }
}

fn words_for(num_bits: usize) -> usize {
    (num_bits + BITS_PER_WORD - 1) / BITS_PER_WORD
}

impl DynamicBitset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(num_bits: usize) -> Self {
        let mut bs = Self::default();
        bs.resize(num_bits);
        bs
    }

    /// Number of bits held.
    pub fn size(&self) -> usize {
        self.num_bits
    }

    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    /// Change the logical size; newly grown bits are zero. Not thread-safe.
    pub fn resize(&mut self, num_bits: usize) {
        self.num_bits = num_bits;
        self.words.resize_with(words_for(num_bits), || AtomicU64::new(0));
        // Shrinking may leave garbage above num_bits in the new last word.
        if let Some(last) = self.words.last_mut() {
            let tail_bits = num_bits % BITS_PER_WORD;
            if tail_bits != 0 {
                *last.get_mut() &= (1u64 << tail_bits) - 1;
            }
        }
    }

    /// Zero every bit. Not thread-safe.
    pub fn reset(&mut self) {
        for w in &mut self.words {
            *w.get_mut() = 0;
        }
    }

    /// Zero bits `begin..=end`. Whole words are filled; straddling words are
    /// masked. Not thread-safe.
    pub fn reset_range(&mut self, begin: usize, end: usize) {
        if self.num_bits == 0 {
            return;
        }
        debug_assert!(begin <= self.num_bits - 1);
        debug_assert!(end <= self.num_bits - 1);
        debug_assert!(begin <= end);

        // First and one-past-last whole word fully inside the range.
        let word_begin = (begin + BITS_PER_WORD - 1) / BITS_PER_WORD;
        let word_end = if end == self.num_bits - 1 {
            self.words.len()
        } else {
            (end + 1) / BITS_PER_WORD
        };

        if word_begin < word_end {
            for w in &mut self.words[word_begin..word_end] {
                *w.get_mut() = 0;
            }
        }

        let bit_begin = word_begin * BITS_PER_WORD;
        let bit_end = word_end * BITS_PER_WORD;

        if bit_begin > bit_end {
            // Range lives inside a single word, not aligned on either side.
            if begin < bit_begin {
                let lead = bit_begin - begin;
                debug_assert!(lead < 64);
                let mut mask = (1u64 << (64 - lead)) - 1;
                let trail = end - bit_end + 1;
                let keep_high = !((1u64 << trail) - 1);
                mask |= keep_high;
                *self.words[begin / BITS_PER_WORD].get_mut() &= mask;
            }
        } else {
            if begin < bit_begin {
                let lead = bit_begin - begin;
                debug_assert!(lead < 64);
                let mask = (1u64 << (64 - lead)) - 1;
                *self.words[begin / BITS_PER_WORD].get_mut() &= mask;
            }
            if end >= bit_end {
                let trail = end - bit_end + 1;
                debug_assert!(trail < 64);
                let mask = (1u64 << trail) - 1;
                *self.words[end / BITS_PER_WORD].get_mut() &= !mask;
            }
        }
    }

    /// Read bit `index` with relaxed ordering. The value observed is some
    /// value the bit has held.
    pub fn test(&self, index: usize) -> bool {
        debug_assert!(index < self.num_bits);
        let word = self.words[index / BITS_PER_WORD].load(Ordering::Relaxed);
        word & (1u64 << (index % BITS_PER_WORD)) != 0
    }

    /// Atomic test-and-set; returns the previous value.
    pub fn set(&self, index: usize) -> bool {
        debug_assert!(index < self.num_bits);
        let word = &self.words[index / BITS_PER_WORD];
        let mask = 1u64 << (index % BITS_PER_WORD);
        let mut old = word.load(Ordering::Relaxed);
        loop {
            if old & mask != 0 {
                return true;
            }
            match word.compare_exchange_weak(old, old | mask, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return false,
                Err(observed) => old = observed,
            }
        }
    }

    /// Atomic test-and-clear; returns the previous value.
    pub fn reset_bit(&self, index: usize) -> bool {
        debug_assert!(index < self.num_bits);
        let word = &self.words[index / BITS_PER_WORD];
        let mask = 1u64 << (index % BITS_PER_WORD);
        let mut old = word.load(Ordering::Relaxed);
        loop {
            if old & mask == 0 {
                return false;
            }
            match word.compare_exchange_weak(old, old & !mask, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return true,
                Err(observed) => old = observed,
            }
        }
    }

    /// In-place word-wise or. Both bitsets must have identical size and no
    /// concurrent per-bit updates.
    pub fn bitwise_or(&mut self, rt: &Runtime, other: &DynamicBitset) {
        debug_assert_eq!(self.size(), other.size());
        let words = &self.words;
        rt.install(|| {
            words.par_iter().zip(other.words.par_iter()).for_each(|(w, o)| {
                let v = w.load(Ordering::Relaxed) | o.load(Ordering::Relaxed);
                w.store(v, Ordering::Relaxed);
            })
        });
    }

    /// In-place word-wise and.
    pub fn bitwise_and(&mut self, rt: &Runtime, other: &DynamicBitset) {
        debug_assert_eq!(self.size(), other.size());
        let words = &self.words;
        rt.install(|| {
            words.par_iter().zip(other.words.par_iter()).for_each(|(w, o)| {
                let v = w.load(Ordering::Relaxed) & o.load(Ordering::Relaxed);
                w.store(v, Ordering::Relaxed);
            })
        });
    }

    /// In-place word-wise xor.
    pub fn bitwise_xor(&mut self, rt: &Runtime, other: &DynamicBitset) {
        debug_assert_eq!(self.size(), other.size());
        let words = &self.words;
        rt.install(|| {
            words.par_iter().zip(other.words.par_iter()).for_each(|(w, o)| {
                let v = w.load(Ordering::Relaxed) ^ o.load(Ordering::Relaxed);
                w.store(v, Ordering::Relaxed);
            })
        });
    }

    /// In-place word-wise complement. Bits past `num_bits` in the last word
    /// flip too, which is why this op is excluded from the tail-zero
    /// invariant; the tail is re-masked here to restore it.
    pub fn bitwise_not(&mut self, rt: &Runtime) {
        let words = &self.words;
        rt.install(|| {
            words.par_iter().for_each(|w| {
                w.store(!w.load(Ordering::Relaxed), Ordering::Relaxed);
            })
        });
        let tail_bits = self.num_bits % BITS_PER_WORD;
        if tail_bits != 0 {
            if let Some(last) = self.words.last_mut() {
                *last.get_mut() &= (1u64 << tail_bits) - 1;
            }
        }
    }

    /// Parallel population count. Do not call from inside a parallel section
    /// running on the same pool.
    pub fn count(&self, rt: &Runtime) -> usize {
        rt.install(|| {
            self.words
                .par_iter()
                .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
                .sum()
        })
    }

    /// Single-threaded population count.
    pub fn serial_count(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    /// Indices of set bits, ascending. Phase 1 counts per worker block,
    /// phase 2 is an exclusive prefix over workers, phase 3 scatters each
    /// worker's indices at its prefix position.
    pub fn offsets<T: OffsetIndex>(&self, rt: &Runtime) -> Vec<T> {
        let mut out = Vec::new();
        self.append_offsets(rt, &mut out);
        out
    }

    /// Append set-bit indices (ascending) to `out`.
    pub fn append_offsets<T: OffsetIndex>(&self, rt: &Runtime, out: &mut Vec<T>) {
        let nthreads = rt.num_threads().max(1);
        let mut per_thread_counts = vec![0usize; nthreads];

        {
            let counts_cell: Vec<AtomicU64> = (0..nthreads).map(|_| AtomicU64::new(0)).collect();
            rt.on_each(|tid, n| {
                let (start, end) = block_range(self.num_bits, tid, n);
                let mut count = 0u64;
                for i in start..end {
                    if self.test(i) {
                        count += 1;
                    }
                }
                counts_cell[tid].store(count, Ordering::Relaxed);
            });
            for (dst, src) in per_thread_counts.iter_mut().zip(counts_cell.iter()) {
                *dst = src.load(Ordering::Relaxed) as usize;
            }
        }

        let total: usize = per_thread_counts.iter().sum();
        if total == 0 {
            return;
        }

        let base = out.len();
        out.resize(base + total, T::default());

        // Carve the output into one disjoint chunk per worker, sized by its
        // block's count, then let each worker fill its own chunk.
        let mut chunks: Vec<(usize, &mut [T])> = Vec::with_capacity(nthreads);
        let mut rest = &mut out[base..];
        for (tid, &count) in per_thread_counts.iter().enumerate() {
            let (chunk, tail) = rest.split_at_mut(count);
            chunks.push((tid, chunk));
            rest = tail;
        }

        rt.install(|| {
            chunks.into_par_iter().for_each(|(tid, chunk)| {
                let (start, end) = block_range(self.num_bits, tid, nthreads);
                let mut k = 0;
                for i in start..end {
                    if self.test(i) {
                        chunk[k] = T::from_bit_index(i);
                        k += 1;
                    }
                }
                debug_assert_eq!(k, chunk.len());
            })
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rt() -> Runtime {
        Runtime::with_threads(4).unwrap()
    }

    #[test]
    fn set_test_reset_roundtrip() {
        let bs = DynamicBitset::with_size(130);
        assert!(!bs.set(0));
        assert!(bs.set(0));
        assert!(bs.test(0));
        assert!(bs.reset_bit(0));
        assert!(!bs.reset_bit(0));
        assert!(!bs.test(0));

        assert!(!bs.set(129));
        assert!(bs.test(129));
    }

    #[test]
    fn reset_range_straddles_words() {
        let rt = rt();
        let mut bs = DynamicBitset::with_size(200);
        for i in 0..200 {
            bs.set(i);
        }
        bs.reset_range(10, 70);
        for i in 0..200 {
            assert_eq!(bs.test(i), !(10..=70).contains(&i), "bit {i}");
        }
        assert_eq!(bs.count(&rt), 200 - 61);
    }

    #[test]
    fn reset_range_within_one_word() {
        let mut bs = DynamicBitset::with_size(64);
        for i in 0..64 {
            bs.set(i);
        }
        bs.reset_range(3, 9);
        for i in 0..64 {
            assert_eq!(bs.test(i), !(3..=9).contains(&i), "bit {i}");
        }
    }

    #[test]
    fn reset_range_to_last_bit() {
        let mut bs = DynamicBitset::with_size(100);
        for i in 0..100 {
            bs.set(i);
        }
        bs.reset_range(64, 99);
        assert_eq!(bs.serial_count(), 64);
    }

    #[test]
    fn bitwise_not_preserves_tail_zeros() {
        let rt = rt();
        let mut bs = DynamicBitset::with_size(70);
        bs.set(3);
        let before = bs.count(&rt);
        bs.bitwise_not(&rt);
        assert_eq!(before + bs.count(&rt), 70);
    }

    #[test]
    fn resize_grows_with_zeros() {
        let mut bs = DynamicBitset::with_size(10);
        for i in 0..10 {
            bs.set(i);
        }
        bs.resize(5);
        bs.resize(128);
        assert_eq!(bs.serial_count(), 5);
        for i in 5..128 {
            assert!(!bs.test(i));
        }
    }

    #[test]
    fn offsets_are_ascending_and_complete() {
        let rt = rt();
        let bs = DynamicBitset::with_size(1000);
        let expected: Vec<u64> = (0..1000).filter(|i| i % 7 == 3).map(|i| i as u64).collect();
        for &i in &expected {
            bs.set(i as usize);
        }
        let offsets: Vec<u64> = bs.offsets(&rt);
        assert_eq!(offsets, expected);
        assert_eq!(offsets.len(), bs.count(&rt));

        let offsets32: Vec<u32> = bs.offsets(&rt);
        assert_eq!(offsets32.len(), expected.len());
    }

    #[test]
    fn empty_bitset() {
        let rt = rt();
        let mut bs = DynamicBitset::new();
        bs.resize(0);
        assert_eq!(bs.count(&rt), 0);
        let offsets: Vec<u64> = bs.offsets(&rt);
        assert!(offsets.is_empty());
    }

    #[test]
    fn concurrent_sets_are_all_observed() {
        let rt = rt();
        let bs = DynamicBitset::with_size(4096);
        rt.do_all(0..4096, |i| {
            bs.set(i);
        });
        assert_eq!(bs.count(&rt), 4096);
    }
}
