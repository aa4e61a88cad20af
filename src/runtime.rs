//! Parallel runtime: the worker pool and the small vocabulary of
//! data-parallel primitives everything else is written against.
//!
//! The pool is an explicit handle ([`Runtime`]) rather than process-global
//! state: construct one before any parallel call, drop it after the last. All
//! parallel constructs are structured - each returns only after every worker
//! body issued by it has finished, so side effects of a construct
//! happen-before anything that runs after it.
//!
//! Primitives:
//! - [`Runtime::do_all`] - parallel for over an index range (work-stealing)
//! - [`Runtime::on_each`] - run a body exactly once per worker
//! - [`Runtime::for_each`] - chunked worklist rounds; bodies may push new items
//! - [`Accumulator`] / [`ReduceLogicalOr`] - reducers, readable after the
//!   construct that updates them returns
//! - [`PerThreadStorage`] / [`InsertBag`] - per-worker slots and a
//!   multi-producer bag whose iteration is valid only after producers quiesce
//! - [`parallel_prefix_sum`] - two-pass block scan

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};
use rayon::prelude::*;

use crate::error::{Error, Result};

/// Handle to a fixed-size worker pool.
pub struct Runtime {
    pool: rayon::ThreadPool,
}

impl Runtime {
    /// Build a pool with one worker per hardware thread.
    pub fn new() -> Result<Self> {
        Self::with_threads(0)
    }

    /// Build a pool with an explicit worker count (0 = hardware threads).
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| Error::invalid(format!("failed to build thread pool: {e}")))?;
        Ok(Runtime { pool })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run a closure inside the pool so that nested `par_iter` calls use this
    /// pool's workers.
    pub fn install<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(f)
    }

    /// Apply `body` to every index in `range`, in parallel, in no particular
    /// order. The body must be conflict-free by construction.
    pub fn do_all<F>(&self, range: Range<usize>, body: F)
    where
        F: Fn(usize) + Sync,
    {
        self.pool
            .install(|| range.into_par_iter().for_each(|i| body(i)));
    }

    /// Run `body(tid, num_threads)` exactly once on every worker.
    pub fn on_each<F>(&self, body: F)
    where
        F: Fn(usize, usize) + Sync,
    {
        let n = self.num_threads();
        self.pool.broadcast(|ctx| body(ctx.index(), n));
    }

    /// Worklist loop: drain `init` in parallel rounds; bodies push follow-up
    /// items through the context. Terminates when a round produces nothing.
    pub fn for_each<T, F>(&self, init: Vec<T>, body: F)
    where
        T: Send,
        F: Fn(T, &ForEachContext<'_, T>) + Sync,
    {
        let mut current = init;
        while !current.is_empty() {
            let next = PerThreadStorage::<Vec<T>>::new(self);
            {
                let ctx = ForEachContext { next: &next };
                self.pool
                    .install(|| current.into_par_iter().for_each(|item| body(item, &ctx)));
            }
            current = next.take_concat();
        }
    }
}

/// Push handle given to [`Runtime::for_each`] bodies.
pub struct ForEachContext<'a, T: Send> {
    next: &'a PerThreadStorage<Vec<T>>,
}

impl<T: Send> ForEachContext<'_, T> {
    pub fn push(&self, item: T) {
        self.next.local().push(item);
    }
}

/// Index of the current pool worker, or 0 when called from outside the pool.
fn thread_slot() -> usize {
    rayon::current_thread_index().unwrap_or(0)
}

/// Split `[0, total)` into `nthreads` contiguous blocks; returns block `tid`.
pub fn block_range(total: usize, tid: usize, nthreads: usize) -> (usize, usize) {
    let mut block = total / nthreads;
    if total % nthreads > 0 {
        block += 1;
    }
    let start = (tid * block).min(total);
    let end = ((tid + 1) * block).min(total);
    (start, end)
}

/// Commutative-associative sum reducer. Updates are relaxed; read the total
/// only after the parallel construct that feeds it has returned.
#[derive(Default)]
pub struct Accumulator {
    value: AtomicU64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, v: u64) {
        self.value.fetch_add(v, Ordering::Relaxed);
    }

    pub fn reduce(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

/// Logical-or reducer.
#[derive(Default)]
pub struct ReduceLogicalOr {
    value: AtomicBool,
}

impl ReduceLogicalOr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, v: bool) {
        if v {
            self.value.store(true, Ordering::Relaxed);
        }
    }

    pub fn reduce(&self) -> bool {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(false, Ordering::Relaxed);
    }
}

/// One `T` per pool worker. `local()` locks the calling worker's slot; the
/// lock is uncontended on the hot path and exists so cross-thread reads
/// (`remote`) stay sound.
pub struct PerThreadStorage<T> {
    slots: Vec<Mutex<T>>,
}

impl<T: Default> PerThreadStorage<T> {
    pub fn new(rt: &Runtime) -> Self {
        let slots = (0..rt.num_threads().max(1))
            .map(|_| Mutex::new(T::default()))
            .collect();
        PerThreadStorage { slots }
    }
}

impl<T> PerThreadStorage<T> {
    pub fn local(&self) -> MutexGuard<'_, T> {
        let slot = thread_slot().min(self.slots.len() - 1);
        self.slots[slot].lock()
    }

    pub fn remote(&self, tid: usize) -> MutexGuard<'_, T> {
        self.slots[tid].lock()
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }
}

impl<T> PerThreadStorage<Vec<T>> {
    /// Concatenate every slot, draining them. Call after workers quiesce.
    pub fn take_concat(&self) -> Vec<T> {
        let mut out = Vec::new();
        for slot in &self.slots {
            out.append(&mut slot.lock());
        }
        out
    }
}

/// Unordered multi-producer bag. Pushes go to the calling worker's slot;
/// iteration is only meaningful after all producers have quiesced.
pub struct InsertBag<T> {
    slots: Vec<Mutex<Vec<T>>>,
}

impl<T> InsertBag<T> {
    pub fn new(rt: &Runtime) -> Self {
        let slots = (0..rt.num_threads().max(1))
            .map(|_| Mutex::new(Vec::new()))
            .collect();
        InsertBag { slots }
    }

    pub fn push(&self, item: T) {
        let slot = thread_slot().min(self.slots.len() - 1);
        self.slots[slot].lock().push(item);
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.lock().is_empty())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().map(|s| s.lock().len()).sum()
    }

    pub fn clear(&self) {
        for slot in &self.slots {
            slot.lock().clear();
        }
    }

    /// Drain the bag into a single vector.
    pub fn take_all(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        for slot in &self.slots {
            out.append(&mut slot.lock());
        }
        out
    }
}

/// In-place inclusive prefix sum over `data`; returns the grand total (0 for
/// an empty slice). Two passes: per-block scans, then a serial block-offset
/// scan applied back in parallel.
pub fn parallel_prefix_sum(rt: &Runtime, data: &mut [u64]) -> u64 {
    if data.is_empty() {
        return 0;
    }
    let nthreads = rt.num_threads().max(1);
    let (_, block) = block_range(data.len(), 0, nthreads);
    let block = block.max(1);

    let block_totals: Vec<u64> = rt.install(|| {
        data.par_chunks_mut(block)
            .map(|chunk| {
                for i in 1..chunk.len() {
                    chunk[i] += chunk[i - 1];
                }
                *chunk.last().unwrap()
            })
            .collect()
    });

    let mut offsets = vec![0u64; block_totals.len()];
    for i in 1..block_totals.len() {
        offsets[i] = offsets[i - 1] + block_totals[i - 1];
    }
    let total = offsets.last().unwrap() + block_totals.last().unwrap();

    rt.install(|| {
        data.par_chunks_mut(block)
            .zip(offsets.par_iter())
            .for_each(|(chunk, &off)| {
                if off != 0 {
                    for v in chunk.iter_mut() {
                        *v += off;
                    }
                }
            })
    });

    total
}

/// Relaxed atomic minimum; returns the previous value.
pub fn atomic_min_i64(target: &AtomicI64, value: i64) -> i64 {
    let mut current = target.load(Ordering::Relaxed);
    while value < current {
        match target.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(prev) => return prev,
            Err(observed) => current = observed,
        }
    }
    current
}

/// Relaxed atomic minimum; returns the previous value.
pub fn atomic_min_u32(target: &AtomicU32, value: u32) -> u32 {
    let mut current = target.load(Ordering::Relaxed);
    while value < current {
        match target.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(prev) => return prev,
            Err(observed) => current = observed,
        }
    }
    current
}

/// Relaxed atomic minimum; returns the previous value.
pub fn atomic_min_u64(target: &AtomicU64, value: u64) -> u64 {
    let mut current = target.load(Ordering::Relaxed);
    while value < current {
        match target.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(prev) => return prev,
            Err(observed) => current = observed,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_range_covers_everything() {
        for total in [0usize, 1, 7, 64, 1000] {
            for nthreads in [1usize, 2, 3, 8] {
                let mut covered = 0;
                let mut prev_end = 0;
                for tid in 0..nthreads {
                    let (start, end) = block_range(total, tid, nthreads);
                    assert!(start <= end);
                    assert_eq!(start, prev_end.min(start));
                    covered += end - start;
                    prev_end = end;
                }
                assert_eq!(covered, total);
                assert_eq!(prev_end, total);
            }
        }
    }

    #[test]
    fn prefix_sum_matches_serial() {
        let rt = Runtime::with_threads(4).unwrap();
        let mut data: Vec<u64> = (0..1237).map(|i| (i * 7 + 3) % 11).collect();
        let mut expected = data.clone();
        for i in 1..expected.len() {
            expected[i] += expected[i - 1];
        }
        let total = parallel_prefix_sum(&rt, &mut data);
        assert_eq!(data, expected);
        assert_eq!(total, *expected.last().unwrap());
    }

    #[test]
    fn prefix_sum_empty() {
        let rt = Runtime::with_threads(2).unwrap();
        let mut data: Vec<u64> = vec![];
        assert_eq!(parallel_prefix_sum(&rt, &mut data), 0);
    }

    #[test]
    fn accumulator_sums_across_workers() {
        let rt = Runtime::with_threads(4).unwrap();
        let acc = Accumulator::new();
        rt.do_all(0..10_000, |i| acc.add(i as u64));
        assert_eq!(acc.reduce(), (0..10_000u64).sum());
    }

    #[test]
    fn insert_bag_collects_all_pushes() {
        let rt = Runtime::with_threads(4).unwrap();
        let bag = InsertBag::new(&rt);
        rt.do_all(0..5000, |i| bag.push(i));
        let mut items = bag.take_all();
        items.sort_unstable();
        assert_eq!(items, (0..5000).collect::<Vec<_>>());
        assert!(bag.is_empty());
    }

    #[test]
    fn for_each_drains_generated_work() {
        let rt = Runtime::with_threads(4).unwrap();
        let acc = Accumulator::new();
        // Each seed k spawns k-1, k-2, ..., 1; total touches = sum over seeds.
        rt.for_each((1..=10u64).collect(), |item, ctx| {
            acc.add(1);
            if item > 1 {
                ctx.push(item - 1);
            }
        });
        assert_eq!(acc.reduce(), (1..=10u64).sum());
    }

    #[test]
    fn atomic_min_keeps_smallest() {
        let v = AtomicI64::new(100);
        assert_eq!(atomic_min_i64(&v, 42), 100);
        assert_eq!(atomic_min_i64(&v, 77), 42);
        assert_eq!(v.load(Ordering::Relaxed), 42);
    }
}
