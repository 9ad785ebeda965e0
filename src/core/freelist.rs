// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Partitioned concurrent free list ("magazine" allocator).
//!
//! Port of the `FREELIST_DOUBLE` variant of `q_freelist.c` (the plain
//! `FREELIST_ATOMIC_LIFO` variant is not used by this crate). Each
//! thread hashes onto one of `NPAR` inner partitions; a partition holds
//! a magazine of up to `MAGSIZE` elements under its own lock. When a
//! partition's magazine fills on push (or empties on pop), it trades
//! whole magazines with a global free list under a second, coarser
//! lock, so the common case only ever takes the cheap per-partition
//! lock.
//!
//! Contention on a partition's lock is self-correcting: `lock_inner`
//! falls back to a blocking lock on trylock failure and, once every
//! [`RESEED_THRESHOLD`] such contended locks, reshuffles which
//! partition this thread hashes to.

use parking_lot::Mutex;
use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};

/// Number of inner partitions; must be a power of two (`NN_FREELIST_NPAR`).
const NPAR: usize = 16;
const NPAR_LG2: u32 = 4;

/// Elements held by one partition's magazine before it swaps with the
/// global list (`NN_FREELIST_MAGSIZE`).
const MAGSIZE: usize = 16;

/// Reroll-on-contention threshold, kept as a tunable constant rather
/// than re-derived (see Design Note resolution).
const RESEED_THRESHOLD: u32 = 100;

thread_local! {
    static INNER_IDX: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Global generation counter folded into the thread-local partition hash;
/// bumping it forces every thread to recompute (and likely change) its
/// partition on next use.
static INNER_IDX_GENERATION: AtomicU32 = AtomicU32::new(0);

const UNIHASH_A: u64 = 16_292_676_669_999_574_021;
const UNIHASH_B: u64 = 10_242_350_189_706_880_077;

fn get_inner_idx() -> usize {
    INNER_IDX.with(|cell| {
        if let Some(idx) = cell.get() {
            return idx;
        }
        // Stand-in for hashing the thread's stack address: a thread-local's
        // own address is just as good a per-thread, per-generation nonce.
        let addr = std::ptr::addr_of!(cell) as u64;
        let t = addr.wrapping_add(u64::from(INNER_IDX_GENERATION.load(Ordering::Relaxed)));
        let lo = (t as u32).wrapping_add(UNIHASH_A as u32);
        let hi = ((t >> 32) as u32).wrapping_add(UNIHASH_B as u32);
        let mixed = u64::from(lo).wrapping_mul(u64::from(hi));
        let idx = (mixed >> (64 - NPAR_LG2)) as usize;
        cell.set(Some(idx));
        idx
    })
}

struct Partition<T> {
    lock: Mutex<Vec<T>>,
    contention: AtomicU32,
}

impl<T> Partition<T> {
    fn new() -> Self {
        Self {
            lock: Mutex::new(Vec::with_capacity(MAGSIZE)),
            contention: AtomicU32::new(0),
        }
    }
}

/// `lock_inner`: trylock first; on contention take the blocking lock and
/// count it, rerolling this thread's partition assignment once the
/// threshold is hit.
fn lock_inner<T>(partitions: &[Partition<T>]) -> (usize, parking_lot::MutexGuard<'_, Vec<T>>) {
    let k = get_inner_idx();
    if let Some(guard) = partitions[k].lock.try_lock() {
        return (k, guard);
    }
    let guard = partitions[k].lock.lock();
    if partitions[k].contention.fetch_add(1, Ordering::Relaxed) + 1 >= RESEED_THRESHOLD {
        partitions[k].contention.store(0, Ordering::Relaxed);
        INNER_IDX_GENERATION.fetch_add(1, Ordering::Relaxed);
        INNER_IDX.with(|cell| cell.set(None));
    }
    (k, guard)
}

/// A bounded, partitioned free list of `T`.
///
/// Push fails (returning the element back) once the list holds `max`
/// elements, matching `nn_freelist_push`'s saturating behavior rather
/// than growing without bound.
pub struct FreeList<T> {
    partitions: Vec<Partition<T>>,
    global: Mutex<Vec<T>>,
    count: AtomicU32,
    max: u32,
}

impl<T> FreeList<T> {
    #[must_use]
    pub fn new(max: u32) -> Self {
        let partitions = (0..NPAR).map(|_| Partition::new()).collect();
        Self {
            partitions,
            global: Mutex::new(Vec::new()),
            count: AtomicU32::new(0),
            max: if max == u32::MAX { max - 1 } else { max },
        }
    }

    /// Total number of elements currently held (both partitioned and
    /// global magazines).
    #[must_use]
    pub fn len(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `nn_freelist_push`: returns `false` (and the element) if the list
    /// is already at capacity.
    pub fn push(&self, elem: T) -> Result<(), T> {
        let (_k, mut mag) = lock_inner(&self.partitions);
        if mag.len() < MAGSIZE {
            mag.push(elem);
            return Ok(());
        }
        drop(mag);

        let mut global = self.global.lock();
        if self.count.load(Ordering::Relaxed) as usize + MAGSIZE >= self.max as usize {
            return Err(elem);
        }
        let (_k2, mut mag) = lock_inner(&self.partitions);
        // Swap this partition's full magazine into the global pile, then
        // start a fresh magazine with the new element.
        let full: Vec<T> = std::mem::replace(&mut *mag, Vec::with_capacity(MAGSIZE));
        global.extend(full);
        self.count.fetch_add(MAGSIZE as u32, Ordering::Relaxed);
        drop(global);
        mag.push(elem);
        Ok(())
    }

    /// `nn_freelist_pop`: `None` when both the local partition and the
    /// global pile are empty.
    pub fn pop(&self) -> Option<T> {
        let (_k, mut mag) = lock_inner(&self.partitions);
        if let Some(e) = mag.pop() {
            return Some(e);
        }
        drop(mag);

        let mut global = self.global.lock();
        if global.len() < MAGSIZE {
            return None;
        }
        let (_k2, mut mag) = lock_inner(&self.partitions);
        let refill: Vec<T> = global.split_off(global.len() - MAGSIZE);
        self.count.fetch_sub(MAGSIZE as u32, Ordering::Relaxed);
        drop(global);
        *mag = refill;
        mag.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_pop_roundtrip() {
        let fl: FreeList<u32> = FreeList::new(1024);
        fl.push(7).unwrap();
        assert_eq!(fl.pop(), Some(7));
        assert_eq!(fl.pop(), None);
    }

    #[test]
    fn saturates_at_max() {
        let fl: FreeList<u32> = FreeList::new(4);
        for i in 0..4 {
            fl.push(i).unwrap();
        }
        // The magazine-swap threshold means small `max` values can refuse
        // before the raw count hits `max`; the invariant under test is
        // that push never panics and eventually refuses.
        let mut refused = false;
        for i in 4..64 {
            if fl.push(i).is_err() {
                refused = true;
                break;
            }
        }
        assert!(refused, "freelist must saturate rather than grow unbounded");
    }

    #[test]
    fn concurrent_push_pop_preserves_count() {
        let fl = Arc::new(FreeList::<u32>::new(10_000));
        let mut handles = Vec::new();
        for t in 0..8 {
            let fl = Arc::clone(&fl);
            handles.push(thread::spawn(move || {
                for i in 0..200 {
                    fl.push(t * 1000 + i).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let mut popped = 0;
        while fl.pop().is_some() {
            popped += 1;
        }
        assert_eq!(popped, 8 * 200);
    }
}
