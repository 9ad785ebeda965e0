// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sample cache for DataReader with read/take semantics.
//!
//! This module provides a cache that supports both DDS `read()` (non-destructive)
//! and `take()` (destructive) operations on received samples.
//!
//! # Architecture
//!
//! ```text
//! Buffer: [S0][S1][S2][S3][S4][S5]
//!          ^              ^
//!          |              |
//!     take_cursor    write_cursor
//!
//! read()  -> peek from take_cursor, marks sample as READ
//! take()  -> removes sample, advances take_cursor
//! ```

use crate::core::avl::Tree;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Sample state per DDS spec (NOT_READ vs READ).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleState {
    /// Sample has not been read yet.
    NotRead,
    /// Sample has been accessed via `read()`.
    Read,
}

/// Instance handle for keyed topics (16-byte key hash).
///
/// This is the DDS-standard instance identifier computed from @key fields.
/// For keyless topics, this is all zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct InstanceHandle(pub [u8; 16]);

impl InstanceHandle {
    /// Create a new instance handle from a key hash.
    pub const fn new(key_hash: [u8; 16]) -> Self {
        Self(key_hash)
    }

    /// Create a nil (all zeros) instance handle for keyless topics.
    pub const fn nil() -> Self {
        Self([0u8; 16])
    }

    /// Check if this is a nil handle.
    pub fn is_nil(&self) -> bool {
        self.0 == [0u8; 16]
    }

    /// Get the raw key hash bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

/// Cached sample with metadata.
#[derive(Debug)]
pub struct CachedSample<T> {
    /// The actual data.
    pub data: T,
    /// Sequence number from writer.
    pub seq: u64,
    /// Reception timestamp (nanoseconds since epoch).
    pub timestamp_ns: u64,
    /// Instance handle (key hash for keyed topics).
    pub instance_handle: InstanceHandle,
    /// Sample state (NOT_READ vs READ).
    state: AtomicBool, // false = NotRead, true = Read
}

impl<T: Clone> Clone for CachedSample<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            seq: self.seq,
            timestamp_ns: self.timestamp_ns,
            instance_handle: self.instance_handle,
            state: AtomicBool::new(self.state.load(Ordering::Relaxed)),
        }
    }
}

impl<T> CachedSample<T> {
    /// Create a new cached sample (keyless topic, nil instance handle).
    #[allow(dead_code)] // DDS API - available for DataReader extensions
    pub fn new(data: T, seq: u64, timestamp_ns: u64) -> Self {
        Self {
            data,
            seq,
            timestamp_ns,
            instance_handle: InstanceHandle::nil(),
            state: AtomicBool::new(false), // NotRead
        }
    }

    /// Create a new cached sample with an instance handle (keyed topic).
    pub fn with_instance(
        data: T,
        seq: u64,
        timestamp_ns: u64,
        instance_handle: InstanceHandle,
    ) -> Self {
        Self {
            data,
            seq,
            timestamp_ns,
            instance_handle,
            state: AtomicBool::new(false), // NotRead
        }
    }

    /// Get sample state.
    pub fn sample_state(&self) -> SampleState {
        if self.state.load(Ordering::Relaxed) {
            SampleState::Read
        } else {
            SampleState::NotRead
        }
    }

    /// Mark sample as read.
    pub fn mark_read(&self) {
        self.state.store(true, Ordering::Relaxed);
    }
}

/// Sample cache with read/take cursor semantics.
///
/// Supports DDS-compliant read (non-destructive) and take (destructive) operations.
pub struct SampleCache<T> {
    /// Ring buffer of cached samples.
    buffer: Mutex<VecDeque<CachedSample<T>>>,
    /// Read cursor position (for read operations).
    /// Samples before this cursor have been read at least once.
    read_cursor: AtomicUsize,
    /// Maximum number of samples to keep (history depth).
    max_samples: usize,
    /// Total samples received (for stats).
    total_received: AtomicUsize,
}

impl<T> SampleCache<T> {
    /// Create a new sample cache with given history depth.
    pub fn new(max_samples: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(max_samples)),
            read_cursor: AtomicUsize::new(0),
            max_samples,
            total_received: AtomicUsize::new(0),
        }
    }

    /// Push a new sample into the cache.
    ///
    /// If cache is full (at max_samples), removes oldest sample and
    /// returns the instance handle it belonged to, so a caller keeping
    /// a separate per-instance count (e.g. `HistoryCache`) can stay in
    /// sync.
    pub fn push(&self, sample: CachedSample<T>) -> Option<InstanceHandle> {
        let mut buffer = self.buffer.lock();

        // Dedup: reject if a sample with same seq already in buffer
        if buffer.iter().any(|s| s.seq == sample.seq) {
            log::warn!("[CACHE] dedup: dropping duplicate seq={}", sample.seq);
            return None;
        }

        // Enforce history depth
        let mut evicted = None;
        while buffer.len() >= self.max_samples {
            if let Some(removed) = buffer.pop_front() {
                evicted = Some(removed.instance_handle);
            }
            // Adjust read cursor if it was pointing to removed sample
            let cursor = self.read_cursor.load(Ordering::Relaxed);
            if cursor > 0 {
                self.read_cursor.store(cursor - 1, Ordering::Relaxed);
            }
        }

        buffer.push_back(sample);
        self.total_received.fetch_add(1, Ordering::Relaxed);
        evicted
    }

    /// Number of samples currently in cache.
    #[allow(dead_code)] // DDS API - diagnostics
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Total samples received since creation.
    #[allow(dead_code)] // DDS API - diagnostics
    pub fn total_received(&self) -> usize {
        self.total_received.load(Ordering::Relaxed)
    }
}

impl<T> SampleCache<T> {
    /// Take a single sample, removing it from cache (DDS take semantics).
    ///
    /// Returns and removes the oldest sample.
    /// Returns `None` if cache is empty.
    pub fn take(&self) -> Option<T> {
        let mut buffer = self.buffer.lock();

        if buffer.is_empty() {
            return None;
        }

        let sample = buffer.pop_front()?;

        // Adjust read cursor
        let cursor = self.read_cursor.load(Ordering::Relaxed);
        if cursor > 0 {
            self.read_cursor.store(cursor - 1, Ordering::Relaxed);
        }

        Some(sample.data)
    }

    /// Take up to `max` samples, removing them from cache.
    #[allow(dead_code)] // DDS API - batch operations
    pub fn take_batch(&self, max: usize) -> Vec<T> {
        self.take_batch_with_instances(max)
            .into_iter()
            .map(|(data, _)| data)
            .collect()
    }

    /// Take up to `max` samples, removing them from cache, paired with
    /// the instance handle each belonged to. Lets a caller that tracks
    /// its own per-instance accounting (`HistoryCache`) keep it in sync
    /// with what actually left the ring.
    pub fn take_batch_with_instances(&self, max: usize) -> Vec<(T, InstanceHandle)> {
        let mut buffer = self.buffer.lock();
        let count = max.min(buffer.len());
        let mut result = Vec::with_capacity(count);

        for _ in 0..count {
            if let Some(sample) = buffer.pop_front() {
                result.push((sample.data, sample.instance_handle));
            }
        }

        // Reset read cursor (samples removed from front)
        let cursor = self.read_cursor.load(Ordering::Relaxed);
        let new_cursor = cursor.saturating_sub(count);
        self.read_cursor.store(new_cursor, Ordering::Relaxed);

        result
    }

    /// Reset read cursor to beginning (re-read all samples).
    #[allow(dead_code)] // DDS API - cursor management
    pub fn reset_read_cursor(&self) {
        self.read_cursor.store(0, Ordering::Relaxed);
    }

    /// Clear all samples from cache.
    #[allow(dead_code)] // DDS API - cache management
    pub fn clear(&self) {
        let mut buffer = self.buffer.lock();
        buffer.clear();
        self.read_cursor.store(0, Ordering::Relaxed);
    }

    /// Take a single sample for a specific instance, removing it (DDS take_instance).
    ///
    /// Returns and removes the oldest sample matching the given instance handle.
    /// Uses linear scan O(n) - acceptable for v1.0.
    ///
    /// # Arguments
    /// * `handle` - The instance handle to filter by
    ///
    /// # Returns
    /// * `Some(data)` if a matching sample was found and removed
    /// * `None` if no matching sample exists
    pub fn take_instance(&self, handle: InstanceHandle) -> Option<T> {
        let mut buffer = self.buffer.lock();

        // Linear scan to find first matching instance
        let pos = buffer.iter().position(|s| s.instance_handle == handle)?;

        let sample = buffer.remove(pos)?;

        // Adjust read cursor if we removed a sample before it
        let cursor = self.read_cursor.load(Ordering::Relaxed);
        if pos < cursor {
            self.read_cursor.store(cursor - 1, Ordering::Relaxed);
        }

        Some(sample.data)
    }

    /// Take up to `max` samples for a specific instance, removing them.
    ///
    /// Returns and removes samples matching the given instance handle.
    /// Uses linear scan O(n*max) - acceptable for v1.0.
    ///
    /// # Arguments
    /// * `handle` - The instance handle to filter by
    /// * `max` - Maximum number of samples to take
    pub fn take_instance_batch(&self, handle: InstanceHandle, max: usize) -> Vec<T> {
        let mut buffer = self.buffer.lock();
        let mut result = Vec::with_capacity(max);
        let mut removed_before_cursor = 0;
        let cursor = self.read_cursor.load(Ordering::Relaxed);

        // Collect indices to remove (in reverse order to not invalidate indices)
        let indices: Vec<usize> = buffer
            .iter()
            .enumerate()
            .filter(|(_, s)| s.instance_handle == handle)
            .take(max)
            .map(|(i, _)| i)
            .collect();

        // Remove in reverse order to maintain valid indices
        for &idx in indices.iter().rev() {
            if let Some(sample) = buffer.remove(idx) {
                result.push(sample.data);
                if idx < cursor {
                    removed_before_cursor += 1;
                }
            }
        }

        // Adjust read cursor
        if removed_before_cursor > 0 {
            let new_cursor = cursor.saturating_sub(removed_before_cursor);
            self.read_cursor.store(new_cursor, Ordering::Relaxed);
        }

        // Results are in reverse order, fix that
        result.reverse();
        result
    }
}

// Read operations require T: Clone (samples are copied, not moved)
impl<T: Clone> SampleCache<T> {
    /// Read a single sample without removing it (DDS read semantics).
    ///
    /// Returns the next unread sample and marks it as READ.
    /// Returns `None` if no unread samples available.
    pub fn read(&self) -> Option<T> {
        let buffer = self.buffer.lock();
        let cursor = self.read_cursor.load(Ordering::Relaxed);

        if cursor >= buffer.len() {
            return None;
        }

        let sample = &buffer[cursor];
        sample.mark_read();

        // Advance read cursor
        self.read_cursor.store(cursor + 1, Ordering::Relaxed);

        Some(sample.data.clone())
    }

    /// Read up to `max` samples without removing them.
    ///
    /// Returns samples and marks them as READ.
    pub fn read_batch(&self, max: usize) -> Vec<T> {
        let buffer = self.buffer.lock();
        let mut cursor = self.read_cursor.load(Ordering::Relaxed);
        let mut result = Vec::with_capacity(max.min(buffer.len()));

        for _ in 0..max {
            if cursor >= buffer.len() {
                break;
            }

            let sample = &buffer[cursor];
            sample.mark_read();
            result.push(sample.data.clone());
            cursor += 1;
        }

        self.read_cursor.store(cursor, Ordering::Relaxed);
        result
    }

    /// Read a single sample for a specific instance (DDS read_instance).
    ///
    /// Returns the first unread sample matching the given instance handle.
    /// Uses linear scan O(n) - acceptable for v1.0.
    ///
    /// Note: This only reads samples that haven't been read yet. After reading,
    /// the sample is marked as READ and won't be returned again by `read_instance`.
    ///
    /// # Arguments
    /// * `handle` - The instance handle to filter by
    ///
    /// # Returns
    /// * `Some(data)` if a matching unread sample was found
    /// * `None` if no matching unread sample exists
    pub fn read_instance(&self, handle: InstanceHandle) -> Option<T> {
        let buffer = self.buffer.lock();

        // Linear scan to find first unread matching instance
        for sample in buffer.iter() {
            if sample.instance_handle == handle && sample.sample_state() == SampleState::NotRead {
                sample.mark_read();
                return Some(sample.data.clone());
            }
        }

        None
    }

    /// Read up to `max` samples for a specific instance without removing them.
    ///
    /// Returns clones of unread samples matching the given instance handle.
    /// Uses linear scan O(n) - acceptable for v1.0.
    ///
    /// # Arguments
    /// * `handle` - The instance handle to filter by
    /// * `max` - Maximum number of samples to read
    pub fn read_instance_batch(&self, handle: InstanceHandle, max: usize) -> Vec<T> {
        let buffer = self.buffer.lock();
        let mut result = Vec::with_capacity(max);

        // Linear scan for unread samples matching instance
        for sample in buffer.iter() {
            if result.len() >= max {
                break;
            }

            if sample.instance_handle == handle && sample.sample_state() == SampleState::NotRead {
                sample.mark_read();
                result.push(sample.data.clone());
            }
        }

        result
    }
}

/// Liveliness state of an instance, per the DDS instance-state machine:
/// `ALIVE` while a matching writer is known and has not disposed the
/// instance; `NOT_ALIVE_DISPOSED` after an explicit dispose; transitions
/// to `NOT_ALIVE_NO_WRITERS` instead when the last matching writer
/// unregisters without disposing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Alive,
    NotAliveDisposed,
    NotAliveNoWriters,
}

/// A configured limit, possibly absent (`UNLIMITED`).
pub type Limit = Option<usize>;

/// Resource limits applied by [`HistoryCache`], mirroring the DDS
/// `RESOURCE_LIMITS` QoS policy's three independent caps.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    pub max_samples: Limit,
    pub max_samples_per_instance: Limit,
    pub max_instances: Limit,
}

impl ResourceLimits {
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_samples: None,
            max_samples_per_instance: None,
            max_instances: None,
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Whether KEEP_LAST eviction is allowed (history depth) or the writer
/// should instead be refused (`KEEP_ALL`, caller retries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    KeepLast(usize),
    KeepAll,
}

/// How many trailing sequence numbers [`InstanceMeta::delivered`] keeps
/// around for exact-duplicate detection once they fall behind
/// `expected_seq`. Bounds the set's memory; a retransmit older than this
/// window is treated as a (harmless) gap-fill instead of a duplicate.
const DEDUP_WINDOW: u64 = 4096;

struct InstanceMeta {
    state: InstanceState,
    /// One past the highest sequence number delivered so far; a sample
    /// equal to or above this is in order (or out-of-order-but-new) and
    /// advances it. Sequence numbers come from the writer's single
    /// monotonic stream, so per-instance arrivals are a strictly
    /// increasing subsequence when no reordering or retransmit occurs --
    /// they need not be contiguous.
    expected_seq: u64,
    /// Exact sequence numbers already delivered, within `DEDUP_WINDOW`
    /// of `expected_seq`. A retransmitted duplicate matches a value
    /// already in this set; a late arrival that fills a gap (lower than
    /// `expected_seq` but never delivered) does not, and is still
    /// delivered without incrementing `out_of_order_count` again.
    delivered: std::collections::BTreeSet<u64>,
    /// Deliveries counted out of order for this instance. Tracked per
    /// instance rather than per publication: this pipeline never threads
    /// a writer/publication handle through `deliver`/`on_sample`, so with
    /// one writer per instance (the only case this crate's matching
    /// supports today) the two notions coincide.
    out_of_order_count: u64,
    sample_count: usize,
}

/// Per instance history, demultiplexing a writer's flat sample sequence
/// into instance lanes and enforcing resource limits and the instance
/// state machine.
///
/// Wraps a [`SampleCache`] for the read/take cursor mechanics and adds
/// the instance index (an owned [`Tree`], per this crate's AVL port)
/// that `q_radmin`/`dds_rhc` keep for exactly this purpose.
pub struct HistoryCache<T> {
    cache: SampleCache<T>,
    instances: Mutex<Tree<InstanceHandle, InstanceMeta>>,
    limits: ResourceLimits,
    history: HistoryKind,
}

impl<T: Clone> HistoryCache<T> {
    #[must_use]
    pub fn new(history: HistoryKind, limits: ResourceLimits) -> Self {
        let capacity = match history {
            HistoryKind::KeepLast(n) => n.max(1),
            HistoryKind::KeepAll => limits.max_samples.unwrap_or(usize::MAX).min(1 << 20),
        };
        Self {
            cache: SampleCache::new(capacity),
            instances: Mutex::new(Tree::new()),
            limits,
            history,
        }
    }

    /// `on_sample`: file a sample into its instance lane, creating the
    /// instance if absent. Returns `Err(())` when `KEEP_ALL` resource
    /// limits refuse the write (caller should retry under reliability);
    /// duplicates (by sequence number) are silently dropped, matching
    /// the writer-side retransmission contract.
    pub fn on_sample(
        &self,
        instance: InstanceHandle,
        seq: u64,
        data: T,
        timestamp_ns: u64,
    ) -> Result<(), ()> {
        let mut instances = self.instances.lock();

        if instances.lookup(&instance).is_none() {
            if let Some(max) = self.limits.max_instances {
                if instances.len() >= max {
                    return Err(());
                }
            }
            instances.insert(
                instance,
                InstanceMeta {
                    state: InstanceState::Alive,
                    expected_seq: seq,
                    delivered: std::collections::BTreeSet::new(),
                    out_of_order_count: 0,
                    sample_count: 0,
                },
            );
        }

        // Safety: just ensured presence above.
        let meta = instances.lookup_mut(&instance).expect("instance just inserted");

        if meta.delivered.contains(&seq) {
            return Ok(()); // exact duplicate, dropped
        }
        if seq >= meta.expected_seq {
            if seq > meta.expected_seq {
                meta.out_of_order_count += 1;
            }
            meta.expected_seq = seq + 1;
        }
        // seq < expected_seq and not in `delivered`: a late arrival
        // filling a gap -- deliver it, but it was already counted
        // out-of-order when the sample ahead of it first arrived.
        meta.delivered.insert(seq);
        let floor = meta.expected_seq.saturating_sub(DEDUP_WINDOW);
        while let Some(&oldest) = meta.delivered.iter().next() {
            if oldest >= floor {
                break;
            }
            meta.delivered.remove(&oldest);
        }
        meta.state = InstanceState::Alive;

        let mut evict_oldest_of_instance = false;
        if let Some(max) = self.limits.max_samples_per_instance {
            if meta.sample_count >= max {
                match self.history {
                    HistoryKind::KeepAll => return Err(()),
                    HistoryKind::KeepLast(_) => evict_oldest_of_instance = true,
                }
            }
        }
        // One sample of this instance leaves to make room for the one
        // about to be pushed when at the per-instance cap; otherwise the
        // count simply grows by one. Either way `sample_count` ends up
        // reflecting what is actually in `self.cache` once the push below
        // completes.
        if !evict_oldest_of_instance {
            meta.sample_count += 1;
        }
        drop(instances);

        if evict_oldest_of_instance {
            self.cache.take_instance(instance);
        }

        if let Some(evicted) = self
            .cache
            .push(CachedSample::with_instance(data, seq, timestamp_ns, instance))
        {
            self.forget_one_sample(evicted);
        }
        Ok(())
    }

    /// Record that one sample belonging to `instance` left `self.cache`
    /// outside of `on_sample`'s own per-instance bookkeeping above (the
    /// shared ring's global `KEEP_LAST` depth evicted it, or the
    /// application took it via [`HistoryCache::take_n`]).
    fn forget_one_sample(&self, instance: InstanceHandle) {
        let mut instances = self.instances.lock();
        if let Some(meta) = instances.lookup_mut(&instance) {
            meta.sample_count = meta.sample_count.saturating_sub(1);
        }
    }

    /// `on_dispose`: transition the instance to `NOT_ALIVE_DISPOSED`
    /// without discarding any buffered payload.
    pub fn on_dispose(&self, instance: InstanceHandle) {
        let mut instances = self.instances.lock();
        if let Some(meta) = instances.lookup_mut(&instance) {
            meta.state = InstanceState::NotAliveDisposed;
        }
    }

    /// Writer unregistration without dispose.
    pub fn on_unregister(&self, instance: InstanceHandle) {
        let mut instances = self.instances.lock();
        if let Some(meta) = instances.lookup_mut(&instance) {
            if meta.state == InstanceState::Alive {
                meta.state = InstanceState::NotAliveNoWriters;
            }
        }
    }

    #[must_use]
    pub fn instance_state(&self, instance: InstanceHandle) -> Option<InstanceState> {
        self.instances.lock().lookup(&instance).map(|m| m.state)
    }

    /// Out-of-order deliveries observed for `instance`. See
    /// [`InstanceMeta::out_of_order_count`] for why this is keyed by
    /// instance rather than by publication.
    #[must_use]
    pub fn out_of_order_count(&self, instance: InstanceHandle) -> u64 {
        self.instances
            .lock()
            .lookup(&instance)
            .map_or(0, |m| m.out_of_order_count)
    }

    /// `take_n`: hand up to `n` samples as a loan; see
    /// [`crate::dds::reader::LoanedSamples`] for the release contract.
    ///
    /// Every sample handed back here also leaves its instance's
    /// `sample_count`, so a `KEEP_ALL` instance that was refusing writes
    /// at `max_samples_per_instance` accepts again once the application
    /// has taken enough of its backlog.
    pub fn take_n(&self, n: usize) -> Vec<T> {
        let taken = self.cache.take_batch_with_instances(n);
        if !taken.is_empty() {
            let mut instances = self.instances.lock();
            for (_, instance) in &taken {
                if let Some(meta) = instances.lookup_mut(instance) {
                    meta.sample_count = meta.sample_count.saturating_sub(1);
                }
            }
        }
        taken.into_iter().map(|(data, _)| data).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}


#[cfg(test)]
mod history_cache_tests {
    use super::*;

    fn make_handle(id: u8) -> InstanceHandle {
        let mut bytes = [0u8; 16];
        bytes[0] = id;
        InstanceHandle::new(bytes)
    }

    #[test]
    fn new_instance_starts_alive() {
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepLast(4), ResourceLimits::default());
        let h = make_handle(1);
        assert_eq!(hc.instance_state(h), None);
        hc.on_sample(h, 0, 10, 0).expect("sample accepted");
        assert_eq!(hc.instance_state(h), Some(InstanceState::Alive));
    }

    #[test]
    fn duplicate_sequence_is_dropped() {
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepLast(4), ResourceLimits::default());
        let h = make_handle(1);
        hc.on_sample(h, 0, 10, 0).expect("first sample accepted");
        hc.on_sample(h, 0, 999, 0).expect("duplicate silently dropped");
        let taken = hc.take_n(10);
        assert_eq!(taken, vec![10], "duplicate must not be delivered");
    }

    #[test]
    fn late_gap_fill_is_delivered_without_double_counting() {
        // Writer sends 1, 3, 2, 4 to one instance. Reader observes all
        // four in arrival order; only the "3" counts as out-of-order.
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepLast(8), ResourceLimits::default());
        let h = make_handle(1);
        hc.on_sample(h, 1, 100, 0).expect("seq 1 accepted");
        hc.on_sample(h, 3, 300, 0).expect("seq 3 accepted out of order");
        hc.on_sample(h, 2, 200, 0).expect("seq 2 fills the gap");
        hc.on_sample(h, 4, 400, 0).expect("seq 4 accepted");
        assert_eq!(hc.out_of_order_count(h), 1);
        assert_eq!(hc.take_n(10), vec![100, 300, 200, 400]);
    }

    #[test]
    fn out_of_order_sample_is_counted_but_delivered() {
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepLast(4), ResourceLimits::default());
        let h = make_handle(1);
        hc.on_sample(h, 0, 10, 0).expect("seq 0 accepted");
        hc.on_sample(h, 2, 30, 0).expect("seq 2 accepted out of order");
        assert_eq!(hc.out_of_order_count(h), 1);
        let taken = hc.take_n(10);
        assert_eq!(taken, vec![10, 30]);
    }

    #[test]
    fn dispose_transitions_to_not_alive_disposed() {
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepLast(4), ResourceLimits::default());
        let h = make_handle(1);
        hc.on_sample(h, 0, 10, 0).expect("sample accepted");
        hc.on_dispose(h);
        assert_eq!(hc.instance_state(h), Some(InstanceState::NotAliveDisposed));
    }

    #[test]
    fn disposed_instance_can_come_back_alive() {
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepLast(4), ResourceLimits::default());
        let h = make_handle(1);
        hc.on_sample(h, 0, 10, 0).expect("sample accepted");
        hc.on_dispose(h);
        hc.on_sample(h, 1, 20, 0).expect("new sample revives instance");
        assert_eq!(hc.instance_state(h), Some(InstanceState::Alive));
    }

    #[test]
    fn unregister_without_dispose_marks_no_writers() {
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepLast(4), ResourceLimits::default());
        let h = make_handle(1);
        hc.on_sample(h, 0, 10, 0).expect("sample accepted");
        hc.on_unregister(h);
        assert_eq!(hc.instance_state(h), Some(InstanceState::NotAliveNoWriters));
    }

    #[test]
    fn unregister_after_dispose_does_not_override_disposed() {
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepLast(4), ResourceLimits::default());
        let h = make_handle(1);
        hc.on_sample(h, 0, 10, 0).expect("sample accepted");
        hc.on_dispose(h);
        hc.on_unregister(h);
        assert_eq!(hc.instance_state(h), Some(InstanceState::NotAliveDisposed));
    }

    #[test]
    fn max_instances_refuses_new_instance_once_full() {
        let limits = ResourceLimits {
            max_instances: Some(1),
            ..ResourceLimits::default()
        };
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepLast(4), limits);
        let h1 = make_handle(1);
        let h2 = make_handle(2);
        hc.on_sample(h1, 0, 10, 0).expect("first instance accepted");
        assert!(hc.on_sample(h2, 0, 20, 0).is_err(), "second instance should be refused");
    }

    #[test]
    fn keep_all_refuses_once_per_instance_limit_reached() {
        let limits = ResourceLimits {
            max_samples_per_instance: Some(2),
            ..ResourceLimits::default()
        };
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepAll, limits);
        let h = make_handle(1);
        hc.on_sample(h, 0, 10, 0).expect("sample 0 accepted");
        hc.on_sample(h, 1, 20, 0).expect("sample 1 accepted");
        assert!(
            hc.on_sample(h, 2, 30, 0).is_err(),
            "KEEP_ALL should refuse past the per-instance cap"
        );
    }

    #[test]
    fn keep_last_evicts_instead_of_refusing_past_per_instance_limit() {
        let limits = ResourceLimits {
            max_samples_per_instance: Some(2),
            ..ResourceLimits::default()
        };
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepLast(8), limits);
        let h = make_handle(1);
        hc.on_sample(h, 0, 10, 0).expect("sample 0 accepted");
        hc.on_sample(h, 1, 20, 0).expect("sample 1 accepted");
        hc.on_sample(h, 2, 30, 0).expect("KEEP_LAST accepts past the per-instance cap");
        hc.on_sample(h, 3, 40, 0).expect("KEEP_LAST keeps accepting");
        hc.on_sample(h, 4, 50, 0).expect("KEEP_LAST keeps accepting");
        // Per-instance cap is 2: only the two most recent samples of
        // this instance survive, even though the shared ring (depth 8)
        // has plenty of room left.
        let taken = hc.take_n(10);
        assert_eq!(taken, vec![40, 50]);
    }

    #[test]
    fn keep_all_accepts_again_once_the_backlog_is_taken() {
        let limits = ResourceLimits {
            max_samples_per_instance: Some(2),
            ..ResourceLimits::default()
        };
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepAll, limits);
        let h = make_handle(1);
        hc.on_sample(h, 0, 10, 0).expect("sample 0 accepted");
        hc.on_sample(h, 1, 20, 0).expect("sample 1 accepted");
        assert!(hc.on_sample(h, 2, 30, 0).is_err(), "refused at the per-instance cap");

        let taken = hc.take_n(10);
        assert_eq!(taken, vec![10, 20]);

        hc.on_sample(h, 2, 30, 0).expect("cap lifts once the backlog is taken");
        assert_eq!(hc.take_n(10), vec![30]);
    }

    #[test]
    fn take_n_drains_across_instances_in_arrival_order() {
        let hc: HistoryCache<i32> = HistoryCache::new(HistoryKind::KeepLast(8), ResourceLimits::default());
        let h1 = make_handle(1);
        let h2 = make_handle(2);
        hc.on_sample(h1, 0, 1, 0).expect("h1 seq0");
        hc.on_sample(h2, 0, 2, 0).expect("h2 seq0");
        hc.on_sample(h1, 1, 3, 0).expect("h1 seq1");
        let taken = hc.take_n(2);
        assert_eq!(taken, vec![1, 2]);
        let rest = hc.take_n(10);
        assert_eq!(rest, vec![3]);
    }
}
