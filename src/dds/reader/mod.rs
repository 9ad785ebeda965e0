// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DataReader
//!
//! The reader half of the sample pipeline. Incoming samples are filed
//! by [`cache::HistoryCache`] (instance demux, resource limits,
//! duplicate/out-of-order bookkeeping); a [`DataReader`] drains that
//! cache with `take`/`read` semantics.
//!
//! ## Retrieval modes
//!
//! A reader is constructed with exactly one [`DeliveryMode`]:
//!
//! - [`DeliveryMode::Polling`] -- the application calls `take`/`take_batch`
//!   whenever it chooses; no notification happens.
//! - [`DeliveryMode::WaitSet`] -- delivery raises `DATA_AVAILABLE` on the
//!   reader's [`StatusCondition`], waking any `WaitSet` the application
//!   attached it to.
//! - [`DeliveryMode::Listener`] -- delivery invokes the callback directly,
//!   synchronously, on the writer's calling thread.
//!
//! These are mutually exclusive for a given reader, matching the DDS
//! specification's "exactly one data-access mechanism per reader" rule.

pub mod cache;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use cache::{HistoryCache, HistoryKind, InstanceHandle, InstanceState, ResourceLimits};

use super::condition::{HasStatusCondition, StatusCondition, StatusMask};
use super::DDS;
use crate::error::{Error, Result};

static NEXT_READER_ID: AtomicU64 = AtomicU64::new(1);

/// Snapshot counters for a [`DataReader`]; cheap to read concurrently.
#[derive(Debug, Default)]
pub struct ReaderStats {
    samples_received: AtomicU64,
    samples_taken: AtomicU64,
}

impl ReaderStats {
    #[must_use]
    pub fn samples_received(&self) -> u64 {
        self.samples_received.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn samples_taken(&self) -> u64 {
        self.samples_taken.load(Ordering::Relaxed)
    }
}

/// How a reader exposes newly-arrived samples to its application.
pub enum DeliveryMode<T> {
    /// The application polls with `take`/`take_batch`.
    Polling,
    /// Delivery sets `DATA_AVAILABLE` on the reader's `StatusCondition`.
    WaitSet,
    /// Delivery invokes this callback synchronously, once per sample.
    Listener(Box<dyn Fn(&T) + Send + Sync>),
}

/// A loan over samples taken from a reader's history cache. The samples
/// stay logically owned by the reader until [`DataReader::return_loan`]
/// releases them; dropping a loan without returning it is not an error
/// (Rust reclaims the backing `Vec` regardless), but `return_loan` still
/// checks the loan came from the reader it is returned to.
pub struct LoanedSamples<T> {
    reader_id: u64,
    samples: Vec<T>,
}

impl<T> LoanedSamples<T> {
    #[must_use]
    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Reader half of the sample pipeline (C8). Owns a
/// [`HistoryCache`] keyed by instance and reports arrival through
/// whichever [`DeliveryMode`] it was built with.
pub struct DataReader<T: DDS + Clone> {
    id: u64,
    history: HistoryCache<T>,
    status_condition: Arc<StatusCondition>,
    mode: Mutex<DeliveryMode<T>>,
    stats: ReaderStats,
}

impl<T: DDS + Clone> DataReader<T> {
    #[must_use]
    pub fn new(history_kind: HistoryKind, limits: ResourceLimits, mode: DeliveryMode<T>) -> Self {
        let status_condition = Arc::new(StatusCondition::new());
        if matches!(mode, DeliveryMode::WaitSet) {
            status_condition.set_enabled_statuses(StatusMask::DATA_AVAILABLE);
        }
        Self {
            id: NEXT_READER_ID.fetch_add(1, Ordering::Relaxed),
            history: HistoryCache::new(history_kind, limits),
            status_condition,
            mode: Mutex::new(mode),
            stats: ReaderStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    #[must_use]
    pub fn history(&self) -> &HistoryCache<T> {
        &self.history
    }

    /// Called by a matched [`super::DataWriter`] for every sample (or
    /// dispose/unregister) addressed to this reader.
    pub(crate) fn deliver(&self, instance: InstanceHandle, seq: u64, data: T, timestamp_ns: u64) {
        let for_listener = data.clone();
        if self.history.on_sample(instance, seq, data, timestamp_ns).is_err() {
            // KEEP_ALL resource limits refused the write; reliability
            // retransmission (out of scope here) is the writer's cue to
            // retry. Not observable to this reader's application.
            return;
        }
        self.stats.samples_received.fetch_add(1, Ordering::Relaxed);
        match &*self.mode.lock() {
            DeliveryMode::Polling => {}
            DeliveryMode::WaitSet => {
                self.status_condition.set_active_statuses(StatusMask::DATA_AVAILABLE);
            }
            DeliveryMode::Listener(callback) => callback(&for_listener),
        }
    }

    /// `take`: remove and return the oldest buffered sample, or `None`
    /// if the cache is empty. `take(n=0)` equivalents go through
    /// `take_batch(0)`, which returns an empty `Vec`, not `NoData`.
    pub fn take(&self) -> Result<Option<T>> {
        let mut drained = self.history.take_n(1);
        self.clear_data_available_if_empty();
        if drained.is_empty() {
            self.stats.samples_taken.fetch_add(0, Ordering::Relaxed);
            Ok(None)
        } else {
            self.stats.samples_taken.fetch_add(1, Ordering::Relaxed);
            Ok(Some(drained.remove(0)))
        }
    }

    /// `take_batch`: remove and return up to `max` buffered samples.
    pub fn take_batch(&self, max: usize) -> Result<Vec<T>> {
        let drained = self.history.take_n(max);
        self.stats.samples_taken.fetch_add(drained.len() as u64, Ordering::Relaxed);
        self.clear_data_available_if_empty();
        Ok(drained)
    }

    /// `take` as an explicit loan: the caller is expected to eventually
    /// call [`DataReader::return_loan`] with the result.
    pub fn take_loan(&self, max: usize) -> Result<LoanedSamples<T>> {
        let samples = self.history.take_n(max);
        self.stats.samples_taken.fetch_add(samples.len() as u64, Ordering::Relaxed);
        self.clear_data_available_if_empty();
        Ok(LoanedSamples {
            reader_id: self.id,
            samples,
        })
    }

    /// Release a loan previously returned by [`DataReader::take_loan`].
    ///
    /// # Errors
    ///
    /// Returns `BadParameter` if `loan` was taken from a different
    /// reader.
    pub fn return_loan(&self, loan: LoanedSamples<T>) -> Result<()> {
        if loan.reader_id != self.id {
            return Err(Error::BadParameter(
                "loan does not belong to this reader".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn instance_state(&self, key: [u8; 16]) -> Option<InstanceState> {
        self.history.instance_state(InstanceHandle::new(key))
    }

    #[must_use]
    pub fn out_of_order_count(&self, key: [u8; 16]) -> u64 {
        self.history.out_of_order_count(InstanceHandle::new(key))
    }

    fn clear_data_available_if_empty(&self) {
        if self.history.is_empty() {
            self.status_condition.set_active_statuses(StatusMask::NONE);
        }
    }
}

impl<T: DDS + Clone> HasStatusCondition for DataReader<T> {
    fn get_status_condition(&self) -> Arc<StatusCondition> {
        Arc::clone(&self.status_condition)
    }
}
