// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DataWriter
//!
//! The writer half of the sample pipeline (C8). `write` assigns the
//! next sequence number from a single monotonic per-writer counter,
//! round-trips the sample through CDR2 (the same codec a real RTPS
//! writer would hand to its transport), and delivers the decoded copy
//! into every matched reader's history cache. `dispose`/`unregister`
//! are key-only frames that carry no payload.
//!
//! Matching here is explicit (`match_reader`): SPDP/SEDP discovery,
//! which would ordinarily populate this set, is out of scope.


use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::reader::cache::InstanceHandle;
use super::reader::DataReader;
use super::DDS;
use crate::core::time::Time;
use crate::error::Result;

/// Buffer size used to round-trip a sample through CDR2 on its way to
/// matched readers. Fixed rather than sized from `TypeDescriptor`,
/// since the descriptor only promises a lower bound for variable-size
/// types.
const WRITE_BUF_CAPACITY: usize = 4096;

/// Snapshot counters for a [`DataWriter`]; cheap to read concurrently.
#[derive(Debug, Default)]
pub struct WriterStats {
    samples_written: AtomicU64,
    disposes: AtomicU64,
    unregisters: AtomicU64,
}

impl WriterStats {
    #[must_use]
    pub fn samples_written(&self) -> u64 {
        self.samples_written.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn disposes(&self) -> u64 {
        self.disposes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn unregisters(&self) -> u64 {
        self.unregisters.load(Ordering::Relaxed)
    }
}

/// Writer half of the sample pipeline.
pub struct DataWriter<T: DDS + Clone> {
    next_seq: AtomicU64,
    readers: Mutex<Vec<Arc<DataReader<T>>>>,
    stats: WriterStats,
}

impl<T: DDS + Clone> Default for DataWriter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DDS + Clone> DataWriter<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(0),
            readers: Mutex::new(Vec::new()),
            stats: WriterStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Register `reader` as matched. A real writer learns this set from
    /// discovery; this is where this crate's scope starts instead.
    pub fn match_reader(&self, reader: Arc<DataReader<T>>) {
        self.readers.lock().push(reader);
    }

    /// `write`: assign the next sequence number, encode the sample, and
    /// deliver a decoded copy into every matched reader's history cache.
    ///
    /// # Errors
    ///
    /// Returns an error if `sample` fails to encode.
    pub fn write(&self, sample: &T) -> Result<()> {
        let seq = self.next_seq.fetch_add(1, Ordering::AcqRel);
        let instance = InstanceHandle::new(sample.compute_key());
        let timestamp_ns = Time::now().0 as u64;

        let mut buf = vec![0u8; WRITE_BUF_CAPACITY];
        let len = sample.encode_cdr2(&mut buf)?;

        let readers = self.readers.lock();
        for reader in readers.iter() {
            match T::decode_cdr2(&buf[..len]) {
                Ok(decoded) => reader.deliver(instance, seq, decoded, timestamp_ns),
                Err(e) => {
                    log::warn!("[writer] dropping sample for matched reader, decode failed: {e}");
                }
            }
        }
        self.stats.samples_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// `dispose`: a key-only frame transitioning the instance to
    /// `NOT_ALIVE_DISPOSED` on every matched reader.
    pub fn dispose(&self, key: [u8; 16]) -> Result<()> {
        let instance = InstanceHandle::new(key);
        for reader in self.readers.lock().iter() {
            reader.history().on_dispose(instance);
        }
        self.stats.disposes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// `unregister`: a key-only frame transitioning the instance to
    /// `NOT_ALIVE_NO_WRITERS` (unless already disposed) on every matched
    /// reader.
    pub fn unregister(&self, key: [u8; 16]) -> Result<()> {
        let instance = InstanceHandle::new(key);
        for reader in self.readers.lock().iter() {
            reader.history().on_unregister(instance);
        }
        self.stats.unregisters.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
