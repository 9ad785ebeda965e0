// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Data-plane API
//!
//! Typed sample pipeline: serialize, push into a history cache, wake
//! waiting readers.
//!
//! ## Entities
//!
//! - [`DataWriter`]: serializes and pushes samples into a matched
//!   reader's history cache.
//! - [`DataReader`]: drains its history cache with `take`/`read`
//!   semantics and a `try_take`/blocking pair gated by [`Condition`]s.
//! - [`Condition`]/[`ReadCondition`]: predicates a [`crate::core::rt::WaitsetDriver`]
//!   blocks on.
//!
//! Entity lifecycle, QoS negotiation, and RTPS wire framing are
//! out of scope here: this module models only the part of the stack
//! that moves a serialized sample from a writer's history cache to a
//! matched reader's.

pub mod builtin;
mod condition;
mod read_condition;
mod reader;
pub mod serdata;
mod writer;

pub use condition::{Condition, GuardCondition, HasStatusCondition, StatusCondition, StatusMask};
pub use read_condition::{
    InstanceStateMask, QueryCondition, ReadCondition, SampleStateMask, ViewStateMask,
};
pub use reader::{DataReader, DeliveryMode, LoanedSamples, ReaderStats};
pub use writer::{DataWriter, WriterStats};

pub use crate::error::{Error, Result};

/// Typed data contract: serialize, deserialize, and describe instance
/// identity for a sample type.
///
/// Generated types (via a derive macro or hand-written impl) provide a
/// real [`crate::core::types::TypeDescriptor`]; there is no blanket
/// impl, since the descriptor must describe the concrete type's layout.
pub trait DDS: Sized + Send + Sync + 'static {
    /// Type descriptor (compile-time or manual registration).
    fn type_descriptor() -> &'static crate::core::types::TypeDescriptor;

    /// Encode to a CDR2 little-endian buffer.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the buffer is too small or encoding fails.
    fn encode_cdr2(&self, buf: &mut [u8]) -> Result<usize>;

    /// Decode from a CDR2 little-endian buffer.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the buffer is truncated or contains invalid data.
    fn decode_cdr2(buf: &[u8]) -> Result<Self>;

    /// Compute the 16-byte instance key hash from `@key` fields.
    ///
    /// Types with no `@key` fields return a zeroed hash -- every sample
    /// of such a type belongs to the same (only) instance.
    fn compute_key(&self) -> [u8; 16] {
        [0u8; 16]
    }

    /// Whether this type has `@key` fields.
    #[must_use]
    fn has_key() -> bool {
        false
    }
}

pub use reader::cache::{HistoryCache, HistoryKind, InstanceHandle, InstanceState, ResourceLimits};
