// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # hdds-dataplane
//!
//! The typed sample pipeline at the center of a DDS/RTPS implementation:
//! serialize a sample, push it through a per-instance history cache,
//! wake the readers waiting on it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use hdds_dataplane::core::types::TypeDescriptor;
//! use hdds_dataplane::dds::serdata::alloc_sample;
//!
//! # fn descriptor() -> &'static TypeDescriptor { unimplemented!() }
//! let tp = descriptor();
//! let sample = alloc_sample(tp);
//! assert_eq!(sample.as_bytes().iter().all(|&b| b == 0), true);
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`core`] | Free list, AVL index, address set, time, serialization cursor, type descriptors |
//! | [`dds`] | Data-plane API: `DataReader`/`DataWriter`, history cache, conditions, `SerData` |
//! | [`logging`] | Dual-sink (log + trace) structured logging, category-masked |
//! | [`config`] | Runtime configuration store (QoS property map) |
//! | [`error`] | Crate-wide error taxonomy |
//!
//! Entity lifecycle (`Participant`/`Publisher`/`Subscriber`/`Topic`),
//! QoS negotiation, RTPS wire framing, and discovery are out of scope:
//! this crate models only the part of the stack that moves a
//! serialized sample from a writer's history cache into a matched
//! reader's.

// Clippy: No blanket suppressions. Fix issues properly or use inline #[allow] with justification.

// Allow the derive macro to work inside this crate's tests.
extern crate self as hdds_dataplane;

/// Runtime configuration store: QoS property map.
pub mod config;
/// Low-level infrastructure: free list, AVL index, address set, time, serialization cursor, type descriptors.
pub mod core;
/// Data-plane API: `DataReader`/`DataWriter`, history cache, conditions, `SerData`.
pub mod dds;
/// Crate-wide error taxonomy.
pub mod error;
/// Dual-sink (log + trace) structured logging, category-masked.
pub mod logging;

pub use dds::{
    Condition, DataReader, DataWriter, GuardCondition, HasStatusCondition, QueryCondition,
    ReadCondition, StatusCondition, DDS,
};
pub use error::{Error, Result};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
