// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Core Runtime Components
//!
//! Low-level infrastructure shared across the data-plane stack: the
//! concurrent allocator, the intrusive-style ordered index, the address
//! set, serialization cursor, and waitset notification primitives.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `freelist` | Partitioned concurrent free list (magazine pools) |
//! | `avl` | Owned generic balanced tree (Lookup/Insert/Delete/Walk) |
//! | `addrset` | Refcounted unicast/multicast locator set |
//! | `time` | Monotonic/wall clock time, wire timestamp codec |
//! | `rt` | Waitset notification driver |
//! | `ser` | CDR2 serialization cursor |
//! | `types` | Type descriptor metadata |
//! | `pcap` | Libpcap-format on-wire capture |
//! | `xmlparser` | Streaming pull-parser for XML configuration documents |
//!
//! Most users should use the high-level [`crate::dds`] API instead of
//! interacting with core modules directly.

pub mod addrset;
pub mod avl;
pub mod freelist;
pub mod pcap;
pub mod rt;
pub mod ser;
pub mod string_utils;
pub mod time;
pub mod types;
pub mod xmlparser;
