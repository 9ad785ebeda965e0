// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime type descriptors used by the serialization pipeline.
//!
//! Provides `TypeDescriptor` for field layout metadata consumed by the
//! [`crate::ser`] CDR cursor and by [`crate::serdata`] when it builds a
//! type's key hash.

pub mod descriptor;

pub use descriptor::{FieldLayout, FieldType, PrimitiveKind, TypeDescriptor};
