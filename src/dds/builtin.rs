// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Builtin-topic adapter (C10).
//!
//! A real participant learns about remote participants and endpoints
//! through SPDP/SEDP discovery samples delivered on the builtin topics
//! (`DCPSParticipant`, `DCPSPublication`, `DCPSSubscription`). Discovery
//! itself -- announcing, matching, SPDP/SEDP wire framing -- is out of
//! scope for this crate; what is in scope is the shape those samples
//! take once they reach the sample pipeline: a builtin topic is simply
//! a [`crate::dds::serdata`] type whose [`crate::core::types::TypeDescriptor`]
//! is a compile-time constant rather than one generated from IDL, and
//! whose key is the entity's GUID rather than an application-defined
//! `@key` field. [`ParticipantBuiltinTopicData`] runs through the same
//! `DataWriter`/`DataReader`/`HistoryCache` pipeline C8 defines for any
//! other typed sample.

use crate::core::ser::{Cursor, CursorMut};
use crate::core::types::{FieldLayout, FieldType, TypeDescriptor};
use crate::dds::DDS;
use crate::error::Result;

/// Maximum bytes of `user_data` carried inline. Real discovery payloads
/// are bounded by the same QoS-configured limit this crate's resource
/// limits (C7) apply everywhere else; builtin samples use a fixed cap
/// instead of a variable-length sequence so the descriptor below can
/// stay a fixed-size, compile-time constant.
pub const MAX_USER_DATA: usize = 128;

/// An entity GUID, reused verbatim as the builtin topic's instance key
/// -- unlike application types, where the key is hashed from `@key`
/// fields, a builtin topic's key *is* the wire identity of the entity
/// it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuiltinTopicKey(pub [u8; 16]);

impl BuiltinTopicKey {
    #[must_use]
    pub const fn nil() -> Self {
        Self([0u8; 16])
    }
}

/// `DCPSParticipant` builtin topic sample: the discovery-time
/// description of a remote (or local) participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantBuiltinTopicData {
    pub key: BuiltinTopicKey,
    pub user_data_len: u8,
    pub user_data: [u8; MAX_USER_DATA],
}

impl ParticipantBuiltinTopicData {
    #[must_use]
    pub fn new(key: BuiltinTopicKey, user_data: &[u8]) -> Self {
        let len = user_data.len().min(MAX_USER_DATA);
        let mut buf = [0u8; MAX_USER_DATA];
        buf[..len].copy_from_slice(&user_data[..len]);
        Self {
            key,
            user_data_len: len as u8,
            user_data: buf,
        }
    }

    #[must_use]
    pub fn user_data(&self) -> &[u8] {
        &self.user_data[..self.user_data_len as usize]
    }
}

static PARTICIPANT_FIELDS: &[FieldLayout] = &[
    FieldLayout {
        name: "key",
        offset_bytes: 0,
        field_type: FieldType::Array,
        alignment: 1,
        size_bytes: 16,
        element_type: None,
    },
    FieldLayout {
        name: "user_data",
        offset_bytes: 16,
        field_type: FieldType::Sequence,
        alignment: 1,
        size_bytes: (MAX_USER_DATA + 1) as u32,
        element_type: None,
    },
];

/// Built once, at startup, as a compile-time constant -- never
/// IDL-generated, since this topic's shape is fixed by the protocol
/// rather than by an application's `.idl` file.
static PARTICIPANT_DESCRIPTOR: TypeDescriptor = TypeDescriptor::new(
    0x4443_5050, // "DCPP" (DCPSParticipant)
    "DCPSParticipant",
    16 + 1 + MAX_USER_DATA as u32,
    1,
    false,
    PARTICIPANT_FIELDS,
);

impl DDS for ParticipantBuiltinTopicData {
    fn type_descriptor() -> &'static TypeDescriptor {
        &PARTICIPANT_DESCRIPTOR
    }

    fn encode_cdr2(&self, buf: &mut [u8]) -> Result<usize> {
        let mut cursor = CursorMut::new(buf);
        cursor.write_bytes(&self.key.0)?;
        cursor.write_u8(self.user_data_len)?;
        cursor.write_bytes(&self.user_data[..self.user_data_len as usize])?;
        Ok(cursor.offset())
    }

    fn decode_cdr2(buf: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(buf);
        let mut key = [0u8; 16];
        key.copy_from_slice(cursor.read_bytes(16)?);
        let len = cursor.read_u8()?;
        let data = cursor.read_bytes(len as usize)?;
        Ok(Self::new(BuiltinTopicKey(key), data))
    }

    fn compute_key(&self) -> [u8; 16] {
        self.key.0
    }

    fn has_key() -> bool {
        true
    }
}
