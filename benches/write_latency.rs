// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Write latency benchmark.
//!
//! Measures `DataWriter::write()` cost with different:
//! - Payload sizes (64B .. 64KB)
//! - History depths (keep-last 1 vs 10 vs 100)
//!
//! Isolates writer-side overhead (sequence assignment, CDR2 encode, cache
//! push) from anything network- or discovery-related, both out of scope
//! for this crate.

#![allow(clippy::uninlined_format_args)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hdds_dataplane::core::ser::{Cursor, CursorMut};
use hdds_dataplane::core::types::{FieldLayout, FieldType, PrimitiveKind, TypeDescriptor};
use hdds_dataplane::dds::{DataReader, DataWriter, DeliveryMode, HistoryKind, ResourceLimits, DDS};
use std::hint::black_box as bb;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
struct BenchMessage {
    seq: u64,
    payload: Vec<u8>,
}

impl BenchMessage {
    fn new(seq: u64, size: usize) -> Self {
        Self { seq, payload: vec![0xAB; size] }
    }
}

static BENCH_FIELDS: &[FieldLayout] = &[
    FieldLayout {
        name: "seq",
        offset_bytes: 0,
        field_type: FieldType::Primitive(PrimitiveKind::U64),
        alignment: 8,
        size_bytes: 8,
        element_type: None,
    },
    FieldLayout {
        name: "payload",
        offset_bytes: 8,
        field_type: FieldType::Sequence,
        alignment: 4,
        size_bytes: 0,
        element_type: None,
    },
];

static BENCH_DESCRIPTOR: TypeDescriptor =
    TypeDescriptor::new(0x6265_6e63, "BenchMessage", 8, 8, true, BENCH_FIELDS);

impl DDS for BenchMessage {
    fn type_descriptor() -> &'static TypeDescriptor {
        &BENCH_DESCRIPTOR
    }

    fn encode_cdr2(&self, buf: &mut [u8]) -> hdds_dataplane::error::Result<usize> {
        let mut cursor = CursorMut::new(buf);
        cursor.write_u64_le(self.seq)?;
        cursor.write_u32_le(self.payload.len() as u32)?;
        cursor.write_bytes(&self.payload)?;
        Ok(cursor.offset())
    }

    fn decode_cdr2(buf: &[u8]) -> hdds_dataplane::error::Result<Self> {
        let mut cursor = Cursor::new(buf);
        let seq = cursor.read_u64_le()?;
        let len = cursor.read_u32_le()? as usize;
        let payload = cursor.read_bytes(len)?.to_vec();
        Ok(Self { seq, payload })
    }
}

fn bench_write_payload_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_latency_by_size");

    let writer: DataWriter<BenchMessage> = DataWriter::new();
    let reader = Arc::new(DataReader::new(
        HistoryKind::KeepLast(1),
        ResourceLimits::default(),
        DeliveryMode::Polling,
    ));
    writer.match_reader(Arc::clone(&reader));

    for size in [64, 256, 1024, 4096, 16384, 65536] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let msg = BenchMessage::new(42, size);
            b.iter(|| {
                writer.write(bb(&msg)).expect("write should succeed");
                reader.take().expect("take should succeed");
            });
        });
    }

    group.finish();
}

fn bench_write_history_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_latency_by_history");

    for depth in [1usize, 10, 100] {
        let writer: DataWriter<BenchMessage> = DataWriter::new();
        let reader = Arc::new(DataReader::new(
            HistoryKind::KeepLast(depth),
            ResourceLimits::default(),
            DeliveryMode::Polling,
        ));
        writer.match_reader(Arc::clone(&reader));

        let msg = BenchMessage::new(42, 256);

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _depth| {
            b.iter(|| {
                writer.write(bb(&msg)).expect("write should succeed");
            });
        });

        // Drain so KeepLast eviction cost stays representative across iterations.
        while reader.take().ok().flatten().is_some() {}
    }

    group.finish();
}

criterion_group!(write_benches, bench_write_payload_sizes, bench_write_history_depth);
criterion_main!(write_benches);
