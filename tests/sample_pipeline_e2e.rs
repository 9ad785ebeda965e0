// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

//! End-to-end sample pipeline tests (C6-C8): write through CDR2, deliver
//! into a matched reader's history cache, drain through each delivery
//! mode.

use hdds_dataplane::core::ser::{Cursor, CursorMut};
use hdds_dataplane::core::types::{FieldLayout, FieldType, PrimitiveKind, TypeDescriptor};
use hdds_dataplane::dds::{DataReader, DataWriter, DeliveryMode, HistoryKind, InstanceState, ResourceLimits, DDS};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Reading {
    sensor_id: u32,
    value: f64,
}

static READING_FIELDS: &[FieldLayout] = &[
    FieldLayout {
        name: "sensor_id",
        offset_bytes: 0,
        field_type: FieldType::Primitive(PrimitiveKind::U32),
        alignment: 4,
        size_bytes: 4,
        element_type: None,
    },
    FieldLayout {
        name: "value",
        offset_bytes: 8,
        field_type: FieldType::Primitive(PrimitiveKind::F64),
        alignment: 8,
        size_bytes: 8,
        element_type: None,
    },
];

static READING_DESCRIPTOR: TypeDescriptor =
    TypeDescriptor::new(0x7265_6164, "Reading", 16, 8, false, READING_FIELDS);

impl DDS for Reading {
    fn type_descriptor() -> &'static TypeDescriptor {
        &READING_DESCRIPTOR
    }

    fn encode_cdr2(&self, buf: &mut [u8]) -> hdds_dataplane::error::Result<usize> {
        let mut cursor = CursorMut::new(buf);
        cursor.write_u32_le(self.sensor_id)?;
        cursor.align(8)?;
        cursor.write_f64_le(self.value)?;
        Ok(cursor.offset())
    }

    fn decode_cdr2(buf: &[u8]) -> hdds_dataplane::error::Result<Self> {
        let mut cursor = Cursor::new(buf);
        let sensor_id = cursor.read_u32_le()?;
        cursor.align(8)?;
        let value = cursor.read_f64_le()?;
        Ok(Reading { sensor_id, value })
    }

    fn compute_key(&self) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[0..4].copy_from_slice(&self.sensor_id.to_le_bytes());
        key
    }

    fn has_key() -> bool {
        true
    }
}

#[test]
fn write_then_take_round_trips_the_sample() {
    let writer: DataWriter<Reading> = DataWriter::new();
    let reader = Arc::new(DataReader::new(
        HistoryKind::KeepLast(4),
        ResourceLimits::default(),
        DeliveryMode::Polling,
    ));
    writer.match_reader(Arc::clone(&reader));

    let sample = Reading { sensor_id: 1, value: 21.5 };
    writer.write(&sample).expect("write should succeed");

    let received = reader.take().expect("take should not error");
    assert_eq!(received, Some(sample));
}

#[test]
fn keep_last_evicts_oldest_sample_per_instance() {
    let writer: DataWriter<Reading> = DataWriter::new();
    let reader = Arc::new(DataReader::new(
        HistoryKind::KeepLast(2),
        ResourceLimits::default(),
        DeliveryMode::Polling,
    ));
    writer.match_reader(Arc::clone(&reader));

    for i in 0..5 {
        writer
            .write(&Reading { sensor_id: 7, value: f64::from(i) })
            .expect("write should succeed");
    }

    let drained = reader.take_batch(10).expect("take_batch should succeed");
    assert_eq!(drained.len(), 2, "KeepLast(2) should cap the instance's cache at 2 samples");
    assert_eq!(drained[0].value, 3.0);
    assert_eq!(drained[1].value, 4.0);
}

#[test]
fn keep_last_tracks_instances_independently() {
    let writer: DataWriter<Reading> = DataWriter::new();
    let reader = Arc::new(DataReader::new(
        HistoryKind::KeepLast(1),
        ResourceLimits::default(),
        DeliveryMode::Polling,
    ));
    writer.match_reader(Arc::clone(&reader));

    writer.write(&Reading { sensor_id: 1, value: 1.0 }).expect("write should succeed");
    writer.write(&Reading { sensor_id: 2, value: 2.0 }).expect("write should succeed");

    let drained = reader.take_batch(10).expect("take_batch should succeed");
    assert_eq!(drained.len(), 2, "two distinct keys should keep one sample each");
}

#[test]
fn listener_delivery_mode_invokes_the_callback_synchronously() {
    let writer: DataWriter<Reading> = DataWriter::new();
    let delivered = Arc::new(AtomicUsize::new(0));
    let delivered_in_cb = Arc::clone(&delivered);
    let reader = Arc::new(DataReader::new(
        HistoryKind::KeepLast(4),
        ResourceLimits::default(),
        DeliveryMode::Listener(Box::new(move |_sample: &Reading| {
            delivered_in_cb.fetch_add(1, Ordering::SeqCst);
        })),
    ));
    writer.match_reader(Arc::clone(&reader));

    writer.write(&Reading { sensor_id: 3, value: 9.0 }).expect("write should succeed");
    writer.write(&Reading { sensor_id: 3, value: 9.5 }).expect("write should succeed");

    assert_eq!(delivered.load(Ordering::SeqCst), 2);
}

#[test]
fn waitset_delivery_mode_sets_data_available_status() {
    use hdds_dataplane::{HasStatusCondition, StatusCondition};

    let writer: DataWriter<Reading> = DataWriter::new();
    let reader = Arc::new(DataReader::new(
        HistoryKind::KeepLast(4),
        ResourceLimits::default(),
        DeliveryMode::WaitSet,
    ));
    writer.match_reader(Arc::clone(&reader));

    let condition: Arc<StatusCondition> = reader.get_status_condition();
    assert!(!condition.get_trigger_value(), "no data yet, condition should be untriggered");

    writer.write(&Reading { sensor_id: 4, value: 0.0 }).expect("write should succeed");
    assert!(condition.get_trigger_value(), "DATA_AVAILABLE should trigger the status condition");
}

#[test]
fn dispose_marks_the_instance_not_alive_disposed() {
    let writer: DataWriter<Reading> = DataWriter::new();
    let reader = Arc::new(DataReader::new(
        HistoryKind::KeepLast(4),
        ResourceLimits::default(),
        DeliveryMode::Polling,
    ));
    writer.match_reader(Arc::clone(&reader));

    let sample = Reading { sensor_id: 5, value: 1.0 };
    writer.write(&sample).expect("write should succeed");
    writer.dispose(sample.compute_key()).expect("dispose should succeed");

    assert_eq!(
        reader.instance_state(sample.compute_key()),
        Some(InstanceState::NotAliveDisposed)
    );
}

#[test]
fn unregister_marks_the_instance_not_alive_no_writers() {
    let writer: DataWriter<Reading> = DataWriter::new();
    let reader = Arc::new(DataReader::new(
        HistoryKind::KeepLast(4),
        ResourceLimits::default(),
        DeliveryMode::Polling,
    ));
    writer.match_reader(Arc::clone(&reader));

    let sample = Reading { sensor_id: 6, value: 1.0 };
    writer.write(&sample).expect("write should succeed");
    writer.unregister(sample.compute_key()).expect("unregister should succeed");

    assert_eq!(
        reader.instance_state(sample.compute_key()),
        Some(InstanceState::NotAliveNoWriters)
    );
}

#[test]
fn one_writer_fans_out_to_multiple_matched_readers() {
    let writer: DataWriter<Reading> = DataWriter::new();
    let reader_a = Arc::new(DataReader::new(
        HistoryKind::KeepLast(4),
        ResourceLimits::default(),
        DeliveryMode::Polling,
    ));
    let reader_b = Arc::new(DataReader::new(
        HistoryKind::KeepLast(4),
        ResourceLimits::default(),
        DeliveryMode::Polling,
    ));
    writer.match_reader(Arc::clone(&reader_a));
    writer.match_reader(Arc::clone(&reader_b));

    writer.write(&Reading { sensor_id: 8, value: 3.0 }).expect("write should succeed");

    assert_eq!(reader_a.take().unwrap(), Some(Reading { sensor_id: 8, value: 3.0 }));
    assert_eq!(reader_b.take().unwrap(), Some(Reading { sensor_id: 8, value: 3.0 }));
}
