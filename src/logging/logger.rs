// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Two independent, swappable structured sinks: `LOG` and `TRACE`.
//!
//! Generalizes the single `GlobalLogger` (one output behind a mutex)
//! into the two-sink, category-masked contract `q_log.c` exposes: a
//! `LOG` sink for ordinary severity-filtered messages, and an
//! independent `TRACE` sink gated by a category bitmask for wire-level
//! diagnostics. Each sink lives behind its own `parking_lot::RwLock`:
//! emitting a message takes the read guard, so concurrent emitters
//! never block each other, while swapping the sink takes the write
//! guard, so a swap can never interleave with an in-flight write.
//!
//! Each thread accumulates a message into a small thread-local buffer
//! before handing it to the sink, so one call site's `write!`-built
//! message always reaches the sink as a single line.

use super::category::Category;
use super::output::{LogLevel, Output};
use std::cell::RefCell;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

/// Per-thread line buffer capacity before the tail is replaced with a
/// truncation marker.
const LINE_BUF_CAP: usize = 2048;

thread_local! {
    static LINE_BUF: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
}

struct Sink {
    output: Option<Arc<dyn Output>>,
    level_filter: LogLevel,
}

impl Sink {
    const fn disabled() -> Self {
        Self {
            output: None,
            level_filter: LogLevel::Info,
        }
    }
}

static LOG: RwLock<Sink> = RwLock::new(Sink::disabled());
static TRACE: RwLock<Sink> = RwLock::new(Sink::disabled());

/// Categories currently enabled on the `TRACE` sink.
static TRACE_CATEGORIES: AtomicU32 = AtomicU32::new(0);

/// Install the `LOG` sink, replacing whatever was there before.
pub fn init_logger(output: Arc<dyn Output>, level: LogLevel) {
    let mut guard = LOG.write();
    guard.output = Some(output);
    guard.level_filter = level;
}

/// Install the `TRACE` sink and the category mask it reacts to.
pub fn init_trace_sink(output: Arc<dyn Output>, categories: Category) {
    let mut guard = TRACE.write();
    guard.output = Some(output);
    guard.level_filter = LogLevel::Debug;
    TRACE_CATEGORIES.store(categories.bits(), Ordering::Relaxed);
}

/// Swap the `TRACE` sink's category mask without touching its output.
pub fn set_trace_categories(categories: Category) {
    TRACE_CATEGORIES.store(categories.bits(), Ordering::Relaxed);
}

fn trace_categories() -> Category {
    Category::from_bits(TRACE_CATEGORIES.load(Ordering::Relaxed))
}

fn buffered_line(prefix: &str, body: &str) -> String {
    LINE_BUF.with(|cell| {
        let mut buf = cell.borrow_mut();
        buf.clear();
        buf.extend_from_slice(prefix.as_bytes());
        buf.extend_from_slice(body.as_bytes());
        if buf.len() > LINE_BUF_CAP {
            const MARK: &[u8] = b"(trunc)\n";
            let keep = LINE_BUF_CAP.saturating_sub(MARK.len());
            buf.truncate(keep);
            buf.extend_from_slice(MARK);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn thread_prefix() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}/{}: ", now.as_secs(), now.subsec_micros(), thread_tag())
}

/// A stable-enough-for-a-log-line numeric tag for the current thread;
/// not required to be globally unique, only to disambiguate lines from
/// concurrently running threads in one trace.
fn thread_tag() -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

/// Called by the `debug!`/`info!`/`warn!`/`error!` macros.
#[inline]
pub(crate) fn log_message(level: LogLevel, message: &str) -> io::Result<()> {
    let guard = LOG.read();
    let Some(output) = guard.output.as_ref() else {
        return Ok(());
    };
    if level < guard.level_filter {
        return Ok(());
    }
    let line = buffered_line(&thread_prefix(), message);
    output.write(level, &line)
}

/// Called by the `trace!` macro; gated on `category` rather than
/// severity, independently of the `LOG` sink's level filter.
#[inline]
pub(crate) fn trace_message(category: Category, message: &str) -> io::Result<()> {
    if !trace_categories().contains(category) {
        return Ok(());
    }
    let guard = TRACE.read();
    let Some(output) = guard.output.as_ref() else {
        return Ok(());
    };
    let line = buffered_line(&thread_prefix(), message);
    output.write(LogLevel::Debug, &line)
}

/// Trace a function entry point, used by `trace_fn!()`.
#[inline]
pub(crate) fn trace_entry(fn_name: &str) -> io::Result<()> {
    trace_message(Category::TRACE, &format!("[ENTER:FNC] {fn_name}"))
}

/// Flush the `LOG` sink's output. Safe to call even if uninitialized.
pub fn flush_logger() -> io::Result<()> {
    if let Some(output) = LOG.read().output.as_ref() {
        output.flush()?;
    }
    Ok(())
}

/// Flush the `TRACE` sink's output. Safe to call even if uninitialized.
pub fn flush_trace_sink() -> io::Result<()> {
    if let Some(output) = TRACE.read().output.as_ref() {
        output.flush()?;
    }
    Ok(())
}
