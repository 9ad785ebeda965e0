// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Monotonic/wall-clock time and the wire timestamp codec.
//!
//! Mirrors the three clock domains `q_time.c` tracks (`now`, `now_mt`,
//! `now_et`) and its asymmetric wire encoding: encoding a duration into
//! the 32.32 fixed-point RTPS timestamp rounds up, decoding rounds to
//! the nearest tick. `NEVER` is the sentinel `i64::MAX` and must survive
//! an encode/decode round trip exactly, with no rounding drift.

use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds per second, matching `T_SECOND` in `q_time.c`.
pub const T_SECOND: i64 = 1_000_000_000;

/// Sentinel meaning "infinitely far in the future" (`T_NEVER`).
pub const NEVER: i64 = i64::MAX;

/// A point in time or a duration, expressed in nanoseconds.
///
/// Three independently-sourced instances exist in the system, exactly as
/// in the original: wall-clock (`now`), monotonic (`now_mt`), and elapsed
/// since process start (`now_et`). They are distinct newtypes so a
/// monotonic timestamp can never be silently compared against a wall
/// timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MTime(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ETime(pub i64);

impl Time {
    pub const NEVER: Time = Time(NEVER);

    /// Current wall-clock time (`now()` in `q_time.c`).
    #[must_use]
    pub fn now() -> Self {
        let d = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Time(d.as_nanos().min(i64::MAX as u128) as i64)
    }

    #[must_use]
    pub fn is_never(self) -> bool {
        self.0 == NEVER
    }
}

impl MTime {
    pub const NEVER: MTime = MTime(NEVER);

    /// Current monotonic time (`now_mt()`), backed by [`std::time::Instant`]
    /// relative to a process-wide epoch so the value stays a plain `i64`
    /// of nanoseconds, matching the wire-agnostic representation used
    /// internally by the original (monotonic time never crosses the wire).
    #[must_use]
    pub fn now() -> Self {
        use std::sync::OnceLock;
        use std::time::Instant;
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        let epoch = *EPOCH.get_or_init(Instant::now);
        MTime(epoch.elapsed().as_nanos().min(i64::MAX as u128) as i64)
    }

    #[must_use]
    pub fn is_never(self) -> bool {
        self.0 == NEVER
    }

    /// `add_duration_to_mtime`: saturates at `NEVER` instead of wrapping.
    #[must_use]
    pub fn add_duration(self, d: i64) -> Self {
        add_duration_to_time(self.0, d).into()
    }
}

impl ETime {
    pub const NEVER: ETime = ETime(NEVER);
}

impl From<i64> for MTime {
    fn from(v: i64) -> Self {
        MTime(v)
    }
}

/// `add_duration_to_time`: `T_NEVER` saturates (never wraps or overflows),
/// mirroring `q_time.c`'s treatment of `T_NEVER + anything == T_NEVER`.
#[must_use]
pub fn add_duration_to_time(t: i64, d: i64) -> i64 {
    if t == NEVER || d == NEVER {
        NEVER
    } else {
        t.saturating_add(d)
    }
}

/// `mtime_round_up`: rounds a monotonic time up to the next multiple of
/// `gran` nanoseconds (used for periodic-task scheduling in the original;
/// kept here as the same small arithmetic helper).
#[must_use]
pub fn mtime_round_up(t: MTime, gran: i64) -> MTime {
    if t.is_never() || gran <= 0 {
        return t;
    }
    let rem = t.0 % gran;
    if rem == 0 {
        t
    } else {
        MTime(t.0 + (gran - rem))
    }
}

/// The wire representation of an RTPS `Time_t`: 32-bit signed seconds
/// plus a 32-bit unsigned fraction of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireTime {
    pub seconds: i32,
    pub fraction: u32,
}

impl WireTime {
    pub const NEVER: WireTime = WireTime {
        seconds: i32::MAX,
        fraction: u32::MAX,
    };
}

/// `nn_to_ddsi_time`: encodes nanoseconds since epoch into the wire
/// format, **ceiling** the fractional part so a timestamp never decodes
/// to something earlier than what was encoded. `NEVER` maps exactly to
/// `(i32::MAX, u32::MAX)`.
#[must_use]
pub fn encode_wire_time(t: i64) -> WireTime {
    if t == NEVER {
        return WireTime::NEVER;
    }
    let seconds = t.div_euclid(T_SECOND);
    let nanos = t.rem_euclid(T_SECOND);
    // (T_SECOND - 1 + ns << 32) / T_SECOND, i.e. ceil(ns * 2^32 / T_SECOND).
    let fraction = ((T_SECOND - 1) as i128 + ((nanos as i128) << 32)) / (T_SECOND as i128);
    WireTime {
        seconds: seconds as i32,
        fraction: fraction as u32,
    }
}

/// `nn_from_ddsi_time`: decodes the wire format back to nanoseconds,
/// **rounding to nearest** tick, the inverse asymmetry of the encoder.
#[must_use]
pub fn decode_wire_time(w: WireTime) -> i64 {
    if w == WireTime::NEVER {
        return NEVER;
    }
    // (2^31 + fraction * T_SECOND) >> 32
    let nanos = ((1i128 << 31) + (w.fraction as i128) * (T_SECOND as i128)) >> 32;
    (w.seconds as i64) * T_SECOND + (nanos as i64)
}
