// Timebase helpers for job latency reporting.
//
// Ticks are nanoseconds on a process-wide monotonic clock. The frequency
// is resolved once and cached.

use std::sync::OnceLock;
use std::time::Instant;

/// Largest tick value before the counter wraps.
pub const TICK_MASK: u64 = 0x0FFF_FFFF_FFFF_FFFF;

const NANOS_PER_SEC: u64 = 1_000_000_000;

static EPOCH: OnceLock<Instant> = OnceLock::new();
static FREQ: OnceLock<u64> = OnceLock::new();

/// Ticks per second.
pub fn freq() -> u64 {
    *FREQ.get_or_init(|| {
        log::trace!("timebase frequency {NANOS_PER_SEC} Hz");
        NANOS_PER_SEC
    })
}

/// Current tick count.
pub fn now() -> u64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    (epoch.elapsed().as_nanos() as u64) & TICK_MASK
}

/// Ticks elapsed from `t1` to `t2`, allowing one counter wrap.
pub fn time_diff(t1: u64, t2: u64) -> u64 {
    if t2 >= t1 {
        t2 - t1
    } else {
        (TICK_MASK - t1) + t2 + 1
    }
}

/// Convert a tick count to microseconds.
pub fn to_micros(ticks: u64) -> u64 {
    ((u128::from(ticks) * 1_000_000) / u128::from(freq())) as u64
}
