//! Baud-rate estimation from edge timing
//!
//! On asynchronous serial data the start bit, stop bit and alternating data
//! bits guarantee that some transitions are exactly one bit apart. The
//! shortest pulse width that recurs consistently is therefore taken as the
//! bit period, and `1 / period` is snapped to the nearest standard rate.

use super::rate::{BaudRate, STANDARD_RATES};

/// Pulses at or below this width (µs) are electrical noise, not bits
pub const NOISE_FLOOR_US: u32 = 5;

/// Pulses within `min / TOLERANCE_DIVISOR` of the minimum count as matches (10%)
const TOLERANCE_DIVISOR: u32 = 10;

/// Matches needed before the minimum is trusted as a bit period
pub const MIN_CONSISTENT_PULSES: usize = 3;

/// Accepted distance from a standard rate: `rate / RATE_TOLERANCE_DIVISOR` (5%)
const RATE_TOLERANCE_DIVISOR: u32 = 20;

/// Fill `out` with the widths between consecutive edges and return how many
/// were written. Timestamps are wrapping microsecond counters, so a
/// rollover between two edges still yields the right width.
pub fn pulse_widths(edges: &[u32], out: &mut [u32]) -> usize {
    let mut n = 0;
    for (slot, pair) in out.iter_mut().zip(edges.windows(2)) {
        *slot = pair[1].wrapping_sub(pair[0]);
        n += 1;
    }
    n
}

/// Find the shortest pulse width that at least `MIN_CONSISTENT_PULSES`
/// pulses agree with (±10%). Returns `None` when fewer than three pulses
/// are given, when every pulse is noise, or when the minimum is not
/// backed by enough matches.
pub fn find_shortest_consistent_pulse(pulses: &[u32]) -> Option<u32> {
    if pulses.len() < MIN_CONSISTENT_PULSES {
        return None;
    }

    let min_pulse = pulses
        .iter()
        .copied()
        .filter(|&p| p > NOISE_FLOOR_US)
        .min()?;

    let tolerance = min_pulse / TOLERANCE_DIVISOR;
    let low = min_pulse - tolerance;
    let high = min_pulse.saturating_add(tolerance);

    let matches = pulses.iter().filter(|&&p| p >= low && p <= high).count();

    (matches >= MIN_CONSISTENT_PULSES).then_some(min_pulse)
}

/// Convert a bit period in microseconds to bits per second
pub fn raw_baud(bit_period_us: u32) -> u32 {
    1_000_000 / bit_period_us.max(1)
}

/// Snap `raw` to the closest standard rate, if it lies within 5% of it.
/// On an exact tie the lower rate is considered.
pub fn round_to_standard_baud(raw: u32) -> Option<BaudRate> {
    let (closest, diff) = STANDARD_RATES
        .iter()
        .map(|&rate| (rate, raw.abs_diff(rate)))
        .fold(None, |best: Option<(u32, u32)>, cand| match best {
            Some(b) if b.1 <= cand.1 => Some(b),
            _ => Some(cand),
        })?;

    if diff < closest / RATE_TOLERANCE_DIVISOR {
        BaudRate::from_standard(closest)
    } else {
        None
    }
}
