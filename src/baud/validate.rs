//! Post-adoption sanity check of a candidate rate
//!
//! A wrong rate still produces bytes, just mostly garbage ones. With the
//! line running at the candidate, sample a short burst and require it to
//! look like text.

use tracing::debug;

use crate::config::{
    VALIDATE_MAX_BYTES, VALIDATE_MIN_BYTES, VALIDATE_POLL_MS, VALIDATE_SETTLE_MS,
    VALIDATE_WINDOW_MS,
};
use crate::hal::{Clock, SerialLine};

/// Printable ASCII (32-126 inclusive)
pub fn is_printable(byte: u8) -> bool {
    (32..=126).contains(&byte)
}

/// Printable ASCII, or one of LF, CR, NUL
pub fn is_plausible(byte: u8) -> bool {
    is_printable(byte) || matches!(byte, b'\n' | b'\r' | 0x00)
}

/// Outcome of one validation window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub read: usize,
    pub valid: usize,
}

impl ValidationReport {
    /// At least five bytes seen and at least half of them plausible
    pub fn passed(&self) -> bool {
        self.read >= VALIDATE_MIN_BYTES && self.valid * 2 >= self.read
    }
}

/// Read up to 20 bytes within one second from a line already configured
/// at the candidate rate and grade them.
pub fn validate_baud_rate<L, C>(line: &mut L, clock: &C) -> ValidationReport
where
    L: SerialLine + ?Sized,
    C: Clock + ?Sized,
{
    clock.delay_ms(VALIDATE_SETTLE_MS);

    let mut report = ValidationReport::default();
    let start = clock.millis();

    while report.read < VALIDATE_MAX_BYTES
        && clock.millis().saturating_sub(start) < VALIDATE_WINDOW_MS
    {
        if let Some(byte) = line.read_byte() {
            report.read += 1;
            if is_plausible(byte) {
                report.valid += 1;
            }
        }
        clock.delay_ms(VALIDATE_POLL_MS);
    }

    debug!(
        "Validation window: read={} valid={} passed={}",
        report.read,
        report.valid,
        report.passed()
    );
    report
}
