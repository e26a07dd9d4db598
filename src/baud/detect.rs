//! Full baud detection protocol
//!
//! 1. Suspend normal reception and arm the edge recorder
//! 2. Wait for a full edge buffer or the timeout
//! 3. Disarm, then estimate the bit period and snap to a standard rate
//! 4. Reconfigure the line at the candidate and validate the bytes it yields
//!
//! The candidate is only returned once validation passes; callers never
//! see an unvalidated rate. The line is released again before returning.

use thiserror::Error;
use tracing::{debug, info};

use super::estimate::{find_shortest_consistent_pulse, pulse_widths, raw_baud, round_to_standard_baud};
use super::rate::BaudRate;
use super::validate::{validate_baud_rate, ValidationReport};
use crate::config::{DETECT_MIN_EDGES, DETECT_POLL_MS, DETECT_TIMEOUT_MS, EDGE_CAPACITY};
use crate::edge::EdgeRecorder;
use crate::error::LineError;
use crate::hal::{Clock, SerialLine};

/// Why automatic detection gave up. Every variant is recovered by
/// falling back to manual selection.
#[derive(Debug, Error)]
pub enum DetectionFailure {
    #[error("only captured {captured} edge transitions")]
    TooFewEdges { captured: usize },

    #[error("no consistent pulse pattern found")]
    InconsistentPulses,

    #[error("calculated baud ({raw}) doesn't match standard rates")]
    NonStandardRate { raw: u32 },

    #[error("could not reconfigure line at {candidate}: {source}")]
    LineUnavailable {
        candidate: BaudRate,
        #[source]
        source: LineError,
    },

    #[error("validation at {candidate} failed ({} of {} bytes plausible)", .report.valid, .report.read)]
    ValidationFailed {
        candidate: BaudRate,
        report: ValidationReport,
    },
}

/// A validated detection result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub baud: BaudRate,
    pub edges: usize,
    pub bit_period_us: u32,
    pub raw_baud: u32,
    pub validation: ValidationReport,
}

/// Run the detection protocol to completion. Blocks for at most the
/// sampling timeout plus the validation window.
pub fn detect_baud_rate<R, L, C>(
    edges: &R,
    line: &mut L,
    clock: &C,
) -> Result<Detection, DetectionFailure>
where
    R: EdgeRecorder + ?Sized,
    L: SerialLine + ?Sized,
    C: Clock + ?Sized,
{
    // The pin cannot be driven by the UART and the edge interrupt at once
    line.end();
    edges.arm();
    info!("Listening for serial transitions...");

    let start = clock.millis();
    let mut last_progress = start;
    while edges.edge_count() < EDGE_CAPACITY
        && clock.millis().saturating_sub(start) < DETECT_TIMEOUT_MS
    {
        clock.delay_ms(DETECT_POLL_MS);
        if clock.millis().saturating_sub(last_progress) >= 1000 {
            debug!("Edges so far: {}", edges.edge_count());
            last_progress = clock.millis();
        }
    }

    edges.disarm();
    let snapshot = edges.snapshot().unwrap_or_else(|| crate::edge::EdgeSnapshot::from_slice(&[]));

    if snapshot.len() < DETECT_MIN_EDGES {
        return Err(DetectionFailure::TooFewEdges {
            captured: snapshot.len(),
        });
    }
    info!("Captured {} edge transitions. Analyzing...", snapshot.len());

    let mut widths = [0u32; EDGE_CAPACITY];
    let n = pulse_widths(snapshot.as_slice(), &mut widths);

    let bit_period_us =
        find_shortest_consistent_pulse(&widths[..n]).ok_or(DetectionFailure::InconsistentPulses)?;

    let raw = raw_baud(bit_period_us);
    info!("Bit period {} µs, calculated baud rate: {}", bit_period_us, raw);

    let candidate = round_to_standard_baud(raw).ok_or(DetectionFailure::NonStandardRate { raw })?;

    info!("Testing baud rate {}...", candidate);
    if let Err(source) = line.begin(candidate) {
        line.end();
        return Err(DetectionFailure::LineUnavailable { candidate, source });
    }
    let validation = validate_baud_rate(line, clock);
    line.end();

    if !validation.passed() {
        return Err(DetectionFailure::ValidationFailed {
            candidate,
            report: validation,
        });
    }

    Ok(Detection {
        baud: candidate,
        edges: snapshot.len(),
        bit_period_us,
        raw_baud: raw,
        validation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, ScriptedEdges, ScriptedLine};

    fn edges_every(period: u32, count: u32) -> Vec<u32> {
        (0..count).map(|i| i * period).collect()
    }

    #[test]
    fn test_detects_19200() {
        let edges = ScriptedEdges::new(&[0, 52, 104, 156, 208, 260, 312, 364, 416, 468, 520]);
        let mut line = ScriptedLine::new();
        line.on_begin(BaudRate::B19200, b"$GPGGA,123519,4807.038,N\r\n");
        let clock = ManualClock::new();

        let detection = detect_baud_rate(&edges, &mut line, &clock).unwrap();
        assert_eq!(detection.baud, BaudRate::B19200);
        assert_eq!(detection.bit_period_us, 52);
        assert_eq!(detection.raw_baud, 19230);
        assert_eq!(detection.edges, 11);
        assert!(!edges.is_armed());
        assert_eq!(line.configured(), None, "line is released after detection");
    }

    #[test]
    fn test_waits_for_timeout_when_buffer_not_full() {
        let edges = ScriptedEdges::new(&edges_every(104, 11));
        let mut line = ScriptedLine::new();
        line.on_begin(BaudRate::B9600, b"hello world\n");
        let clock = ManualClock::new();

        detect_baud_rate(&edges, &mut line, &clock).unwrap();
        assert!(clock.millis() >= DETECT_TIMEOUT_MS);
    }

    #[test]
    fn test_full_buffer_ends_sampling_early() {
        let edges = ScriptedEdges::new(&edges_every(26, 60));
        let mut line = ScriptedLine::new();
        line.on_begin(BaudRate::B38400, b"AT+OK\r\nAT+OK\r\n");
        let clock = ManualClock::new();

        let detection = detect_baud_rate(&edges, &mut line, &clock).unwrap();
        assert_eq!(detection.baud, BaudRate::B38400);
        assert_eq!(detection.edges, EDGE_CAPACITY);
        assert!(clock.millis() < DETECT_TIMEOUT_MS);
    }

    #[test]
    fn test_too_few_edges() {
        let edges = ScriptedEdges::new(&edges_every(52, 8));
        let mut line = ScriptedLine::new();
        let clock = ManualClock::new();

        let err = detect_baud_rate(&edges, &mut line, &clock).unwrap_err();
        assert!(matches!(err, DetectionFailure::TooFewEdges { captured: 8 }));
        assert!(line.begins().is_empty(), "line never reconfigured");
    }

    #[test]
    fn test_nine_edges_is_one_short() {
        let edges = ScriptedEdges::new(&edges_every(52, DETECT_MIN_EDGES as u32 - 1));
        let mut line = ScriptedLine::new();
        line.on_begin(BaudRate::B19200, b"$GPGGA,123519,4807.038,N\r\n");
        let clock = ManualClock::new();

        let err = detect_baud_rate(&edges, &mut line, &clock).unwrap_err();
        assert!(matches!(err, DetectionFailure::TooFewEdges { captured: 9 }));
        assert!(line.begins().is_empty());
    }

    #[test]
    fn test_ten_edges_is_enough() {
        let edges = ScriptedEdges::new(&edges_every(52, DETECT_MIN_EDGES as u32));
        let mut line = ScriptedLine::new();
        line.on_begin(BaudRate::B19200, b"$GPGGA,123519,4807.038,N\r\n");
        let clock = ManualClock::new();

        let detection = detect_baud_rate(&edges, &mut line, &clock).unwrap();
        assert_eq!(detection.edges, 10);
        assert_eq!(detection.baud, BaudRate::B19200);
        assert_eq!(line.begins(), vec![BaudRate::B19200]);
    }

    #[test]
    fn test_backwards_timestamps_rejected() {
        let script: Vec<u32> = (0..12).map(|i| 10_000 - i * 52).collect();
        let edges = ScriptedEdges::new(&script);
        let mut line = ScriptedLine::new();
        let clock = ManualClock::new();

        let err = detect_baud_rate(&edges, &mut line, &clock).unwrap_err();
        assert!(matches!(err, DetectionFailure::NonStandardRate { raw: 0 }));
        assert!(line.begins().is_empty());
    }

    #[test]
    fn test_inconsistent_pulses() {
        // Single short pulse among long runs
        let edges = ScriptedEdges::new(&[0, 52, 300, 700, 1200, 1800, 2500, 3300, 4200, 5200, 6300]);
        let mut line = ScriptedLine::new();
        let clock = ManualClock::new();

        let err = detect_baud_rate(&edges, &mut line, &clock).unwrap_err();
        assert!(matches!(err, DetectionFailure::InconsistentPulses));
    }

    #[test]
    fn test_non_standard_rate() {
        // 70µs bit ~ 14285 baud, between 9600 and 19200
        let edges = ScriptedEdges::new(&edges_every(70, 12));
        let mut line = ScriptedLine::new();
        let clock = ManualClock::new();

        let err = detect_baud_rate(&edges, &mut line, &clock).unwrap_err();
        assert!(matches!(err, DetectionFailure::NonStandardRate { raw: 14285 }));
    }

    #[test]
    fn test_validation_failure_keeps_candidate_out() {
        let edges = ScriptedEdges::new(&edges_every(52, 12));
        let mut line = ScriptedLine::new();
        line.on_begin(BaudRate::B19200, &[0xFE, 0x81, 0x93, 0xC4, 0xE7, 0x99, 0x88, 0xF1]);
        let clock = ManualClock::new();

        let err = detect_baud_rate(&edges, &mut line, &clock).unwrap_err();
        match err {
            DetectionFailure::ValidationFailed { candidate, report } => {
                assert_eq!(candidate, BaudRate::B19200);
                assert_eq!(report.read, 8);
                assert_eq!(report.valid, 0);
            }
            other => panic!("unexpected failure: {other}"),
        }
        assert_eq!(line.configured(), None);
    }

    #[test]
    fn test_line_open_failure() {
        let edges = ScriptedEdges::new(&edges_every(52, 12));
        let mut line = ScriptedLine::new();
        line.fail_begin(true);
        let clock = ManualClock::new();

        let err = detect_baud_rate(&edges, &mut line, &clock).unwrap_err();
        assert!(matches!(err, DetectionFailure::LineUnavailable { .. }));
    }
}
