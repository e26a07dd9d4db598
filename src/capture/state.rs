//! Capture phase, its transition table, and per-file statistics

use std::fmt;

use thiserror::Error;

/// Phase of the capture state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    DetectingBaud,
    AwaitingManualBaud,
    Capturing,
    Stopped,
}

/// Events that move the machine between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BeginDetection,
    DetectionSucceeded,
    DetectionFailed,
    PromptManual,
    ManualSelected,
    StartCapture,
    StopCapture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {event} while {from}")]
pub struct IllegalTransition {
    pub from: CaptureState,
    pub event: Transition,
}

impl CaptureState {
    /// The complete transition table. Anything not listed is rejected.
    pub fn next(self, event: Transition) -> Result<CaptureState, IllegalTransition> {
        use CaptureState::*;
        use Transition::*;

        match (self, event) {
            (Idle | Stopped, BeginDetection) => Ok(DetectingBaud),
            (Idle | Stopped, PromptManual) => Ok(AwaitingManualBaud),
            (Idle | Stopped, StartCapture) => Ok(Capturing),
            (DetectingBaud, DetectionSucceeded) => Ok(Idle),
            (DetectingBaud, DetectionFailed) => Ok(AwaitingManualBaud),
            (AwaitingManualBaud, ManualSelected) => Ok(Idle),
            (Capturing, StopCapture) => Ok(Stopped),
            (from, event) => Err(IllegalTransition { from, event }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CaptureState::Idle => "IDLE",
            CaptureState::DetectingBaud => "DETECTING BAUD",
            CaptureState::AwaitingManualBaud => "AWAITING MANUAL INPUT",
            CaptureState::Capturing => "CAPTURING",
            CaptureState::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Transition::BeginDetection => "begin detection",
            Transition::DetectionSucceeded => "finish detection",
            Transition::DetectionFailed => "fail detection",
            Transition::PromptManual => "prompt for manual baud",
            Transition::ManualSelected => "select manual baud",
            Transition::StartCapture => "start capture",
            Transition::StopCapture => "stop capture",
        };
        f.write_str(s)
    }
}

/// Statistics for the current capture file
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    pub bytes_received: u64,
    pub bytes_logged: u64,
    pub overflow_events: u64,
    pub flushes: u64,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&mut self) {
        self.bytes_received += 1;
    }

    pub fn record_logged(&mut self, flushed: bool) {
        self.bytes_logged += 1;
        if flushed {
            self.record_flush();
        }
    }

    pub fn record_flush(&mut self) {
        self.flushes += 1;
    }

    pub fn record_overflow(&mut self) {
        self.overflow_events += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
