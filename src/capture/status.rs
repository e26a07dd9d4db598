//! On-demand status report

use std::fmt;

use super::state::CaptureState;
use crate::baud::BaudRate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub state: CaptureState,
    pub baud: Option<BaudRate>,
    pub filename: Option<String>,
    pub bytes_received: u64,
    pub buffer_used: usize,
    pub buffer_capacity: usize,
    pub storage_ready: bool,
    pub uptime_secs: u64,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========================================")?;
        writeln!(f, "SerialSniffer Status")?;
        writeln!(f, "========================================")?;
        writeln!(f, "State: {}", self.state)?;
        match self.baud {
            Some(baud) => writeln!(f, "Baud Rate: {}", baud)?,
            None => writeln!(f, "Baud Rate: Not detected")?,
        }
        writeln!(f, "Capture File: {}", self.filename.as_deref().unwrap_or("None"))?;
        writeln!(f, "Bytes Received: {}", self.bytes_received)?;
        writeln!(f, "Buffer Usage: {}/{}", self.buffer_used, self.buffer_capacity)?;
        writeln!(
            f,
            "SD Card: {}",
            if self.storage_ready { "Ready" } else { "Not available" }
        )?;
        writeln!(f, "Uptime: {} seconds", self.uptime_secs)?;
        write!(f, "========================================")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        let report = StatusReport {
            state: CaptureState::Capturing,
            baud: Some(BaudRate::B57600),
            filename: Some("capture_4.csv".to_string()),
            bytes_received: 1234,
            buffer_used: 1024,
            buffer_capacity: 1024,
            storage_ready: true,
            uptime_secs: 61,
        };
        let text = report.to_string();
        assert!(text.contains("State: CAPTURING"));
        assert!(text.contains("Baud Rate: 57600"));
        assert!(text.contains("Capture File: capture_4.csv"));
        assert!(text.contains("Bytes Received: 1234"));
        assert!(text.contains("Buffer Usage: 1024/1024"));
        assert!(text.contains("SD Card: Ready"));
        assert!(text.contains("Uptime: 61 seconds"));
    }

    #[test]
    fn test_status_placeholders() {
        let report = StatusReport {
            state: CaptureState::Idle,
            baud: None,
            filename: None,
            bytes_received: 0,
            buffer_used: 0,
            buffer_capacity: 1024,
            storage_ready: false,
            uptime_secs: 0,
        };
        let text = report.to_string();
        assert!(text.contains("Baud Rate: Not detected"));
        assert!(text.contains("Capture File: None"));
        assert!(text.contains("SD Card: Not available"));
    }
}
