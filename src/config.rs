//! Configuration loaded from environment variables, plus the fixed
//! capacities and timings of the capture pipeline

use std::path::PathBuf;

use crate::baud::BaudRate;

/// Edge timestamp slots filled by the interrupt-level recorder
pub const EDGE_CAPACITY: usize = 50;

/// In-memory capture buffer size in bytes
pub const CAPTURE_BUFFER_SIZE: usize = 1024;

/// Flush the capture log if this much time passed since the last flush
pub const FLUSH_INTERVAL_MS: u64 = 1000;

/// Flush the capture log after this many records
pub const FLUSH_BYTE_COUNT: u32 = 512;

/// Status indicator toggle period while capturing
pub const BLINK_INTERVAL_MS: u64 = 500;

/// Upper bound on bytes drained from the line per main-loop iteration
pub const ACQUIRE_BURST: usize = 64;

// Baud detection timing
pub const DETECT_TIMEOUT_MS: u64 = 10_000;
pub const DETECT_POLL_MS: u64 = 10;
pub const DETECT_MIN_EDGES: usize = 10;

// Post-adoption validation
pub const VALIDATE_SETTLE_MS: u64 = 100;
pub const VALIDATE_WINDOW_MS: u64 = 1000;
pub const VALIDATE_MAX_BYTES: usize = 20;
pub const VALIDATE_MIN_BYTES: usize = 5;
pub const VALIDATE_POLL_MS: u64 = 10;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Serial device of the monitored line
    pub port: String,

    /// Directory acting as the capture storage volume
    pub capture_dir: PathBuf,

    /// Rate adopted at boot, `None` until detected or selected
    pub default_baud: Option<BaudRate>,

    /// External command printing one edge timestamp (µs) per line
    pub edge_command: Option<String>,

    /// Delay between main-loop iterations in milliseconds
    pub loop_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("SNIFFER_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string()),

            capture_dir: std::env::var("SNIFFER_CAPTURE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("captures")),

            default_baud: match std::env::var("SNIFFER_DEFAULT_BAUD") {
                Ok(value) => parse_baud(&value),
                Err(_) => Some(BaudRate::B9600),
            },

            edge_command: std::env::var("SNIFFER_EDGE_COMMAND")
                .ok()
                .filter(|s| !s.trim().is_empty()),

            loop_interval_ms: std::env::var("SNIFFER_LOOP_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

/// `0`, `none` or anything that is not a standard rate means "not detected"
fn parse_baud(value: &str) -> Option<BaudRate> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") {
        return None;
    }
    value.parse::<u32>().ok().and_then(BaudRate::from_standard)
}
