//! CSV record format of the capture log

use std::fmt;

use crate::baud::is_printable;

/// First line of every capture file
pub const CSV_HEADER: &str = "Timestamp,Direction,Value_Hex,Value_ASCII,Status";

/// Rendering used for bytes outside printable ASCII
const PLACEHOLDER: char = '.';

/// One received byte, timestamped relative to the session start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRecord {
    pub timestamp_ms: u64,
    pub value: u8,
}

impl ByteRecord {
    pub fn new(timestamp_ms: u64, value: u8) -> Self {
        Self { timestamp_ms, value }
    }

    pub fn ascii(&self) -> char {
        if is_printable(self.value) {
            self.value as char
        } else {
            PLACEHOLDER
        }
    }
}

impl fmt::Display for ByteRecord {
    /// `<ms>,RX,0x<HH>,<char>,OK`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},RX,0x{},{},OK",
            self.timestamp_ms,
            hex::encode_upper([self.value]),
            self.ascii()
        )
    }
}
