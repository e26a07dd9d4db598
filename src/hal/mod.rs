//! Hardware boundary
//!
//! The capture core only talks to the outside world through these traits:
//! 1. `Clock` - monotonic time and blocking delays
//! 2. `SerialLine` - byte-oriented reception on the monitored line
//! 3. `Storage` / `LogFile` - append-capable persistent volume
//! 4. `StatusIndicator` - binary status output
//! 5. `Console` - character-oriented operator channel
//!
//! `host` implements them for a desktop process.

pub mod host;

use crate::baud::BaudRate;
use crate::error::{LineError, StorageError};

/// Monotonic clock
pub trait Clock {
    /// Microseconds since an arbitrary fixed origin
    fn micros(&self) -> u64;

    fn millis(&self) -> u64 {
        self.micros() / 1000
    }

    /// Block for `ms` milliseconds
    fn delay_ms(&self, ms: u64);
}

/// The monitored asynchronous serial line
pub trait SerialLine {
    /// (Re)configure reception at `baud`, 8N1
    fn begin(&mut self, baud: BaudRate) -> Result<(), LineError>;

    /// Suspend reception and release the pin
    fn end(&mut self);

    /// Next received byte, if one is waiting. Never blocks.
    fn read_byte(&mut self) -> Option<u8>;
}

/// An open, append-only log on the storage volume
pub trait LogFile {
    fn write_line(&mut self, line: &str) -> Result<(), StorageError>;

    /// Force buffered lines onto the medium
    fn flush(&mut self) -> Result<(), StorageError>;

    /// Flush and release the handle
    fn close(self) -> Result<(), StorageError>;
}

/// Persistent storage volume
pub trait Storage {
    type File: LogFile;

    fn exists(&self, name: &str) -> bool;

    /// Open `name` for appending, creating it if missing
    fn open_append(&mut self, name: &str) -> Result<Self::File, StorageError>;
}

/// Binary status output (an LED on real hardware)
pub trait StatusIndicator {
    fn set(&mut self, on: bool);
}

/// Operator I/O channel
pub trait Console {
    /// Next operator keystroke, if any. Never blocks.
    fn read_byte(&mut self) -> Option<u8>;

    fn write_str(&mut self, s: &str);

    fn write_line(&mut self, s: &str) {
        self.write_str(s);
        self.write_str("\n");
    }
}
