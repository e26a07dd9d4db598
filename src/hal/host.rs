//! Desktop implementations of the hardware boundary

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver};
use serialport::{DataBits, Parity, SerialPort, StopBits};
use tracing::{debug, info, trace, warn};

use super::{Clock, Console, LogFile, SerialLine, StatusIndicator, Storage};
use crate::baud::BaudRate;
use crate::error::{LineError, StorageError};

/// Monotonic clock anchored at construction
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn delay_ms(&self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }
}

const READ_AHEAD: usize = 256;

/// Pause between read attempts while the device keeps failing
const READ_RETRY: Duration = Duration::from_millis(100);

/// A streak of serial read errors. The first error of a streak is reported;
/// later ones are counted and reads back off to `READ_RETRY`.
#[derive(Debug, Default)]
struct ReadFaults {
    retry_at: Option<Instant>,
    count: u64,
}

impl ReadFaults {
    fn ready(&self, now: Instant) -> bool {
        self.retry_at.map_or(true, |at| now >= at)
    }

    /// Returns true for the first failure of a streak
    fn fail(&mut self, now: Instant) -> bool {
        self.count += 1;
        self.retry_at = Some(now + READ_RETRY);
        self.count == 1
    }

    /// End the streak, returning how many errors it held
    fn clear(&mut self) -> u64 {
        self.retry_at = None;
        std::mem::take(&mut self.count)
    }
}

/// Serial device opened through `serialport`. Reads are drained into a
/// small read-ahead so `read_byte` costs one syscall per burst.
pub struct SerialPortLine {
    path: String,
    port: Option<Box<dyn SerialPort>>,
    rx: [u8; READ_AHEAD],
    head: usize,
    tail: usize,
    faults: ReadFaults,
}

impl SerialPortLine {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            port: None,
            rx: [0u8; READ_AHEAD],
            head: 0,
            tail: 0,
            faults: ReadFaults::default(),
        }
    }

    fn fill(&mut self) -> io::Result<usize> {
        let Some(port) = self.port.as_mut() else {
            return Ok(0);
        };
        let waiting = port.bytes_to_read().map_err(io::Error::from)? as usize;
        if waiting == 0 {
            return Ok(0);
        }
        let n = port.read(&mut self.rx[..waiting.min(READ_AHEAD)])?;
        self.head = 0;
        self.tail = n;
        Ok(n)
    }
}

impl SerialLine for SerialPortLine {
    fn begin(&mut self, baud: BaudRate) -> Result<(), LineError> {
        self.end();
        if self.path.is_empty() {
            return Err(LineError::Unavailable("no serial device configured".to_string()));
        }
        let port = serialport::new(&self.path, baud.bits_per_second())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(Duration::from_millis(1))
            .open()
            .map_err(|source| LineError::Open {
                port: self.path.clone(),
                baud: baud.bits_per_second(),
                source,
            })?;
        info!("Opened {} at {} baud", self.path, baud);
        self.port = Some(port);
        Ok(())
    }

    fn end(&mut self) {
        if self.port.take().is_some() {
            debug!("Released {}", self.path);
        }
        self.head = 0;
        self.tail = 0;
        self.faults.clear();
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.head == self.tail {
            let now = Instant::now();
            if !self.faults.ready(now) {
                return None;
            }
            match self.fill() {
                Ok(n) => {
                    let missed = self.faults.clear();
                    if missed > 0 {
                        info!("Serial reads on {} recovered after {} errors", self.path, missed);
                    }
                    if n == 0 {
                        return None;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return None,
                Err(e) => {
                    if self.faults.fail(now) {
                        warn!(
                            "Serial read error on {}: {} (retrying every {} ms)",
                            self.path,
                            e,
                            READ_RETRY.as_millis()
                        );
                    } else {
                        trace!("Serial read error on {}: {}", self.path, e);
                    }
                    return None;
                }
            }
        }
        let byte = self.rx[self.head];
        self.head += 1;
        Some(byte)
    }
}

/// A directory standing in for the removable storage volume
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub fn mount(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Open {
            name: root.display().to_string(),
            source,
        })?;
        info!("Capture directory ready: {}", root.display());
        Ok(Self { root })
    }

    #[cfg(test)]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl Storage for DirStorage {
    type File = DirFile;

    fn exists(&self, name: &str) -> bool {
        self.root.join(name).exists()
    }

    fn open_append(&mut self, name: &str) -> Result<DirFile, StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(name))
            .map_err(|source| StorageError::Open {
                name: name.to_string(),
                source,
            })?;
        Ok(DirFile {
            writer: BufWriter::new(file),
        })
    }
}

#[derive(Debug)]
pub struct DirFile {
    writer: BufWriter<File>,
}

impl LogFile for DirFile {
    fn write_line(&mut self, line: &str) -> Result<(), StorageError> {
        writeln!(self.writer, "{}", line).map_err(StorageError::Write)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.writer.flush().map_err(StorageError::Flush)?;
        self.writer.get_ref().sync_data().map_err(StorageError::Flush)
    }

    fn close(mut self) -> Result<(), StorageError> {
        self.flush()
    }
}

/// Keystrokes from stdin, output to stdout. A reader thread forwards stdin
/// bytes so `read_byte` never blocks the main loop.
pub struct StdConsole {
    keys: Receiver<u8>,
    write_failing: bool,
}

/// Write and flush `s`. A failure is logged once per streak of failures;
/// returns true when this call logged one.
fn emit<W: Write>(out: &mut W, s: &str, failing: &mut bool) -> bool {
    match out.write_all(s.as_bytes()).and_then(|()| out.flush()) {
        Ok(()) => {
            *failing = false;
            false
        }
        Err(e) => {
            let first = !*failing;
            if first {
                warn!("Console output failed: {}", e);
            }
            *failing = true;
            first
        }
    }
}

impl StdConsole {
    pub fn spawn() -> Self {
        let (tx, keys) = bounded(256);
        let spawned = thread::Builder::new()
            .name("console".to_string())
            .spawn(move || {
                for byte in io::stdin().lock().bytes() {
                    match byte {
                        Ok(b) => {
                            if tx.send(b).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("stdin read failed: {}", e);
                            break;
                        }
                    }
                }
                debug!("stdin closed");
            });
        if let Err(e) = spawned {
            warn!("Operator input unavailable: {}", e);
        }
        Self {
            keys,
            write_failing: false,
        }
    }
}

impl Console for StdConsole {
    fn read_byte(&mut self) -> Option<u8> {
        self.keys.try_recv().ok()
    }

    fn write_str(&mut self, s: &str) {
        emit(&mut io::stdout().lock(), s, &mut self.write_failing);
    }
}

/// Status indicator rendered as trace events
#[derive(Default)]
pub struct LogIndicator {
    on: bool,
}

impl StatusIndicator for LogIndicator {
    fn set(&mut self, on: bool) {
        if on != self.on {
            trace!("Status indicator {}", if on { "on" } else { "off" });
            self.on = on;
        }
    }
}
