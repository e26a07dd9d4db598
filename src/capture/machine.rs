//! Capture state machine
//!
//! Owns every piece of sniffer state and drives it from two inputs: operator
//! keystrokes (`handle_input`) and the periodic main-loop tick (`poll`).
//! The hardware is reached only through the `hal` traits so the whole
//! machine runs against a synthetic clock in tests.

use tracing::{debug, error, info, warn};

use super::buffer::CaptureBuffer;
use super::command::{Command, Input, HELP, MANUAL_MENU, MANUAL_PROMPT};
use super::logger::{FlushPolicy, SessionLog};
use super::naming::create_capture_file;
use super::record::ByteRecord;
use super::state::{CaptureState, CaptureStats, IllegalTransition, Transition};
use super::status::StatusReport;
use crate::baud::{detect_baud_rate, BaudRate};
use crate::config::{ACQUIRE_BURST, BLINK_INTERVAL_MS};
use crate::edge::EdgeRecorder;
use crate::error::StorageError;
use crate::hal::{Clock, Console, SerialLine, StatusIndicator, Storage};

/// Devices the machine drives. `storage` is `None` when no volume could be
/// mounted; capture then runs without a durable log.
pub struct Hardware<R, L, S, C> {
    pub edges: R,
    pub line: L,
    pub storage: Option<S>,
    pub clock: C,
}

/// Toggles the indicator while capturing
#[derive(Debug, Default)]
struct Blinker {
    last_toggle_ms: u64,
    on: bool,
}

impl Blinker {
    fn update<I: StatusIndicator + ?Sized>(&mut self, now_ms: u64, indicator: &mut I) {
        if now_ms.saturating_sub(self.last_toggle_ms) > BLINK_INTERVAL_MS {
            self.on = !self.on;
            indicator.set(self.on);
            self.last_toggle_ms = now_ms;
        }
    }

    fn off<I: StatusIndicator + ?Sized>(&mut self, indicator: &mut I) {
        if self.on {
            self.on = false;
            indicator.set(false);
        }
    }
}

pub struct CaptureMachine<R, L, S, C>
where
    R: EdgeRecorder,
    L: SerialLine,
    S: Storage,
    C: Clock,
{
    hw: Hardware<R, L, S, C>,
    state: CaptureState,
    baud: Option<BaudRate>,
    filename: Option<String>,
    log: Option<SessionLog<S::File>>,
    buffer: CaptureBuffer,
    stats: CaptureStats,
    overflow_reported: bool,
    policy: FlushPolicy,
    boot_ms: u64,
    session_start_ms: u64,
    blinker: Blinker,
}

impl<R, L, S, C> CaptureMachine<R, L, S, C>
where
    R: EdgeRecorder,
    L: SerialLine,
    S: Storage,
    C: Clock,
{
    pub fn new(hw: Hardware<R, L, S, C>, default_baud: Option<BaudRate>) -> Self {
        let boot_ms = hw.clock.millis();
        Self {
            hw,
            state: CaptureState::Idle,
            baud: default_baud,
            filename: None,
            log: None,
            buffer: CaptureBuffer::new(),
            stats: CaptureStats::new(),
            overflow_reported: false,
            policy: FlushPolicy::default(),
            boot_ms,
            session_start_ms: boot_ms,
            blinker: Blinker::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// The adopted rate. Only ever a validated detection, a manual choice
    /// or the configured default.
    #[cfg(test)]
    pub fn baud(&self) -> Option<BaudRate> {
        self.baud
    }

    #[cfg(test)]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    #[cfg(test)]
    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    #[cfg(test)]
    pub fn buffer(&self) -> &CaptureBuffer {
        &self.buffer
    }

    #[cfg(test)]
    pub fn is_logging(&self) -> bool {
        self.log.is_some()
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            state: self.state,
            baud: self.baud,
            filename: self.filename.clone(),
            bytes_received: self.stats.bytes_received,
            buffer_used: self.buffer.len(),
            buffer_capacity: self.buffer.capacity(),
            storage_ready: self.hw.storage.is_some(),
            uptime_secs: self.hw.clock.millis().saturating_sub(self.boot_ms) / 1000,
        }
    }

    /// Boot banner, current status and the command list
    pub fn greet<K: Console + ?Sized>(&self, console: &mut K) {
        console.write_line("Serial Sniffer ready.");
        if self.hw.storage.is_none() {
            console.write_line("WARNING: SD card not available. Logging disabled.");
        }
        console.write_line(&self.status().to_string());
        console.write_str(HELP);
    }

    /// One main-loop iteration: at most one operator keystroke, then the
    /// periodic work
    pub fn step<K, I>(&mut self, console: &mut K, indicator: &mut I)
    where
        K: Console + ?Sized,
        I: StatusIndicator + ?Sized,
    {
        if let Some(byte) = console.read_byte() {
            self.handle_input(byte, console);
        }
        self.poll(console, indicator);
    }

    pub fn handle_input<K: Console + ?Sized>(&mut self, byte: u8, console: &mut K) {
        if self.state == CaptureState::AwaitingManualBaud {
            self.handle_manual_key(byte, console);
            return;
        }

        match Input::from_byte(byte) {
            Input::Command(command) => self.execute(command, console),
            Input::LineEnding => {}
            Input::Unknown(_) => console.write_line("Unknown command. Press 'h' for help."),
        }
    }

    fn execute<K: Console + ?Sized>(&mut self, command: Command, console: &mut K) {
        debug!("Command {:?} in state {}", command, self.state);
        match command {
            Command::Start => self.start_capture(console),
            Command::Stop => self.stop_capture(console),
            Command::Detect => self.detect(console),
            Command::ManualBaud => self.prompt_manual(console),
            Command::NewFile => self.new_file(console),
            Command::ClearBuffer => self.clear_buffer(console),
            Command::Status => console.write_line(&self.status().to_string()),
            Command::Help => console.write_str(HELP),
        }
    }

    fn advance(&mut self, event: Transition) -> Result<(), IllegalTransition> {
        let next = self.state.next(event)?;
        info!("State: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn reject<K: Console + ?Sized>(&self, err: IllegalTransition, console: &mut K) {
        warn!("Rejected: {}", err);
        match err.from {
            CaptureState::Capturing => {
                console.write_line("Capture in progress. Press 't' to stop first.")
            }
            _ => console.write_line(&format!("Cannot {} now.", err.event)),
        }
    }

    fn detect<K: Console + ?Sized>(&mut self, console: &mut K) {
        if let Err(err) = self.advance(Transition::BeginDetection) {
            self.reject(err, console);
            return;
        }

        console.write_line("Starting baud rate detection...");
        console.write_line("Make sure target device is transmitting data.");

        let outcome = detect_baud_rate(&self.hw.edges, &mut self.hw.line, &self.hw.clock);
        match outcome {
            Ok(detection) => {
                info!(
                    "Detected {} baud ({} edges, {} µs bit, raw {}, {} of {} bytes plausible)",
                    detection.baud,
                    detection.edges,
                    detection.bit_period_us,
                    detection.raw_baud,
                    detection.validation.valid,
                    detection.validation.read
                );
                self.baud = Some(detection.baud);
                console.write_line(&format!("SUCCESS! Baud rate detected: {}", detection.baud));
                if let Err(err) = self.advance(Transition::DetectionSucceeded) {
                    error!("{}", err);
                }
            }
            Err(failure) => {
                warn!("Baud detection failed: {}", failure);
                console.write_line(&format!("Detection failed: {}.", failure));
                if let Err(err) = self.advance(Transition::DetectionFailed) {
                    error!("{}", err);
                    return;
                }
                console.write_str(MANUAL_MENU);
                console.write_str(MANUAL_PROMPT);
            }
        }
    }

    fn prompt_manual<K: Console + ?Sized>(&mut self, console: &mut K) {
        if let Err(err) = self.advance(Transition::PromptManual) {
            self.reject(err, console);
            return;
        }
        console.write_str(MANUAL_MENU);
        console.write_str(MANUAL_PROMPT);
    }

    fn handle_manual_key<K: Console + ?Sized>(&mut self, byte: u8, console: &mut K) {
        if let Some(baud) = BaudRate::from_menu_key(byte) {
            console.write_line(&char::from(byte).to_string());
            console.write_line(&format!("Baud rate set to: {}", baud));
            self.baud = Some(baud);
            if let Err(err) = self.advance(Transition::ManualSelected) {
                error!("{}", err);
            }
            return;
        }

        if matches!(Input::from_byte(byte), Input::LineEnding) {
            return;
        }
        console.write_line("");
        console.write_line("Invalid selection. Please enter 1-5.");
        console.write_str(MANUAL_PROMPT);
    }

    fn start_capture<K: Console + ?Sized>(&mut self, console: &mut K) {
        if let Err(err) = self.state.next(Transition::StartCapture) {
            self.reject(err, console);
            return;
        }

        let Some(baud) = self.baud else {
            console.write_line("No baud rate set. Select one manually.");
            self.prompt_manual(console);
            return;
        };

        console.write_line("Starting capture...");
        let log = match self.open_session_log(console) {
            Ok(log) => log,
            Err(err) => {
                error!("Could not open capture log: {}", err);
                console.write_line(&format!("ERROR: Could not open capture file for writing. ({})", err));
                return;
            }
        };

        if let Err(err) = self.hw.line.begin(baud) {
            error!("{}", err);
            console.write_line(&format!("ERROR: {}", err));
            if let Some(log) = log {
                if let Err(err) = log.close() {
                    warn!("Closing unused capture log failed: {}", err);
                }
            }
            return;
        }

        let now = self.hw.clock.millis();
        self.log = log;
        self.session_start_ms = now;
        self.blinker.last_toggle_ms = now;
        if let Err(err) = self.advance(Transition::StartCapture) {
            error!("{}", err);
            return;
        }

        info!(
            "Capture session started at {} ({} baud, file {})",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            baud,
            self.filename.as_deref().unwrap_or("none")
        );
        console.write_line(&format!("Using baud rate: {}", baud));
        console.write_line("Capture started!");
    }

    /// Create the capture file on first use and open it for appending.
    /// `Ok(None)` means no storage is mounted and capture runs unlogged.
    fn open_session_log<K: Console + ?Sized>(
        &mut self,
        console: &mut K,
    ) -> Result<Option<SessionLog<S::File>>, StorageError> {
        let now = self.hw.clock.millis();
        let Some(storage) = self.hw.storage.as_mut() else {
            console.write_line("WARNING: SD card not available. Logging disabled.");
            return Ok(None);
        };

        let name = match self.filename.clone() {
            Some(name) => name,
            None => {
                let name = create_capture_file(storage)?;
                console.write_line(&format!("Created capture file: {}", name));
                self.filename = Some(name.clone());
                self.stats.reset();
                name
            }
        };

        let file = storage.open_append(&name)?;
        Ok(Some(SessionLog::new(file, self.policy, now)))
    }

    fn stop_capture<K: Console + ?Sized>(&mut self, console: &mut K) {
        if self.advance(Transition::StopCapture).is_err() {
            console.write_line("Not currently capturing.");
            return;
        }

        self.hw.line.end();
        self.close_log(console);
        console.write_line("Capture stopped.");
        console.write_line(&self.status().to_string());
        console.write_line(&format!("Bytes Logged: {}", self.stats.bytes_logged));
        console.write_line(&format!("Overflow Events: {}", self.stats.overflow_events));
        console.write_line(&format!("Flushes: {}", self.stats.flushes));
    }

    fn close_log<K: Console + ?Sized>(&mut self, console: &mut K) {
        let Some(log) = self.log.take() else {
            return;
        };
        match log.close() {
            Ok(summary) => info!(
                "Closed capture log: {} records, {} flushes",
                summary.records, summary.flushes
            ),
            Err(err) => {
                error!("Closing capture log failed: {}", err);
                console.write_line(&format!("ERROR: Could not close capture file. ({})", err));
            }
        }
    }

    fn new_file<K: Console + ?Sized>(&mut self, console: &mut K) {
        let Some(storage) = self.hw.storage.as_mut() else {
            console.write_line("ERROR: SD card not available.");
            return;
        };

        let name = match create_capture_file(storage) {
            Ok(name) => name,
            Err(err) => {
                error!("{}", err);
                console.write_line(&format!("ERROR: Could not create file. ({})", err));
                return;
            }
        };
        console.write_line(&format!("Creating new capture file: {}", name));
        console.write_line("File created successfully.");
        self.filename = Some(name.clone());
        self.stats.reset();

        if self.state != CaptureState::Capturing {
            return;
        }

        // Rotate the live session onto the new file
        self.close_log(console);
        let now = self.hw.clock.millis();
        let opened = match self.hw.storage.as_mut() {
            Some(storage) => storage.open_append(&name),
            None => return,
        };
        match opened {
            Ok(file) => {
                self.log = Some(SessionLog::new(file, self.policy, now));
                self.session_start_ms = now;
            }
            Err(err) => {
                error!("{}", err);
                console.write_line(&format!(
                    "ERROR: Could not open capture file for writing. ({}) Capture continues without logging.",
                    err
                ));
            }
        }
    }

    fn clear_buffer<K: Console + ?Sized>(&mut self, console: &mut K) {
        self.buffer.clear();
        self.overflow_reported = false;
        console.write_line("Buffer cleared.");
    }

    /// Periodic work: drain the line while capturing, keep the log durable
    /// and drive the indicator
    pub fn poll<K, I>(&mut self, console: &mut K, indicator: &mut I)
    where
        K: Console + ?Sized,
        I: StatusIndicator + ?Sized,
    {
        if self.state == CaptureState::Capturing {
            self.acquire(console);
            self.blinker.update(self.hw.clock.millis(), indicator);
        } else {
            self.blinker.off(indicator);
        }
    }

    /// Drain up to one burst from the line. Each byte is stamped when it is
    /// read, not when the burst began.
    fn acquire<K: Console + ?Sized>(&mut self, console: &mut K) {
        let mut received = 0;
        while received < ACQUIRE_BURST {
            let Some(byte) = self.hw.line.read_byte() else {
                break;
            };
            received += 1;
            let now = self.hw.clock.millis();
            self.ingest(byte, now, console);
        }

        if received == 0 {
            let now = self.hw.clock.millis();
            if let Some(log) = self.log.as_mut() {
                match log.tick(now) {
                    Ok(true) => self.stats.record_flush(),
                    Ok(false) => {}
                    Err(err) => self.drop_log(err, console),
                }
            }
        }
    }

    fn ingest<K: Console + ?Sized>(&mut self, byte: u8, now: u64, console: &mut K) {
        self.stats.record_received();

        if self.buffer.push(byte).is_err() {
            self.stats.record_overflow();
            if !self.overflow_reported {
                self.overflow_reported = true;
                warn!("Capture buffer full ({} bytes)", self.buffer.capacity());
                console.write_line("WARNING: Buffer overflow!");
            }
        }

        if let Some(log) = self.log.as_mut() {
            let record = ByteRecord::new(now.saturating_sub(self.session_start_ms), byte);
            match log.append(&record, now) {
                Ok(flushed) => self.stats.record_logged(flushed),
                Err(err) => self.drop_log(err, console),
            }
        }
    }

    /// A failed write ends logging for this session; reception carries on
    fn drop_log<K: Console + ?Sized>(&mut self, err: StorageError, console: &mut K) {
        error!("Capture log write failed: {}", err);
        console.write_line(&format!(
            "ERROR: Write to capture file failed. ({}) Logging disabled for this session.",
            err
        ));
        if let Some(log) = self.log.take() {
            if let Err(err) = log.close() {
                warn!("Closing failed capture log: {}", err);
            }
        }
    }

    /// Stop any running capture so the log is closed cleanly
    pub fn shutdown<K: Console + ?Sized>(&mut self, console: &mut K) {
        if self.state == CaptureState::Capturing {
            self.stop_capture(console);
        }
        info!("Capture machine shut down in state {}", self.state);
    }
}
