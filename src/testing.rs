//! Deterministic doubles for the hardware boundary
//!
//! Every double is a cheap handle over shared state so a test can hand a
//! clone to the machine and keep one for inspection.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;

use crate::baud::BaudRate;
use crate::config::EDGE_CAPACITY;
use crate::edge::{EdgeRecorder, EdgeSnapshot};
use crate::error::{LineError, StorageError};
use crate::hal::{Clock, Console, LogFile, SerialLine, StatusIndicator, Storage};

/// Clock that only moves when told to; `delay_ms` advances it instantly
#[derive(Clone, Default)]
pub struct ManualClock {
    now_us: Rc<Cell<u64>>,
    step_us: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_us.set(self.now_us.get() + ms * 1000);
    }

    /// Move time forward by `ms` after every read
    pub fn tick_on_read_ms(&self, ms: u64) {
        self.step_us.set(ms * 1000);
    }
}

impl Clock for ManualClock {
    fn micros(&self) -> u64 {
        let now = self.now_us.get();
        self.now_us.set(now + self.step_us.get());
        now
    }

    fn delay_ms(&self, ms: u64) {
        self.advance_ms(ms);
    }
}

#[derive(Default)]
struct LineState {
    rx: VecDeque<u8>,
    configured: Option<BaudRate>,
    begins: Vec<BaudRate>,
    on_begin: Vec<(BaudRate, Vec<u8>)>,
    fail_begin: bool,
}

/// Serial line fed from a script. Bytes are only readable while the line
/// is configured; `end` discards anything unread.
#[derive(Clone, Default)]
pub struct ScriptedLine {
    inner: Rc<RefCell<LineState>>,
}

impl ScriptedLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `bytes` every time the line is configured at `baud`
    pub fn on_begin(&self, baud: BaudRate, bytes: &[u8]) {
        self.inner.borrow_mut().on_begin.push((baud, bytes.to_vec()));
    }

    /// Bytes arriving on the wire right now
    pub fn push(&self, bytes: &[u8]) {
        self.inner.borrow_mut().rx.extend(bytes.iter().copied());
    }

    pub fn fail_begin(&self, fail: bool) {
        self.inner.borrow_mut().fail_begin = fail;
    }

    pub fn configured(&self) -> Option<BaudRate> {
        self.inner.borrow().configured
    }

    pub fn begins(&self) -> Vec<BaudRate> {
        self.inner.borrow().begins.clone()
    }

    pub fn unread(&self) -> usize {
        self.inner.borrow().rx.len()
    }
}

impl SerialLine for ScriptedLine {
    fn begin(&mut self, baud: BaudRate) -> Result<(), LineError> {
        let mut state = self.inner.borrow_mut();
        if state.fail_begin {
            return Err(LineError::Unavailable("scripted failure".to_string()));
        }
        state.configured = Some(baud);
        state.begins.push(baud);
        let scripted: Vec<u8> = state
            .on_begin
            .iter()
            .filter(|(b, _)| *b == baud)
            .flat_map(|(_, bytes)| bytes.iter().copied())
            .collect();
        state.rx.extend(scripted);
        Ok(())
    }

    fn end(&mut self) {
        let mut state = self.inner.borrow_mut();
        state.configured = None;
        state.rx.clear();
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut state = self.inner.borrow_mut();
        state.configured?;
        state.rx.pop_front()
    }
}

#[derive(Default)]
struct EdgeState {
    script: Vec<u32>,
    recorded: Vec<u32>,
    armed: bool,
}

/// Edge recorder that "captures" a fixed timestamp script when armed
#[derive(Clone, Default)]
pub struct ScriptedEdges {
    inner: Rc<RefCell<EdgeState>>,
}

impl ScriptedEdges {
    pub fn new(script: &[u32]) -> Self {
        let edges = Self::default();
        edges.inner.borrow_mut().script = script.to_vec();
        edges
    }

    pub fn is_armed(&self) -> bool {
        self.inner.borrow().armed
    }
}

impl EdgeRecorder for ScriptedEdges {
    fn arm(&self) {
        let mut state = self.inner.borrow_mut();
        let n = state.script.len().min(EDGE_CAPACITY);
        state.recorded = state.script[..n].to_vec();
        state.armed = true;
    }

    fn disarm(&self) {
        self.inner.borrow_mut().armed = false;
    }

    fn edge_count(&self) -> usize {
        self.inner.borrow().recorded.len()
    }

    fn snapshot(&self) -> Option<EdgeSnapshot> {
        let state = self.inner.borrow();
        if state.armed {
            return None;
        }
        Some(EdgeSnapshot::from_slice(&state.recorded))
    }
}

/// What a test can observe about one in-memory file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemFileState {
    pub lines: Vec<String>,
    /// Lines covered by the latest flush or close
    pub durable_lines: usize,
    pub flushes: usize,
    pub open: bool,
}

#[derive(Default)]
struct Volume {
    files: HashMap<String, MemFileState>,
    fail_open: bool,
    fail_writes: bool,
}

/// In-memory storage volume
#[derive(Clone, Default)]
pub struct MemStorage {
    volume: Rc<RefCell<Volume>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty closed file
    pub fn touch(&self, name: &str) {
        self.volume
            .borrow_mut()
            .files
            .entry(name.to_string())
            .or_default();
    }

    pub fn file(&self, name: &str) -> Option<MemFileState> {
        self.volume.borrow().files.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.volume.borrow().files.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn fail_open(&self, fail: bool) {
        self.volume.borrow_mut().fail_open = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.volume.borrow_mut().fail_writes = fail;
    }
}

impl Storage for MemStorage {
    type File = MemFile;

    fn exists(&self, name: &str) -> bool {
        self.volume.borrow().files.contains_key(name)
    }

    fn open_append(&mut self, name: &str) -> Result<MemFile, StorageError> {
        let mut volume = self.volume.borrow_mut();
        if volume.fail_open {
            return Err(StorageError::Open {
                name: name.to_string(),
                source: io::Error::new(io::ErrorKind::Other, "scripted open failure"),
            });
        }
        volume.files.entry(name.to_string()).or_default().open = true;
        Ok(MemFile {
            name: name.to_string(),
            volume: self.volume.clone(),
        })
    }
}

pub struct MemFile {
    name: String,
    volume: Rc<RefCell<Volume>>,
}

impl MemFile {
    fn with<T>(&self, f: impl FnOnce(&mut MemFileState) -> T) -> T {
        let mut volume = self.volume.borrow_mut();
        f(volume.files.entry(self.name.clone()).or_default())
    }
}

impl LogFile for MemFile {
    fn write_line(&mut self, line: &str) -> Result<(), StorageError> {
        if self.volume.borrow().fail_writes {
            return Err(StorageError::Write(io::Error::new(
                io::ErrorKind::Other,
                "scripted write failure",
            )));
        }
        self.with(|f| f.lines.push(line.to_string()));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.with(|f| {
            f.durable_lines = f.lines.len();
            f.flushes += 1;
        });
        Ok(())
    }

    fn close(self) -> Result<(), StorageError> {
        self.with(|f| {
            f.durable_lines = f.lines.len();
            f.open = false;
        });
        Ok(())
    }
}

/// Operator channel with scripted keystrokes and captured output
#[derive(Default)]
pub struct RecordingConsole {
    input: VecDeque<u8>,
    output: String,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_keys(&mut self, keys: &[u8]) {
        self.input.extend(keys.iter().copied());
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl Console for RecordingConsole {
    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write_str(&mut self, s: &str) {
        self.output.push_str(s);
    }
}

#[derive(Default)]
pub struct RecordingIndicator {
    pub states: Vec<bool>,
}

impl RecordingIndicator {
    pub fn is_on(&self) -> bool {
        self.states.last().copied().unwrap_or(false)
    }
}

impl StatusIndicator for RecordingIndicator {
    fn set(&mut self, on: bool) {
        self.states.push(on);
    }
}
