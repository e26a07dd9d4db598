//! Operator keystrokes

/// Single-character operator commands (case-insensitive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Detect,
    ManualBaud,
    NewFile,
    ClearBuffer,
    Status,
    Help,
}

/// One decoded keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    LineEnding,
    Unknown(u8),
}

impl Input {
    pub fn from_byte(byte: u8) -> Self {
        let command = match byte.to_ascii_lowercase() {
            b's' => Command::Start,
            b't' => Command::Stop,
            b'd' => Command::Detect,
            b'b' => Command::ManualBaud,
            b'n' => Command::NewFile,
            b'c' => Command::ClearBuffer,
            b'i' => Command::Status,
            b'h' => Command::Help,
            b'\r' | b'\n' => return Input::LineEnding,
            other => return Input::Unknown(other),
        };
        Input::Command(command)
    }
}

pub const HELP: &str = "\
Commands:
  s - Start capture (uses current baud rate)
  t - Stop capture
  d - Detect baud rate automatically
  b - Set baud rate manually
  n - New capture file
  c - Clear buffer
  i - Show status/info
  h - Show this help menu
";

pub const MANUAL_MENU: &str = "\
========================================
Manual Baud Rate Selection
========================================
Please select baud rate:
  1 - 9600
  2 - 19200
  3 - 38400
  4 - 57600
  5 - 115200
";

pub const MANUAL_PROMPT: &str = "Enter selection (1-5): ";
