//! Capture control core: state machine, buffering and the CSV log

mod buffer;
mod command;
mod logger;
mod machine;
mod naming;
mod record;
mod state;
mod status;

pub use machine::{CaptureMachine, Hardware};
