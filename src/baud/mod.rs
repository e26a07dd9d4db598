//! Baud-rate inference
//!
//! Turns a batch of edge timestamps into a validated standard rate:
//! 1. Pulse widths between consecutive edges
//! 2. Shortest consistent pulse = one bit period
//! 3. Snap 1 / period to a standard rate (within 5%)
//! 4. Validate by reading real bytes at the candidate

mod detect;
mod estimate;
mod rate;
mod validate;

pub use detect::detect_baud_rate;
pub use rate::BaudRate;
pub use validate::is_printable;
