//! Error types shared across the hardware boundary

use std::io;

use thiserror::Error;

/// Failures of the persistent storage volume
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not open {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("flush failed: {0}")]
    Flush(#[source] io::Error),
}

/// Failures of the monitored serial line
#[derive(Debug, Error)]
pub enum LineError {
    #[error("could not open {port} at {baud} baud: {source}")]
    Open {
        port: String,
        baud: u32,
        #[source]
        source: serialport::Error,
    },

    #[error("serial line unavailable: {0}")]
    Unavailable(String),
}
