//! Capture file naming: `capture_<N>.csv` with the smallest unused `N`

use tracing::info;

use super::record::CSV_HEADER;
use crate::error::StorageError;
use crate::hal::{LogFile, Storage};

pub fn capture_filename(n: u32) -> String {
    format!("capture_{}.csv", n)
}

/// Probe `capture_0.csv`, `capture_1.csv`, ... and return the first name
/// not present on the volume
pub fn next_capture_filename<S: Storage + ?Sized>(storage: &S) -> String {
    let mut n = 0u32;
    loop {
        let name = capture_filename(n);
        if !storage.exists(&name) {
            return name;
        }
        n = n.wrapping_add(1);
    }
}

/// Pick the next free name, write the CSV header and close the file so it
/// is ready to be reopened for capture
pub fn create_capture_file<S: Storage + ?Sized>(storage: &mut S) -> Result<String, StorageError> {
    let name = next_capture_filename(storage);
    info!("Creating new capture file: {}", name);

    let mut file = storage.open_append(&name)?;
    file.write_line(CSV_HEADER)?;
    file.close()?;
    Ok(name)
}
