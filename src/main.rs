//! Serial Sniffer - passive serial line capture
//!
//! Infers the baud rate of a monitored line from edge timing, then logs
//! every received byte to numbered CSV files. The operator drives it with
//! single-key commands on stdin.

mod baud;
mod capture;
mod config;
mod edge;
mod error;
mod hal;
#[cfg(test)]
mod testing;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use capture::{CaptureMachine, Hardware};
use config::Config;
use edge::{EdgeFeed, EdgeRing};
use hal::host::{DirStorage, LogIndicator, SerialPortLine, StdConsole, SystemClock};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the operator console
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("===========================================");
    info!("   Serial Sniffer");
    info!("   edge-timed baud detection + CSV capture");
    info!("===========================================");

    let config = Config::from_env();

    info!("Configuration:");
    info!("  Serial port: {}", config.port);
    info!("  Capture dir: {}", config.capture_dir.display());
    match config.default_baud {
        Some(baud) => info!("  Default baud: {}", baud),
        None => info!("  Default baud: not set"),
    }
    info!("  Loop interval: {} ms", config.loop_interval_ms);

    let ring = Arc::new(EdgeRing::new());
    let mut feed = match config.edge_command.as_deref() {
        Some(command) => match EdgeFeed::spawn(command, ring.clone()) {
            Ok(feed) => Some(feed),
            Err(e) => {
                warn!("{:#}", e);
                warn!("Automatic baud detection will see no edges");
                None
            }
        },
        None => {
            info!("No edge source configured (SNIFFER_EDGE_COMMAND), detection will time out");
            None
        }
    };

    let storage = match DirStorage::mount(&config.capture_dir) {
        Ok(storage) => Some(storage),
        Err(e) => {
            error!("{}", e);
            warn!("Logging disabled");
            None
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let loop_running = running.clone();
    let mut worker =
        tokio::task::spawn_blocking(move || run_capture_loop(config, ring, storage, loop_running));

    info!("Press Ctrl+C to exit.");

    let interrupted = tokio::select! {
        signal = tokio::signal::ctrl_c() => Some(signal),
        result = &mut worker => {
            result.context("Capture loop panicked")?;
            None
        }
    };

    if let Some(signal) = interrupted {
        running.store(false, Ordering::Relaxed);
        signal.context("Failed to listen for Ctrl+C")?;
        info!("Shutdown requested");
        worker.await.context("Capture loop panicked")?;
    }

    if let Some(feed) = feed.as_mut() {
        if !feed.is_running() {
            warn!("Edge source exited before shutdown");
        }
        feed.stop();
    }

    info!("Shutdown complete.");
    Ok(())
}

/// The blocking main loop. Detection and validation block for seconds at a
/// time, so this runs on its own thread rather than inside the runtime.
fn run_capture_loop(
    config: Config,
    ring: Arc<EdgeRing>,
    storage: Option<DirStorage>,
    running: Arc<AtomicBool>,
) {
    let hw = Hardware {
        edges: ring,
        line: SerialPortLine::new(config.port.clone()),
        storage,
        clock: SystemClock::new(),
    };
    let mut machine = CaptureMachine::new(hw, config.default_baud);
    let mut console = StdConsole::spawn();
    let mut indicator = LogIndicator::default();

    machine.greet(&mut console);

    let interval = Duration::from_millis(config.loop_interval_ms);
    while running.load(Ordering::Relaxed) {
        machine.step(&mut console, &mut indicator);
        std::thread::sleep(interval);
    }

    machine.shutdown(&mut console);
}
