//! Host binding for the edge interrupt
//!
//! A desktop has no pin-change interrupt on a UART RX line, so edges come
//! from an external sampler (a logic analyser CLI or similar) that prints
//! one transition timestamp in microseconds per line. A reader thread
//! plays the role of the ISR and pushes every timestamp into the ring.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use super::EdgeRing;

/// Running external edge source
pub struct EdgeFeed {
    child: Child,
    running: Arc<AtomicBool>,
    lines_seen: Arc<AtomicU64>,
}

impl EdgeFeed {
    /// Spawn `command` through the shell and start forwarding its output
    pub fn spawn(command: &str, ring: Arc<EdgeRing>) -> Result<Self> {
        info!("Starting edge source: {}", command);

        let mut child = shell(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn edge source `{}`", command))?;

        let stdout = child
            .stdout
            .take()
            .context("Failed to capture edge source stdout")?;

        // Edge source diagnostics go to the log
        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    if !line.trim().is_empty() {
                        info!("[edges] {}", line.trim());
                    }
                }
            });
        }

        let running = Arc::new(AtomicBool::new(true));
        let lines_seen = Arc::new(AtomicU64::new(0));

        let thread_running = running.clone();
        let thread_lines = lines_seen.clone();
        thread::Builder::new()
            .name("edge-feed".to_string())
            .spawn(move || {
                for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                    if !thread_running.load(Ordering::Relaxed) {
                        break;
                    }
                    thread_lines.fetch_add(1, Ordering::Relaxed);
                    match parse_edge_line(&line) {
                        Some(ts) => ring.record(ts),
                        None => debug!("Skipping edge source line: {:?}", line),
                    }
                }
                thread_running.store(false, Ordering::Relaxed);
                warn!("Edge source output closed");
            })
            .context("Failed to spawn edge feed thread")?;

        Ok(Self {
            child,
            running,
            lines_seen,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn lines_seen(&self) -> u64 {
        self.lines_seen.load(Ordering::Relaxed)
    }

    pub fn stop(&mut self) {
        if self.running.swap(false, Ordering::Relaxed) {
            info!("Stopping edge source ({} lines read)", self.lines_seen());
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for EdgeFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(not(unix))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Parse one edge source line. The first comma or whitespace separated
/// field is the timestamp in microseconds; it is truncated to the same
/// wrapping 32-bit counter the hardware timer would produce.
fn parse_edge_line(line: &str) -> Option<u32> {
    let field = line
        .trim()
        .split(|c: char| c == ',' || c.is_whitespace())
        .next()?;
    field.parse::<u64>().ok().map(|us| us as u32)
}
