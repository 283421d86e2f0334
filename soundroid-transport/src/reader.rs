//! Background reader that drains a chunked channel into a single response slot
//!
//! The reader thread owns the inbound half of the channel. Complete lines are
//! published into a mutex-guarded slot, overwriting anything unconsumed: the
//! protocol is strictly request/response, so at most one reply is pending.
//! Callers take the slot with [`ResponseReader::take_response`], which reads
//! and clears it inside one critical section.

use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, TransportError};
use crate::{Inbound, Interrupt};

/// Size of the buffer each read from the channel fills
pub const RECEIVE_BUFFER_SIZE: usize = 100;

// An unterminated tail longer than this is published as-is.
const MAX_PENDING_BYTES: usize = 4096;

#[derive(Debug, Default)]
struct Slot {
    text: String,
    running: bool,
}

#[derive(Debug, Default)]
struct Shared {
    slot: Mutex<Slot>,
    changed: Condvar,
}

impl Shared {
    fn publish(&self, text: String) {
        self.slot.lock().text = text;
        self.changed.notify_all();
    }

    fn is_running(&self) -> bool {
        self.slot.lock().running
    }

    fn mark_stopped(&self) {
        self.slot.lock().running = false;
        self.changed.notify_all();
    }
}

/// Drains a channel's inbound half on a dedicated thread
pub struct ResponseReader {
    shared: Arc<Shared>,
    interrupt: Arc<dyn Interrupt>,
    handle: Option<JoinHandle<()>>,
}

impl ResponseReader {
    /// Clear the slot and start draining `inbound`
    pub fn start(inbound: Inbound) -> Result<Self> {
        let (stream, interrupt) = inbound.into_parts();

        let shared = Arc::new(Shared::default());
        shared.slot.lock().running = true;

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("soundroid-reader".to_string())
            .spawn(move || read_loop(stream, &worker))
            .map_err(|e| TransportError::io("Can't start the response reader", e))?;

        tracing::debug!("Response reader started");

        Ok(Self {
            shared,
            interrupt,
            handle: Some(handle),
        })
    }

    /// Whether the read loop is still draining the channel
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Drop any unconsumed response
    pub fn clear(&self) {
        let stale = std::mem::take(&mut self.shared.slot.lock().text);
        if !stale.is_empty() {
            tracing::debug!("Discarding unsolicited response '{}'", stale.trim());
        }
    }

    /// Wait up to `timeout` for a response, then take it and clear the slot.
    ///
    /// Returns the trimmed text, or an empty string when nothing arrived in
    /// time or the reader stopped first.
    pub fn take_response(&self, timeout: Duration) -> String {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();

        while slot.text.is_empty() && slot.running {
            if self.shared.changed.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }

        if slot.text.is_empty() {
            if slot.running {
                tracing::error!("Too long awaiting for response (> {:?})", timeout);
            } else {
                tracing::error!("The response reader has stopped, no response available");
            }
            return String::new();
        }

        let text = std::mem::take(&mut slot.text);
        text.trim().to_string()
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// Returns once the thread has finished and released the inbound half.
    /// Calling it again is a no-op.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.shared.mark_stopped();
        if let Err(e) = self.interrupt.interrupt() {
            tracing::debug!("Interrupting the inbound channel failed: {}", e);
        }

        if handle.join().is_err() {
            tracing::error!("The response reader thread panicked");
        }
        tracing::debug!("Response reader stopped");
    }
}

impl Drop for ResponseReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop(mut stream: Box<dyn Read + Send>, shared: &Shared) {
    let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];
    let mut pending: Vec<u8> = Vec::new();

    while shared.is_running() {
        match stream.read(&mut buffer) {
            Ok(0) => {
                tracing::debug!("The inbound channel was closed by the peer");
                break;
            }
            Ok(bytes) => {
                tracing::trace!("Received {} bytes", bytes);
                pending.extend_from_slice(&buffer[..bytes]);
                if let Some(line) = take_last_line(&mut pending) {
                    tracing::debug!("Response: '{}'", line.trim());
                    shared.publish(line);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                if shared.is_running() {
                    tracing::error!("Can't read from the inbound channel: {}", e);
                }
                break;
            }
        }
    }

    if !pending.is_empty() && shared.is_running() {
        shared.publish(String::from_utf8_lossy(&pending).into_owned());
    }
    shared.mark_stopped();
}

/// Remove every complete line from `pending` and return the last one.
///
/// Oversized unterminated data is flushed whole so a peer that never sends a
/// terminator cannot grow the buffer without bound.
fn take_last_line(pending: &mut Vec<u8>) -> Option<String> {
    match pending.iter().rposition(|&b| b == b'\n') {
        Some(end) => {
            let complete: Vec<u8> = pending.drain(..=end).collect();
            let text = String::from_utf8_lossy(&complete);
            text.split('\n')
                .map(|line| line.trim_end_matches('\r'))
                .filter(|line| !line.trim().is_empty())
                .last()
                .map(str::to_string)
        }
        None if pending.len() > MAX_PENDING_BYTES => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            Some(text)
        }
        None => None,
    }
}
