//! Live capture handle.

use crate::error::{ScanError, ScanResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Transmit half of a capture.
pub trait FrameSink: Send {
    fn send(&mut self, frame: &[u8]) -> ScanResult<()>;
}

/// Receive half of a capture.
pub trait FrameSource: Send {
    /// Next captured frame, or `None` if the read timed out.
    fn next_frame(&mut self) -> ScanResult<Option<Vec<u8>>>;
}

/// An open live capture on one device.
///
/// Writes and reads are each serialized through their own lock, so one
/// reader and any number of writers can share the handle behind an `Arc`.
/// Closing drops both halves, which releases the underlying socket.
pub struct CaptureHandle {
    device: String,
    sink: Mutex<Option<Box<dyn FrameSink>>>,
    source: Mutex<Option<Box<dyn FrameSource>>>,
    closed: AtomicBool,
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CaptureHandle {
    pub fn new(
        device: impl Into<String>,
        sink: Box<dyn FrameSink>,
        source: Box<dyn FrameSource>,
    ) -> Self {
        Self {
            device: device.into(),
            sink: Mutex::new(Some(sink)),
            source: Mutex::new(Some(source)),
            closed: AtomicBool::new(false),
        }
    }

    /// Name of the device this capture is open on.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Write one frame. Blocks while another writer holds the handle.
    pub fn write(&self, frame: &[u8]) -> ScanResult<()> {
        if self.is_closed() {
            return Err(ScanError::CaptureClosed);
        }
        match lock(&self.sink).as_mut() {
            Some(sink) => sink.send(frame),
            None => Err(ScanError::CaptureClosed),
        }
    }

    /// Read the next frame, waiting at most the configured read timeout.
    pub fn read(&self) -> ScanResult<Option<Vec<u8>>> {
        if self.is_closed() {
            return Err(ScanError::CaptureClosed);
        }
        match lock(&self.source).as_mut() {
            Some(source) => source.next_frame(),
            None => Err(ScanError::CaptureClosed),
        }
    }

    /// Close the capture. Returns `true` only for the call that closed it.
    ///
    /// Waits for an in-progress read or write to finish before dropping the
    /// corresponding half.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        drop(lock(&self.sink).take());
        drop(lock(&self.source).take());
        tracing::debug!(device = %self.device, "capture closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.close();
    }
}
