//! In-memory sources, sinks and capture devices.
//!
//! These let the pipeline run without files or audio hardware. Every stub
//! exposes shared counters so tests can check teardown after the pipeline has
//! consumed (and dropped) the stub itself.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::capture::CaptureDevice;
use super::frame::{FrameSink, FrameSource};
use crate::error::StreamError;
use crate::pipeline::CancellationToken;

/// Finite source over a sample vector.
pub struct MemorySource {
    samples: Vec<i16>,
    position: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<i16>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<usize, StreamError> {
        let remaining = &self.samples[self.position..];
        let count = remaining.len().min(frame.len());
        frame[..count].copy_from_slice(&remaining[..count]);
        frame[count..].fill(0);
        self.position += count;
        Ok(count)
    }

    fn total_samples(&self) -> Option<u64> {
        Some(self.samples.len() as u64)
    }
}

/// Sink appending into a shared buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    samples: Arc<Mutex<Vec<i16>>>,
    writes: Arc<Mutex<Vec<usize>>>,
    finished: Arc<AtomicUsize>,
    capacity: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts at most `capacity` samples in total; the write that crosses the
    /// limit is short and fails.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn samples(&self) -> Vec<i16> {
        self.samples.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Length of every non-empty write, in order.
    pub fn write_lengths(&self) -> Vec<usize> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn finish_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl FrameSink for MemorySink {
    fn write_samples(&mut self, samples: &[i16]) -> Result<(), StreamError> {
        if samples.is_empty() {
            return Ok(());
        }
        let mut buffer = self
            .samples
            .lock()
            .map_err(|_| StreamError::io("Failed to write to memory sink", "lock poisoned"))?;

        let room = self
            .capacity
            .map_or(samples.len(), |cap| cap.saturating_sub(buffer.len()));
        let accepted = room.min(samples.len());
        buffer.extend_from_slice(&samples[..accepted]);
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(accepted);
        }

        if accepted < samples.len() {
            return Err(StreamError::io(
                "Failed to write to memory sink",
                format!("wrote {} of {} samples", accepted, samples.len()),
            ));
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn samples_written(&self) -> u64 {
        self.samples.lock().map(|s| s.len() as u64).unwrap_or(0)
    }
}

/// Lifecycle counters of a `ScriptedCaptureDevice`.
#[derive(Debug, Default)]
pub struct CaptureCounters {
    pub starts: AtomicUsize,
    pub reads: AtomicUsize,
    pub stops: AtomicUsize,
    pub closes: AtomicUsize,
}

impl CaptureCounters {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Capture device producing a ramp of samples (0, 1, 2, ...).
///
/// Can cancel a token from inside a read, the way a signal would arrive while
/// the main thread is blocked on the device, and can fail on demand.
pub struct ScriptedCaptureDevice {
    name: String,
    next_sample: i16,
    counters: Arc<CaptureCounters>,
    cancel_during_read: Option<(usize, CancellationToken)>,
    fail_start: bool,
    fail_read: Option<usize>,
}

impl ScriptedCaptureDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_sample: 0,
            counters: Arc::new(CaptureCounters::default()),
            cancel_during_read: None,
            fail_start: false,
            fail_read: None,
        }
    }

    /// Cancels `token` while serving the read with zero-based index `read`.
    pub fn cancel_during_read(mut self, read: usize, token: CancellationToken) -> Self {
        self.cancel_during_read = Some((read, token));
        self
    }

    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Fails the read with zero-based index `read`.
    pub fn fail_read(mut self, read: usize) -> Self {
        self.fail_read = Some(read);
        self
    }

    pub fn counters(&self) -> Arc<CaptureCounters> {
        Arc::clone(&self.counters)
    }
}

impl CaptureDevice for ScriptedCaptureDevice {
    fn selected_device_name(&self) -> String {
        self.name.clone()
    }

    fn start(&mut self) -> Result<(), StreamError> {
        if self.fail_start {
            return Err(StreamError::device("start", "scripted start failure"));
        }
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_frame(&mut self, frame: &mut [i16]) -> Result<(), StreamError> {
        let read = self.counters.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_read == Some(read) {
            return Err(StreamError::device("read from", "scripted read failure"));
        }
        if let Some((at, token)) = &self.cancel_during_read {
            if *at == read {
                token.cancel();
            }
        }
        for slot in frame.iter_mut() {
            *slot = self.next_sample;
            self.next_sample = self.next_sample.wrapping_add(1);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for ScriptedCaptureDevice {
    fn drop(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}
