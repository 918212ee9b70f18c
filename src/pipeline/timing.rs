//! Real-time factor instrumentation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic clock used to time engine calls.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic clock: every call to `now()` advances by a fixed step.
///
/// Timing one call reads the clock twice, so each timed call costs exactly
/// one step.
pub struct StubTimeSource {
    start: Instant,
    step_us: u64,
    offset_us: AtomicU64,
}

impl StubTimeSource {
    pub fn new(step: Duration) -> Self {
        Self {
            start: Instant::now(),
            step_us: step.as_micros() as u64,
            offset_us: AtomicU64::new(0),
        }
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        let us = self.offset_us.fetch_add(self.step_us, Ordering::SeqCst);
        self.start + Duration::from_micros(us)
    }
}

/// Running totals of processing cost against audio duration.
#[derive(Debug, Clone, PartialEq)]
pub struct RtfAccumulator {
    frame_usec: f64,
    frames: u64,
    total_cpu_usec: u64,
    total_processed_usec: f64,
}

impl RtfAccumulator {
    pub fn new(frame_length: usize, sample_rate: u32) -> Self {
        let frame_usec = if sample_rate == 0 {
            0.0
        } else {
            frame_length as f64 / f64::from(sample_rate) * 1e6
        };
        Self {
            frame_usec,
            frames: 0,
            total_cpu_usec: 0,
            total_processed_usec: 0.0,
        }
    }

    /// Adds one processed frame that took `elapsed`.
    pub fn record(&mut self, elapsed: Duration) {
        self.frames += 1;
        self.total_cpu_usec += elapsed.as_micros() as u64;
        self.total_processed_usec += self.frame_usec;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn total_cpu_usec(&self) -> u64 {
        self.total_cpu_usec
    }

    pub fn total_processed_usec(&self) -> f64 {
        self.total_processed_usec
    }

    /// `None` until at least one frame of audio has been processed.
    pub fn rtf(&self) -> Option<f64> {
        if self.total_processed_usec <= 0.0 {
            return None;
        }
        Some(self.total_cpu_usec as f64 / self.total_processed_usec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stream_has_no_rtf() {
        let acc = RtfAccumulator::new(512, 16_000);
        assert_eq!(acc.rtf(), None);
        assert_eq!(RtfAccumulator::new(512, 0).rtf(), None);
    }

    #[test]
    fn rtf_is_cpu_over_audio_time() {
        // 160 samples at 16 kHz = 10 ms per frame
        let mut acc = RtfAccumulator::new(160, 16_000);
        for _ in 0..4 {
            acc.record(Duration::from_millis(5));
        }
        assert_eq!(acc.frames(), 4);
        assert_eq!(acc.total_cpu_usec(), 20_000);
        assert!((acc.total_processed_usec() - 40_000.0).abs() < 1e-6);
        assert!((acc.rtf().unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn stub_clock_advances_fixed_step() {
        let clock = StubTimeSource::new(Duration::from_micros(250));
        let a = clock.now();
        let b = clock.now();
        assert_eq!(b - a, Duration::from_micros(250));
    }
}
