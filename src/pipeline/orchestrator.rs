//! Frame-by-frame pump between a source, the engine and one or two sinks.
//!
//! The orchestrator owns the engine instance and everything handed to a
//! `run_*` call. Whatever happens inside the pump, the run releases its
//! resources in reverse acquisition order (device, sinks, engine) exactly
//! once, and reports the first error encountered.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::alignment::Timeline;
use super::cancel::CancellationToken;
use super::report::{NullObserver, SessionInfo, StreamMode, StreamObserver, StreamReport};
use super::timing::{RtfAccumulator, SystemTimeSource, TimeSource};
use crate::audio::meter::{level_percent, DEFAULT_FLOOR_DB};
use crate::audio::{CaptureDevice, FrameSink, FrameSource};
use crate::engine::Enhancer;
use crate::error::StreamError;

pub struct StreamOrchestrator {
    engine: Box<dyn Enhancer>,
    clock: Arc<dyn TimeSource>,
    observer: Box<dyn StreamObserver>,
    floor_db: f32,
}

/// Reusable per-session state shared by both modes.
struct Pump {
    frame_length: usize,
    sample_rate: u32,
    delay_samples: usize,
    pcm: Vec<i16>,
    enhanced: Vec<i16>,
    timing: RtfAccumulator,
}

impl StreamOrchestrator {
    pub fn new(engine: Box<dyn Enhancer>) -> Self {
        Self {
            engine,
            clock: Arc::new(SystemTimeSource),
            observer: Box::new(NullObserver),
            floor_db: DEFAULT_FLOOR_DB,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn StreamObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_level_floor_db(mut self, floor_db: f32) -> Self {
        self.floor_db = floor_db;
        self
    }

    /// Queries the engine geometry once; the delay is fixed from here on.
    fn prepare(&self) -> Result<Pump, StreamError> {
        let frame_length = self.engine.frame_length();
        if frame_length == 0 {
            return Err(StreamError::argument("engine reported a frame length of 0"));
        }
        let sample_rate = self.engine.sample_rate();
        let delay_samples = self.engine.delay_samples()?;
        debug!(
            "engine geometry: frame_length={}, sample_rate={}, delay={}",
            frame_length, sample_rate, delay_samples
        );
        Ok(Pump {
            frame_length,
            sample_rate,
            delay_samples,
            pcm: vec![0; frame_length],
            enhanced: vec![0; frame_length],
            timing: RtfAccumulator::new(frame_length, sample_rate),
        })
    }

    /// Runs `pump.pcm` through the engine into `pump.enhanced`, timing the call.
    fn process(&mut self, pump: &mut Pump) -> Result<(), StreamError> {
        let before = self.clock.now();
        self.engine.process(&pump.pcm, &mut pump.enhanced)?;
        let after = self.clock.now();
        pump.timing.record(after.saturating_duration_since(before));
        Ok(())
    }

    fn report(
        pump: &Pump,
        mode: StreamMode,
        samples_written: u64,
        reference_samples_written: Option<u64>,
    ) -> StreamReport {
        StreamReport {
            mode,
            sample_rate: pump.sample_rate,
            delay_samples: pump.delay_samples,
            frames_processed: pump.timing.frames(),
            samples_written,
            reference_samples_written,
            total_cpu_usec: pump.timing.total_cpu_usec(),
            total_processed_usec: pump.timing.total_processed_usec(),
            rtf: pump.timing.rtf(),
        }
    }

    /// Delay-compensated file processing.
    ///
    /// Writes exactly `source.total_samples()` samples to `sink`, each the
    /// enhanced counterpart of the input sample at the same position.
    pub fn run_file_mode<S, K>(mut self, mut source: S, mut sink: K) -> Result<StreamReport, StreamError>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let result = self.pump_file(&mut source, &mut sink);
        drop(source);
        let finished = sink.finish();
        drop(sink);
        let report = settle(result, finished)?;

        self.observer.on_finish(&report);
        info!(
            "file session done: {} frames, {} samples written",
            report.frames_processed, report.samples_written
        );
        Ok(report)
    }

    fn pump_file(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
    ) -> Result<StreamReport, StreamError> {
        let total = source
            .total_samples()
            .ok_or_else(|| StreamError::argument("file mode needs a source of known length"))?;
        let mut pump = self.prepare()?;
        let timeline = Timeline::new(pump.frame_length, total, pump.delay_samples as u64);
        self.observer.on_start(&SessionInfo {
            mode: StreamMode::File,
            version: self.engine.version(),
            frame_length: pump.frame_length,
            sample_rate: pump.sample_rate,
            delay_samples: pump.delay_samples,
            total_samples: Some(total),
        });

        let mut start = 0u64;
        while timeline.needs_frame(start) {
            source.read_frame(&mut pump.pcm)?;
            self.process(&mut pump)?;
            if let Some(window) = timeline.window(start) {
                sink.write_samples(&pump.enhanced[window.range()])?;
            }
            start += pump.frame_length as u64;
            self.observer.on_progress(start, total);
        }

        Ok(Self::report(
            &pump,
            StreamMode::File,
            sink.samples_written(),
            None,
        ))
    }

    /// Live capture until `cancel` is set.
    ///
    /// Enhanced frames go to `sink` whole and unaligned: the output lags the
    /// microphone by the engine delay. The raw frames go to `reference` when
    /// given. Cancellation is checked once per frame, so at most one more
    /// frame is processed after it is requested.
    pub fn run_capture_mode<D, K>(
        mut self,
        mut device: D,
        mut sink: K,
        mut reference: Option<Box<dyn FrameSink>>,
        cancel: &CancellationToken,
    ) -> Result<StreamReport, StreamError>
    where
        D: CaptureDevice,
        K: FrameSink,
    {
        let mut started = false;
        let mut result = self.pump_capture(
            &mut device,
            &mut sink,
            reference.as_mut().map(|r| &mut **r as &mut dyn FrameSink),
            cancel,
            &mut started,
        );

        if started {
            result = settle(result, device.stop());
        }
        drop(device);
        if let Some(mut reference) = reference.take() {
            result = settle(result, reference.finish());
        }
        result = settle(result, sink.finish());
        drop(sink);
        let report = result?;

        self.observer.on_finish(&report);
        info!(
            "capture session done: {} frames, {:.2} s written",
            report.frames_processed,
            report.seconds_written()
        );
        Ok(report)
    }

    fn pump_capture(
        &mut self,
        device: &mut dyn CaptureDevice,
        sink: &mut dyn FrameSink,
        mut reference: Option<&mut dyn FrameSink>,
        cancel: &CancellationToken,
        started: &mut bool,
    ) -> Result<StreamReport, StreamError> {
        let mut pump = self.prepare()?;
        device.start()?;
        *started = true;
        self.observer.on_start(&SessionInfo {
            mode: StreamMode::Capture,
            version: self.engine.version(),
            frame_length: pump.frame_length,
            sample_rate: pump.sample_rate,
            delay_samples: pump.delay_samples,
            total_samples: None,
        });

        while !cancel.is_cancelled() {
            device.read_frame(&mut pump.pcm)?;
            self.process(&mut pump)?;
            sink.write_samples(&pump.enhanced)?;
            if let Some(reference) = reference.as_deref_mut() {
                reference.write_samples(&pump.pcm)?;
            }
            self.observer
                .on_level(level_percent(&pump.pcm, self.floor_db));
        }
        debug!("cancellation observed after {} frames", pump.timing.frames());

        Ok(Self::report(
            &pump,
            StreamMode::Capture,
            sink.samples_written(),
            reference.map(|r| r.samples_written()),
        ))
    }
}

/// Keeps the earliest error; later teardown failures are only logged.
fn settle<T>(result: Result<T, StreamError>, teardown: Result<(), StreamError>) -> Result<T, StreamError> {
    match (result, teardown) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(later)) => {
            warn!("teardown also failed: {}", later);
            Err(err)
        }
    }
}
