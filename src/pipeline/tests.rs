use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;
use crate::audio::stubs::{MemorySink, MemorySource, ScriptedCaptureDevice};
use crate::audio::FrameSink;
use crate::engine::{EngineBackend, EngineInitParams, StubBackend, StubCounters, StubScript};
use crate::error::{EngineError, EngineStatus, StreamError};

fn identity_engine(frame_length: usize, delay: usize) -> (StreamOrchestrator, Arc<StubCounters>) {
    scripted_engine(StubScript::identity(frame_length, delay))
}

fn scripted_engine(script: StubScript) -> (StreamOrchestrator, Arc<StubCounters>) {
    let backend = StubBackend::new(script);
    let counters = backend.counters();
    let engine = backend.init(&EngineInitParams::new("key")).unwrap();
    (StreamOrchestrator::new(engine), counters)
}

fn ramp(len: usize) -> Vec<i16> {
    (0..len).map(|i| (i % 30_000) as i16 + 1).collect()
}

fn three_entry_failure() -> EngineError {
    EngineError::new(
        "process",
        EngineStatus::ActivationLimitReached,
        vec![
            "first diagnostic".into(),
            "second diagnostic".into(),
            "third diagnostic".into(),
        ],
    )
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Start(SessionInfo),
    Progress(u64, u64),
    Level(u8),
    Finish(Option<f64>),
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Event>>>);

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }
}

impl StreamObserver for Recorder {
    fn on_start(&mut self, info: &SessionInfo) {
        self.0.lock().unwrap().push(Event::Start(info.clone()));
    }

    fn on_progress(&mut self, position: u64, total: u64) {
        self.0.lock().unwrap().push(Event::Progress(position, total));
    }

    fn on_level(&mut self, percent: u8) {
        self.0.lock().unwrap().push(Event::Level(percent));
    }

    fn on_finish(&mut self, report: &StreamReport) {
        self.0.lock().unwrap().push(Event::Finish(report.rtf));
    }
}

#[test]
fn file_mode_round_trip_for_all_delays() {
    for frame_length in [1usize, 4, 7] {
        for delay in 0..=(3 * frame_length) {
            for total in [0usize, 1, frame_length, 2 * frame_length + 1, 23] {
                let input = ramp(total);
                let sink = MemorySink::new();
                let (orchestrator, _) = identity_engine(frame_length, delay);

                let report = orchestrator
                    .run_file_mode(MemorySource::new(input.clone()), sink.clone())
                    .unwrap();

                assert_eq!(
                    sink.samples(),
                    input,
                    "L={frame_length} delay={delay} total={total}"
                );
                assert_eq!(report.samples_written, total as u64);
            }
        }
    }
}

#[test]
fn file_mode_trims_warm_up_and_tail() {
    let input = ramp(5 * 512 + 7);
    let sink = MemorySink::new();
    let (orchestrator, counters) = identity_engine(512, 515);

    let report = orchestrator
        .run_file_mode(MemorySource::new(input.clone()), sink.clone())
        .unwrap();

    assert_eq!(sink.write_lengths(), vec![509, 512, 512, 512, 512, 10]);
    assert_eq!(sink.samples(), input);
    assert_eq!(report.frames_processed, 7);
    assert_eq!(report.delay_samples, 515);
    assert_eq!(counters.processed(), 7);
    assert_eq!(sink.finish_count(), 1);
    assert_eq!(counters.released(), 1);
}

#[test]
fn file_mode_without_delay_writes_full_frames() {
    let sink = MemorySink::new();
    let (orchestrator, _) = identity_engine(4, 0);

    orchestrator
        .run_file_mode(MemorySource::new(ramp(12)), sink.clone())
        .unwrap();

    assert_eq!(sink.write_lengths(), vec![4, 4, 4]);
}

#[test]
fn empty_input_processes_nothing_and_succeeds() {
    let sink = MemorySink::new();
    let (orchestrator, counters) = identity_engine(512, 0);

    let report = orchestrator
        .run_file_mode(MemorySource::new(Vec::new()), sink.clone())
        .unwrap();

    assert_eq!(report.frames_processed, 0);
    assert_eq!(report.rtf, None);
    assert!(sink.samples().is_empty());
    assert_eq!(counters.processed(), 0);
    assert_eq!(sink.finish_count(), 1);
}

#[test]
fn progress_is_monotonic_and_announces_geometry() {
    let recorder = Recorder::default();
    let (orchestrator, _) = identity_engine(4, 2);

    orchestrator
        .with_observer(Box::new(recorder.clone()))
        .run_file_mode(MemorySource::new(ramp(10)), MemorySink::new())
        .unwrap();

    let events = recorder.events();
    assert_eq!(
        events.first(),
        Some(&Event::Start(SessionInfo {
            mode: StreamMode::File,
            version: "0.0.0-stub".to_string(),
            frame_length: 4,
            sample_rate: 16_000,
            delay_samples: 2,
            total_samples: Some(10),
        }))
    );
    let positions: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            Event::Progress(position, total) => {
                assert_eq!(*total, 10);
                Some(*position)
            }
            _ => None,
        })
        .collect();
    assert_eq!(positions, vec![4, 8, 12]);
    assert!(matches!(events.last(), Some(Event::Finish(Some(_)))));
}

#[test]
fn engine_failure_surfaces_diagnostics_in_order() {
    let (orchestrator, counters) = scripted_engine(StubScript {
        frame_length: 4,
        process_failure: Some((1, three_entry_failure())),
        ..StubScript::default()
    });
    let sink = MemorySink::new();

    let err = orchestrator
        .run_file_mode(MemorySource::new(ramp(16)), sink.clone())
        .unwrap_err();

    assert!(matches!(err, StreamError::Engine(_)));
    assert_eq!(
        err.diagnostics(),
        &[
            "first diagnostic".to_string(),
            "second diagnostic".to_string(),
            "third diagnostic".to_string(),
        ]
    );
    assert_eq!(err.exit_code(), 1);
    let rendered = err.to_string();
    let first = rendered.find("  [0] first").unwrap();
    let third = rendered.find("  [2] third").unwrap();
    assert!(first < third);

    assert_eq!(sink.finish_count(), 1);
    assert_eq!(counters.released(), 1);
}

#[test]
fn short_write_aborts_as_io_error() {
    let (orchestrator, counters) = identity_engine(4, 0);
    let sink = MemorySink::with_capacity_limit(6);

    let err = orchestrator
        .run_file_mode(MemorySource::new(ramp(12)), sink.clone())
        .unwrap_err();

    assert!(matches!(err, StreamError::Io { .. }));
    assert_eq!(counters.processed(), 2);
    assert_eq!(sink.finish_count(), 1);
    assert_eq!(counters.released(), 1);
}

#[test]
fn rtf_tracks_engine_sleep() {
    // 160 samples at 16 kHz is 10 ms of audio; each call sleeps 2 ms
    let (orchestrator, _) = scripted_engine(StubScript {
        frame_length: 160,
        process_latency: Some(Duration::from_millis(2)),
        ..StubScript::default()
    });

    let report = orchestrator
        .run_file_mode(MemorySource::new(ramp(1600)), MemorySink::new())
        .unwrap();

    assert_eq!(report.frames_processed, 10);
    assert!((report.total_processed_usec - 100_000.0).abs() < 1e-6);
    let rtf = report.rtf.unwrap();
    assert!(rtf >= 0.19, "rtf {rtf} below the sleep time");
    assert!(rtf < 1.0, "rtf {rtf} far above the sleep time");
}

#[test]
fn rtf_is_exact_with_stub_clock() {
    let (orchestrator, _) = identity_engine(160, 0);

    let report = orchestrator
        .with_clock(Arc::new(StubTimeSource::new(Duration::from_micros(250))))
        .run_file_mode(MemorySource::new(ramp(800)), MemorySink::new())
        .unwrap();

    assert_eq!(report.total_cpu_usec, 5 * 250);
    assert!((report.rtf.unwrap() - 0.025).abs() < 1e-9);
}

#[test]
fn capture_cancel_during_read_finishes_that_frame_only() {
    let token = CancellationToken::new();
    let device = ScriptedCaptureDevice::new("scripted mic").cancel_during_read(2, token.clone());
    let device_counters = device.counters();
    let sink = MemorySink::new();
    let reference = MemorySink::new();
    let (orchestrator, engine_counters) = identity_engine(4, 0);

    let report = orchestrator
        .run_capture_mode(
            device,
            sink.clone(),
            Some(Box::new(reference.clone()) as Box<dyn FrameSink>),
            &token,
        )
        .unwrap();

    assert_eq!(device_counters.reads(), 3);
    assert_eq!(engine_counters.processed(), 3);
    assert_eq!(report.frames_processed, 3);
    assert_eq!(report.samples_written, 12);
    assert_eq!(report.reference_samples_written, Some(12));
    assert_eq!(reference.samples(), (0..12).collect::<Vec<i16>>());

    assert_eq!(device_counters.starts(), 1);
    assert_eq!(device_counters.stops(), 1);
    assert_eq!(device_counters.closes(), 1);
    assert_eq!(sink.finish_count(), 1);
    assert_eq!(reference.finish_count(), 1);
    assert_eq!(engine_counters.released(), 1);
}

#[test]
fn capture_writes_full_frames_without_alignment() {
    let token = CancellationToken::new();
    let device = ScriptedCaptureDevice::new("mic").cancel_during_read(1, token.clone());
    let sink = MemorySink::new();
    let (orchestrator, _) = identity_engine(4, 3);

    orchestrator
        .run_capture_mode(device, sink.clone(), None, &token)
        .unwrap();

    assert_eq!(sink.write_lengths(), vec![4, 4]);
    assert_eq!(sink.samples(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
}

#[test]
fn capture_already_cancelled_runs_no_frames() {
    let token = CancellationToken::new();
    token.cancel();
    let device = ScriptedCaptureDevice::new("mic");
    let device_counters = device.counters();
    let (orchestrator, engine_counters) = identity_engine(4, 0);

    let report = orchestrator
        .run_capture_mode(device, MemorySink::new(), None, &token)
        .unwrap();

    assert_eq!(report.frames_processed, 0);
    assert_eq!(report.rtf, None);
    assert_eq!(device_counters.reads(), 0);
    assert_eq!(device_counters.stops(), 1);
    assert_eq!(engine_counters.released(), 1);
}

#[test]
fn capture_read_failure_tears_down_once() {
    let token = CancellationToken::new();
    let device = ScriptedCaptureDevice::new("mic").fail_read(1);
    let device_counters = device.counters();
    let sink = MemorySink::new();
    let (orchestrator, engine_counters) = identity_engine(4, 0);

    let err = orchestrator
        .run_capture_mode(device, sink.clone(), None, &token)
        .unwrap_err();

    assert!(matches!(err, StreamError::Device { operation: "read from", .. }));
    assert_eq!(device_counters.stops(), 1);
    assert_eq!(device_counters.closes(), 1);
    assert_eq!(sink.finish_count(), 1);
    assert_eq!(sink.samples().len(), 4);
    assert_eq!(engine_counters.released(), 1);
}

#[test]
fn capture_start_failure_skips_stop() {
    let token = CancellationToken::new();
    let device = ScriptedCaptureDevice::new("mic").fail_start();
    let device_counters = device.counters();
    let sink = MemorySink::new();
    let (orchestrator, engine_counters) = identity_engine(4, 0);

    let err = orchestrator
        .run_capture_mode(device, sink.clone(), None, &token)
        .unwrap_err();

    assert!(matches!(err, StreamError::Device { operation: "start", .. }));
    assert_eq!(device_counters.stops(), 0);
    assert_eq!(device_counters.closes(), 1);
    assert_eq!(sink.finish_count(), 1);
    assert_eq!(engine_counters.released(), 1);
}

#[test]
fn capture_engine_failure_keeps_diagnostics() {
    let token = CancellationToken::new();
    let device = ScriptedCaptureDevice::new("mic");
    let device_counters = device.counters();
    let (orchestrator, engine_counters) = scripted_engine(StubScript {
        frame_length: 4,
        process_failure: Some((0, three_entry_failure())),
        ..StubScript::default()
    });

    let err = orchestrator
        .run_capture_mode(device, MemorySink::new(), None, &token)
        .unwrap_err();

    assert_eq!(err.diagnostics().len(), 3);
    assert_eq!(device_counters.stops(), 1);
    assert_eq!(device_counters.closes(), 1);
    assert_eq!(engine_counters.released(), 1);
}

#[test]
fn capture_reports_levels_per_frame() {
    let token = CancellationToken::new();
    let device = ScriptedCaptureDevice::new("mic").cancel_during_read(1, token.clone());
    let recorder = Recorder::default();
    let (orchestrator, _) = identity_engine(4, 0);

    orchestrator
        .with_observer(Box::new(recorder.clone()))
        .run_capture_mode(device, MemorySink::new(), None, &token)
        .unwrap();

    let levels = recorder
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Level(_)))
        .count();
    assert_eq!(levels, 2);
}
