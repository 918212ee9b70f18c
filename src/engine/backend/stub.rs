use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::engine::{check_frame, EngineBackend, EngineInitParams, Enhancer};
use crate::error::EngineError;

/// Behaviour of the in-process stub engine.
///
/// The default is an identity engine: output equals input shifted by
/// `delay_samples`, with silence during warm-up.
#[derive(Debug, Clone)]
pub struct StubScript {
    pub frame_length: usize,
    pub sample_rate: u32,
    pub delay_samples: usize,
    pub version: String,
    pub hardware_devices: Vec<String>,
    /// Sleep inside every `process` call.
    pub process_latency: Option<Duration>,
    pub init_failure: Option<EngineError>,
    /// Fail the call with this zero-based index.
    pub process_failure: Option<(usize, EngineError)>,
}

impl Default for StubScript {
    fn default() -> Self {
        Self {
            frame_length: 512,
            sample_rate: 16_000,
            delay_samples: 0,
            version: "0.0.0-stub".to_string(),
            hardware_devices: vec!["cpu".to_string()],
            process_latency: None,
            init_failure: None,
            process_failure: None,
        }
    }
}

impl StubScript {
    pub fn identity(frame_length: usize, delay_samples: usize) -> Self {
        Self {
            frame_length,
            delay_samples,
            ..Self::default()
        }
    }
}

/// Lifecycle counters shared between a backend and its instances.
#[derive(Debug, Default)]
pub struct StubCounters {
    pub instances_created: AtomicUsize,
    pub instances_released: AtomicUsize,
    pub process_calls: AtomicUsize,
}

impl StubCounters {
    pub fn created(&self) -> usize {
        self.instances_created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.instances_released.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }
}

/// Deterministic engine backend for tests and dry runs without the real
/// library.
pub struct StubBackend {
    script: StubScript,
    counters: Arc<StubCounters>,
}

impl StubBackend {
    pub fn new(script: StubScript) -> Self {
        Self {
            script,
            counters: Arc::new(StubCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<StubCounters> {
        Arc::clone(&self.counters)
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(StubScript::default())
    }
}

impl EngineBackend for StubBackend {
    fn frame_length(&self) -> usize {
        self.script.frame_length
    }

    fn sample_rate(&self) -> u32 {
        self.script.sample_rate
    }

    fn version(&self) -> String {
        self.script.version.clone()
    }

    fn list_hardware_devices(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.script.hardware_devices.clone())
    }

    fn init(&self, params: &EngineInitParams) -> Result<Box<dyn Enhancer>, EngineError> {
        if let Some(err) = &self.script.init_failure {
            return Err(err.clone());
        }
        if params.access_key.is_empty() {
            return Err(EngineError::invalid_argument(
                "init",
                "access key must be a non-empty string",
            ));
        }
        Ok(Box::new(StubEngine::with_counters(
            self.script.clone(),
            Arc::clone(&self.counters),
        )))
    }
}

/// Identity engine with a fixed delay line.
pub struct StubEngine {
    script: StubScript,
    line: VecDeque<i16>,
    calls: usize,
    counters: Arc<StubCounters>,
}

impl StubEngine {
    pub fn new(script: StubScript) -> Self {
        Self::with_counters(script, Arc::new(StubCounters::default()))
    }

    fn with_counters(script: StubScript, counters: Arc<StubCounters>) -> Self {
        counters.instances_created.fetch_add(1, Ordering::SeqCst);
        let line = Self::primed_line(&script);
        Self {
            script,
            line,
            calls: 0,
            counters,
        }
    }

    fn primed_line(script: &StubScript) -> VecDeque<i16> {
        let mut line = VecDeque::with_capacity(script.delay_samples + script.frame_length);
        line.extend(std::iter::repeat(0).take(script.delay_samples));
        line
    }
}

impl Enhancer for StubEngine {
    fn frame_length(&self) -> usize {
        self.script.frame_length
    }

    fn sample_rate(&self) -> u32 {
        self.script.sample_rate
    }

    fn version(&self) -> String {
        self.script.version.clone()
    }

    fn delay_samples(&self) -> Result<usize, EngineError> {
        Ok(self.script.delay_samples)
    }

    fn process(&mut self, pcm: &[i16], enhanced: &mut [i16]) -> Result<(), EngineError> {
        check_frame("process", self.script.frame_length, pcm, enhanced)?;
        let call = self.calls;
        self.calls += 1;
        self.counters.process_calls.fetch_add(1, Ordering::SeqCst);

        if let Some((fail_at, err)) = &self.script.process_failure {
            if *fail_at == call {
                return Err(err.clone());
            }
        }
        if let Some(latency) = self.script.process_latency {
            thread::sleep(latency);
        }

        self.line.extend(pcm.iter().copied());
        for (slot, sample) in enhanced.iter_mut().zip(self.line.drain(..pcm.len())) {
            *slot = sample;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), EngineError> {
        self.line = Self::primed_line(&self.script);
        Ok(())
    }
}

impl Drop for StubEngine {
    fn drop(&mut self) {
        self.counters.instances_released.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineStatus;

    #[test]
    fn delay_line_shifts_output() {
        let mut engine = StubEngine::new(StubScript::identity(4, 3));
        let mut out = [0i16; 4];

        engine.process(&[1, 2, 3, 4], &mut out).unwrap();
        assert_eq!(out, [0, 0, 0, 1]);

        engine.process(&[5, 6, 7, 8], &mut out).unwrap();
        assert_eq!(out, [2, 3, 4, 5]);
    }

    #[test]
    fn reset_restores_warm_up_silence() {
        let mut engine = StubEngine::new(StubScript::identity(2, 2));
        let mut out = [0i16; 2];
        engine.process(&[9, 9], &mut out).unwrap();
        engine.reset().unwrap();
        engine.process(&[1, 2], &mut out).unwrap();
        assert_eq!(out, [0, 0]);
        engine.process(&[3, 4], &mut out).unwrap();
        assert_eq!(out, [1, 2]);
    }

    #[test]
    fn scripted_failure_hits_requested_call() {
        let failure = EngineError::new(
            "process",
            EngineStatus::ActivationThrottled,
            vec!["throttled".into()],
        );
        let mut engine = StubEngine::new(StubScript {
            frame_length: 2,
            process_failure: Some((1, failure.clone())),
            ..StubScript::default()
        });
        let mut out = [0i16; 2];
        assert!(engine.process(&[1, 1], &mut out).is_ok());
        assert_eq!(engine.process(&[1, 1], &mut out).unwrap_err(), failure);
    }

    #[test]
    fn backend_counts_instance_lifecycle() {
        let backend = StubBackend::new(StubScript::identity(8, 0));
        let counters = backend.counters();
        let engine = backend.init(&EngineInitParams::new("key")).unwrap();
        assert_eq!(counters.created(), 1);
        drop(engine);
        assert_eq!(counters.released(), 1);
    }

    #[test]
    fn empty_access_key_is_rejected() {
        let backend = StubBackend::default();
        let err = backend.init(&EngineInitParams::new("")).err().unwrap();
        assert_eq!(err.status, EngineStatus::InvalidArgument);
    }
}
