//! Engine module housing the enhancement capability interface.
//!
//! The orchestrator only ever talks to the two traits defined here. How an
//! implementation is located (a shared library resolved at runtime, or the
//! in-process stub used by tests) lives in `backend`.

pub mod backend;

pub use backend::{DynamicBackend, StubBackend, StubCounters, StubEngine, StubScript};

use std::path::PathBuf;

use crate::error::EngineError;

/// Inference target used when the caller does not pick one.
pub const DEFAULT_INFERENCE_DEVICE: &str = "best";

/// Parameters for constructing one engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInitParams {
    pub access_key: String,
    pub model_path: Option<PathBuf>,
    pub device: String,
}

impl EngineInitParams {
    pub fn new(access_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            model_path: None,
            device: DEFAULT_INFERENCE_DEVICE.to_string(),
        }
    }

    pub fn with_model_path(mut self, model_path: Option<PathBuf>) -> Self {
        self.model_path = model_path;
        self
    }

    pub fn with_device(mut self, device: Option<String>) -> Self {
        if let Some(device) = device {
            self.device = device;
        }
        self
    }
}

/// Library-level entry points: static properties, hardware enumeration and
/// construction of engine instances.
pub trait EngineBackend {
    fn frame_length(&self) -> usize;
    fn sample_rate(&self) -> u32;
    fn version(&self) -> String;

    /// Lists the inference targets accepted as `EngineInitParams::device`.
    fn list_hardware_devices(&self) -> Result<Vec<String>, EngineError>;

    fn init(&self, params: &EngineInitParams) -> Result<Box<dyn Enhancer>, EngineError>;
}

/// One live engine instance.
///
/// `process` consumes exactly `frame_length()` samples and produces the same
/// number; the output lags the input stream by `delay_samples()`. Dropping the
/// instance releases it.
pub trait Enhancer {
    fn frame_length(&self) -> usize;
    fn sample_rate(&self) -> u32;
    fn version(&self) -> String;

    /// Constant for the lifetime of the instance.
    fn delay_samples(&self) -> Result<usize, EngineError>;

    fn process(&mut self, pcm: &[i16], enhanced: &mut [i16]) -> Result<(), EngineError>;

    /// Drops buffered audio; the next `process` behaves as on a fresh instance.
    fn reset(&mut self) -> Result<(), EngineError>;
}

/// Reject frames of the wrong size before they reach the engine.
pub(crate) fn check_frame(
    operation: &'static str,
    expected: usize,
    pcm: &[i16],
    enhanced: &[i16],
) -> Result<(), EngineError> {
    if pcm.len() != expected || enhanced.len() != expected {
        return Err(EngineError::invalid_argument(
            operation,
            format!(
                "frame must hold {} samples (got input {}, output {})",
                expected,
                pcm.len(),
                enhanced.len()
            ),
        ));
    }
    Ok(())
}
