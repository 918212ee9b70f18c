//! Session drivers shared by the command-line tools.
//!
//! A session validates its arguments, then acquires resources in the order
//! engine, sink(s), source/device and hands them to the orchestrator. If an
//! acquisition fails, everything acquired before it is dropped in reverse.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::audio::{
    AudioDeviceInfo, CaptureDevice, DeviceSelector, FrameSink, WavFrameSink, WavFrameSource,
};
use crate::config::AppConfig;
use crate::engine::{EngineBackend, EngineInitParams};
use crate::error::StreamError;
use crate::pipeline::{CancellationToken, StreamObserver, StreamOrchestrator, StreamReport};

/// Inputs of one file-mode run.
#[derive(Debug, Clone)]
pub struct FileSession {
    pub engine: EngineInitParams,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

/// Inputs of one capture-mode run.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub engine: EngineInitParams,
    pub audio_device: DeviceSelector,
    pub output_path: PathBuf,
    pub reference_path: Option<PathBuf>,
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn require_wav_extension(path: &Path, flag: &str) -> Result<(), StreamError> {
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    if !is_wav {
        return Err(StreamError::argument(format!(
            "`{}` must be a file with a `.wav` extension (got '{}')",
            flag,
            path.display()
        )));
    }
    Ok(())
}

impl FileSession {
    pub fn validate(&self) -> Result<(), StreamError> {
        if same_file(&self.input_path, &self.output_path) {
            return Err(StreamError::argument(format!(
                "input and output must be different files (both are '{}')",
                self.input_path.display()
            )));
        }
        Ok(())
    }

    /// Enhances `input_path` into `output_path` with delay compensation.
    pub fn run(
        &self,
        backend: &dyn EngineBackend,
        observer: Box<dyn StreamObserver>,
    ) -> Result<StreamReport, StreamError> {
        self.validate()?;

        let engine = backend.init(&self.engine)?;
        let sample_rate = engine.sample_rate();
        info!(
            "engine {} ready on '{}' ({} Hz)",
            engine.version(),
            self.engine.device,
            sample_rate
        );
        let orchestrator = StreamOrchestrator::new(engine).with_observer(observer);
        let sink = WavFrameSink::create(&self.output_path, sample_rate)?;
        let source = WavFrameSource::open(&self.input_path, sample_rate)?;

        orchestrator.run_file_mode(source, sink)
    }
}

impl CaptureSession {
    pub fn validate(&self) -> Result<(), StreamError> {
        require_wav_extension(&self.output_path, "output_audio_path")?;
        if let Some(reference) = &self.reference_path {
            require_wav_extension(reference, "reference_audio_path")?;
            if same_file(reference, &self.output_path) {
                return Err(StreamError::argument(
                    "reference and output must be different files",
                ));
            }
        }
        Ok(())
    }

    /// Records from the selected device until `cancel` is set.
    ///
    /// `open_device` receives the engine frame length and sample rate.
    pub fn run<F>(
        &self,
        backend: &dyn EngineBackend,
        config: &AppConfig,
        open_device: F,
        mut observer: Box<dyn StreamObserver>,
        cancel: &CancellationToken,
    ) -> Result<StreamReport, StreamError>
    where
        F: FnOnce(usize, u32, DeviceSelector) -> Result<Box<dyn CaptureDevice>, StreamError>,
    {
        self.validate()?;

        let engine = backend.init(&self.engine)?;
        let frame_length = engine.frame_length();
        let sample_rate = engine.sample_rate();
        info!(
            "engine {} ready on '{}' ({} Hz)",
            engine.version(),
            self.engine.device,
            sample_rate
        );
        let orchestrator = StreamOrchestrator::new(engine)
            .with_level_floor_db(config.meter.floor_db);

        let sink = WavFrameSink::create(&self.output_path, sample_rate)?;
        let reference: Option<Box<dyn FrameSink>> = match &self.reference_path {
            Some(path) => Some(Box::new(WavFrameSink::create(path, sample_rate)?)),
            None => None,
        };

        let device = open_device(frame_length, sample_rate, self.audio_device)?;
        observer.on_device_selected(&device.selected_device_name());

        orchestrator
            .with_observer(observer)
            .run_capture_mode(device, sink, reference, cancel)
    }
}

/// Prints inference targets, one per line.
pub fn show_inference_devices(
    backend: &dyn EngineBackend,
    out: &mut dyn Write,
) -> Result<(), StreamError> {
    let devices = backend.list_hardware_devices()?;
    for device in devices {
        writeln!(out, "{}", device)?;
    }
    Ok(())
}

/// Prints capture devices as `index: N, name: NAME`.
pub fn show_audio_devices(
    devices: &[AudioDeviceInfo],
    out: &mut dyn Write,
) -> Result<(), StreamError> {
    writeln!(out, "Printing devices...")?;
    for device in devices {
        writeln!(out, "index: {}, name: {}", device.index, device.name)?;
    }
    Ok(())
}
