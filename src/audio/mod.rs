// Audio module - frame sources/sinks, WAV files and live capture

pub mod capture;
#[cfg(feature = "capture")]
pub mod engine_cpal;
pub mod frame;
pub mod meter;
pub mod stubs;
pub mod wav;

// Re-export commonly used types for convenience
pub use capture::{AudioDeviceInfo, CaptureDevice, DeviceSelector};
pub use frame::{FrameSink, FrameSource};
pub use wav::{WavFrameSink, WavFrameSource};

#[cfg(feature = "capture")]
pub use engine_cpal::{list_audio_devices, CpalCaptureDevice};

use crate::config::CaptureConfig;
use crate::error::StreamError;

/// Opens the host capture device for the given engine frame geometry.
#[cfg(feature = "capture")]
pub fn open_capture_device(
    frame_length: usize,
    sample_rate: u32,
    selector: DeviceSelector,
    config: &CaptureConfig,
) -> Result<Box<dyn CaptureDevice>, StreamError> {
    let device = CpalCaptureDevice::open(frame_length, sample_rate, selector, config)?;
    Ok(Box::new(device))
}

#[cfg(not(feature = "capture"))]
pub fn open_capture_device(
    _frame_length: usize,
    _sample_rate: u32,
    _selector: DeviceSelector,
    _config: &CaptureConfig,
) -> Result<Box<dyn CaptureDevice>, StreamError> {
    Err(StreamError::device(
        "open",
        "built without the `capture` feature",
    ))
}

#[cfg(not(feature = "capture"))]
pub fn list_audio_devices() -> Result<Vec<AudioDeviceInfo>, StreamError> {
    Err(StreamError::device(
        "enumerate",
        "built without the `capture` feature",
    ))
}
