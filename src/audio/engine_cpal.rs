use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, info, warn};

use super::capture::{AudioDeviceInfo, CaptureDevice, DeviceSelector};
use crate::config::CaptureConfig;
use crate::error::StreamError;

const UNKNOWN_DEVICE: &str = "<unknown input device>";

/// Lists input devices of the default host, in the order `DeviceSelector::Index`
/// refers to them.
pub fn list_audio_devices() -> Result<Vec<AudioDeviceInfo>, StreamError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| StreamError::device("enumerate", e))?;

    Ok(devices
        .enumerate()
        .map(|(index, device)| AudioDeviceInfo {
            index,
            name: device.name().unwrap_or_else(|_| UNKNOWN_DEVICE.to_string()),
        })
        .collect())
}

/// CPAL input stream feeding a lock-free ring buffer that `read_frame` drains.
///
/// The audio callback only converts to mono i16 and pushes; samples that do
/// not fit are dropped and counted.
pub struct CpalCaptureDevice {
    stream: cpal::Stream,
    consumer: rtrb::Consumer<i16>,
    failure: Arc<Mutex<Option<String>>>,
    overruns: Arc<AtomicU64>,
    name: String,
    poll_interval: Duration,
    running: bool,
}

impl CpalCaptureDevice {
    pub fn open(
        frame_length: usize,
        sample_rate: u32,
        selector: DeviceSelector,
        config: &CaptureConfig,
    ) -> Result<Self, StreamError> {
        let host = cpal::default_host();
        let device = match selector {
            DeviceSelector::Default => host
                .default_input_device()
                .ok_or_else(|| StreamError::device("open", "No default input device found"))?,
            DeviceSelector::Index(index) => host
                .input_devices()
                .map_err(|e| StreamError::device("enumerate", e))?
                .nth(index)
                .ok_or_else(|| {
                    StreamError::device("open", format!("no input device at index {}", index))
                })?,
        };
        let name = device
            .name()
            .unwrap_or_else(|_| UNKNOWN_DEVICE.to_string());

        let supported = pick_input_config(&device, sample_rate)?;
        let channels = usize::from(supported.channels());
        let stream_config: cpal::StreamConfig = supported.config();
        debug!(
            "capture config for '{}': {} ch, {:?}, {} Hz",
            name,
            channels,
            supported.sample_format(),
            sample_rate
        );

        let capacity = frame_length * config.buffered_frames.max(1);
        let (producer, consumer) = rtrb::RingBuffer::<i16>::new(capacity);
        let failure = Arc::new(Mutex::new(None));
        let overruns = Arc::new(AtomicU64::new(0));

        let stream = match supported.sample_format() {
            cpal::SampleFormat::I16 => build_input_stream::<i16, _>(
                &device,
                &stream_config,
                channels,
                producer,
                Arc::clone(&overruns),
                Arc::clone(&failure),
                |sample| sample,
            )?,
            cpal::SampleFormat::F32 => build_input_stream::<f32, _>(
                &device,
                &stream_config,
                channels,
                producer,
                Arc::clone(&overruns),
                Arc::clone(&failure),
                |sample| (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16,
            )?,
            other => {
                return Err(StreamError::device(
                    "open",
                    format!("unsupported sample format {:?}", other),
                ))
            }
        };
        // Some hosts start streams on creation.
        let _ = stream.pause();

        Ok(Self {
            stream,
            consumer,
            failure,
            overruns,
            name,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            running: false,
        })
    }

    fn stream_failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Prefers native i16, then the fewest channels, at exactly `sample_rate`.
fn pick_input_config(
    device: &cpal::Device,
    sample_rate: u32,
) -> Result<cpal::SupportedStreamConfig, StreamError> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| StreamError::device("open", e))?;

    let mut candidates: Vec<cpal::SupportedStreamConfig> = ranges
        .filter(|range| {
            matches!(
                range.sample_format(),
                cpal::SampleFormat::I16 | cpal::SampleFormat::F32
            )
        })
        .filter(|range| {
            range.min_sample_rate().0 <= sample_rate && sample_rate <= range.max_sample_rate().0
        })
        .map(|range| range.with_sample_rate(cpal::SampleRate(sample_rate)))
        .collect();
    candidates.sort_by_key(|config| {
        (
            config.sample_format() != cpal::SampleFormat::I16,
            config.channels(),
        )
    });

    candidates.into_iter().next().ok_or_else(|| {
        StreamError::device(
            "open",
            format!("device does not support {} Hz 16-bit or float capture", sample_rate),
        )
    })
}

fn build_input_stream<T, F>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut producer: rtrb::Producer<i16>,
    overruns: Arc<AtomicU64>,
    failure: Arc<Mutex<Option<String>>>,
    convert: F,
) -> Result<cpal::Stream, StreamError>
where
    T: cpal::SizedSample + Send + 'static,
    F: Fn(T) -> i16 + Send + 'static,
{
    let channels = channels.max(1);
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // De-interleave: take first channel
                for frame in data.chunks(channels) {
                    if producer.push(convert(frame[0])).is_err() {
                        overruns.fetch_add(1, Ordering::Relaxed);
                    }
                }
            },
            move |err| {
                if let Ok(mut slot) = failure.lock() {
                    slot.get_or_insert_with(|| err.to_string());
                }
            },
            None,
        )
        .map_err(|e| StreamError::device("open", e))
}

impl CaptureDevice for CpalCaptureDevice {
    fn selected_device_name(&self) -> String {
        self.name.clone()
    }

    fn start(&mut self) -> Result<(), StreamError> {
        self.stream
            .play()
            .map_err(|e| StreamError::device("start", e))?;
        self.running = true;
        info!("capture started on '{}'", self.name);
        Ok(())
    }

    fn read_frame(&mut self, frame: &mut [i16]) -> Result<(), StreamError> {
        let needed = frame.len();
        loop {
            if let Some(reason) = self.stream_failure() {
                return Err(StreamError::device("read from", reason));
            }
            if self.consumer.slots() >= needed {
                let chunk = self
                    .consumer
                    .read_chunk(needed)
                    .map_err(|e| StreamError::device("read from", e))?;
                let (first, second) = chunk.as_slices();
                frame[..first.len()].copy_from_slice(first);
                frame[first.len()..].copy_from_slice(second);
                chunk.commit_all();
                return Ok(());
            }
            if !self.running {
                return Err(StreamError::device("read from", "device is not started"));
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        self.running = false;
        self.stream
            .pause()
            .map_err(|e| StreamError::device("stop", e))?;
        let dropped = self.overruns.load(Ordering::Relaxed);
        if dropped > 0 {
            warn!("capture overrun: dropped {} samples", dropped);
        }
        info!("capture stopped on '{}'", self.name);
        Ok(())
    }
}
