//! WAV file source and sink backed by `hound`.
//!
//! Only single-channel 16-bit linear PCM at the engine sample rate is
//! accepted; anything else is rejected before the first frame is read.

use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use super::frame::{FrameSink, FrameSource};
use crate::error::StreamError;

/// Output format for every file this crate writes.
pub fn output_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Validates `spec` against the engine's requirements.
pub fn check_input_spec(path: &Path, spec: &WavSpec, sample_rate: u32) -> Result<(), StreamError> {
    let mismatch = |reason: String| StreamError::AudioFormat {
        path: path.to_path_buf(),
        reason,
    };

    if spec.sample_rate != sample_rate {
        return Err(mismatch(format!(
            "sample rate should be {} Hz (got {} Hz)",
            sample_rate, spec.sample_rate
        )));
    }
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(mismatch(format!(
            "audio format should be 16-bit PCM (got {}-bit {:?})",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    if spec.channels != 1 {
        return Err(mismatch(format!(
            "audio should be single-channel (got {} channels)",
            spec.channels
        )));
    }
    Ok(())
}

/// Finite frame source reading a WAV file.
pub struct WavFrameSource {
    path: PathBuf,
    reader: WavReader<BufReader<File>>,
    total_samples: u64,
}

impl WavFrameSource {
    pub fn open(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self, StreamError> {
        let path = path.as_ref().to_path_buf();
        let reader = WavReader::open(&path).map_err(|err| {
            StreamError::io(format!("Failed to open wav file at '{}'", path.display()), err)
        })?;
        check_input_spec(&path, &reader.spec(), sample_rate)?;
        let total_samples = u64::from(reader.duration());
        debug!("opened {} ({} samples)", path.display(), total_samples);

        Ok(Self {
            path,
            reader,
            total_samples,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for WavFrameSource {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<usize, StreamError> {
        let mut filled = 0;
        let mut samples = self.reader.samples::<i16>();
        while filled < frame.len() {
            match samples.next() {
                Some(Ok(sample)) => {
                    frame[filled] = sample;
                    filled += 1;
                }
                Some(Err(err)) => {
                    return Err(StreamError::io(
                        format!("Failed to read from '{}'", self.path.display()),
                        err,
                    ))
                }
                None => break,
            }
        }
        frame[filled..].fill(0);
        Ok(filled)
    }

    fn total_samples(&self) -> Option<u64> {
        Some(self.total_samples)
    }
}

/// Frame sink writing a mono 16-bit WAV file.
pub struct WavFrameSink {
    path: PathBuf,
    writer: Option<WavWriter<BufWriter<File>>>,
    written: u64,
}

impl WavFrameSink {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self, StreamError> {
        let path = path.as_ref().to_path_buf();
        let writer = WavWriter::create(&path, output_spec(sample_rate)).map_err(|err| {
            StreamError::io(
                format!("Failed to open the output file at '{}'", path.display()),
                err,
            )
        })?;
        Ok(Self {
            path,
            writer: Some(writer),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSink for WavFrameSink {
    fn write_samples(&mut self, samples: &[i16]) -> Result<(), StreamError> {
        let path = &self.path;
        let writer = self.writer.as_mut().ok_or_else(|| {
            StreamError::io(
                format!("Failed to write to '{}'", path.display()),
                "file already closed",
            )
        })?;

        let mut count = 0usize;
        for &sample in samples {
            if let Err(err) = writer.write_sample(sample) {
                self.written += count as u64;
                return Err(StreamError::io(
                    format!("Failed to write to '{}'", path.display()),
                    format!("wrote {} of {} samples: {}", count, samples.len(), err),
                ));
            }
            count += 1;
        }
        self.written += count as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        match self.writer.take() {
            Some(writer) => writer.finalize().map_err(|err| {
                StreamError::io(
                    format!("Failed to finalize '{}'", self.path.display()),
                    err,
                )
            }),
            None => Ok(()),
        }
    }

    fn samples_written(&self) -> u64 {
        self.written
    }
}
