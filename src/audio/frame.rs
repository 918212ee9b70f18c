//! Frame-level source and sink abstractions.

use crate::error::StreamError;

/// Produces fixed-length frames of mono 16-bit samples.
pub trait FrameSource {
    /// Fills `frame`, zero-padding anything past the end of the stream.
    ///
    /// Returns the number of real samples written into `frame`; `0` once the
    /// source is exhausted. Capture-backed sources block until a full frame is
    /// available.
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<usize, StreamError>;

    /// Total number of samples, known up front for finite sources.
    fn total_samples(&self) -> Option<u64>;
}

/// Consumes samples and appends them to an output stream.
pub trait FrameSink {
    /// Appends all of `samples`. Writing fewer is an I/O error.
    fn write_samples(&mut self, samples: &[i16]) -> Result<(), StreamError>;

    /// Flushes and closes the sink. Calling it again is a no-op.
    fn finish(&mut self) -> Result<(), StreamError>;

    fn samples_written(&self) -> u64;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<usize, StreamError> {
        (**self).read_frame(frame)
    }

    fn total_samples(&self) -> Option<u64> {
        (**self).total_samples()
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write_samples(&mut self, samples: &[i16]) -> Result<(), StreamError> {
        (**self).write_samples(samples)
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        (**self).finish()
    }

    fn samples_written(&self) -> u64 {
        (**self).samples_written()
    }
}
