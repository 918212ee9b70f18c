//! Live capture device interface.

use crate::error::StreamError;

/// An input device as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDeviceInfo {
    pub index: usize,
    pub name: String,
}

/// Which input device to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    /// Host default ("best") input device.
    #[default]
    Default,
    Index(usize),
}

impl DeviceSelector {
    /// Negative indices select the default device.
    pub fn from_index(index: i32) -> Self {
        if index < 0 {
            DeviceSelector::Default
        } else {
            DeviceSelector::Index(index as usize)
        }
    }
}

/// Blocking frame reader over live input hardware.
///
/// Dropping the device closes it. `stop` must only be called after a
/// successful `start`.
pub trait CaptureDevice {
    fn selected_device_name(&self) -> String;

    fn start(&mut self) -> Result<(), StreamError>;

    /// Blocks until exactly `frame.len()` samples are available.
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<(), StreamError>;

    fn stop(&mut self) -> Result<(), StreamError>;
}

impl<D: CaptureDevice + ?Sized> CaptureDevice for Box<D> {
    fn selected_device_name(&self) -> String {
        (**self).selected_device_name()
    }

    fn start(&mut self) -> Result<(), StreamError> {
        (**self).start()
    }

    fn read_frame(&mut self, frame: &mut [i16]) -> Result<(), StreamError> {
        (**self).read_frame(frame)
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        (**self).stop()
    }
}
