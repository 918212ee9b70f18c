// Engine status codes and failures

use std::fmt;

/// Status returned by every fallible engine entry point.
///
/// The numeric values mirror the engine's C ABI; anything outside the known
/// table is preserved as [`EngineStatus::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Success,
    OutOfMemory,
    IoError,
    InvalidArgument,
    StopIteration,
    KeyError,
    InvalidState,
    RuntimeError,
    ActivationError,
    ActivationLimitReached,
    ActivationThrottled,
    ActivationRefused,
    Unknown(i32),
}

impl EngineStatus {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => EngineStatus::Success,
            1 => EngineStatus::OutOfMemory,
            2 => EngineStatus::IoError,
            3 => EngineStatus::InvalidArgument,
            4 => EngineStatus::StopIteration,
            5 => EngineStatus::KeyError,
            6 => EngineStatus::InvalidState,
            7 => EngineStatus::RuntimeError,
            8 => EngineStatus::ActivationError,
            9 => EngineStatus::ActivationLimitReached,
            10 => EngineStatus::ActivationThrottled,
            11 => EngineStatus::ActivationRefused,
            other => EngineStatus::Unknown(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            EngineStatus::Success => 0,
            EngineStatus::OutOfMemory => 1,
            EngineStatus::IoError => 2,
            EngineStatus::InvalidArgument => 3,
            EngineStatus::StopIteration => 4,
            EngineStatus::KeyError => 5,
            EngineStatus::InvalidState => 6,
            EngineStatus::RuntimeError => 7,
            EngineStatus::ActivationError => 8,
            EngineStatus::ActivationLimitReached => 9,
            EngineStatus::ActivationThrottled => 10,
            EngineStatus::ActivationRefused => 11,
            EngineStatus::Unknown(other) => other,
        }
    }

    pub fn is_success(self) -> bool {
        self == EngineStatus::Success
    }

    /// True for the credential/licensing family of failures.
    pub fn is_activation_failure(self) -> bool {
        matches!(
            self,
            EngineStatus::ActivationError
                | EngineStatus::ActivationLimitReached
                | EngineStatus::ActivationThrottled
                | EngineStatus::ActivationRefused
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineStatus::Success => "SUCCESS",
            EngineStatus::OutOfMemory => "OUT_OF_MEMORY",
            EngineStatus::IoError => "IO_ERROR",
            EngineStatus::InvalidArgument => "INVALID_ARGUMENT",
            EngineStatus::StopIteration => "STOP_ITERATION",
            EngineStatus::KeyError => "KEY_ERROR",
            EngineStatus::InvalidState => "INVALID_STATE",
            EngineStatus::RuntimeError => "RUNTIME_ERROR",
            EngineStatus::ActivationError => "ACTIVATION_ERROR",
            EngineStatus::ActivationLimitReached => "ACTIVATION_LIMIT_REACHED",
            EngineStatus::ActivationThrottled => "ACTIVATION_THROTTLED",
            EngineStatus::ActivationRefused => "ACTIVATION_REFUSED",
            EngineStatus::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Unknown(raw) => write!(f, "UNKNOWN({})", raw),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A non-success engine status together with the engine's diagnostic stack.
///
/// `diagnostics` keeps the order the engine reported them in; the first entry
/// is the outermost message.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineError {
    pub operation: &'static str,
    pub status: EngineStatus,
    pub diagnostics: Vec<String>,
}

impl EngineError {
    pub fn new(operation: &'static str, status: EngineStatus, diagnostics: Vec<String>) -> Self {
        Self {
            operation,
            status,
            diagnostics,
        }
    }

    /// Error raised on the Rust side of the boundary, no diagnostics attached.
    pub fn invalid_argument(operation: &'static str, details: impl Into<String>) -> Self {
        Self::new(
            operation,
            EngineStatus::InvalidArgument,
            vec![details.into()],
        )
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' failed with '{}'", self.operation, self.status)?;
        if !self.diagnostics.is_empty() {
            f.write_str(":")?;
            for (index, message) in self.diagnostics.iter().enumerate() {
                write!(f, "\n  [{}] {}", index, message)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}
