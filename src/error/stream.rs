// Session-level error taxonomy

use std::fmt;
use std::path::PathBuf;

use log::error;

use super::{EngineError, ErrorCode};

/// Session error code constants
///
/// Error code range: 2001-2006
pub struct StreamErrorCodes {}

impl StreamErrorCodes {
    /// A required flag is missing or unparsable
    pub const ARGUMENT: i32 = 2001;

    /// The engine library cannot be opened or lacks an entry point
    pub const BACKEND_LOAD: i32 = 2002;

    /// The engine returned a non-success status
    pub const ENGINE: i32 = 2003;

    /// Input audio does not match the engine's format
    pub const AUDIO_FORMAT: i32 = 2004;

    /// File open/read/write failure or short write
    pub const IO: i32 = 2005;

    /// Capture device enumerate/open/start/read/stop failure
    pub const DEVICE: i32 = 2006;
}

/// Log a session error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_stream_error(err: &StreamError, context: &str) {
    error!(
        "Stream error in {}: code={}, component=StreamOrchestrator, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Every way a session can fail.
///
/// None of these are recovered internally; the driver releases whatever was
/// acquired and exits non-zero.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Missing, conflicting or unparsable command-line input
    Argument { message: String },

    /// Engine shared library could not be opened or a symbol is missing
    BackendLoad { path: PathBuf, reason: String },

    /// Engine failure with its diagnostic stack
    Engine(EngineError),

    /// Sample rate, bit depth, or channel count mismatch
    AudioFormat { path: PathBuf, reason: String },

    /// File I/O failure, including short writes
    Io { context: String, reason: String },

    /// Capture device failure
    Device {
        operation: &'static str,
        reason: String,
    },
}

impl StreamError {
    pub fn argument(message: impl Into<String>) -> Self {
        StreamError::Argument {
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, reason: impl fmt::Display) -> Self {
        StreamError::Io {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    pub fn device(operation: &'static str, reason: impl fmt::Display) -> Self {
        StreamError::Device {
            operation,
            reason: reason.to_string(),
        }
    }

    /// Engine diagnostics, empty for every other variant.
    pub fn diagnostics(&self) -> &[String] {
        match self {
            StreamError::Engine(err) => &err.diagnostics,
            _ => &[],
        }
    }

    /// Process exit status for this failure. There is no partial-success mode.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

impl ErrorCode for StreamError {
    fn code(&self) -> i32 {
        match self {
            StreamError::Argument { .. } => StreamErrorCodes::ARGUMENT,
            StreamError::BackendLoad { .. } => StreamErrorCodes::BACKEND_LOAD,
            StreamError::Engine(_) => StreamErrorCodes::ENGINE,
            StreamError::AudioFormat { .. } => StreamErrorCodes::AUDIO_FORMAT,
            StreamError::Io { .. } => StreamErrorCodes::IO,
            StreamError::Device { .. } => StreamErrorCodes::DEVICE,
        }
    }

    fn message(&self) -> String {
        match self {
            StreamError::Argument { message } => message.clone(),
            StreamError::BackendLoad { path, reason } => {
                format!("Failed to open library at '{}': {}", path.display(), reason)
            }
            StreamError::Engine(err) => err.to_string(),
            StreamError::AudioFormat { path, reason } => {
                format!("Unsupported audio in '{}': {}", path.display(), reason)
            }
            StreamError::Io { context, reason } => format!("{}: {}", context, reason),
            StreamError::Device { operation, reason } => {
                format!("Failed to {} audio device: {}", operation, reason)
            }
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Engine(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EngineError> for StreamError {
    fn from(err: EngineError) -> Self {
        StreamError::Engine(err)
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::io("I/O failure", err)
    }
}
