// Error types for the enhancement pipeline
//
// This module defines the engine status table and the session-level error
// taxonomy, with numeric codes so the binaries can report them uniformly.

mod engine;
mod stream;

pub use engine::{EngineError, EngineStatus};
pub use stream::{log_stream_error, StreamError, StreamErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
