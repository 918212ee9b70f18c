// Enhance Stream - streaming orchestration around an opaque enhancement engine
// Frame pump with delay-compensated alignment, live capture and RTF reporting

// Module declarations
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod session;

// Re-exports for convenience
pub use config::AppConfig;
pub use engine::{EngineBackend, EngineInitParams, Enhancer};
pub use error::{EngineError, EngineStatus, StreamError};
pub use pipeline::{CancellationToken, StreamOrchestrator, StreamReport};
pub use session::{CaptureSession, FileSession};

/// Environment variable holding the log level (`error` ... `trace`).
pub const LOG_ENV: &str = "ENHANCE_STREAM_LOG";

fn log_level(value: Option<&str>) -> tracing::Level {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(tracing::Level::WARN)
}

/// Installs the stderr log subscriber. Later calls are no-ops.
///
/// stdout is left to the progress bar and level meter.
pub fn init_logging() {
    let level = log_level(std::env::var(LOG_ENV).ok().as_deref());
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
