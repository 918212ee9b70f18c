//! Streaming orchestration: alignment, timing, cancellation and the pump.

pub mod alignment;
pub mod cancel;
pub mod orchestrator;
pub mod report;
pub mod timing;

pub use alignment::{OutputWindow, Timeline};
pub use cancel::{install_interrupt_handler, CancellationToken};
pub use orchestrator::StreamOrchestrator;
pub use report::{
    ConsoleObserver, NullObserver, SessionInfo, StreamMode, StreamObserver, StreamReport,
};
pub use timing::{RtfAccumulator, StubTimeSource, SystemTimeSource, TimeSource};

#[cfg(test)]
mod tests;
