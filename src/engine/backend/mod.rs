//! Backend implementations of the engine capability interface.

mod dynamic;
mod stub;

pub use dynamic::DynamicBackend;
pub use stub::{StubBackend, StubCounters, StubEngine, StubScript};
