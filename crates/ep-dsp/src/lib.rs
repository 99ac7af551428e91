// Windowed energy / peak envelope follower and its host shim for envpeak.

pub mod accumulator;
pub mod capture;
pub mod decode;
pub mod envpeak;
pub mod error;
pub mod host;
pub mod scheduler;
pub mod window;

pub use accumulator::{EnvelopeAccumulator, Published, Settings, Step};
pub use envpeak::EnvPeak;
pub use error::DspError;
pub use host::{BlockFramer, ClassRegistry, DspGraph, ObjectId, SignalObject};
pub use scheduler::{ClockState, EmissionScheduler};
pub use window::WindowTable;
