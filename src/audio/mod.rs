//! Audio subsystem module

pub mod capture;
pub mod device;
pub mod playback;
#[cfg(test)]
pub mod testing;

pub use capture::CapturePipeline;
pub use device::{AudioBackend, CpalBackend, InputDevice, OutputDevice};
pub use playback::{AudioFragment, PlaybackScheduler};
