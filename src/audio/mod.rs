//! Audio subsystem module

pub mod device;
pub mod format;
pub mod timing;

pub use device::{list_output_devices, EndpointInfo};
pub use format::{SampleFormat, SubFormat};
pub use timing::{DevicePeriod, ReferenceTime};
