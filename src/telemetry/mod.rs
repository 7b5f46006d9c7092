//! Resource telemetry.
//!
//! - [`DeviceQuery`] / [`SystemDeviceQuery`]: one synchronous reading
//! - [`RollingWindow`]: bounded per-series history
//! - [`TelemetrySampler`]: periodic task publishing [`TelemetrySnapshot`]s

mod device;
mod sampler;
mod window;

pub use device::{DeviceQuery, SystemDeviceQuery};
pub use sampler::{
    SamplerHandle, TelemetryHistory, TelemetrySampler, TelemetrySnapshot,
    DEFAULT_HISTORY_CAPACITY, DEFAULT_SAMPLE_INTERVAL,
};
pub use window::RollingWindow;
