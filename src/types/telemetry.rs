//! Resource telemetry sample.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use super::job::system_time_serde;

/// Raw reading returned by a device query, before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceReading {
    pub cpu_percent: f32,
    pub accelerator_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    /// Memory controller utilization reported by the device, 0-100.
    pub memory_util_percent: f32,
    pub power_watts: f32,
}

/// One telemetry tick.
///
/// Values are clamped on construction: percentages to 0-100, memory to the
/// device capacity, power to non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    #[serde(with = "system_time_serde")]
    pub timestamp: SystemTime,
    pub cpu_percent: f32,
    pub accelerator_util_percent: f32,
    pub accelerator_mem_used: u64,
    pub accelerator_mem_total: u64,
    pub power_draw_watts: f32,
    /// Approximation: memory utilization fraction times the device core count.
    pub estimated_active_cores: u32,
    /// True when the query failed and this is a zeroed placeholder.
    pub sentinel: bool,
}

impl TelemetrySample {
    /// Builds a sample from a device reading.
    pub fn from_reading(timestamp: SystemTime, reading: DeviceReading, device_cores: u32) -> Self {
        let memory_total = reading.memory_total_bytes;
        let memory_used = if memory_total > 0 {
            reading.memory_used_bytes.min(memory_total)
        } else {
            reading.memory_used_bytes
        };
        let mem_fraction = clamp_percent(reading.memory_util_percent) / 100.0;

        Self {
            timestamp,
            cpu_percent: clamp_percent(reading.cpu_percent),
            accelerator_util_percent: clamp_percent(reading.accelerator_percent),
            accelerator_mem_used: memory_used,
            accelerator_mem_total: memory_total,
            power_draw_watts: if reading.power_watts.is_finite() {
                reading.power_watts.max(0.0)
            } else {
                0.0
            },
            estimated_active_cores: (mem_fraction * device_cores as f32).round() as u32,
            sentinel: false,
        }
    }

    /// Zeroed placeholder emitted when a device query fails.
    pub fn sentinel(timestamp: SystemTime) -> Self {
        Self {
            timestamp,
            cpu_percent: 0.0,
            accelerator_util_percent: 0.0,
            accelerator_mem_used: 0,
            accelerator_mem_total: 0,
            power_draw_watts: 0.0,
            estimated_active_cores: 0,
            sentinel: true,
        }
    }
}

fn clamp_percent(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
