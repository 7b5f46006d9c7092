//! Device queries for CPU and accelerator readings.
//!
//! NVML is optional: without NVIDIA drivers the collector logs a warning once
//! and reports zero accelerator readings, while CPU sampling keeps working.

use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use sysinfo::System;
use tracing::{info, warn};

use crate::error::{CineError, Result};
use crate::types::DeviceReading;

/// Synchronous source of device readings.
pub trait DeviceQuery: Send {
    fn query(&mut self) -> Result<DeviceReading>;
}

/// Accelerator readings from NVML for one device.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct AcceleratorReading {
    utilization_percent: f32,
    /// Share of the sample period the memory controller was busy.
    memory_util_percent: f32,
    memory_used_bytes: u64,
    memory_total_bytes: u64,
    power_watts: f32,
}

/// Reads CPU load via `sysinfo` and accelerator load via NVML.
pub struct SystemDeviceQuery {
    system: System,
    /// `None` when NVML could not be initialised (no drivers / no GPU).
    nvml: Option<Nvml>,
    device_index: u32,
}

impl SystemDeviceQuery {
    pub fn new(device_index: u32) -> Self {
        let mut system = System::new();
        // CPU usage is a delta between refreshes; prime the first one.
        system.refresh_cpu_usage();

        let nvml = match Nvml::init() {
            Ok(nvml) => {
                info!(device = device_index, "NVML initialised");
                Some(nvml)
            }
            Err(e) => {
                warn!(error = %e, "NVML unavailable, accelerator readings will be zero");
                None
            }
        };

        Self {
            system,
            nvml,
            device_index,
        }
    }

    /// True when accelerator readings come from a real device.
    pub fn has_accelerator(&self) -> bool {
        self.nvml.is_some()
    }

    fn accelerator(&self) -> std::result::Result<AcceleratorReading, NvmlError> {
        let nvml = match self.nvml.as_ref() {
            Some(nvml) => nvml,
            None => return Ok(AcceleratorReading::default()),
        };

        let device = nvml.device_by_index(self.device_index)?;
        let utilization = device.utilization_rates()?;
        let memory = device.memory_info()?;
        // Not every board reports power; milliwatts when it does.
        let power_watts = device
            .power_usage()
            .map(|mw| mw as f32 / 1000.0)
            .unwrap_or(0.0);

        Ok(AcceleratorReading {
            utilization_percent: utilization.gpu as f32,
            memory_util_percent: utilization.memory as f32,
            memory_used_bytes: memory.used,
            memory_total_bytes: memory.total,
            power_watts,
        })
    }
}

impl DeviceQuery for SystemDeviceQuery {
    fn query(&mut self) -> Result<DeviceReading> {
        self.system.refresh_cpu_usage();
        let cpu_percent = self.system.global_cpu_usage();

        let accelerator = self.accelerator().map_err(|e| {
            CineError::TelemetryQuery(format!("device {}: {}", self.device_index, e))
        })?;

        Ok(reading_from(cpu_percent, accelerator))
    }
}

fn reading_from(cpu_percent: f32, accelerator: AcceleratorReading) -> DeviceReading {
    DeviceReading {
        cpu_percent,
        accelerator_percent: accelerator.utilization_percent,
        memory_used_bytes: accelerator.memory_used_bytes,
        memory_total_bytes: accelerator.memory_total_bytes,
        memory_util_percent: accelerator.memory_util_percent,
        power_watts: accelerator.power_watts,
    }
}
