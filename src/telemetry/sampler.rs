//! Periodic telemetry sampler.
//!
//! Runs as a tokio task for the whole life of the process, independent of
//! the render thread. Each tick queries the device, pushes the sample into
//! the rolling history and publishes a complete snapshot through a
//! `watch` channel, so readers always see whole ticks.

use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::types::TelemetrySample;

use super::device::DeviceQuery;
use super::window::RollingWindow;

/// Default sampling cadence.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of samples kept per series.
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

/// Rolling history, one window per displayed series.
#[derive(Debug, Clone)]
pub struct TelemetryHistory {
    cpu_percent: RollingWindow<f32>,
    accelerator_util_percent: RollingWindow<f32>,
    accelerator_mem_used: RollingWindow<u64>,
    power_draw_watts: RollingWindow<f32>,
    estimated_active_cores: RollingWindow<u32>,
    latest: Option<TelemetrySample>,
}

impl TelemetryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            cpu_percent: RollingWindow::new(capacity),
            accelerator_util_percent: RollingWindow::new(capacity),
            accelerator_mem_used: RollingWindow::new(capacity),
            power_draw_watts: RollingWindow::new(capacity),
            estimated_active_cores: RollingWindow::new(capacity),
            latest: None,
        }
    }

    pub fn push(&mut self, sample: TelemetrySample) {
        self.cpu_percent.push(sample.cpu_percent);
        self.accelerator_util_percent
            .push(sample.accelerator_util_percent);
        self.accelerator_mem_used.push(sample.accelerator_mem_used);
        self.power_draw_watts.push(sample.power_draw_watts);
        self.estimated_active_cores
            .push(sample.estimated_active_cores);
        self.latest = Some(sample);
    }

    pub fn cpu_percent(&self) -> &RollingWindow<f32> {
        &self.cpu_percent
    }

    pub fn accelerator_util_percent(&self) -> &RollingWindow<f32> {
        &self.accelerator_util_percent
    }

    pub fn accelerator_mem_used(&self) -> &RollingWindow<u64> {
        &self.accelerator_mem_used
    }

    pub fn power_draw_watts(&self) -> &RollingWindow<f32> {
        &self.power_draw_watts
    }

    pub fn estimated_active_cores(&self) -> &RollingWindow<u32> {
        &self.estimated_active_cores
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.latest.as_ref()
    }

    pub fn capacity(&self) -> usize {
        self.cpu_percent.capacity()
    }
}

/// Immutable copy of the history after one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub latest: Option<TelemetrySample>,
    pub cpu_percent: Vec<f32>,
    pub accelerator_util_percent: Vec<f32>,
    pub accelerator_mem_used: Vec<u64>,
    pub power_draw_watts: Vec<f32>,
    pub estimated_active_cores: Vec<u32>,
    /// Ticks taken since start.
    pub ticks: u64,
    /// Ticks whose device query failed.
    pub failed_queries: u64,
}

impl TelemetrySnapshot {
    fn capture(history: &TelemetryHistory, ticks: u64, failed_queries: u64) -> Self {
        Self {
            latest: history.latest,
            cpu_percent: history.cpu_percent.to_vec(),
            accelerator_util_percent: history.accelerator_util_percent.to_vec(),
            accelerator_mem_used: history.accelerator_mem_used.to_vec(),
            power_draw_watts: history.power_draw_watts.to_vec(),
            estimated_active_cores: history.estimated_active_cores.to_vec(),
            ticks,
            failed_queries,
        }
    }
}

/// Single writer of the telemetry history.
pub struct TelemetrySampler<Q> {
    query: Q,
    history: TelemetryHistory,
    device_cores: u32,
    ticks: u64,
    failed_queries: u64,
    publisher: watch::Sender<TelemetrySnapshot>,
}

impl<Q: DeviceQuery> TelemetrySampler<Q> {
    /// `device_cores` is the accelerator core count used for the active
    /// core estimate.
    pub fn new(query: Q, capacity: usize, device_cores: u32) -> Self {
        let (publisher, _) = watch::channel(TelemetrySnapshot::default());
        Self {
            query,
            history: TelemetryHistory::new(capacity),
            device_cores,
            ticks: 0,
            failed_queries: 0,
            publisher,
        }
    }

    /// Receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.publisher.subscribe()
    }

    pub fn history(&self) -> &TelemetryHistory {
        &self.history
    }

    /// Takes one sample. A failed query yields a zeroed sentinel sample.
    pub fn tick(&mut self) -> TelemetrySample {
        let now = SystemTime::now();
        let sample = match self.query.query() {
            Ok(reading) => TelemetrySample::from_reading(now, reading, self.device_cores),
            Err(e) => {
                self.failed_queries += 1;
                warn!(error = %e, "telemetry query failed, recording zeroed sample");
                TelemetrySample::sentinel(now)
            }
        };

        self.ticks += 1;
        self.history.push(sample);
        self.publisher.send_replace(TelemetrySnapshot::capture(
            &self.history,
            self.ticks,
            self.failed_queries,
        ));
        sample
    }
}

impl<Q: DeviceQuery + 'static> TelemetrySampler<Q> {
    /// Samples every `interval` until `shutdown` fires or its sender is dropped.
    pub async fn run(mut self, interval: Duration, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = interval.as_millis() as u64, "telemetry sampler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sample = self.tick();
                    debug!(cpu = sample.cpu_percent, accelerator = sample.accelerator_util_percent, "telemetry tick");
                }
                _ = &mut shutdown => break,
            }
        }

        info!(ticks = self.ticks, "telemetry sampler stopped");
    }

    /// Starts [`run`](Self::run) on `runtime`.
    pub fn spawn(self, runtime: &Handle, interval: Duration) -> SamplerHandle {
        let snapshots = self.subscribe();
        let (stop, shutdown) = oneshot::channel();
        let task = runtime.spawn(self.run(interval, shutdown));
        SamplerHandle {
            stop: Some(stop),
            task: Some(task),
            snapshots,
        }
    }
}

/// Handle to a running sampler task.
pub struct SamplerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    snapshots: watch::Receiver<TelemetrySnapshot>,
}

impl SamplerHandle {
    /// Most recent snapshot.
    pub fn latest(&self) -> TelemetrySnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver for callers that want to await new ticks.
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.snapshots.clone()
    }

    /// Signals the task to stop and returns its join handle.
    pub fn stop(&mut self) -> Option<JoinHandle<()>> {
        if let Some(stop) = self.stop.take() {
            stop.send(()).ok();
        }
        self.task.take()
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.send(()).ok();
        }
    }
}
