//! cineboard-daemon: storyboard video rendering daemon.
//!
//! This binary can run in two modes:
//! - CLI mode: render a single job and print progress to stderr
//! - Daemon mode: JSON-RPC server over stdin/stdout
//!
//! Both modes start the telemetry sampler on a small tokio runtime and the
//! render worker on its own thread. The HTTP pipeline uses a blocking client,
//! so `main` itself is not async.

use std::sync::mpsc::Receiver;

use anyhow::{anyhow, bail, Context};
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cineboard_daemon::cli::Cli;
use cineboard_daemon::config::DaemonConfig;
use cineboard_daemon::generation::{Orchestrator, PanelBoard, RenderEvent, RenderWorker};
use cineboard_daemon::pipeline::{FfmpegReencoder, HttpPipeline, Prerequisites};
use cineboard_daemon::rpc::{run_server, spawn_notification_forwarder, ServerState};
use cineboard_daemon::telemetry::{SamplerHandle, SystemDeviceQuery, TelemetrySampler};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    if !cli.is_daemon_mode() && !cli.is_cli_mode() {
        print_usage();
        return Ok(());
    }

    init_tracing();

    let mut config = DaemonConfig::from_env().context("failed to read CINEBOARD_* variables")?;
    cli.apply_to(&mut config);
    config
        .validate()
        .map_err(|e| anyhow!(e.with_hint()))
        .context("invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("telemetry")
        .enable_all()
        .build()
        .context("failed to start the telemetry runtime")?;

    let sampler = TelemetrySampler::new(
        SystemDeviceQuery::new(config.device_index),
        config.history_capacity,
        config.device_cores,
    )
    .spawn(runtime.handle(), config.sample_interval());

    let (orchestrator, events) = build_orchestrator(&config);
    let worker = RenderWorker::spawn(orchestrator);

    info!(
        output_dir = %config.effective_output_dir().display(),
        pipeline = %config.pipeline_url,
        reencode = config.reencode,
        "daemon started"
    );

    if cli.is_daemon_mode() {
        run_daemon_mode(&runtime, worker, events, sampler, config)
    } else {
        run_cli_mode(&cli, &runtime, worker, events, sampler)
    }
}

/// Installs the stderr log subscriber. Stdout is reserved for JSON-RPC.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cineboard_daemon=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the orchestrator around the single pipeline adapter.
fn build_orchestrator(config: &DaemonConfig) -> (Orchestrator, Receiver<RenderEvent>) {
    let pipeline = HttpPipeline::new(config.pipeline_url.clone());
    let mut setup = Prerequisites::new(config.effective_output_dir())
        .with_service(&config.pipeline_url);
    if config.reencode {
        setup = setup.with_ffmpeg(config.ffmpeg_binary.clone());
    }

    let (orchestrator, events) = Orchestrator::new(Box::new(pipeline), config.render_settings());
    let orchestrator = orchestrator.with_setup(setup);
    let orchestrator = if config.reencode {
        orchestrator.with_post_processor(FfmpegReencoder::new(config.ffmpeg_binary.clone()))
    } else {
        orchestrator
    };
    (orchestrator, events)
}

/// Runs the daemon mode (JSON-RPC server).
fn run_daemon_mode(
    runtime: &Runtime,
    worker: RenderWorker,
    events: Receiver<RenderEvent>,
    sampler: SamplerHandle,
    config: DaemonConfig,
) -> anyhow::Result<()> {
    let forwarder =
        spawn_notification_forwarder(events).context("failed to start notification thread")?;

    let mut state = ServerState::new(worker, config).with_telemetry(sampler);
    let served = run_server(&mut state);

    state.worker.shutdown();
    let sampler = state.telemetry.take();
    // Dropping the state releases the last event senders.
    drop(state);
    forwarder.join().ok();
    if let Some(sampler) = sampler {
        stop_sampler(runtime, sampler);
    }

    served.map_err(|e| anyhow!(e.with_hint()))
}

/// Renders the single job described by the command line.
fn run_cli_mode(
    cli: &Cli,
    runtime: &Runtime,
    mut worker: RenderWorker,
    events: Receiver<RenderEvent>,
    sampler: SamplerHandle,
) -> anyhow::Result<()> {
    let request = cli
        .job_request()
        .ok_or_else(|| anyhow!("a prompt is required in CLI mode"))?;

    let mut board = PanelBoard::new();
    board
        .stage(1, request)
        .map_err(|e| anyhow!(e.with_hint()))?;
    worker
        .process(&mut board)
        .map_err(|e| anyhow!(e.with_hint()))?;

    let mut failure = None;
    for event in events.iter() {
        print_event(&event);
        if let RenderEvent::Error { message, .. } = &event {
            failure = Some(message.clone());
        }
        if event.ends_batch() {
            break;
        }
    }

    let snapshot = sampler.latest();
    if let Some(sample) = snapshot.latest {
        eprintln!(
            "Telemetry: CPU {:.1}%, accelerator {:.1}%, {:.1} W over {} samples",
            sample.cpu_percent,
            sample.accelerator_util_percent,
            sample.power_draw_watts,
            snapshot.ticks
        );
    }

    worker.shutdown();
    stop_sampler(runtime, sampler);

    if let Some(message) = failure {
        bail!(message);
    }
    Ok(())
}

fn stop_sampler(runtime: &Runtime, mut sampler: SamplerHandle) {
    if let Some(task) = sampler.stop() {
        runtime.block_on(task).ok();
    }
}

/// Prints one render event for a person watching the terminal.
fn print_event(event: &RenderEvent) {
    match event {
        RenderEvent::SetupProgress { percent } => {
            eprintln!("Checking dependencies: {}%", percent)
        }
        RenderEvent::JobStarted { job, video_count } => {
            eprintln!("Rendering {} ({} videos)", job, video_count)
        }
        RenderEvent::VideoProgress {
            video,
            step,
            total_steps,
            percent,
            ..
        } => eprintln!(
            "  video {}: step {}/{} ({}%)",
            video, step, total_steps, percent
        ),
        RenderEvent::JobEta { text, .. } => eprintln!("  {}", text),
        RenderEvent::VideoCompleted {
            path, elapsed_sec, ..
        } => eprintln!("  saved {} in {:.2}s", path.display(), elapsed_sec),
        RenderEvent::JobCompleted {
            job, elapsed_sec, ..
        } => eprintln!("Finished {} in {:.2}s", job, elapsed_sec),
        RenderEvent::BatchCompleted { jobs } => eprintln!("Batch complete: {} job(s)", jobs),
        RenderEvent::Stopped { mode, remaining } => {
            eprintln!("Stopped ({:?}), {} job(s) left in queue", mode, remaining)
        }
        RenderEvent::Error { code, message, .. } => eprintln!("[{}] {}", code, message),
        RenderEvent::QueueChanged { .. }
        | RenderEvent::StateChanged { .. }
        | RenderEvent::JobProgress { .. } => {}
    }
}

/// Prints usage information.
fn print_usage() {
    eprintln!("cineboard-daemon: storyboard video rendering with resource telemetry");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  Render one job:");
    eprintln!("    cineboard-daemon --project harbor --prompt \"fog over the pier\" --videos 2");
    eprintln!();
    eprintln!("  Daemon mode (JSON-RPC server):");
    eprintln!("    cineboard-daemon --daemon");
    eprintln!();
    eprintln!("Run 'cineboard-daemon --help' for full options.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_usage_doesnt_panic() {
        print_usage();
    }

    #[test]
    fn print_event_handles_every_kind() {
        print_event(&RenderEvent::BatchCompleted { jobs: 1 });
        print_event(&RenderEvent::SetupProgress { percent: 50 });
        print_event(&RenderEvent::QueueChanged { length: 0 });
    }

    #[test]
    fn orchestrator_starts_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DaemonConfig::default();
        config.output_dir = Some(dir.path().to_path_buf());
        config.reencode = true;

        let (orchestrator, _events) = build_orchestrator(&config);
        assert!(!orchestrator.state().is_busy());
        assert_eq!(orchestrator.settings().output_dir, dir.path());
    }
}
