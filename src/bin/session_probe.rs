//! Session Probe
//!
//! Opens a session on the default output endpoint, negotiates the configured
//! format and walks the stream through its lifecycle, reporting what the
//! engine answered at each step.
//!
//! Usage: `session-probe [--simulated] [--json] [--config <path>]`

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wasapi_session::{
    audio::{device::list_output_devices, DevicePeriod, EndpointInfo, SampleFormat},
    client::{AudioEngine, FormatSupport, SessionController, SimulatedEngine},
    config::SessionConfig,
};

#[derive(Debug, Default)]
struct Args {
    simulated: bool,
    json: bool,
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = Args::default();
        let mut iter = std::env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--simulated" => args.simulated = true,
                "--json" => args.json = true,
                "--config" => {
                    let path = iter.next().context("--config needs a path")?;
                    args.config = Some(PathBuf::from(path));
                }
                other => anyhow::bail!("Unknown argument: {}", other),
            }
        }
        Ok(args)
    }
}

/// Everything the probe learned about the endpoint
#[derive(Debug, Serialize)]
struct ProbeReport {
    engine: &'static str,
    endpoints: Vec<EndpointInfo>,
    mix_format: SampleFormat,
    device_period: DevicePeriod,
    requested: SampleFormat,
    support: FormatSupport,
    initialized_format: SampleFormat,
    buffer_frames: u32,
    buffer_duration_ms: f64,
    stream_latency_ms: f64,
    lifecycle: Vec<String>,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting session probe");

    let args = Args::parse()?;
    let config = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SessionConfig::load_or_default()?,
    };

    let endpoints = list_output_devices();

    let report = if args.simulated || !cfg!(windows) {
        probe("simulated", SimulatedEngine::default(), &config, endpoints)?
    } else {
        probe_wasapi(&config, endpoints)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

#[cfg(windows)]
fn probe_wasapi(config: &SessionConfig, endpoints: Vec<EndpointInfo>) -> Result<ProbeReport> {
    use wasapi_session::client::wasapi;

    wasapi::com_initialize()
        .map_err(|status| anyhow::anyhow!("COM initialization failed: {}", status))?;
    let engine = wasapi::default_output_engine()
        .map_err(|status| anyhow::anyhow!("No default output endpoint: {}", status))?;
    probe("wasapi", engine, config, endpoints)
}

#[cfg(not(windows))]
fn probe_wasapi(config: &SessionConfig, endpoints: Vec<EndpointInfo>) -> Result<ProbeReport> {
    tracing::warn!("WASAPI is only available on Windows, using the simulated endpoint");
    probe("simulated", SimulatedEngine::default(), config, endpoints)
}

fn probe<E: AudioEngine>(
    engine_name: &'static str,
    engine: E,
    config: &SessionConfig,
    endpoints: Vec<EndpointInfo>,
) -> Result<ProbeReport> {
    let mut session = SessionController::new(engine);

    let mix_format = session.mix_format().context("Mix format query failed")?;
    let device_period = session.device_period().context("Device period query failed")?;
    tracing::info!(
        "Mix format {}, default period {}, minimum period {}",
        mix_format,
        device_period.default,
        device_period.minimum
    );

    let requested = config.format.to_sample_format()?;
    let support = session.format_support(config.share_mode, &requested)?;

    // Choosing a substitute is the caller's decision; the probe takes the
    // closest match unless the engine was asked to convert.
    let chosen = match &support {
        FormatSupport::Supported => requested,
        FormatSupport::SupportedWithAlternative(_) if config.autoconvert => requested,
        FormatSupport::SupportedWithAlternative(alternative) => *alternative,
        FormatSupport::Rejected => {
            anyhow::bail!("Engine rejected {} in {} mode", requested, config.share_mode)
        }
    };

    session
        .initialize(
            config.share_mode,
            config.stream_flags(),
            config.buffer_duration(),
            config.periodicity(),
            &chosen,
            uuid::Uuid::nil(),
        )
        .context("Initialize failed")?;

    let buffer_frames = session.buffer_size()?;
    let buffer_duration = session.buffer_duration()?;
    let stream_latency = session.stream_latency()?;
    let transfer = session.acquire_render_transfer()?;
    let padding = session.current_padding()?;
    tracing::info!(
        "Buffer {} frames ({}), {} writable",
        buffer_frames,
        buffer_duration,
        transfer.writable_frames(padding)
    );

    let mut lifecycle = vec![format!("initialized: padding {}", padding)];
    session.start()?;
    lifecycle.push(format!("started: padding {}", session.current_padding()?));
    session.stop()?;
    lifecycle.push(format!("stopped: padding {}", session.current_padding()?));
    session.reset()?;
    lifecycle.push(format!("reset: padding {}", session.current_padding()?));
    drop(transfer);

    Ok(ProbeReport {
        engine: engine_name,
        endpoints,
        mix_format,
        device_period,
        requested,
        support,
        initialized_format: chosen,
        buffer_frames,
        buffer_duration_ms: buffer_duration.as_millis_f64(),
        stream_latency_ms: stream_latency.as_millis_f64(),
        lifecycle,
    })
}

fn print_report(report: &ProbeReport) {
    println!("\n=== Output Endpoints ===");
    for endpoint in &report.endpoints {
        let default_marker = if endpoint.is_default { " [DEFAULT]" } else { "" };
        println!("  {}{}:", endpoint.name, default_marker);
        println!("    Sample rates: {:?}", endpoint.sample_rates);
        println!("    Channels: {:?}", endpoint.channels);
    }

    println!("\n=== Session ({}) ===", report.engine);
    println!("  Mix format:       {}", report.mix_format);
    println!("  Default period:   {}", report.device_period.default);
    println!("  Minimum period:   {}", report.device_period.minimum);
    println!("  Requested:        {}", report.requested);
    match &report.support {
        FormatSupport::Supported => println!("  Negotiation:      supported"),
        FormatSupport::SupportedWithAlternative(alt) => {
            println!("  Negotiation:      closest match {}", alt)
        }
        FormatSupport::Rejected => println!("  Negotiation:      rejected"),
    }
    println!("  Initialized with: {}", report.initialized_format);
    println!(
        "  Buffer:           {} frames ({:.3} ms)",
        report.buffer_frames, report.buffer_duration_ms
    );
    println!("  Stream latency:   {:.3} ms", report.stream_latency_ms);
    for step in &report.lifecycle {
        println!("  {}", step);
    }
    println!();
}
