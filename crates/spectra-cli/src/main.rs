//! Spectra command line — capture, analyze, publish
//!
//! Process flow:
//! 1. Startup (cold): parse arguments, load YAML configuration,
//!    initialize logging, handle one-off commands (device listing).
//! 2. Run (hot): open the engine, wire the datagram publisher, start
//!    the input stream.
//! 3. Shutdown (cold): on Ctrl-C, close the engine — publisher first,
//!    then the stream, then chain components in reverse order.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use spectra_core::audio::{host_devices, AudioEngine};
use spectra_core::config::{load_config, AppConfig};
use spectra_core::net::{Publisher, UdpSender};

const USAGE: &str = "\
spectra — real-time audio spectrum analyzer

USAGE:
    spectra [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from a YAML file
    --list-devices      List available audio devices and exit
    --verbose           Log at debug level (overrides config log_level)
    --help              Show this help
";

struct Args {
    config_path: Option<PathBuf>,
    list_devices: bool,
    verbose: bool,
    help: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    Args {
        config_path: args
            .windows(2)
            .find(|pair| pair[0] == "--config")
            .map(|pair| PathBuf::from(&pair[1])),
        list_devices: args.iter().any(|a| a == "--list-devices"),
        verbose: args.iter().any(|a| a == "--verbose"),
        help: args.iter().any(|a| a == "--help" || a == "-h"),
    }
}

fn init_logging(config: &AppConfig, verbose: bool) {
    let default_level = if verbose {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("info")
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn print_devices() -> Result<()> {
    let devices = host_devices().context("enumerate audio devices")?;
    println!("Available audio devices ({}):", devices.len());
    for device in devices {
        println!("  {}", device);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args();
    if args.help {
        print!("{}", USAGE);
        return Ok(());
    }

    let config: AppConfig = match &args.config_path {
        Some(path) => load_config(path),
        None => load_config(std::path::Path::new("config.yaml")),
    };
    init_logging(&config, args.verbose);
    log::info!("spectra starting up");

    if args.list_devices {
        return print_devices();
    }

    // Engine and analysis chain.
    let mut engine = AudioEngine::open(config.audio.clone()).context("open audio engine")?;

    let gate = engine.gate();
    gate.set_enabled(config.gate.enabled);
    gate.set_threshold_ratio(config.gate.threshold);

    // Datagram publisher, when enabled.
    if config.transport.enabled {
        let sender = UdpSender::connect(
            &config.transport.endpoint,
            config.transport.suppress_refused,
        )
        .context("connect datagram sender")?;
        let publisher = Publisher::new(
            Duration::from_millis(config.transport.interval_ms),
            Arc::new(sender),
            Arc::new(engine.spectrum()),
        );
        engine.attach_publisher(publisher);
    } else {
        log::info!("transport disabled; running analysis only");
    }

    engine.start().context("start audio engine")?;
    log::info!(
        "capturing from '{}' ({} Hz, {} frames/buffer) — Ctrl-C to stop",
        engine.device_info().name,
        engine.config().sample_rate,
        engine.config().frames_per_buffer,
    );

    wait_for_ctrl_c()?;

    log::info!("shutting down");
    if let Err(e) = engine.close() {
        log::error!("error during shutdown: {}", e);
    }
    Ok(())
}

/// Block the main thread until Ctrl-C. A current-thread runtime keeps
/// the engine (whose stream handle is not Send) on this thread.
fn wait_for_ctrl_c() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build signal runtime")?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("wait for Ctrl-C")?;
    Ok(())
}
