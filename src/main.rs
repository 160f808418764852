//! Skyframe command line: one weather-to-image run with live status.

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use skyframe_core::{Config, ConfigError, LocationMode};
use skyframe_imagegen::ImageJobClient;
use skyframe_weather::{locator_from_config, WeatherProvider};
use skyframe_workflow::{Orchestrator, WorkflowState};
use tokio::sync::{mpsc, watch};

/// Generate an image of the current weather where you are
#[derive(Parser)]
#[command(name = "skyframe")]
#[command(about = "Generates an image from your location and current weather")]
struct Args {
    /// Config file (defaults to <config dir>/skyframe/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Latitude to use instead of the configured location source
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude to use instead of the configured location source
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Seconds between automatic status checks
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Do not offer manual status checks on stdin
    #[arg(long)]
    no_interactive: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    skyframe_core::init()?;

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            if let Some(config_err) = e.downcast_ref::<ConfigError>() {
                eprintln!("{}", config_err.user_message());
            }
            return Err(e);
        }
    };

    let locator = locator_from_config(&config.location)?;
    let weather = WeatherProvider::new(&config.weather)?;
    let jobs = ImageJobClient::new(&config.image)?;
    tracing::info!("Using image model {}", jobs.model());

    let mut orchestrator = Orchestrator::new(
        locator,
        Arc::new(weather),
        Arc::new(jobs),
        Duration::from_secs(config.polling.interval_secs),
    );

    let printer = tokio::spawn(print_updates(orchestrator.subscribe()));

    run(&mut orchestrator, !args.no_interactive).await;

    let final_state = orchestrator.state().clone();
    drop(orchestrator);
    if let Err(e) = printer.await {
        tracing::warn!("Status printer failed: {}", e);
    }

    if let Some(url) = &final_state.image_url {
        println!("{}", url);
    }

    Ok(if final_state.is_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    apply_args(&mut config, args);
    let (config, _) = config.into_validated()?;
    Ok(config)
}

fn apply_args(config: &mut Config, args: &Args) {
    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        config.location.mode = LocationMode::Fixed;
        config.location.latitude = Some(lat);
        config.location.longitude = Some(lon);
    }
    if let Some(secs) = args.interval_secs {
        config.polling.interval_secs = secs;
    }
}

async fn run(orchestrator: &mut Orchestrator, interactive: bool) {
    if let Err(e) = orchestrator.generate().await {
        tracing::debug!("Run ended before polling: {}", e.user_message());
        return;
    }

    let mut input = if interactive {
        Some(spawn_stdin_reader())
    } else {
        None
    };

    while orchestrator.is_polling() {
        tokio::select! {
            event = orchestrator.recv_event() => match event {
                Some(event) => orchestrator.handle_event(event),
                None => break,
            },
            line = recv_line(&mut input) => match line {
                Some(_) if orchestrator.state().show_fetch_control => {
                    orchestrator.check_status().await;
                }
                Some(_) => {}
                None => input = None,
            },
            _ = tokio::signal::ctrl_c() => {
                orchestrator.cancel();
                break;
            }
        }
    }
}

/// Read stdin lines on a plain thread so a pending read never holds up exit
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn recv_line(input: &mut Option<mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match input {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn print_updates(mut rx: watch::Receiver<WorkflowState>) {
    let mut last = String::new();
    while rx.changed().await.is_ok() {
        let line = render(&rx.borrow_and_update());
        if line != last {
            println!("{}", line);
            last = line;
        }
    }
}

fn render(state: &WorkflowState) -> String {
    let mut line = if state.is_error {
        format!("[error] {}", state.status)
    } else {
        state.status.clone()
    };
    if state.show_fetch_control {
        line.push_str("  (press Enter to check now)");
    }
    line
}
