use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, LevelFilter};

use herd_sim::scenarios::herd_demo::{run_with_config, SimConfig};

#[derive(Parser, Debug)]
#[command(name = "herd-sim")]
#[command(about = "Herd trading simulation: a fair-value leader and latency-staggered followers")]
struct Args {
    /// Scenario JSON file; the built-in demo day is used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the scenario seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write CSV logs into this directory
    #[arg(short, long)]
    logs_dir: Option<String>,

    /// Debug-level logging (RUST_LOG still wins)
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let mut config = match &args.config {
        Some(path) => match SimConfig::from_file(path) {
            Ok(config) => {
                info!("[Main] loaded {}", path.display());
                config
            }
            Err(e) => {
                error!("[Main] failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            info!("[Main] no --config given, running the default scenario");
            SimConfig::default()
        }
    };

    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(dir) = args.logs_dir {
        config.logs_dir = Some(dir);
    }

    info!("[Main] scenario={} seed={}", config.scenario_name, config.seed);

    match run_with_config(&config) {
        Ok(report) => {
            info!(
                "[Main] delivered={} dropped={} end={} ns",
                report.summary.messages_delivered, report.summary.messages_dropped, report.summary.end_ns
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("[Main] {}", e);
            ExitCode::FAILURE
        }
    }
}
