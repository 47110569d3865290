use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, info};

use arq_lab_abstract::{Command, ConfigOverride, Message, ProtocolConfig};
use arq_lab_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless windowed ARQ simulator")]
struct Args {
    /// Load a scenario from disk.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    #[arg(long)]
    frame_size: Option<usize>,
    #[arg(long)]
    window_size: Option<usize>,
    #[arg(long)]
    max_rounds: Option<u32>,
    #[arg(long)]
    checksum_error_rate: Option<u8>,
    #[arg(long)]
    ack_loss_rate: Option<u8>,
    #[arg(long)]
    seed: Option<u64>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    info!("arq-lab-sim-cli starting…");

    let report = if let Some(path) = &args.scenario {
        let scenario_path = path
            .to_str()
            .context("Scenario path contains invalid UTF-8")?;
        scenario_runner::run_scenario(scenario_path)?
    } else {
        run_default_sim(&args)?
    };
    log_summary(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    /// Command-line settings, in the same shape scenario files use.
    fn overrides(&self) -> ConfigOverride {
        ConfigOverride {
            frame_size: self.frame_size,
            window_size: self.window_size,
            max_rounds: self.max_rounds,
            checksum_error_rate: self.checksum_error_rate,
            ack_loss_rate: self.ack_loss_rate,
            seed: self.seed,
            ..Default::default()
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn run_default_sim(args: &Args) -> Result<SimulationReport> {
    let mut config = ProtocolConfig::default();
    config.faults.checksum_error_rate = 10;
    config.faults.ack_loss_rate = 10;
    config.faults.seed = Some(42);
    args.overrides().apply_to(&mut config);
    config.validate().context("Invalid simulator settings")?;

    let mut sim = Simulator::new(config);
    info!("Starting default headless simulation…");
    let messages = [
        Message::new(Command::Chat, "Packet 1"),
        Message::new(Command::Chat, "Packet 2"),
        Message::new(Command::File, "QUJD".repeat(3000)),
    ];
    for message in &messages {
        sim.transfer(message)?;
    }
    info!("Simulation complete.");
    Ok(sim.export_report())
}

fn log_summary(report: &SimulationReport) {
    for (i, t) in report.transfers.iter().enumerate() {
        info!(
            "transfer {i}: {} {} frames, {} rounds, {} sent, {} corrupted, {} ACKs dropped, {:?}",
            t.command, t.frames, t.rounds, t.frames_sent, t.corrupted, t.acks_dropped, t.outcome
        );
    }
    info!(
        "{} of {} messages delivered",
        report.delivered.len(),
        report.transfers.len()
    );
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
