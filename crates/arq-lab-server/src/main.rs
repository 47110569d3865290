use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{Level, info};

use arq_lab_abstract::consts::{DEFAULT_HOST, DEFAULT_PORT};
use arq_lab_session::{ConnectionCounter, FileStore, ProtocolArgs, Responder, run_server};

#[derive(Parser, Debug)]
#[command(author, version, about = "Windowed ARQ lab server")]
struct Args {
    #[arg(long, env = "ARQ_LAB_HOST", default_value = DEFAULT_HOST)]
    host: String,

    #[arg(long, env = "ARQ_LAB_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory served to `FILE` requests.
    #[arg(long, default_value = "./images")]
    files_dir: PathBuf,

    #[command(flatten)]
    protocol: ProtocolArgs,

    /// Log every frame and ACK.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    info!("arq-lab-server starting…");

    let config = args.protocol.to_config().context("Invalid protocol settings")?;
    info!(
        "frame size {}, window {}, ACK timeout {} ms, faults {:?}",
        config.frame_size, config.window_size, config.ack_timeout_ms, config.faults
    );
    if !args.files_dir.is_dir() {
        tracing::warn!(
            "files directory {} does not exist, FILE requests will fail",
            args.files_dir.display()
        );
    }

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let responder = Responder::new(config, FileStore::new(args.files_dir));
    run_server(listener, responder, ConnectionCounter::default())
        .await
        .context("Accept loop failed")?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();
}
