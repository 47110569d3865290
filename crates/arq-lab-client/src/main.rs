use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{Level, error, info, warn};

use arq_lab_abstract::Command;
use arq_lab_abstract::consts::{DEFAULT_HOST, DEFAULT_PORT};
use arq_lab_session::{Client, ProtocolArgs, save_download};

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive client for the windowed ARQ lab server")]
struct Args {
    #[arg(long, env = "ARQ_LAB_HOST", default_value = DEFAULT_HOST)]
    host: String,

    #[arg(long, env = "ARQ_LAB_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Where `FILE` replies are saved.
    #[arg(long, default_value = "./downloads")]
    downloads_dir: PathBuf,

    #[command(flatten)]
    protocol: ProtocolArgs,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = args.protocol.to_config().context("Invalid protocol settings")?;
    let addr = format!("{}:{}", args.host, args.port);
    let mut client = Client::connect(addr.as_str(), config)
        .await
        .with_context(|| format!("Cannot reach server at {addr}"))?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = prompt(&mut input, "Command: (CHAT, FILE, EXIT) ").await? else {
            break;
        };
        let command: Command = match line.parse() {
            Ok(Command::Error) | Err(_) => {
                warn!("unknown command {line:?}");
                continue;
            }
            Ok(command) => command,
        };

        let data = match command {
            Command::Exit => break,
            Command::Chat => prompt(&mut input, "Message: ").await?,
            Command::File => prompt(&mut input, "Filename: ").await?,
            Command::Error => continue,
        };
        let Some(data) = data else { break };

        let reply = match client.request(command, data.clone()).await {
            Ok(Some(reply)) => reply,
            Ok(None) => continue,
            Err(err) if err.is_recoverable() => {
                warn!("{err}");
                continue;
            }
            Err(err) => return Err(err).context("Request failed"),
        };

        match reply.command {
            Command::Chat => println!("SERVER: {}", reply.data),
            Command::File => match save_download(&args.downloads_dir, &data, &reply.data).await {
                Ok(path) => info!("saved {}", path.display()),
                Err(err) => error!("could not save {data}: {err}"),
            },
            Command::Error => error!("server error: {}", reply.data),
            Command::Exit => warn!("unexpected EXIT reply"),
        }
    }

    client.exit().await.context("Failed to close the session")?;
    info!("bye");
    Ok(())
}

/// Print `label` and read one trimmed line. `None` on end of input.
async fn prompt(input: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;
    Ok(input
        .next_line()
        .await
        .context("Failed to read stdin")?
        .map(|line| line.trim().to_string()))
}
