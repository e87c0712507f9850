use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyward_client::{ClientError, DaemonClient, default_daemon_url};
use keyward_protocol::{Event, EventKind};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "keyward", about = "keyward CLI", version)]
struct Cli {
    /// Daemon base URL (default: $KEYWARD_DAEMON_URL or http://127.0.0.1:7781).
    #[arg(long, global = true)]
    daemon: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage org keypairs.
    Keypairs {
        #[command(subcommand)]
        command: KeypairsCommand,
    },
    /// Print every progress event the daemon publishes.
    Watch,
    /// Show the daemon version.
    Version,
}

#[derive(Subcommand)]
enum KeypairsCommand {
    /// Generate signing and encryption keypairs for an org.
    Generate {
        /// Org ID.
        #[arg(long)]
        org: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DaemonClient::new(cli.daemon.unwrap_or_else(default_daemon_url));

    match cli.command {
        Command::Keypairs {
            command: KeypairsCommand::Generate { org },
        } => {
            let generated = client
                .generate_keypairs(&org, print_progress)
                .await
                .with_context(|| format!("failed to generate keypairs for {org}"))?;
            print_json(&generated)
        }
        Command::Watch => {
            let mut events = client.subscribe().await?;
            eprintln!("Watching {} (Ctrl-C to stop)", client.base_url());
            while let Some(next) = events.next().await {
                let event = next?;
                println!(
                    "{} [{}] {}/{} {}",
                    event.id, event.kind, event.completed, event.total, event.message
                );
            }
            eprintln!("Daemon closed the stream.");
            Ok(())
        }
        Command::Version => {
            let info = client.version().await?;
            println!("keyward {}", env!("CARGO_PKG_VERSION"));
            println!("keywardd {}", info.version);
            Ok(())
        }
    }
}

fn print_progress(next: Result<Event, ClientError>) {
    match next {
        Ok(event) if event.kind == EventKind::Error => eprintln!("error: {}", event.message),
        Ok(event) => eprintln!("[{}/{}] {}", event.completed, event.total, event.message),
        Err(err) => eprintln!("progress unavailable: {err}"),
    }
}

fn print_json<T: Serialize>(data: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}
