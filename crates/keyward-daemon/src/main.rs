use anyhow::Result;
use clap::Parser;
use keyward_daemon::config::DaemonConfig;
use keyward_daemon::server;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keywardd", about = "keyward daemon", version)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/keyward/daemon.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the config file
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keyward_daemon=info,keyward_observer=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = DaemonConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    server::run(config, async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await
}
