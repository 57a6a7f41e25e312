//! peercall-relay: rendezvous server for peercall signaling

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use peercall_infra_common::{log_welcome, setup_logging};
use peercall_signaling_server::{RelayConfig, RelayServer};

#[derive(Parser, Debug)]
#[command(name = "peercall-relay")]
#[command(about = "Relay offer/answer/candidate envelopes between registered peers")]
struct Args {
    /// Address to listen on, overrides the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level, overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RelayConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config = config.with_bind_addr(bind);
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.logging.json |= args.json_logs;

    setup_logging(config.logging.to_config("peercall-relay")?)?;
    log_welcome("peercall-relay", env!("CARGO_PKG_VERSION"));

    let server = RelayServer::bind(&config).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Could not listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
