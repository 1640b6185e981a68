use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dispatch_service::config::{Cli, Command, ServiceContext, ServiceError};
use dispatch_service::server::{serve_stdio, serve_tcp};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    // stdout carries protocol responses in stdio mode.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), ServiceError> {
    let ctx = Arc::new(ServiceContext::from_cli(&cli)?);
    match cli.command {
        Command::Serve { listen } => {
            let listener = TcpListener::bind(&listen).await?;
            info!(addr = %listener.local_addr()?, "dispatchd listening");
            serve_tcp(listener, ctx, async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    error!(%err, "failed to listen for ctrl-c");
                }
            })
            .await?;
        }
        Command::Stdio => serve_stdio(ctx).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "dispatchd failed");
            ExitCode::FAILURE
        }
    }
}
