use clap::Parser;
use neko_scan::cli::{Cli, Command};
use neko_scan::commands::{self, ScanContext};
use neko_scan::config;
use neko_scan::rpc::SubstrateClient;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // stdout carries CSV and reports, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut cfg = config::load()?;
    if let Some(url) = &cli.url {
        cfg.node_url = url.clone();
    }
    if let Some(policy) = cli.policy {
        cfg.failure_policy = policy.into();
    }

    // replaying a table needs no chain
    if let Command::Top { input, rank } = &cli.command {
        return commands::top(input, *rank);
    }

    let (client, head) = SubstrateClient::connect(&cfg).await?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received, stopping after current block...");
                cancel.cancel();
            }
        }
    });

    let ctx = ScanContext {
        policy: cfg.failure_policy,
        cancel,
        bar: cli.bar,
    };

    match &cli.command {
        Command::Head => {
            println!("{head}");
            Ok(())
        }
        Command::Transfers { range, out } => {
            let range = commands::resolve_range(*range, head)?;
            commands::transfers(&ctx, &client, range, out.as_deref()).await
        }
        Command::NftTransfers { range, out } => {
            let range = commands::resolve_range(*range, head)?;
            commands::nft_transfers(&ctx, &client, range, out.as_deref()).await
        }
        Command::Movers { range, rank } => {
            let range = commands::resolve_range(*range, head)?;
            commands::movers(&ctx, &client, range, *rank).await
        }
        Command::NftReceived { range, targets } => {
            let range = commands::resolve_range(*range, head)?;
            commands::nft_received(&ctx, &client, range, targets).await
        }
        Command::NftDiff { range, targets } => {
            let range = commands::resolve_range(*range, head)?;
            commands::nft_diff(&client, range, targets).await
        }
        Command::Top { .. } => Ok(()),
    }
}
