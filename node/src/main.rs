use anyhow::Error;
use clap::{Parser, Subcommand};
use common::config::Config;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod flows;

#[derive(Parser, Debug)]
#[command(about = "Keystore rollup relayer and bundler sidecar")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Relay the keystore state root from L1 to the destination chain
    Sync,
    /// Rotate the account keys through a sponsored update transaction
    Update,
    /// Fund the keystore account through the L1 bridge
    Deposit,
    /// Withdraw from the keystore account and finalize on L1
    Withdraw,
    /// Build, sign and self-bundle a user operation
    UserOp,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    common::utils::logging::init_logging();

    let cli = Cli::parse();

    info!("🚀 Starting Keywarden v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::new()?;
    let cancel_token = CancellationToken::new();

    // Set up panic hook to cancel token on panic
    let panic_cancel_token = cancel_token.clone();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!("Panic occurred: {:?}", panic_info);
        panic_cancel_token.cancel();
        info!("Cancellation token triggered, initiating shutdown...");
    }));

    spawn_signal_watcher(cancel_token.clone());

    let result = match cli.command {
        Command::Sync => flows::sync::run(&config).await,
        Command::Update => flows::update::run(&config, &cancel_token).await,
        Command::Deposit => flows::deposit::run(&config, &cancel_token).await,
        Command::Withdraw => flows::withdraw::run(&config, &cancel_token).await,
        Command::UserOp => flows::user_op::run(&config).await,
    };

    if let Err(e) = &result {
        error!("Flow failed: {e}");
    }
    result
}

fn spawn_signal_watcher(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to set up SIGTERM handler");
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
            }
        }
        cancel_token.cancel();
    });
}
