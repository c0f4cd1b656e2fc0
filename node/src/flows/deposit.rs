use anyhow::Error;
use common::{
    config::Config,
    keystore::{
        account::AccountResolver,
        finality::{TrackOutcome, track_transaction},
        sequencer_client::SequencerClient,
        transaction::DepositTransaction,
        types::TransactionStatus,
    },
    l1::execution_layer::ExecutionLayer as L1ExecutionLayer,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Funds the keystore account through the L1 bridge and waits for the
/// deposit to appear in a keystore block.
pub async fn run(config: &Config, cancellation: &CancellationToken) -> Result<(), Error> {
    let l1 = L1ExecutionLayer::new(config).await?;
    let sequencer = SequencerClient::new(&config.keystore_sequencer_rpc_url)?;
    let resolver = AccountResolver::from_config(config)?;

    let transaction = DepositTransaction {
        keystore_address: resolver.keystore_address(),
        amount: config.deposit_amount,
    };
    info!(
        "Depositing {} wei to keystore account {}",
        transaction.amount, transaction.keystore_address
    );

    let (l1_tx_hash, l2_tx_hash) = l1
        .initiate_transaction(transaction.tx_bytes(), transaction.amount)
        .await?;
    info!("Deposit initiated on L1: {l1_tx_hash}, keystore transaction: {l2_tx_hash}");

    // A deposit is effective once a keystore block includes it
    let outcome = track_transaction(
        &sequencer,
        l2_tx_hash,
        TransactionStatus::L2IncludedL1Pending,
        config.poll_interval,
        config.max_polls,
        cancellation,
    )
    .await?;
    match outcome {
        TrackOutcome::Finalized(status) => info!("Deposit included in a keystore block: {status}"),
        TrackOutcome::TimedOut => warn!("Gave up waiting for deposit transaction {l2_tx_hash}"),
        TrackOutcome::Cancelled => info!("Deposit tracking cancelled"),
    }
    Ok(())
}
