use anyhow::Error;
use common::{
    config::Config,
    keystore::{
        account::AccountResolver,
        auth::{DebugArtifact, SinglePartyAuth, authenticate},
        finality::{BridgeFinalizer, TrackOutcome, track_withdrawal},
        prover_client::{AuthInputs, ProverClient},
        sequencer_client::SequencerClient,
        transaction::WithdrawTransaction,
    },
    l1::execution_layer::ExecutionLayer as L1ExecutionLayer,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Withdraws from the keystore account: authenticate the withdraw
/// transaction, hand it to the sequencer, track it to the finality target
/// and finalize the withdrawal on L1.
pub async fn run(config: &Config, cancellation: &CancellationToken) -> Result<(), Error> {
    let l1 = L1ExecutionLayer::new(config).await?;
    let sequencer = SequencerClient::new(&config.keystore_sequencer_rpc_url)?;
    let prover = ProverClient::new(&config.signature_prover_rpc_url)?;
    let resolver = AccountResolver::from_config(config)?;

    let resolved = resolver.resolve(&sequencer).await?;
    info!(
        "Keystore account {} resolved at nonce {}",
        resolver.keystore_address(),
        resolved.nonce
    );

    let fee_per_gas = sequencer.gas_price().await?;
    let to = config.withdraw_to.unwrap_or_else(|| l1.relayer_address());
    let transaction = WithdrawTransaction {
        nonce: resolved.nonce,
        fee_per_gas,
        to,
        amount: config.withdraw_amount,
        user_account: resolved.account,
    };
    info!(
        "Withdrawing {} wei from {} to {to}",
        transaction.amount,
        resolver.keystore_address()
    );

    let signatures = resolver.sign_hash(transaction.user_msg_hash()).await?;
    let transport = SinglePartyAuth {
        prover: &prover,
        auth_inputs: AuthInputs {
            code_hash: config.consumer_codehash,
            signatures,
            eoa_addrs: resolved.signers,
        },
    };
    let artifact = config.debug_artifacts_dir.as_ref().map(|dir| DebugArtifact {
        dir: dir.clone(),
        body: transaction.to_debug_json(),
    });
    let authenticated = authenticate(
        &transport,
        transaction.tx_bytes(),
        config.poll_interval,
        config.max_polls,
        artifact.as_ref(),
        cancellation,
    )
    .await?;

    let tx_hash = sequencer.send_raw_transaction(authenticated).await?;
    info!("Withdraw transaction sent to the sequencer: {tx_hash}");

    let finalizer = BridgeFinalizer {
        sequencer: &sequencer,
        l1: &l1,
    };
    let outcome = track_withdrawal(
        &sequencer,
        &finalizer,
        tx_hash,
        config.finality_target,
        config.poll_interval,
        config.max_polls,
        cancellation,
    )
    .await?;
    match outcome {
        TrackOutcome::Finalized(status) => info!("Withdraw transaction finalized: {status}"),
        TrackOutcome::TimedOut => warn!("Gave up waiting for withdraw transaction {tx_hash}"),
        TrackOutcome::Cancelled => info!("Withdraw tracking cancelled"),
    }
    Ok(())
}
