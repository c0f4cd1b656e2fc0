use alloy::primitives::{Address, Bytes, U256, keccak256};
use anyhow::{Error, anyhow};
use common::{
    config::Config,
    keystore::{
        account::{
            AccountResolver, KeyDataVersion, KeystoreAccount, encode_data_hash_data,
            encode_m_of_n_data,
        },
        auth::{SponsoredAuth, authenticate},
        finality::{TrackOutcome, track_transaction},
        node_client::NodeClient,
        prover_client::{AuthInputs, ProverClient, SponsorAuthInputs},
        sequencer_client::SequencerClient,
        transaction::UpdateTransaction,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Rotates the account keys: builds an update transaction that authorizes
/// one additional signer, has it proven through the sponsored path, and
/// tracks it to the configured finality target.
pub async fn run(config: &Config, cancellation: &CancellationToken) -> Result<(), Error> {
    let node = NodeClient::new(&config.keystore_node_rpc_url)?;
    let sequencer = SequencerClient::new(&config.keystore_sequencer_rpc_url)?;
    let prover = ProverClient::new(&config.signature_prover_rpc_url)?;
    let resolver = AccountResolver::from_config(config)?;

    let sponsor = config
        .sponsor
        .as_ref()
        .ok_or_else(|| anyhow!("SPONSOR_KEYSTORE_ADDRESS is required for the update flow"))?;
    let new_signer = config
        .new_signer_address
        .ok_or_else(|| anyhow!("NEW_SIGNER_ADDRESS is required for the update flow"))?;

    let resolved = resolver.resolve(&node).await?;
    info!(
        "Keystore account {} resolved at nonce {}",
        resolver.keystore_address(),
        resolved.nonce
    );

    let fee_per_gas = sequencer.gas_price().await?;
    let transaction = UpdateTransaction {
        nonce: resolved.nonce,
        fee_per_gas,
        new_user_data: encode_new_user_data(config, &resolver, new_signer),
        new_user_vkey: resolver.vkey().clone(),
        user_account: resolved.account,
        sponsor_account: Some(KeystoreAccount::Existing {
            keystore_address: sponsor.keystore_address,
            data_hash: sponsor.data_hash,
            vkey: sponsor.vkey.clone(),
        }),
    };
    info!(
        "Update transaction {} authorizes signer {}",
        transaction.tx_hash(),
        new_signer
    );

    let signatures = resolver.sign_hash(transaction.user_msg_hash()).await?;
    let transport = SponsoredAuth {
        prover: &prover,
        sponsor_auth_inputs: SponsorAuthInputs {
            // The prover fills in the sponsor side, only its codehash is sent
            sponsor_auth: AuthInputs {
                code_hash: sponsor.codehash,
                signatures: vec![],
                eoa_addrs: vec![],
            },
            user_auth: AuthInputs {
                code_hash: config.consumer_codehash,
                signatures,
                eoa_addrs: resolved.signers,
            },
        },
    };
    let authenticated = authenticate(
        &transport,
        transaction.tx_bytes(),
        config.poll_interval,
        config.max_polls,
        None,
        cancellation,
    )
    .await?;

    let tx_hash = sequencer.send_raw_transaction(authenticated).await?;
    info!("Update transaction sent to the sequencer: {tx_hash}");

    let outcome = track_transaction(
        &node,
        tx_hash,
        config.finality_target,
        config.poll_interval,
        config.max_polls,
        cancellation,
    )
    .await?;
    match outcome {
        TrackOutcome::Finalized(status) => info!("Update transaction finalized: {status}"),
        TrackOutcome::TimedOut => warn!("Gave up waiting for update transaction {tx_hash}"),
        TrackOutcome::Cancelled => info!("Update tracking cancelled"),
    }
    Ok(())
}

/// New key data: the configured signer set plus the newly authorized key,
/// in the configured encoding.
fn encode_new_user_data(config: &Config, resolver: &AccountResolver, new_signer: Address) -> Bytes {
    let mut signers = resolver.local_signer_addresses();
    signers.push(new_signer);
    let m_of_n = encode_m_of_n_data(
        config.consumer_codehash,
        U256::from(config.signer_threshold),
        &signers,
    );
    match config.key_data_version {
        KeyDataVersion::MOfN => m_of_n,
        KeyDataVersion::DataHash => encode_data_hash_data(keccak256(&m_of_n)),
    }
}
