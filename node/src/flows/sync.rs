use alloy::primitives::B256;
use anyhow::{Error, anyhow};
use common::{
    config::{Config, SubmissionShape},
    keystore::node_client::NodeClient,
    l1::{execution_layer::ExecutionLayer as L1ExecutionLayer, header::canonicalize_block_header},
    l2::{
        bindings::{OutputRootPreimage, StateRootProof},
        execution_layer::ExecutionLayer as L2ExecutionLayer,
    },
};
use tracing::info;

/// Relays the keystore state root from the source chain to the destination
/// chain: make a fresh source blockhash available, prove the bridge's
/// latest-state-root slot against it, and submit the proof.
pub async fn run(config: &Config) -> Result<(), Error> {
    let l1 = L1ExecutionLayer::new(config).await?;
    let l2 = L2ExecutionLayer::new(config).await?;
    let node = NodeClient::new(&config.keystore_node_rpc_url)?;

    let inclusion_block = l2.cache_blockhash().await?;
    let l1_block_number = l2.l1_block_number_at(inclusion_block).await?;
    info!("Relaying keystore state root from L1 block {l1_block_number}");

    let header_json = l1.get_block_header_json(l1_block_number).await?;
    let block_header = canonicalize_block_header(&header_json)?;

    let proof_response = l1.get_state_root_proof(l1_block_number).await?;
    let slot_proof = proof_response
        .storage_proof
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("eth_getProof returned no proof for the state root slot"))?;
    let proof = StateRootProof {
        storageValue: B256::from(slot_proof.value),
        blockHeader: block_header,
        accountProof: proof_response.account_proof,
        storageProof: slot_proof.proof,
    };

    let preimage = match config.submission_shape {
        SubmissionShape::ProofOnly => None,
        SubmissionShape::ProofWithPreimage => {
            Some(resolve_output_root_preimage(&node, proof.storageValue).await?)
        }
    };

    let tx_hash = l2.cache_keystore_state_root(proof, preimage).await?;
    info!("Keystore state root relayed: {tx_hash}");
    Ok(())
}

/// The state oracle commits to the full output root, so the submission has
/// to carry the keystore block the cached value was produced at.
async fn resolve_output_root_preimage(
    node: &NodeClient,
    state_root: B256,
) -> Result<OutputRootPreimage, Error> {
    let block_number = node
        .get_block_number_by_state_root(state_root)
        .await?
        .ok_or_else(|| anyhow!("Keystore node does not know state root {state_root}"))?;
    let header = node.get_block_by_number(block_number).await?;
    Ok(OutputRootPreimage {
        stateRoot: header.state_root,
        withdrawalsRoot: header.withdrawals_root,
        lastValidBlockhash: header.hash,
    })
}
