use alloy::primitives::{Address, B256, Bytes, FixedBytes, U256, b256, fixed_bytes};
use anyhow::{Error, anyhow};
use common::{
    config::Config,
    keystore::{
        account::AccountResolver,
        node_client::NodeClient,
        signature::{ProofError, encode_user_op_signature},
    },
    l2::{bindings::PackedUserOperation, execution_layer::ExecutionLayer as L2ExecutionLayer},
};
use tracing::info;

/// ERC-7579 `execute(bytes32,bytes)` selector.
const EXECUTE_SELECTOR: FixedBytes<4> = fixed_bytes!("0xe9ae5c53");

/// Single-call execution mode.
const EXECUTE_MODE: B256 = B256::ZERO;

const ACCOUNT_GAS_LIMITS: B256 =
    b256!("0x000000000000000000000000000f4257000000000000000000000000000f403c");
const PRE_VERIFICATION_GAS: u64 = 90_377;
const GAS_FEES: B256 = b256!("0x0000000000000000000000000010eff0000000000000000000000000011e777e");

/// Builds, signs and self-bundles one user operation whose keystore
/// signature proves the account's key data against the cached state root.
pub async fn run(config: &Config) -> Result<(), Error> {
    let l2 = L2ExecutionLayer::new(config).await?;
    let node = NodeClient::new(&config.keystore_node_rpc_url)?;
    let resolver = AccountResolver::from_config(config)?;

    let sender = config
        .smart_account_address
        .ok_or_else(|| anyhow!("SMART_ACCOUNT_ADDRESS is required for the user-op flow"))?;
    let target = config
        .user_op_target
        .ok_or_else(|| anyhow!("USER_OP_TARGET is required for the user-op flow"))?;

    let nonce = l2.get_user_op_nonce(sender).await?;
    let mut user_op = PackedUserOperation {
        sender,
        nonce,
        initCode: Bytes::new(),
        callData: build_execute_calldata(target, config.user_op_value, &[]),
        accountGasLimits: ACCOUNT_GAS_LIMITS,
        preVerificationGas: U256::from(PRE_VERIFICATION_GAS),
        gasFees: GAS_FEES,
        paymasterAndData: Bytes::new(),
        signature: Bytes::new(),
    };

    let user_op_hash = l2.get_user_op_hash(user_op.clone()).await?;
    info!("UserOp hash: {user_op_hash}");

    // Threshold-1 account, the first signer's approval suffices
    let auth_data = resolver
        .sign_hash(user_op_hash)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No local signers configured"))?;

    user_op.signature = match encode_user_op_signature(&l2, &node, &resolver, &auth_data).await {
        Ok(signature) => signature,
        Err(ProofError::StaleCachedRoot(root)) => {
            return Err(anyhow!(
                "Cached state root {root} is unknown to the keystore node, run the sync flow first"
            ));
        }
        Err(ProofError::Any(e)) => return Err(e),
    };

    let tx_hash = l2.submit_user_op(user_op).await?;
    info!("UserOp bundle submitted: {tx_hash}");
    Ok(())
}

/// Calldata for the smart account's `execute` convention: selector, mode
/// word, then the execution payload `target ++ value ++ calldata` as one
/// ABI `bytes` argument.
fn build_execute_calldata(target: Address, value: U256, calldata: &[u8]) -> Bytes {
    let execution = [target.as_slice(), &value.to_be_bytes::<32>(), calldata].concat();
    let mut out = Vec::with_capacity(100 + execution.len());
    out.extend_from_slice(EXECUTE_SELECTOR.as_slice());
    out.extend_from_slice(EXECUTE_MODE.as_slice());
    out.extend_from_slice(&U256::from(0x40).to_be_bytes::<32>());
    out.extend_from_slice(&U256::from(execution.len()).to_be_bytes::<32>());
    out.extend_from_slice(&execution);
    out.into()
}
