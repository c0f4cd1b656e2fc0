use super::bindings::{
    ENTRY_POINT_ADDRESS, EntryPoint, KeystoreValidator, L1_BLOCK_PREDEPLOY, L1Block,
    OPStackStateOracle, OutputRootPreimage, PackedUserOperation, StateRootProof,
    keystore_nonce_key,
};
use crate::config::{Config, SubmissionShape};
use alloy::{
    eips::BlockId,
    network::EthereumWallet,
    primitives::{Address, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use anyhow::{Error, anyhow};
use std::{str::FromStr, time::Duration};
use tracing::info;

const RECEIPT_TIMEOUT: Duration = Duration::from_secs(100);

/// Contract that receives the relayed state root. Older deployments verify
/// the storage proof on the validator module itself; newer ones verify it on
/// a state oracle that also checks the output-root preimage.
enum StateRootTarget {
    Validator(KeystoreValidator::KeystoreValidatorInstance<DynProvider>),
    StateOracle(OPStackStateOracle::OPStackStateOracleInstance<DynProvider>),
}

/// Destination-chain execution layer: state-root caching, the cached-root
/// read used by proof encoding, and ERC-4337 self-bundling.
pub struct ExecutionLayer {
    provider: DynProvider,
    target: StateRootTarget,
    entry_point: EntryPoint::EntryPointInstance<DynProvider>,
    validator_address: Address,
    bundler_address: Address,
}

impl ExecutionLayer {
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let signer = PrivateKeySigner::from_str(config.funded_private_key.as_str())
            .map_err(|e| anyhow!("Failed to parse FUNDED_PRIVATE_KEY: {e}"))?;
        let bundler_address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(config.l2_rpc_url.parse()?)
            .erased();

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| anyhow!("Failed to get L2 chain ID: {e}"))?;
        info!(
            "L2 chain ID: {}, keystore validator: {}",
            chain_id, config.validator_address
        );

        let target = match config.submission_shape {
            SubmissionShape::ProofOnly => StateRootTarget::Validator(KeystoreValidator::new(
                config.validator_address,
                provider.clone(),
            )),
            SubmissionShape::ProofWithPreimage => {
                let oracle_address = config.state_oracle_address.ok_or_else(|| {
                    anyhow!("STATE_ORACLE_ADDRESS is required for proof-with-preimage submission")
                })?;
                StateRootTarget::StateOracle(OPStackStateOracle::new(
                    oracle_address,
                    provider.clone(),
                ))
            }
        };
        let entry_point = EntryPoint::new(ENTRY_POINT_ADDRESS, provider.clone());

        Ok(Self {
            provider,
            target,
            entry_point,
            validator_address: config.validator_address,
            bundler_address,
        })
    }

    pub fn bundler_address(&self) -> Address {
        self.bundler_address
    }

    /// Rolls the destination chain's view of the source chain forward.
    /// Returns the block number the call landed in.
    pub async fn cache_blockhash(&self) -> Result<u64, Error> {
        let pending = match &self.target {
            StateRootTarget::Validator(validator) => validator.cacheBlockhash().send().await,
            StateRootTarget::StateOracle(oracle) => oracle.cacheBlockhash().send().await,
        }
        .map_err(|e| anyhow!("Failed to send cacheBlockhash: {e}"))?;
        let tx_hash = *pending.tx_hash();
        info!("cacheBlockhash tx hash: {}", tx_hash);

        let receipt = pending
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(|e| anyhow!("Failed to get receipt for cacheBlockhash {tx_hash}: {e}"))?;
        if !receipt.status() {
            return Err(anyhow!("cacheBlockhash transaction {tx_hash} reverted"));
        }
        receipt
            .block_number
            .ok_or_else(|| anyhow!("cacheBlockhash receipt for {tx_hash} has no block number"))
    }

    /// Reads the L1Block predeploy at `block_number`: the source-chain block
    /// the destination chain had imported at that point.
    pub async fn l1_block_number_at(&self, block_number: u64) -> Result<u64, Error> {
        let l1_block = L1Block::new(L1_BLOCK_PREDEPLOY, self.provider.clone());
        let number = l1_block
            .number()
            .block(BlockId::number(block_number))
            .call()
            .await
            .map_err(|e| anyhow!("Failed to read L1Block number at block {block_number}: {e}"))?;
        if number == 0 {
            return Err(anyhow!("L1Block predeploy returned zero at block {block_number}"));
        }
        Ok(number)
    }

    /// Submits the canonicalized header and storage proof, waits one
    /// confirmation. The state-oracle shape additionally commits to the
    /// output-root preimage.
    pub async fn cache_keystore_state_root(
        &self,
        proof: StateRootProof,
        preimage: Option<OutputRootPreimage>,
    ) -> Result<B256, Error> {
        let pending = match &self.target {
            StateRootTarget::Validator(validator) => {
                validator.cacheKeystoreStateRoot(proof).send().await
            }
            StateRootTarget::StateOracle(oracle) => {
                let preimage = preimage.ok_or_else(|| {
                    anyhow!("Output-root preimage is required for the state oracle submission")
                })?;
                oracle.cacheKeystoreStateRoot(proof, preimage).send().await
            }
        }
        .map_err(|e| anyhow!("Failed to send cacheKeystoreStateRoot: {e}"))?;
        let tx_hash = *pending.tx_hash();
        info!("cacheKeystoreStateRoot tx hash: {}", tx_hash);

        let receipt = pending
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(|e| {
                anyhow!("Failed to get receipt for cacheKeystoreStateRoot {tx_hash}: {e}")
            })?;
        if !receipt.status() {
            return Err(anyhow!("cacheKeystoreStateRoot transaction {tx_hash} reverted"));
        }
        Ok(tx_hash)
    }

    /// Keystore state root currently cached on the destination chain.
    pub async fn latest_state_root(&self) -> Result<B256, Error> {
        match &self.target {
            StateRootTarget::Validator(validator) => validator.latestStateRoot().call().await,
            StateRootTarget::StateOracle(oracle) => oracle.latestStateRoot().call().await,
        }
        .map_err(|e| anyhow!("Failed to read latestStateRoot: {e}"))
    }

    /// Next ERC-4337 nonce for `sender` under the keystore validator
    /// nonce key.
    pub async fn get_user_op_nonce(&self, sender: Address) -> Result<U256, Error> {
        self.entry_point
            .getNonce(sender, keystore_nonce_key(self.validator_address))
            .call()
            .await
            .map_err(|e| anyhow!("Failed to read EntryPoint nonce for {sender}: {e}"))
    }

    pub async fn get_user_op_hash(&self, user_op: PackedUserOperation) -> Result<B256, Error> {
        self.entry_point
            .getUserOpHash(user_op)
            .call()
            .await
            .map_err(|e| anyhow!("Failed to compute userOp hash: {e}"))
    }

    /// Self-bundles a single user operation through `handleOps`, waits one
    /// confirmation.
    pub async fn submit_user_op(&self, user_op: PackedUserOperation) -> Result<B256, Error> {
        let pending = self
            .entry_point
            .handleOps(vec![user_op], self.bundler_address)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send handleOps: {e}"))?;
        let tx_hash = *pending.tx_hash();
        info!("handleOps tx hash: {}", tx_hash);

        let receipt = pending
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(|e| anyhow!("Failed to get receipt for handleOps {tx_hash}: {e}"))?;
        if !receipt.status() {
            return Err(anyhow!("handleOps transaction {tx_hash} reverted"));
        }
        info!(
            "Bundle executed at block {:?}: {}",
            receipt.block_number, tx_hash
        );
        Ok(tx_hash)
    }
}
