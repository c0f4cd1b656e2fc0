use super::bindings::{KeystoreBridge, LATEST_STATE_ROOT_SLOT};
use crate::{config::Config, keystore::types::FinalizeWithdrawalArgs};
use alloy::{
    eips::BlockId,
    network::EthereumWallet,
    primitives::{Address, B256, Bytes, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::EIP1186AccountProofResponse,
    signers::local::PrivateKeySigner,
    sol_types::SolEvent,
};
use anyhow::{Error, anyhow};
use serde_json::Value;
use std::{borrow::Cow, str::FromStr, time::Duration};
use tracing::info;

const RECEIPT_TIMEOUT: Duration = Duration::from_secs(100);

/// Source-chain execution layer. The keystore bridge lives here: deposits
/// enter through it, withdrawals leave through it, and its latest-state-root
/// slot is what the relay proves to the destination chain.
pub struct ExecutionLayer {
    provider: DynProvider,
    bridge: KeystoreBridge::KeystoreBridgeInstance<DynProvider>,
    relayer_address: Address,
}

impl ExecutionLayer {
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let signer = PrivateKeySigner::from_str(config.funded_private_key.as_str())
            .map_err(|e| anyhow!("Failed to parse FUNDED_PRIVATE_KEY: {e}"))?;
        let relayer_address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(config.l1_rpc_url.parse()?)
            .erased();

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| anyhow!("Failed to get L1 chain ID: {e}"))?;
        info!("L1 chain ID: {}, keystore bridge: {}", chain_id, config.bridge_address);

        let bridge = KeystoreBridge::new(config.bridge_address, provider.clone());

        Ok(Self {
            provider,
            bridge,
            relayer_address,
        })
    }

    pub fn relayer_address(&self) -> Address {
        self.relayer_address
    }

    /// Fetches the block header in its raw RPC form. The canonicalizer
    /// needs the fetched shape: fork-gated fields genuinely absent,
    /// quantities minimal-width hex.
    pub async fn get_block_header_json(&self, block_number: u64) -> Result<Value, Error> {
        let block: Value = self
            .provider
            .raw_request(
                Cow::Borrowed("eth_getBlockByNumber"),
                (format!("0x{block_number:x}"), false),
            )
            .await
            .map_err(|e| anyhow!("Failed to fetch L1 block {block_number}: {e}"))?;
        if block.is_null() {
            return Err(anyhow!("L1 block {block_number} not found"));
        }
        Ok(block)
    }

    /// `eth_getProof` for the bridge account and its latest-state-root slot
    /// at the given block.
    pub async fn get_state_root_proof(
        &self,
        block_number: u64,
    ) -> Result<EIP1186AccountProofResponse, Error> {
        self.provider
            .get_proof(*self.bridge.address(), vec![LATEST_STATE_ROOT_SLOT])
            .block_id(BlockId::number(block_number))
            .await
            .map_err(|e| anyhow!("Failed to fetch storage proof for the keystore bridge: {e}"))
    }

    /// Submits an L1-initiated keystore transaction to the bridge and waits
    /// one confirmation. Returns the L1 transaction hash and the keystore
    /// transaction hash emitted by the bridge.
    pub async fn initiate_transaction(
        &self,
        transaction: Bytes,
        value: U256,
    ) -> Result<(B256, B256), Error> {
        let pending = self
            .bridge
            .initiateTransaction(transaction)
            .value(value)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send initiateTransaction to the bridge: {e}"))?;
        let tx_hash = *pending.tx_hash();
        info!("Bridge initiateTransaction tx hash: {}", tx_hash);

        let receipt = pending
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(|e| anyhow!("Failed to get receipt for bridge transaction {tx_hash}: {e}"))?;
        if !receipt.status() {
            return Err(anyhow!("Bridge transaction {tx_hash} reverted"));
        }

        let initiated = receipt
            .inner
            .logs()
            .iter()
            .find(|log| log.topic0() == Some(&KeystoreBridge::TransactionInitiated::SIGNATURE_HASH))
            .ok_or_else(|| anyhow!("No TransactionInitiated event in receipt for {tx_hash}"))?
            .log_decode::<KeystoreBridge::TransactionInitiated>()
            .map_err(|e| anyhow!("Failed to decode TransactionInitiated event: {e}"))?;

        Ok((tx_hash, initiated.inner.l2TransactionHash))
    }

    /// Submits `finalizeWithdrawal` with the arguments assembled by the
    /// keystore sequencer and waits one confirmation.
    pub async fn finalize_withdrawal(&self, args: &FinalizeWithdrawalArgs) -> Result<B256, Error> {
        let pending = self
            .bridge
            .finalizeWithdrawal(
                args.keystore_block_number,
                args.withdrawal_transaction.clone(),
                args.proof.clone(),
            )
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send finalizeWithdrawal to the bridge: {e}"))?;
        let tx_hash = *pending.tx_hash();
        info!("Bridge finalizeWithdrawal tx hash: {}", tx_hash);

        let receipt = pending
            .with_timeout(Some(RECEIPT_TIMEOUT))
            .get_receipt()
            .await
            .map_err(|e| anyhow!("Failed to get receipt for finalizeWithdrawal {tx_hash}: {e}"))?;
        if !receipt.status() {
            return Err(anyhow!("finalizeWithdrawal transaction {tx_hash} reverted"));
        }

        Ok(tx_hash)
    }
}
