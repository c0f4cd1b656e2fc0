use crate::{
    keystore::{
        account::StateReader,
        finality::ReceiptReader,
        types::{AccountState, FinalizeWithdrawalArgs, TransactionReceipt},
    },
    utils::rpc_client::JSONRPCClient,
};
use alloy::primitives::{B256, Bytes, U64, U256};
use anyhow::Error;

/// Client for communicating with the keystore sequencer RPC.
pub struct SequencerClient {
    client: JSONRPCClient,
}

impl SequencerClient {
    pub fn new(url: &str) -> Result<Self, Error> {
        Ok(Self {
            client: JSONRPCClient::new(url)?,
        })
    }

    /// Fee per gas the sequencer currently charges for keystore transactions.
    pub async fn gas_price(&self) -> Result<U256, Error> {
        self.client.call_method_noparams("keystore_gasPrice").await
    }

    /// Submits an authenticated transaction, returns its keystore hash.
    pub async fn send_raw_transaction(&self, transaction: Bytes) -> Result<B256, Error> {
        self.client
            .call_method("keystore_sendRawTransaction", (transaction,))
            .await
    }

    /// Arguments for the bridge `finalizeWithdrawal` call for a withdrawal
    /// transaction whose keystore block is already finalized.
    pub async fn build_finalize_withdrawal_args(
        &self,
        tx_hash: B256,
    ) -> Result<FinalizeWithdrawalArgs, Error> {
        self.client
            .call_method("keystore_buildFinalizeWithdrawalArgs", (tx_hash,))
            .await
    }
}

impl ReceiptReader for SequencerClient {
    async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceipt>, Error> {
        self.client
            .call_method("keystore_getTransactionReceipt", (tx_hash,))
            .await
    }
}

impl StateReader for SequencerClient {
    async fn get_transaction_count(&self, keystore_address: B256) -> Result<u64, Error> {
        let count: U64 = self
            .client
            .call_method("keystore_getTransactionCount", (keystore_address, "latest"))
            .await?;
        Ok(count.to::<u64>())
    }

    async fn get_state_at(&self, keystore_address: B256) -> Result<AccountState, Error> {
        self.client
            .call_method("keystore_getStateAt", (keystore_address, "latest"))
            .await
    }
}
