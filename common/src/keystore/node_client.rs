use crate::{
    keystore::{
        account::StateReader,
        finality::ReceiptReader,
        types::{AccountState, ImtProofResponse, KeystoreBlockHeader, TransactionReceipt},
    },
    utils::rpc_client::JSONRPCClient,
};
use alloy::primitives::{B256, U64};
use anyhow::Error;

/// Client for communicating with the keystore node RPC.
pub struct NodeClient {
    client: JSONRPCClient,
}

impl NodeClient {
    pub fn new(url: &str) -> Result<Self, Error> {
        Ok(Self {
            client: JSONRPCClient::new(url)?,
        })
    }

    /// IMT proof for the keystore address at the given keystore block.
    pub async fn get_proof(
        &self,
        keystore_address: B256,
        block_number: u64,
    ) -> Result<ImtProofResponse, Error> {
        self.client
            .call_method(
                "keystore_getProof",
                (keystore_address, U64::from(block_number)),
            )
            .await
    }

    /// Resolves a keystore state root to the block it was produced at.
    /// Returns `None` for roots the node does not know, including roots
    /// cached on the destination chain before the node pruned them.
    pub async fn get_block_number_by_state_root(
        &self,
        state_root: B256,
    ) -> Result<Option<u64>, Error> {
        let number: Option<U64> = self
            .client
            .call_method("keystore_getBlockNumberByStateRoot", (state_root,))
            .await?;
        Ok(number.map(|number| number.to::<u64>()))
    }

    pub async fn get_block_by_number(
        &self,
        block_number: u64,
    ) -> Result<KeystoreBlockHeader, Error> {
        self.client
            .call_method("keystore_getBlockByNumber", (U64::from(block_number),))
            .await
    }
}

impl ReceiptReader for NodeClient {
    async fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceipt>, Error> {
        self.client
            .call_method("keystore_getTransactionReceipt", (tx_hash,))
            .await
    }
}

impl StateReader for NodeClient {
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

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;

    #[tokio::test]
    async fn test_get_proof_parses_exclusion_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"jsonrpc":"2.0","id":0,"result":{
                    "proof":{
                        "isExclusionProof":true,
                        "leaf":{
                            "keyPrefix":"0x01",
                            "key":"0x00000000000000000000000000000000000000000000000000000000000000aa",
                            "value":"0xbeef",
                            "nextKeyPrefix":"0x02",
                            "nextKey":"0x00000000000000000000000000000000000000000000000000000000000000bb"
                        },
                        "siblings":[
                            {"hash":"0x1111111111111111111111111111111111111111111111111111111111111111","isLeft":true},
                            {"hash":"0x2222222222222222222222222222222222222222222222222222222222222222","isLeft":false}
                        ]
                    },
                    "state":null
                }}"#,
            )
            .create_async()
            .await;

        let client = NodeClient::new(&server.url()).unwrap();
        let response = client
            .get_proof(
                b256!("0x00000000000000000000000000000000000000000000000000000000000000aa"),
                7,
            )
            .await
            .unwrap();

        assert!(response.proof.is_exclusion_proof);
        assert!(response.state.is_none());
        assert_eq!(response.proof.siblings.len(), 2);
        assert!(response.proof.siblings[0].is_left);
        assert!(!response.proof.siblings[1].is_left);
        assert_eq!(response.proof.leaf.key_prefix.as_slice(), &[0x01]);
    }

    #[tokio::test]
    async fn test_stale_state_root_resolves_to_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":0,"result":null}"#)
            .create_async()
            .await;

        let client = NodeClient::new(&server.url()).unwrap();
        let number = client
            .get_block_number_by_state_root(b256!(
                "0x3333333333333333333333333333333333333333333333333333333333333333"
            ))
            .await
            .unwrap();
        assert!(number.is_none());
    }

    #[tokio::test]
    async fn test_get_state_at_parses_account_state() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"jsonrpc":"2.0","id":0,"result":{
                    "data":"0x00aabb",
                    "dataHash":"0x4444444444444444444444444444444444444444444444444444444444444444",
                    "vkey":"0xdeadbeef"
                }}"#,
            )
            .create_async()
            .await;

        let client = NodeClient::new(&server.url()).unwrap();
        let state = client
            .get_state_at(b256!(
                "0x00000000000000000000000000000000000000000000000000000000000000aa"
            ))
            .await
            .unwrap();
        assert_eq!(state.data.as_ref(), &[0x00, 0xaa, 0xbb]);
        assert_eq!(
            state.data_hash,
            b256!("0x4444444444444444444444444444444444444444444444444444444444444444")
        );
    }

    #[tokio::test]
    async fn test_get_transaction_count_decodes_hex_quantity() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":0,"result":"0x2a"}"#)
            .create_async()
            .await;

        let client = NodeClient::new(&server.url()).unwrap();
        let count = client
            .get_transaction_count(b256!(
                "0x00000000000000000000000000000000000000000000000000000000000000aa"
            ))
            .await
            .unwrap();
        assert_eq!(count, 42);
    }
}
