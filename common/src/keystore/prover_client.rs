use crate::utils::rpc_client::JSONRPCClient;
use alloy::primitives::{Address, B256, Bytes};
use anyhow::Error;
use serde::{Deserialize, Serialize};

/// Inputs authenticating one party's signatures over a transaction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthInputs {
    pub code_hash: B256,
    pub signatures: Vec<Bytes>,
    pub eoa_addrs: Vec<Address>,
}

/// Dual-party authentication: the sponsor covers fees, the user authorizes
/// the state change. The prover combines both proofs server-side.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SponsorAuthInputs {
    pub sponsor_auth: AuthInputs,
    pub user_auth: AuthInputs,
}

/// Status of an authentication request. The status string stays raw here,
/// classification happens in the polling session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationStatus {
    pub status: String,
    pub authenticated_transaction: Option<Bytes>,
}

/// Client for communicating with the signature prover RPC.
pub struct ProverClient {
    client: JSONRPCClient,
}

impl ProverClient {
    pub fn new(url: &str) -> Result<Self, Error> {
        Ok(Self {
            client: JSONRPCClient::new(url)?,
        })
    }

    /// Submits a transaction for single-party authentication, returns the
    /// request hash to poll on.
    pub async fn authenticate_transaction(
        &self,
        transaction: Bytes,
        auth_inputs: AuthInputs,
    ) -> Result<B256, Error> {
        self.client
            .call_method("keystore_authenticateTransaction", (transaction, auth_inputs))
            .await
    }

    pub async fn get_authentication_status(
        &self,
        request_hash: B256,
    ) -> Result<AuthenticationStatus, Error> {
        self.client
            .call_method("keystore_getAuthenticationStatus", (request_hash,))
            .await
    }

    /// Submits a transaction for sponsored dual-party authentication.
    pub async fn sponsor_authenticate_transaction(
        &self,
        transaction: Bytes,
        sponsor_auth_inputs: SponsorAuthInputs,
    ) -> Result<B256, Error> {
        self.client
            .call_method(
                "keystore_sponsorAuthenticateTransaction",
                (transaction, sponsor_auth_inputs),
            )
            .await
    }

    pub async fn get_sponsor_authentication_status(
        &self,
        request_hash: B256,
    ) -> Result<AuthenticationStatus, Error> {
        self.client
            .call_method("keystore_getSponsorAuthenticationStatus", (request_hash,))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256, bytes};

    #[tokio::test]
    async fn test_authenticate_transaction_sends_camel_case_inputs() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{
                    "method":"keystore_authenticateTransaction",
                    "params":[
                        "0x02aabb",
                        {
                            "codeHash":"0x7777777777777777777777777777777777777777777777777777777777777777",
                            "signatures":["0x01"],
                            "eoaAddrs":["0x1111111111111111111111111111111111111111"]
                        }
                    ]
                }"#
                .to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"jsonrpc":"2.0","id":0,"result":"0x8888888888888888888888888888888888888888888888888888888888888888"}"#,
            )
            .create_async()
            .await;

        let client = ProverClient::new(&server.url()).unwrap();
        let request_hash = client
            .authenticate_transaction(
                bytes!("0x02aabb"),
                AuthInputs {
                    code_hash: b256!(
                        "0x7777777777777777777777777777777777777777777777777777777777777777"
                    ),
                    signatures: vec![bytes!("0x01")],
                    eoa_addrs: vec![address!("0x1111111111111111111111111111111111111111")],
                },
            )
            .await
            .unwrap();

        assert_eq!(
            request_hash,
            b256!("0x8888888888888888888888888888888888888888888888888888888888888888")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pending_status_has_no_payload() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":0,"result":{"status":"pending"}}"#)
            .create_async()
            .await;

        let client = ProverClient::new(&server.url()).unwrap();
        let status = client
            .get_authentication_status(b256!(
                "0x8888888888888888888888888888888888888888888888888888888888888888"
            ))
            .await
            .unwrap();
        assert_eq!(status.status, "pending");
        assert!(status.authenticated_transaction.is_none());
    }

    #[tokio::test]
    async fn test_completed_status_carries_authenticated_transaction() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"jsonrpc":"2.0","id":0,"result":{
                    "status":"completed",
                    "authenticatedTransaction":"0x02aabbcc"
                }}"#,
            )
            .create_async()
            .await;

        let client = ProverClient::new(&server.url()).unwrap();
        let status = client
            .get_sponsor_authentication_status(b256!(
                "0x8888888888888888888888888888888888888888888888888888888888888888"
            ))
            .await
            .unwrap();
        assert_eq!(status.status, "completed");
        assert_eq!(status.authenticated_transaction, Some(bytes!("0x02aabbcc")));
    }
}
