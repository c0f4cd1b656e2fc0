use alloy::rpc::client::{ClientBuilder, RpcClient};
use alloy_json_rpc::{RpcRecv, RpcSend};
use anyhow::{Error, anyhow};

/// Thin JSON-RPC client for the keystore node, sequencer, and signature
/// prover endpoints. Typed wrappers live next to each service.
pub struct JSONRPCClient {
    client: RpcClient,
}

impl JSONRPCClient {
    pub fn new(url: &str) -> Result<Self, Error> {
        let client = ClientBuilder::default().http(url.parse()?);
        Ok(Self { client })
    }

    pub async fn call_method<P, R>(&self, method: &'static str, params: P) -> Result<R, Error>
    where
        P: RpcSend,
        R: RpcRecv,
    {
        self.client
            .request(method, params)
            .await
            .map_err(|e| anyhow!("{method} request failed: {e}"))
    }

    pub async fn call_method_noparams<R>(&self, method: &'static str) -> Result<R, Error>
    where
        R: RpcRecv,
    {
        self.client
            .request_noparams(method)
            .await
            .map_err(|e| anyhow!("{method} request failed: {e}"))
    }
}
