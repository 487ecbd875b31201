//! EVM JSON-RPC chain client.
//!
//! Implements the `ChainClient` collaborator with `eth_call` reads against
//! a single node. Errors here are environment-caused (node down, contract
//! reverted, malformed response) and are reported to the orchestrator,
//! which decides whether they fail a token or terminate an enumeration.

pub mod abi;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use publisher_common::ChainClient;

use abi::{
    decode_string, decode_uint, encode_call, SELECTOR_TOKEN_BY_INDEX, SELECTOR_TOKEN_URI,
    SELECTOR_TOTAL_SUPPLY,
};

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'static str,
    params: (CallParams<'a>, &'static str),
}

#[derive(Debug, Serialize)]
struct CallParams<'a> {
    from: &'a str,
    to: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// `eth_call`-based implementation of [`ChainClient`].
pub struct EthCallClient {
    http: reqwest::Client,
    node_url: String,
    caller_address: String,
}

impl EthCallClient {
    pub fn new(node_url: impl Into<String>, caller_address: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .context("failed to build RPC client")?;
        Ok(Self {
            http,
            node_url: node_url.into(),
            caller_address: caller_address.into(),
        })
    }

    async fn eth_call(&self, contract: &str, data: &str) -> Result<String> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_call",
            params: (
                CallParams {
                    from: &self.caller_address,
                    to: contract,
                    data,
                },
                "latest",
            ),
        };

        let response: RpcResponse = self
            .http
            .post(&self.node_url)
            .json(&request)
            .send()
            .await
            .context("eth_call request failed")?
            .json()
            .await
            .context("eth_call returned malformed JSON")?;

        if let Some(error) = response.error {
            bail!("eth_call failed: {} (code {})", error.message, error.code);
        }

        match response.result {
            Some(result) if result != "0x" => Ok(result),
            _ => bail!("eth_call returned an empty result for {contract}"),
        }
    }
}

#[async_trait]
impl ChainClient for EthCallClient {
    async fn total_supply(&self, address: &str) -> Result<U256> {
        let data = encode_call(SELECTOR_TOTAL_SUPPLY, &[]);
        let result = self.eth_call(address, &data).await?;
        decode_uint(&result)
    }

    async fn token_id_at(&self, address: &str, index: U256) -> Result<U256> {
        let data = encode_call(SELECTOR_TOKEN_BY_INDEX, &[index]);
        let result = self.eth_call(address, &data).await?;
        decode_uint(&result)
    }

    async fn token_uri(&self, address: &str, token_id: U256) -> Result<String> {
        let data = encode_call(SELECTOR_TOKEN_URI, &[token_id]);
        let result = self.eth_call(address, &data).await?;
        let uri = decode_string(&result)?;
        tracing::trace!(
            target: "publisher_chain",
            contract = address,
            token_id = %token_id,
            uri = %uri,
            "resolved token URI"
        );
        Ok(uri)
    }
}
