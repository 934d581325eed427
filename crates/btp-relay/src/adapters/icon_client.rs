//! # Source Chain JSON-RPC Client
//!
//! `SourceChainClient` over JSON-RPC 2.0 / HTTP.
//!
//! Integer and hash params are sent as `0x` hex strings; byte results come
//! back as standard base64 strings.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::config::RelayConfig;
use crate::domain::{HexBytes, HexInt, RelayError};
use crate::ports::SourceChainClient;

const METHOD_HEADER_BY_HEIGHT: &str = "icx_getBlockHeaderByHeight";
const METHOD_VOTES_BY_HEIGHT: &str = "icx_getVotesByHeight";
const METHOD_DATA_BY_HASH: &str = "icx_getDataByHash";
const METHOD_PROOF_FOR_EVENTS: &str = "icx_getProofForEvents";

/// JSON-RPC request structure.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, T: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: u64,
}

/// JSON-RPC response structure.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
}

#[derive(Debug, Serialize)]
struct HeightParam {
    height: HexInt,
}

#[derive(Debug, Serialize)]
struct HashParam {
    hash: HexBytes,
}

#[derive(Debug, Serialize)]
struct ProofEventsParam {
    hash: HexBytes,
    index: HexInt,
    events: Vec<HexInt>,
}

/// JSON-RPC client for the source chain node.
pub struct IconRpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    request_id: AtomicU64,
}

impl IconRpcClient {
    /// Create a client for `rpc_url` with a per-request timeout.
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::transport("client", e))?;
        Ok(Self {
            http_client,
            rpc_url: rpc_url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    /// Create a client from the relay config.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        Self::new(
            config.endpoint.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.rpc_url
    }

    /// Make a JSON-RPC call.
    async fn call<P: Serialize + Send, R: DeserializeOwned + Send>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, RelayError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        debug!("[btp-relay] RPC {} id={}", method, id);

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::transport(method, e))?;

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| RelayError::transport(method, format!("invalid response: {}", e)))?;

        unwrap_response(method, rpc_response)
    }

    async fn call_bytes<P: Serialize + Send>(
        &self,
        method: &str,
        params: P,
    ) -> Result<Vec<u8>, RelayError> {
        let encoded: String = self.call(method, params).await?;
        decode_base64(method, &encoded)
    }
}

fn unwrap_response<R>(method: &str, response: JsonRpcResponse<R>) -> Result<R, RelayError> {
    if let Some(error) = response.error {
        return Err(RelayError::transport(
            method,
            format!("error {}: {}", error.code, error.message),
        ));
    }
    response
        .result
        .ok_or_else(|| RelayError::transport(method, "response missing result"))
}

fn decode_base64(method: &str, encoded: &str) -> Result<Vec<u8>, RelayError> {
    STANDARD
        .decode(encoded)
        .map_err(|e| RelayError::transport(method, format!("invalid base64: {}", e)))
}

#[async_trait]
impl SourceChainClient for IconRpcClient {
    async fn get_block_header_by_height(&self, height: i64) -> Result<Vec<u8>, RelayError> {
        self.call_bytes(
            METHOD_HEADER_BY_HEIGHT,
            HeightParam {
                height: HexInt::from_i64(height),
            },
        )
        .await
    }

    async fn get_votes_by_height(&self, height: i64) -> Result<Vec<u8>, RelayError> {
        self.call_bytes(
            METHOD_VOTES_BY_HEIGHT,
            HeightParam {
                height: HexInt::from_i64(height),
            },
        )
        .await
    }

    async fn get_data_by_hash(&self, hash: &[u8]) -> Result<Vec<u8>, RelayError> {
        self.call_bytes(
            METHOD_DATA_BY_HASH,
            HashParam {
                hash: HexBytes::from_bytes(hash),
            },
        )
        .await
    }

    async fn get_proof_for_events(
        &self,
        block_hash: &[u8],
        index: i64,
        events: &[i64],
    ) -> Result<Vec<Vec<Vec<u8>>>, RelayError> {
        let params = ProofEventsParam {
            hash: HexBytes::from_bytes(block_hash),
            index: HexInt::from_i64(index),
            events: events.iter().copied().map(HexInt::from_i64).collect(),
        };
        let proofs: Vec<Vec<String>> = self.call(METHOD_PROOF_FOR_EVENTS, params).await?;
        proofs
            .iter()
            .map(|nodes| {
                nodes
                    .iter()
                    .map(|n| decode_base64(METHOD_PROOF_FOR_EVENTS, n))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect()
    }
}
