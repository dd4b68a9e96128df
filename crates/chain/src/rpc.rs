//! Minimal async Ethereum JSON-RPC client.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ChainClientError;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// One entry of an `eth_getLogs` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: Option<String>,
    pub log_index: Option<String>,
    pub transaction_hash: Option<String>,
    /// Set by the node when the log was dropped by a reorg.
    #[serde(default)]
    pub removed: bool,
}

/// Parses a `0x`-prefixed hex quantity.
pub fn parse_quantity(method: &str, value: &str) -> Result<u64, ChainClientError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| ChainClientError::malformed(method, format!("quantity {value} lacks 0x")))?;
    if digits.is_empty() {
        return Err(ChainClientError::malformed(method, "empty quantity"));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainClientError::malformed(method, format!("quantity {value}: {e}")))
}

pub fn format_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

#[derive(Clone, Debug)]
pub struct JsonRpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
    request_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, ChainClientError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .pool_max_idle_per_host(8)
            .build()?;
        Ok(Self {
            http_client,
            rpc_url: rpc_url.into(),
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainClientError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.request_id.fetch_add(1, Ordering::SeqCst),
        };
        debug!("[RPC] >>> {} #{}", method, request.id);

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("[RPC] <<< HTTP {} for {}", status, method);
            return Err(ChainClientError::Http {
                endpoint: self.rpc_url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let envelope: JsonRpcResponse = response.json().await?;
        if let Some(error) = envelope.error {
            return Err(ChainClientError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        let result = envelope
            .result
            .ok_or_else(|| ChainClientError::malformed(method, "missing result"))?;
        serde_json::from_value(result).map_err(|e| ChainClientError::malformed(method, e.to_string()))
    }

    pub async fn block_number(&self) -> Result<u64, ChainClientError> {
        let head: String = self.call("eth_blockNumber", json!([])).await?;
        parse_quantity("eth_blockNumber", &head)
    }

    /// Logs of `address` with the given first topic in `from..=to`.
    pub async fn get_logs(
        &self,
        address: &str,
        topic0: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RpcLog>, ChainClientError> {
        let filter = json!([{
            "address": address,
            "fromBlock": format_quantity(from_block),
            "toBlock": format_quantity(to_block),
            "topics": [topic0],
        }]);
        self.call("eth_getLogs", filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_round_trip() {
        assert_eq!(parse_quantity("m", "0x1b4").unwrap(), 436);
        assert_eq!(parse_quantity("m", "0x0").unwrap(), 0);
        assert_eq!(format_quantity(436), "0x1b4");
    }

    #[test]
    fn test_quantity_rejects_bad_input() {
        assert!(parse_quantity("m", "1b4").is_err());
        assert!(parse_quantity("m", "0x").is_err());
        assert!(parse_quantity("m", "0xzz").is_err());
    }

    #[test]
    fn test_rpc_log_deserializes_node_shape() {
        let log: RpcLog = serde_json::from_value(json!({
            "address": "0x00000000000000000000000000000000000000AA",
            "topics": ["0x01"],
            "data": "0x",
            "blockNumber": "0x10",
            "logIndex": "0x2",
            "transactionHash": "0xabc",
            "transactionIndex": "0x0",
            "blockHash": "0xdef"
        }))
        .unwrap();
        assert_eq!(log.block_number.as_deref(), Some("0x10"));
        assert!(!log.removed);
    }
}
