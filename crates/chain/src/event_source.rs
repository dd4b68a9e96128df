//! [`VaultEventSource`] backed by an Ethereum JSON-RPC node.

use async_trait::async_trait;
use log::debug;
use std::time::Duration;

use vaultledger_core::vault::{RawVaultLog, VaultConfig, VaultEventKind, VaultEventSource};
use vaultledger_core::Result;

use crate::errors::ChainClientError;
use crate::rpc::{parse_quantity, JsonRpcClient, RpcLog};

const GET_LOGS: &str = "eth_getLogs";

pub struct RpcVaultEventSource {
    client: JsonRpcClient,
}

impl RpcVaultEventSource {
    pub fn new(client: JsonRpcClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &VaultConfig, timeout: Duration) -> Result<Self> {
        Ok(Self::new(JsonRpcClient::new(config.rpc_url.clone(), timeout)?))
    }
}

/// Converts a node log to the ledger's raw shape. Logs without a block
/// position (still pending) or flagged as removed yield `None`.
pub fn to_raw_log(log: RpcLog) -> std::result::Result<Option<RawVaultLog>, ChainClientError> {
    if log.removed {
        return Ok(None);
    }
    let (Some(block_number), Some(log_index), Some(transaction_hash)) =
        (log.block_number, log.log_index, log.transaction_hash)
    else {
        return Ok(None);
    };
    Ok(Some(RawVaultLog {
        address: log.address,
        topics: log.topics,
        data: log.data,
        block_number: parse_quantity(GET_LOGS, &block_number)?,
        log_index: parse_quantity(GET_LOGS, &log_index)?,
        transaction_hash,
    }))
}

#[async_trait]
impl VaultEventSource for RpcVaultEventSource {
    async fn latest_block(&self) -> Result<u64> {
        Ok(self.client.block_number().await?)
    }

    async fn fetch_logs(
        &self,
        vault_address: &str,
        kind: VaultEventKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawVaultLog>> {
        let logs = self
            .client
            .get_logs(vault_address, &kind.topic0(), from_block, to_block)
            .await?;
        let fetched = logs.len();
        let mut raw_logs = Vec::with_capacity(fetched);
        for log in logs {
            if let Some(raw) = to_raw_log(log)? {
                raw_logs.push(raw);
            }
        }
        if raw_logs.len() != fetched {
            debug!(
                "Dropped {} pending or removed {} logs from {}",
                fetched - raw_logs.len(),
                kind,
                self.client.rpc_url()
            );
        }
        Ok(raw_logs)
    }
}
