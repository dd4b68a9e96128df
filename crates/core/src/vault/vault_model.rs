//! Vault event, audit and checkpoint models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_MAX_BLOCK_RANGE, DEFAULT_MAX_RETRY_ELAPSED_SECS, DEFAULT_POLL_INTERVAL_SECS,
};
use crate::errors::{Error, Result, ValidationError};
use crate::utils::amounts::normalize_address;
use crate::utils::decimal_serde::amount_serde;

fn default_max_block_range() -> u64 {
    DEFAULT_MAX_BLOCK_RANGE
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_max_retry_elapsed_secs() -> u64 {
    DEFAULT_MAX_RETRY_ELAPSED_SECS
}

/// One (network, vault) pair to scan. Constructed from configuration and
/// passed by reference to the scanner that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    pub network: String,
    pub vault_address: String,
    pub rpc_url: String,
    #[serde(default)]
    pub start_block: u64,
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_retry_elapsed_secs")]
    pub max_retry_elapsed_secs: u64,
}

impl VaultConfig {
    pub fn normalized(self) -> Self {
        Self {
            network: self.network.trim().to_lowercase(),
            vault_address: normalize_address(&self.vault_address),
            rpc_url: self.rpc_url.trim().to_string(),
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.trim().is_empty() {
            return Err(Error::InvalidConfigValue("vault network is empty".to_string()));
        }
        if self.vault_address.trim().is_empty() {
            return Err(Error::InvalidConfigValue(format!(
                "vault address is empty for network {}",
                self.network
            )));
        }
        if self.rpc_url.trim().is_empty() {
            return Err(Error::InvalidConfigValue(format!(
                "rpc url is empty for vault {}",
                self.vault_address
            )));
        }
        if self.max_block_range == 0 {
            return Err(Error::InvalidConfigValue(format!(
                "maxBlockRange must be at least 1 for vault {}",
                self.vault_address
            )));
        }
        Ok(())
    }

    /// Scanner lock key.
    pub fn key(&self) -> String {
        format!("{}:{}", self.network, self.vault_address)
    }
}

/// The three events emitted by the vault contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaultEventKind {
    Deposited,
    Withdrawn,
    YieldDistributed,
}

impl VaultEventKind {
    pub const ALL: [VaultEventKind; 3] = [
        VaultEventKind::Deposited,
        VaultEventKind::Withdrawn,
        VaultEventKind::YieldDistributed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VaultEventKind::Deposited => "Deposited",
            VaultEventKind::Withdrawn => "Withdrawn",
            VaultEventKind::YieldDistributed => "YieldDistributed",
        }
    }

    /// Solidity event signature.
    pub fn signature(&self) -> &'static str {
        match self {
            VaultEventKind::Deposited => "Deposited(address,uint256,uint256,uint256,uint8)",
            VaultEventKind::Withdrawn => "Withdrawn(address,uint256,uint256,uint256,uint256)",
            VaultEventKind::YieldDistributed => "YieldDistributed(uint256,uint256)",
        }
    }

    /// `0x`-prefixed keccak-256 of the signature, i.e. the log's topic0.
    pub fn topic0(&self) -> String {
        let digest = Keccak256::digest(self.signature().as_bytes());
        format!("0x{}", hex::encode(digest))
    }

    pub fn from_topic0(topic: &str) -> Option<Self> {
        let topic = normalize_address(topic);
        Self::ALL.into_iter().find(|kind| kind.topic0() == topic)
    }
}

impl fmt::Display for VaultEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VaultEventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Deposited" => Ok(VaultEventKind::Deposited),
            "Withdrawn" => Ok(VaultEventKind::Withdrawn),
            "YieldDistributed" => Ok(VaultEventKind::YieldDistributed),
            other => Err(ValidationError::InvalidInput(format!(
                "Unknown vault event kind '{}'",
                other
            ))
            .into()),
        }
    }
}

/// An EVM log as returned by the event source, before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVaultLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: String,
}

/// Kind-specific payload of a normalized event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EventExtra {
    Deposited {
        #[serde(with = "amount_serde")]
        shares: Decimal,
        lock_tier: u8,
    },
    Withdrawn {
        #[serde(with = "amount_serde")]
        yield_amount: Decimal,
        #[serde(with = "amount_serde")]
        shares_burned: Decimal,
    },
    YieldDistributed {
        #[serde(with = "amount_serde")]
        new_interest_index: Decimal,
    },
}

/// Uniform shape for every vault event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedVaultEvent {
    pub network: String,
    pub vault_address: String,
    pub kind: VaultEventKind,
    /// None for vault-wide events.
    pub user_address: Option<String>,
    #[serde(with = "amount_serde")]
    pub amount: Decimal,
    /// The contract's per-user deposit id.
    pub correlation_id: Option<String>,
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: String,
    pub extra: EventExtra,
}

impl NormalizedVaultEvent {
    /// Idempotency key: sha256 over (network, vault, tx hash, kind, log index).
    pub fn event_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.network.as_bytes());
        hasher.update(b"|");
        hasher.update(self.vault_address.as_bytes());
        hasher.update(b"|");
        hasher.update(self.tx_hash.as_bytes());
        hasher.update(b"|");
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(self.log_index.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn yield_amount(&self) -> Decimal {
        match &self.extra {
            EventExtra::Withdrawn { yield_amount, .. } => *yield_amount,
            _ => Decimal::ZERO,
        }
    }

    pub fn shares(&self) -> Option<Decimal> {
        match &self.extra {
            EventExtra::Deposited { shares, .. } => Some(*shares),
            EventExtra::Withdrawn { shares_burned, .. } => Some(*shares_burned),
            EventExtra::YieldDistributed { .. } => None,
        }
    }

    pub fn lock_tier(&self) -> Option<u8> {
        match &self.extra {
            EventExtra::Deposited { lock_tier, .. } => Some(*lock_tier),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Orphaned,
    Matched,
    AuditOnly,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Orphaned => "orphaned",
            AuditStatus::Matched => "matched",
            AuditStatus::AuditOnly => "audit_only",
        }
    }

    /// Initial status when an event is first recorded.
    pub fn initial_for(kind: VaultEventKind) -> Self {
        match kind {
            VaultEventKind::YieldDistributed => AuditStatus::AuditOnly,
            _ => AuditStatus::Orphaned,
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "orphaned" => Ok(AuditStatus::Orphaned),
            "matched" => Ok(AuditStatus::Matched),
            "audit_only" => Ok(AuditStatus::AuditOnly),
            other => Err(ValidationError::InvalidInput(format!(
                "Unknown audit status '{}'",
                other
            ))
            .into()),
        }
    }
}

/// Audit-store row: the event plus its reconciliation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultAuditRecord {
    pub event_id: String,
    pub event: NormalizedVaultEvent,
    pub status: AuditStatus,
    pub matched_transaction_id: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub reconciled_at: Option<DateTime<Utc>>,
}

impl VaultAuditRecord {
    pub fn new(event: NormalizedVaultEvent, now: DateTime<Utc>) -> Self {
        Self {
            event_id: event.event_id(),
            status: AuditStatus::initial_for(event.kind),
            event,
            matched_transaction_id: None,
            first_seen_at: now,
            reconciled_at: None,
        }
    }
}

/// Marks an audit row matched; committed with the ledger mutation it caused.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditMatch {
    pub event_id: String,
    pub transaction_id: String,
    pub reconciled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCheckpoint {
    pub network: String,
    pub vault_address: String,
    pub last_processed_block: u64,
    pub updated_at: DateTime<Utc>,
}
