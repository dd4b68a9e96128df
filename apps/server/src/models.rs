//! Request and response bodies that differ from the core models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vaultledger_core::goals::{GoalStatus, TokenIdentity};
use vaultledger_core::transactions::ChainSubmission;
use vaultledger_core::utils::decimal_serde::amount_serde;
use vaultledger_core::vault::{ScanCheckpoint, VaultConfig};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub owner_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickSaveRequest {
    pub owner_id: String,
    pub token: TokenIdentity,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: GoalStatus,
}

/// Deposit or withdrawal body; the goal comes from the path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountRequest {
    #[serde(with = "amount_serde")]
    pub amount: Decimal,
    pub submission: Option<ChainSubmission>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestRequest {
    /// Defaults to today (UTC).
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ValuationQuery {
    pub quote: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionRequest {
    pub user_id: String,
    #[serde(with = "amount_serde")]
    pub amount: Decimal,
    pub submission: Option<ChainSubmission>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveMemberRequest {
    pub approver_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOwnershipRequest {
    pub owner_id: String,
    pub new_owner_id: String,
}

#[derive(Debug, Deserialize)]
pub struct FailTransactionRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<i64>,
}

/// A configured vault and how far it has been scanned.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStatus {
    pub network: String,
    pub vault_address: String,
    pub start_block: u64,
    pub poll_interval_secs: u64,
    pub checkpoint: Option<ScanCheckpoint>,
}

impl VaultStatus {
    pub fn new(config: &VaultConfig, checkpoint: Option<ScanCheckpoint>) -> Self {
        Self {
            network: config.network.clone(),
            vault_address: config.vault_address.clone(),
            start_block: config.start_block,
            poll_interval_secs: config.poll_interval_secs,
            checkpoint,
        }
    }
}
