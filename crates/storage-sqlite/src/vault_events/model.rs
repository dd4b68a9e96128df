use diesel::prelude::*;
use std::str::FromStr;

use vaultledger_core::vault::{
    AuditStatus, EventExtra, NormalizedVaultEvent, VaultAuditRecord, VaultEventKind,
};
use vaultledger_core::{Error, Result};

use crate::errors::StorageError;
use crate::utils::{
    format_decimal, format_timestamp, from_db_u64, parse_decimal, parse_timestamp,
    parse_timestamp_opt, to_db_u64,
};

/// Audit row. The kind-specific payload is kept as JSON in `extra`.
#[derive(Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(primary_key(event_id))]
#[diesel(table_name = crate::schema::vault_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct VaultEventDB {
    pub event_id: String,
    pub network: String,
    pub vault_address: String,
    pub kind: String,
    pub user_address: Option<String>,
    pub amount: String,
    pub correlation_id: Option<String>,
    pub block_number: i64,
    pub log_index: i64,
    pub tx_hash: String,
    pub extra: String,
    pub status: String,
    pub matched_transaction_id: Option<String>,
    pub first_seen_at: String,
    pub reconciled_at: Option<String>,
}

impl VaultEventDB {
    pub fn from_domain(record: &VaultAuditRecord) -> Result<Self> {
        let event = &record.event;
        let extra = serde_json::to_string(&event.extra).map_err(|e| {
            Error::from(StorageError::InvalidStoredValue(format!(
                "cannot encode payload of event {}: {}",
                record.event_id, e
            )))
        })?;
        Ok(Self {
            event_id: record.event_id.clone(),
            network: event.network.clone(),
            vault_address: event.vault_address.clone(),
            kind: event.kind.as_str().to_string(),
            user_address: event.user_address.clone(),
            amount: format_decimal(event.amount),
            correlation_id: event.correlation_id.clone(),
            block_number: to_db_u64("vault_events.block_number", event.block_number)?,
            log_index: to_db_u64("vault_events.log_index", event.log_index)?,
            tx_hash: event.tx_hash.clone(),
            extra,
            status: record.status.as_str().to_string(),
            matched_transaction_id: record.matched_transaction_id.clone(),
            first_seen_at: format_timestamp(record.first_seen_at),
            reconciled_at: record.reconciled_at.map(format_timestamp),
        })
    }
}

impl TryFrom<VaultEventDB> for VaultAuditRecord {
    type Error = Error;

    fn try_from(db: VaultEventDB) -> Result<Self> {
        let extra: EventExtra = serde_json::from_str(&db.extra).map_err(|e| {
            Error::from(StorageError::InvalidStoredValue(format!(
                "vault_events.extra of {}: {}",
                db.event_id, e
            )))
        })?;
        let event = NormalizedVaultEvent {
            kind: VaultEventKind::from_str(&db.kind)?,
            amount: parse_decimal("vault_events.amount", &db.amount)?,
            block_number: from_db_u64("vault_events.block_number", db.block_number)?,
            log_index: from_db_u64("vault_events.log_index", db.log_index)?,
            network: db.network,
            vault_address: db.vault_address,
            user_address: db.user_address,
            correlation_id: db.correlation_id,
            tx_hash: db.tx_hash,
            extra,
        };
        Ok(Self {
            status: AuditStatus::from_str(&db.status)?,
            first_seen_at: parse_timestamp("vault_events.first_seen_at", &db.first_seen_at)?,
            reconciled_at: parse_timestamp_opt(
                "vault_events.reconciled_at",
                db.reconciled_at.as_deref(),
            )?,
            event_id: db.event_id,
            event,
            matched_transaction_id: db.matched_transaction_id,
        })
    }
}
